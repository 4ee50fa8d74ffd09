//! Thread-safe shared reader and views with per-thread cursors
//!
//! 线程安全的共享读取器及按线程游标的视图

use memmap2::Mmap;
use parking_lot::Mutex;
use std::cell::Cell;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thread_local::ThreadLocal;
use super::access::{check_seek, check_span, RandomAccess};
use super::config::PageConfig;
use super::error::{Error, Result};
use super::page::{copy_from_page, read_paged, Page, PageCache};
use super::paged_reader::PagedReader;

struct Shared {
    path: PathBuf,
    file: File,
    size: u64,
    config: PageConfig,
    closed: AtomicBool,
    maps: AtomicU64,

    /// Guards map/evict only; decoding happens on an `Arc<Page>` outside the lock
    ///
    /// 只保护映射/淘汰；解码在锁外通过 `Arc<Page>` 进行
    pages: Mutex<PageCache<Arc<Page<Mmap>>>>,
}

/// Read-only paged engine shareable across threads
///
/// 可在线程间共享的只读分页引擎
///
/// The page cache sits behind a mutex that is held only while a page is looked
/// up, mapped or evicted. Callers receive a reference-counted page and decode
/// from it without holding the lock, so reads of resident bytes proceed in
/// parallel. A page evicted while another thread still reads from it stays
/// mapped until that thread lets go of it.
///
/// 页面缓存位于互斥锁之后，仅在查找、映射或淘汰页面时持有锁。
/// 调用者得到引用计数的页面并在锁外解码，因此对驻留字节的读取可以并行进行。
/// 某页在其他线程仍在读取时被淘汰，会保持映射直到该线程释放它。
///
/// # Thrashing
///
/// Threads reading far-apart offsets with the default single-page cache evict
/// each other's pages and remap repeatedly. [`maps_performed`](Self::maps_performed)
/// exposes the number of mappings for diagnosis; a larger `cache_pages` trades
/// address space for fewer remaps.
///
/// # 抖动
///
/// 使用默认单页缓存时，读取相距较远偏移的线程会互相淘汰页面并反复重新映射。
/// [`maps_performed`](Self::maps_performed) 提供映射次数以便诊断；
/// 更大的 `cache_pages` 以地址空间换取更少的重新映射。
///
/// # Examples
///
/// ```
/// use paged_mmap::{PagedWriter, RandomAccess, RandomAccessMut, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("shared.bin");
/// let writer = PagedWriter::create(&path)?;
/// for i in 0..1024 {
///     writer.put_i32(i)?;
/// }
/// let shared = writer.into_shared()?;
/// let view = shared.view(0, shared.len())?;
///
/// std::thread::scope(|s| {
///     for t in 0..4 {
///         let view = &view;
///         s.spawn(move || {
///             // Each thread owns an independent cursor
///             // 每个线程拥有独立的游标
///             view.seek(t * 1024).unwrap();
///             assert_eq!(view.get_i32().unwrap(), (t * 256) as i32);
///         });
///     }
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SharedPagedReader {
    inner: Arc<Shared>,
}

impl SharedPagedReader {
    /// Open an existing file with the default reader geometry
    ///
    /// 使用默认读取配置打开已存在的文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        PagedReader::open(path)?.into_shared()
    }

    pub fn open_with(path: impl AsRef<Path>, config: PageConfig) -> Result<Self> {
        PagedReader::open_with(path, config)?.into_shared()
    }

    pub(crate) fn from_parts(path: PathBuf, file: File, size: u64, config: PageConfig) -> Self {
        Self {
            inner: Arc::new(Shared {
                path,
                file,
                size,
                config,
                closed: AtomicBool::new(false),
                maps: AtomicU64::new(0),
                pages: Mutex::new(PageCache::new(config.cache_pages())),
            }),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// File size in bytes
    ///
    /// 文件大小（字节）
    #[inline]
    pub fn len(&self) -> u64 {
        self.inner.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.size == 0
    }

    #[inline]
    pub fn config(&self) -> &PageConfig {
        &self.inner.config
    }

    /// Total number of page mappings performed so far
    ///
    /// 迄今执行的页面映射总数
    pub fn maps_performed(&self) -> u64 {
        self.inner.maps.load(Ordering::Relaxed)
    }

    /// Number of pages held by the cache
    ///
    /// 缓存持有的页面数
    pub fn resident_pages(&self) -> usize {
        self.inner.pages.lock().len()
    }

    /// Window `[start, end)` with a per-thread cursor
    ///
    /// 拥有按线程游标的窗口 `[start, end)`
    ///
    /// # Errors
    /// `InvalidRange` if `start > end` or `end > len()`
    pub fn view(&self, start: u64, end: u64) -> Result<ConcurrentWindowedView> {
        if start > end || end > self.inner.size {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(ConcurrentWindowedView {
            shared: self.clone(),
            start,
            end,
            cursors: ThreadLocal::new(),
        })
    }

    /// Fill `buf` from absolute `offset`
    ///
    /// 从绝对偏移 `offset` 开始填充 `buf`
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_span(offset, buf.len() as u64, self.inner.size)?;
        read_paged(&self.inner.config, offset, buf, |index, in_page, dst| {
            let page = self.page(index)?;
            Ok(copy_from_page(page.bytes(), in_page, dst))
        })
    }

    /// Read exactly `N` bytes at absolute `offset`
    ///
    /// 在绝对偏移 `offset` 处读取恰好 `N` 字节
    pub fn read_array_at<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        check_span(offset, N as u64, self.inner.size)?;
        let mut out = [0u8; N];
        if N as u64 > self.inner.config.overlap() {
            self.read_at(offset, &mut out)?;
            return Ok(out);
        }
        let (index, in_page) = self.inner.config.locate(offset);
        let page = self.page(index)?;
        out.copy_from_slice(&page.bytes()[in_page..in_page + N]);
        Ok(out)
    }

    /// Evict every page; later page fetches fail with `Closed`
    ///
    /// 淘汰所有页面；之后的页面获取会返回 `Closed`
    ///
    /// Closing while other threads still access the file is not supported:
    /// their in-flight reads finish on pages they already hold, and their
    /// next fetch fails. The file handle is released when the last clone drops.
    ///
    /// 不支持在其他线程仍在访问时关闭：它们进行中的读取会在已持有的页面上完成，
    /// 下一次获取将失败。文件句柄在最后一个克隆被丢弃时释放。
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            self.inner.pages.lock().clear();
            tracing::debug!(path = %self.inner.path.display(), "closed shared paged reader");
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Fetch page `index`, mapping it under the lock on a cache miss
    ///
    /// 获取第 `index` 页，未命中缓存时在锁内映射
    fn page(&self, index: u64) -> Result<Arc<Page<Mmap>>> {
        let inner = &*self.inner;
        let mut pages = inner.pages.lock();
        // Checked under the lock so a concurrent close cannot race a new mapping in
        // 在锁内检查，避免并发关闭与新映射竞争
        if inner.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        if let Some(page) = pages.get(index) {
            return Ok(Arc::clone(page));
        }
        pages.make_room();
        let page = Page::map_read(&inner.file, &inner.path, index, &inner.config, inner.size)?;
        inner.maps.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::clone(pages.insert(Arc::new(page))))
    }
}

/// Implement Debug for SharedPagedReader
///
/// 为 SharedPagedReader 实现 Debug
impl std::fmt::Debug for SharedPagedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPagedReader")
            .field("path", &self.inner.path)
            .field("size", &self.inner.size)
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Window over a [`SharedPagedReader`] whose cursor is private to each thread
///
/// 基于 [`SharedPagedReader`] 的窗口，其游标为每个线程私有
///
/// The view itself is `Send + Sync`; sharing one view by reference gives every
/// thread its own position starting at `0`. A clone is a distinct view with a
/// distinct cursor.
///
/// 视图本身是 `Send + Sync`；以引用共享同一视图时，每个线程都拥有从 `0`
/// 开始的独立位置。克隆出的视图是拥有独立游标的另一个视图。
///
/// Cursors are owned by the view, one slot per thread that touched it, and
/// are freed together with the view whichever thread drops it.
///
/// 游标归视图所有，每个访问过它的线程占一个槽位，无论在哪个线程上丢弃视图都会一并释放。
pub struct ConcurrentWindowedView {
    shared: SharedPagedReader,
    start: u64,
    end: u64,
    cursors: ThreadLocal<Cell<u64>>,
}

impl ConcurrentWindowedView {
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    #[inline]
    pub fn shared(&self) -> &SharedPagedReader {
        &self.shared
    }

    /// Number of threads holding a cursor slot in this view
    ///
    /// 在此视图中持有游标槽位的线程数
    pub fn cursor_slots(&mut self) -> usize {
        self.cursors.iter_mut().count()
    }

    #[inline]
    fn cursor(&self) -> &Cell<u64> {
        self.cursors.get_or_default()
    }

    /// Window `[start, end)` relative to this view, with fresh cursors
    ///
    /// 相对于此视图的窗口 `[start, end)`，游标重新开始
    pub fn view(&self, start: u64, end: u64) -> Result<ConcurrentWindowedView> {
        if start > end || end > self.len() {
            return Err(Error::InvalidRange { start, end });
        }
        self.shared.view(self.start + start, self.start + end)
    }
}

impl Clone for ConcurrentWindowedView {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            start: self.start,
            end: self.end,
            cursors: ThreadLocal::new(),
        }
    }
}

impl RandomAccess for ConcurrentWindowedView {
    #[inline]
    fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    fn position(&self) -> u64 {
        self.cursors.get().map_or(0, Cell::get)
    }

    fn seek(&self, pos: u64) -> Result<()> {
        check_seek(pos, self.len())?;
        self.cursor().set(pos);
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_span(offset, buf.len() as u64, self.len())?;
        self.shared.read_at(self.start + offset, buf)
    }

    #[inline]
    fn read_array_at<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        check_span(offset, N as u64, self.len())?;
        self.shared.read_array_at(self.start + offset)
    }
}

impl std::fmt::Debug for ConcurrentWindowedView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentWindowedView")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("position", &self.position())
            .finish()
    }
}
