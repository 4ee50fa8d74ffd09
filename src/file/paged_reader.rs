//! Read-only paged engine based on memmap2
//!
//! 基于 memmap2 的只读分页引擎

use memmap2::Mmap;
use std::cell::{Cell, RefCell};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use super::access::{check_seek, check_span, RandomAccess};
use super::concurrent_view::SharedPagedReader;
use super::config::PageConfig;
use super::error::{Error, Result};
use super::page::{copy_from_page, read_paged, Page, PageCache};
use super::view::WindowedView;

/// Read-only, page-at-a-time memory-mapped file
///
/// 逐页内存映射的只读文件
///
/// Maps fixed-size chunks of an immutable file on demand, so files larger than
/// a single mapping call can address are still byte-addressable. With the
/// default configuration exactly one page is mapped at a time; touching a
/// different page unmaps the previous one before mapping the next.
///
/// 按需映射不可变文件的定长块，使超出单次映射上限的文件仍可按字节寻址。
/// 默认配置下同一时刻只映射一个页面；访问另一个页面时会先解除旧映射再映射新页面。
///
/// # Limitations
///
/// - Not `Sync`: share it across threads through [`PagedReader::into_shared`]
/// - The size is fixed when the file is opened
///
/// # 限制
///
/// - 不是 `Sync`：跨线程共享请使用 [`PagedReader::into_shared`]
/// - 文件大小在打开时确定
///
/// # Examples
///
/// ```
/// use paged_mmap::{PageConfig, PagedReader, PagedWriter, RandomAccess, RandomAccessMut, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("reader.bin");
/// let mut writer = PagedWriter::create(&path)?;
/// for i in 0..100 {
///     writer.put_i64(i)?;
/// }
/// writer.close()?;
///
/// // Tiny pages so the reads below cross page boundaries
/// // 使用极小的页面，使下面的读取跨越页面边界
/// let config = PageConfig::reader().with_page_size(64).with_overlap(8);
/// let reader = PagedReader::open_with(&path, config)?;
/// assert_eq!(reader.len(), 800);
/// assert_eq!(reader.get_i64_at(8 * 42)?, 42);
/// assert_eq!(reader.resident_pages(), 1);
/// # Ok(())
/// # }
/// ```
pub struct PagedReader {
    path: PathBuf,

    /// `None` once closed
    ///
    /// 关闭后为 `None`
    file: Option<File>,

    size: u64,
    config: PageConfig,
    cursor: Cell<u64>,
    pages: RefCell<PageCache<Page<Mmap>>>,
}

impl PagedReader {
    /// Open an existing file with the default reader geometry
    ///
    /// 使用默认读取配置打开已存在的文件
    ///
    /// # Errors
    /// Returns an I/O error naming the path if the file cannot be opened
    ///
    /// # Errors
    /// 如果无法打开文件，返回包含路径的 I/O 错误
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, PageConfig::reader())
    }

    /// Open an existing file with an explicit page geometry
    ///
    /// 使用指定页面配置打开已存在的文件
    pub fn open_with(path: impl AsRef<Path>, config: PageConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(Error::io_at("open", &path, None))?;
        let size = file
            .metadata()
            .map_err(Error::io_at("stat", &path, None))?
            .len();

        tracing::debug!(path = %path.display(), size, page_size = config.page_size(), "opened paged reader");

        Ok(Self {
            path,
            file: Some(file),
            size,
            config,
            cursor: Cell::new(0),
            pages: RefCell::new(PageCache::new(config.cache_pages())),
        })
    }

    /// Path this reader was opened from
    ///
    /// 打开此读取器所用的路径
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Number of pages currently mapped
    ///
    /// 当前已映射的页面数
    pub fn resident_pages(&self) -> usize {
        self.pages.borrow().len()
    }

    /// Window `[start, end)` over this reader with its own cursor
    ///
    /// 在此读取器上创建拥有独立游标的窗口 `[start, end)`
    ///
    /// Creating a view never maps anything.
    ///
    /// 创建视图不会进行任何映射。
    ///
    /// # Errors
    /// `InvalidRange` if `start > end` or `end > len()`
    pub fn view(&self, start: u64, end: u64) -> Result<WindowedView<'_, Self>> {
        if end > self.size {
            return Err(Error::InvalidRange { start, end });
        }
        WindowedView::new(self, start, end)
    }

    /// Hand the open file over to a thread-safe shared reader
    ///
    /// 将已打开的文件移交给线程安全的共享读取器
    pub fn into_shared(mut self) -> Result<SharedPagedReader> {
        self.pages.get_mut().clear();
        let file = self.file.take().ok_or(Error::Closed)?;
        let path = std::mem::take(&mut self.path);
        Ok(SharedPagedReader::from_parts(path, file, self.size, self.config))
    }

    /// Unmap every page and release the file handle
    ///
    /// 解除所有页面映射并释放文件句柄
    ///
    /// Calling `close` again is a no-op. Any later access fails with `Closed`.
    ///
    /// 重复调用 `close` 不产生任何效果。之后的任何访问都会返回 `Closed`。
    pub fn close(&mut self) {
        self.pages.get_mut().clear();
        if self.file.take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed paged reader");
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Run `f` against page `index`, mapping it on a cache miss
    ///
    /// 对第 `index` 页执行 `f`，未命中缓存时进行映射
    fn with_page<T>(&self, index: u64, f: impl FnOnce(&[u8]) -> T) -> Result<T> {
        let file = self.file.as_ref().ok_or(Error::Closed)?;
        let mut pages = self.pages.borrow_mut();
        if let Some(page) = pages.get(index) {
            return Ok(f(page.bytes()));
        }
        pages.make_room();
        let page = Page::map_read(file, &self.path, index, &self.config, self.size)?;
        Ok(f(pages.insert(page).bytes()))
    }
}

impl RandomAccess for PagedReader {
    #[inline]
    fn len(&self) -> u64 {
        self.size
    }

    #[inline]
    fn position(&self) -> u64 {
        self.cursor.get()
    }

    fn seek(&self, pos: u64) -> Result<()> {
        check_seek(pos, self.size)?;
        self.cursor.set(pos);
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.ensure_open()?;
        check_span(offset, buf.len() as u64, self.size)?;
        read_paged(&self.config, offset, buf, |index, in_page, dst| {
            self.with_page(index, |bytes| copy_from_page(bytes, in_page, dst))
        })
    }

    #[inline]
    fn read_array_at<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        self.ensure_open()?;
        check_span(offset, N as u64, self.size)?;
        let mut out = [0u8; N];
        if N as u64 > self.config.overlap() {
            self.read_at(offset, &mut out)?;
            return Ok(out);
        }
        let (index, in_page) = self.config.locate(offset);
        self.with_page(index, |bytes| out.copy_from_slice(&bytes[in_page..in_page + N]))?;
        Ok(out)
    }
}

/// Implement Debug for PagedReader
///
/// 为 PagedReader 实现 Debug
impl std::fmt::Debug for PagedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedReader")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("position", &self.cursor.get())
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}
