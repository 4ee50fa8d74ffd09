//! Growable read-write paged engine based on memmap2
//!
//! 基于 memmap2 的可增长读写分页引擎

use fs2::FileExt;
use memmap2::MmapMut;
use std::cell::{Cell, RefCell};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use super::access::{check_seek, check_span, RandomAccess, RandomAccessMut};
use super::concurrent_view::SharedPagedReader;
use super::config::{PageConfig, MAX_FILE_LEN};
use super::error::{Error, Result};
use super::page::{copy_from_page, copy_into_page, read_paged, write_paged, Indexed, Page, PageCache};
use super::paged_reader::PagedReader;
use super::view::WindowedView;

/// Growable, page-at-a-time memory-mapped writer
///
/// 可增长的逐页内存映射写入器
///
/// Pages are mapped read-write on first touch. Before page `i` is mapped the
/// file is extended to at least `(i + 1) * page_size + overlap` bytes, so the
/// on-disk length grows in page-sized steps. The writer remembers the highest
/// byte actually written (`max_length`) and truncates the file to exactly that
/// length on [`close`](Self::close), discarding the over-allocated tail.
///
/// 页面在首次访问时以读写方式映射。映射第 `i` 页之前，文件会被扩展到至少
/// `(i + 1) * page_size + overlap` 字节，因此磁盘长度以页为单位增长。
/// 写入器记录实际写入的最高字节位置（`max_length`），并在 [`close`](Self::close)
/// 时把文件精确截断到该长度，丢弃超额分配的尾部。
///
/// # Features
///
/// - **Exclusive**: holds an advisory lock for its whole open lifetime
/// - **Bounded mappings**: at most `cache_pages` pages mapped (default 1)
/// - **Readable**: everything written can be read back before closing
///
/// # 特性
///
/// - **独占**：在整个打开期间持有建议锁
/// - **映射有界**：最多映射 `cache_pages` 个页面（默认 1 个）
/// - **可读**：关闭前可以读回已写入的全部内容
///
/// # Limitations
///
/// - Single writer: the type is neither `Sync` nor internally synchronized
/// - Closing while a view still borrows the writer is rejected by the borrow checker
///
/// # 限制
///
/// - 单写入者：该类型不是 `Sync`，内部也没有同步
/// - 视图借用写入器期间无法关闭，由借用检查器保证
///
/// # Examples
///
/// ```
/// use paged_mmap::{PageConfig, PagedWriter, RandomAccess, RandomAccessMut, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("writer.bin");
/// let config = PageConfig::writer().with_page_size(4096);
/// let mut writer = PagedWriter::create_with(&path, config)?;
///
/// writer.put_i32(1)?;
/// writer.put_i64_at(10_000, -1)?;
/// assert_eq!(writer.len(), 10_008);
///
/// writer.close()?;
/// assert_eq!(std::fs::metadata(&path)?.len(), 10_008);
/// # Ok(())
/// # }
/// ```
pub struct PagedWriter {
    path: PathBuf,

    /// `None` once closed
    ///
    /// 关闭后为 `None`
    file: Option<File>,

    config: PageConfig,

    /// Current on-disk length, grown in page steps
    ///
    /// 当前磁盘长度，按页增长
    file_len: Cell<u64>,

    /// High-water mark of bytes written
    ///
    /// 已写入字节的高水位
    max_length: Cell<u64>,

    cursor: Cell<u64>,
    pages: RefCell<PageCache<Page<MmapMut>>>,
}

impl PagedWriter {
    /// Create (or truncate) a file with the default writer geometry
    ///
    /// 使用默认写入配置创建（或截断）文件
    ///
    /// # Errors
    /// - `Locked` if another handle holds the advisory lock
    /// - I/O errors naming the path if the file cannot be created
    ///
    /// # Errors
    /// - 如果其他句柄持有建议锁，返回 `Locked`
    /// - 如果无法创建文件，返回包含路径的 I/O 错误
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(path, PageConfig::writer())
    }

    /// Create (or truncate) a file with an explicit page geometry
    ///
    /// 使用指定页面配置创建（或截断）文件
    pub fn create_with(path: impl AsRef<Path>, config: PageConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(Error::io_at("create", &path, None))?;

        // Lock before truncating so a concurrent writer's data is left intact
        // 先加锁再截断，避免破坏并发写入者的数据
        lock(&file, &path)?;
        file.set_len(0).map_err(Error::io_at("truncate", &path, Some(0)))?;

        Ok(Self::from_parts(path, file, config, 0))
    }

    /// Open an existing file for update with the default writer geometry
    ///
    /// 使用默认写入配置打开已存在的文件以进行更新
    ///
    /// The existing content is kept and counts as written, so closing without
    /// writing leaves the file length unchanged.
    ///
    /// 现有内容会被保留并计为已写入，因此不写入直接关闭时文件长度不变。
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, PageConfig::writer())
    }

    pub fn open_with(path: impl AsRef<Path>, config: PageConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(Error::io_at("open", &path, None))?;
        lock(&file, &path)?;
        let len = file
            .metadata()
            .map_err(Error::io_at("stat", &path, None))?
            .len();

        Ok(Self::from_parts(path, file, config, len))
    }

    fn from_parts(path: PathBuf, file: File, config: PageConfig, len: u64) -> Self {
        tracing::debug!(path = %path.display(), len, page_size = config.page_size(), "opened paged writer");
        Self {
            path,
            file: Some(file),
            config,
            file_len: Cell::new(len),
            max_length: Cell::new(len),
            cursor: Cell::new(0),
            pages: RefCell::new(PageCache::new(config.cache_pages())),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    /// High-water mark of bytes written; the final file length
    ///
    /// 已写入字节的高水位，即最终的文件长度
    #[inline]
    pub fn max_length(&self) -> u64 {
        self.max_length.get()
    }

    /// Current on-disk length, including not yet truncated growth
    ///
    /// 当前磁盘长度，包括尚未截断的增长部分
    #[inline]
    pub fn file_len(&self) -> u64 {
        self.file_len.get()
    }

    /// Number of pages currently mapped
    ///
    /// 当前已映射的页面数
    pub fn resident_pages(&self) -> usize {
        self.pages.borrow().len()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Window `[start, end)` over this writer
    ///
    /// 在此写入器上创建窗口 `[start, end)`
    ///
    /// The window may extend past the bytes written so far; reads beyond the
    /// high-water mark still fail, writes grow the file.
    ///
    /// 窗口可以超出目前已写入的字节；超出高水位的读取仍会失败，写入会扩展文件。
    pub fn view(&self, start: u64, end: u64) -> Result<WindowedView<'_, Self>> {
        WindowedView::new(self, start, end)
    }

    /// Flush mapped pages and sync the file to disk
    ///
    /// 刷新已映射页面并将文件同步到磁盘
    pub fn flush(&self) -> Result<()> {
        let file = self.file.as_ref().ok_or(Error::Closed)?;
        for page in self.pages.borrow().iter() {
            let offset = self.config.page_start(page.index());
            page.flush().map_err(Error::io_at("flush page", &self.path, Some(offset)))?;
        }
        file.sync_all().map_err(Error::io_at("sync", &self.path, None))
    }

    /// Truncate to the bytes written, release the lock and close the file
    ///
    /// 截断到已写入的字节，释放锁并关闭文件
    ///
    /// Calling `close` again is a no-op.
    ///
    /// 重复调用 `close` 不产生任何效果。
    ///
    /// # Errors
    /// I/O errors from truncation. The handle is released even then, so a
    /// failed close is not retried on drop.
    ///
    /// # Errors
    /// 截断产生的 I/O 错误。即使出错也会释放句柄，drop 时不会重试。
    pub fn close(&mut self) -> Result<()> {
        // Mappings must be gone before the file shrinks beneath them
        // 文件缩短之前必须先解除映射
        self.pages.get_mut().clear();
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let max_length = self.max_length.get();
        let truncated = file
            .set_len(max_length)
            .map_err(Error::io_at("truncate", &self.path, Some(max_length)));
        if let Err(err) = FileExt::unlock(&file) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to release writer lock");
        }
        truncated?;

        self.file_len.set(max_length);
        tracing::debug!(path = %self.path.display(), len = max_length, "closed paged writer");
        Ok(())
    }

    /// Close and reopen the file as a [`PagedReader`]
    ///
    /// 关闭并以 [`PagedReader`] 重新打开文件
    pub fn into_reader(self) -> Result<PagedReader> {
        self.into_reader_with(PageConfig::reader())
    }

    pub fn into_reader_with(mut self, config: PageConfig) -> Result<PagedReader> {
        self.close()?;
        PagedReader::open_with(&self.path, config)
    }

    /// Close and reopen the file as a [`SharedPagedReader`] for concurrent views
    ///
    /// 关闭并以 [`SharedPagedReader`] 重新打开文件，用于并发视图
    pub fn into_shared(self) -> Result<SharedPagedReader> {
        self.into_reader()?.into_shared()
    }

    /// Grow the file so page `index` can be mapped in full
    ///
    /// 扩展文件使第 `index` 页可以完整映射
    fn ensure_capacity(&self, file: &File, index: u64) -> Result<()> {
        let start = self.config.page_start(index);
        let needed = start
            .checked_add(self.config.mapped_len())
            .filter(|&needed| needed <= MAX_FILE_LEN)
            .ok_or(Error::OutOfBounds {
                offset: start,
                len: self.config.mapped_len(),
                size: MAX_FILE_LEN,
            })?;
        if self.file_len.get() < needed {
            file.set_len(needed)
                .map_err(Error::io_at("grow", &self.path, Some(needed)))?;
            tracing::debug!(path = %self.path.display(), page = index, len = needed, "grew file");
            self.file_len.set(needed);
        }
        Ok(())
    }

    /// Run `f` against page `index`, growing and mapping it on a cache miss
    ///
    /// 对第 `index` 页执行 `f`，未命中缓存时扩展文件并映射
    fn with_page<T>(&self, index: u64, f: impl FnOnce(&mut [u8]) -> T) -> Result<T> {
        let file = self.file.as_ref().ok_or(Error::Closed)?;
        let mut pages = self.pages.borrow_mut();
        if let Some(page) = pages.get(index) {
            return Ok(f(page.bytes_mut()));
        }
        pages.make_room();
        self.ensure_capacity(file, index)?;
        let page = Page::map_write(file, &self.path, index, &self.config)?;
        Ok(f(pages.insert(page).bytes_mut()))
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    #[inline]
    fn record_write(&self, offset: u64, len: u64) {
        let end = offset + len;
        if end > self.max_length.get() {
            self.max_length.set(end);
        }
    }
}

impl RandomAccess for PagedWriter {
    /// Bytes written so far
    ///
    /// 目前已写入的字节数
    #[inline]
    fn len(&self) -> u64 {
        self.max_length.get()
    }

    #[inline]
    fn position(&self) -> u64 {
        self.cursor.get()
    }

    fn seek(&self, pos: u64) -> Result<()> {
        check_seek(pos, self.max_length.get())?;
        self.cursor.set(pos);
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.ensure_open()?;
        check_span(offset, buf.len() as u64, self.max_length.get())?;
        read_paged(&self.config, offset, buf, |index, in_page, dst| {
            self.with_page(index, |bytes| copy_from_page(bytes, in_page, dst))
        })
    }

    #[inline]
    fn read_array_at<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        self.ensure_open()?;
        check_span(offset, N as u64, self.max_length.get())?;
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

impl RandomAccessMut for PagedWriter {
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        check_span(offset, data.len() as u64, MAX_FILE_LEN)?;
        write_paged(&self.config, offset, data, |index, in_page, src| {
            self.with_page(index, |bytes| copy_into_page(bytes, in_page, src))
        })?;
        self.record_write(offset, data.len() as u64);
        Ok(())
    }

    #[inline]
    fn write_array_at<const N: usize>(&self, offset: u64, bytes: [u8; N]) -> Result<()> {
        if N as u64 > self.config.overlap() {
            return self.write_at(offset, &bytes);
        }
        self.ensure_open()?;
        check_span(offset, N as u64, MAX_FILE_LEN)?;
        let (index, in_page) = self.config.locate(offset);
        self.with_page(index, |page| page[in_page..in_page + N].copy_from_slice(&bytes))?;
        self.record_write(offset, N as u64);
        Ok(())
    }
}

impl Drop for PagedWriter {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(err) = self.close() {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to finalize paged writer on drop");
            }
        }
    }
}

/// Implement Debug for PagedWriter
///
/// 为 PagedWriter 实现 Debug
impl std::fmt::Debug for PagedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedWriter")
            .field("path", &self.path)
            .field("max_length", &self.max_length.get())
            .field("file_len", &self.file_len.get())
            .field("position", &self.cursor.get())
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn lock(file: &File, path: &Path) -> Result<()> {
    match file.try_lock_exclusive() {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "acquired writer lock");
            Ok(())
        }
        Err(err) if is_contended(&err) => Err(Error::Locked { path: path.to_path_buf() }),
        Err(err) => Err(Error::io_at("lock", path, None)(err)),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
