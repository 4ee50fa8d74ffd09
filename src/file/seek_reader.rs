//! Seek-and-read fallback implementing the same access contract
//!
//! 以 seek + read 实现相同访问约定的后备读取器

use std::cell::{Cell, RefCell};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use super::access::{check_seek, check_span, RandomAccess};
use super::error::{Error, Result};

/// Reader that issues one seek and one read per access
///
/// 每次访问执行一次 seek 和一次 read 的读取器
///
/// No mapping, no page cache, no eviction. Cheap to create, which suits
/// callers that need many small independent windows; [`view`](Self::view)
/// opens a fresh handle positioned at the window start.
///
/// 没有映射、页面缓存或淘汰。创建开销小，适合需要大量独立小窗口的调用者；
/// [`view`](Self::view) 会打开一个定位到窗口起点的新句柄。
///
/// # Examples
///
/// ```
/// use paged_mmap::{PagedWriter, RandomAccess, RandomAccessMut, Result, SeekReader};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("seek.bin");
/// let mut writer = PagedWriter::create(&path)?;
/// writer.put_i64(1)?;
/// writer.put_i64(2)?;
/// writer.close()?;
///
/// let reader = SeekReader::open(&path)?;
/// let second = reader.view(8, 16)?;
/// assert_eq!(second.len(), 8);
/// assert_eq!(second.get_i64()?, 2);
/// # Ok(())
/// # }
/// ```
pub struct SeekReader {
    path: PathBuf,

    /// `None` once closed
    ///
    /// 关闭后为 `None`
    file: RefCell<Option<File>>,

    /// Absolute offset of logical position 0
    ///
    /// 逻辑位置 0 对应的绝对偏移
    origin: u64,

    size: u64,
    cursor: Cell<u64>,
}

impl SeekReader {
    /// Open an existing file
    ///
    /// 打开已存在的文件
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_read(&path)?;
        let size = file
            .metadata()
            .map_err(Error::io_at("stat", &path, None))?
            .len();
        Ok(Self::from_parts(path, file, 0, size))
    }

    fn from_parts(path: PathBuf, file: File, origin: u64, size: u64) -> Self {
        Self {
            path,
            file: RefCell::new(Some(file)),
            origin,
            size,
            cursor: Cell::new(0),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Absolute offset of this reader's first byte in the file
    ///
    /// 此读取器首字节在文件中的绝对偏移
    #[inline]
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Window `[start, end)` on a new handle pre-seeked to `start`
    ///
    /// 在新句柄上创建窗口 `[start, end)`，该句柄预先定位到 `start`
    ///
    /// # Errors
    /// `InvalidRange` if the range is inverted or exceeds this reader; I/O
    /// errors if the file cannot be reopened.
    pub fn view(&self, start: u64, end: u64) -> Result<SeekReader> {
        self.ensure_open()?;
        if start > end || end > self.size {
            return Err(Error::InvalidRange { start, end });
        }
        let origin = self.origin + start;
        let mut file = open_read(&self.path)?;
        file.seek(SeekFrom::Start(origin))
            .map_err(Error::io_at("seek", &self.path, Some(origin)))?;
        Ok(Self::from_parts(self.path.clone(), file, origin, end - start))
    }

    /// Release the file handle; idempotent
    ///
    /// 释放文件句柄；可重复调用
    pub fn close(&mut self) {
        self.file.get_mut().take();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.file.borrow().is_none()
    }

    #[inline]
    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl RandomAccess for SeekReader {
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
        let mut guard = self.file.borrow_mut();
        let file = guard.as_mut().ok_or(Error::Closed)?;
        check_span(offset, buf.len() as u64, self.size)?;

        let absolute = self.origin + offset;
        file.seek(SeekFrom::Start(absolute))
            .map_err(Error::io_at("seek", &self.path, Some(absolute)))?;
        file.read_exact(buf)
            .map_err(Error::io_at("read", &self.path, Some(absolute)))
    }
}

impl std::fmt::Debug for SeekReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeekReader")
            .field("path", &self.path)
            .field("origin", &self.origin)
            .field("size", &self.size)
            .field("position", &self.cursor.get())
            .finish()
    }
}

fn open_read(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(Error::io_at("open", path, None))
}
