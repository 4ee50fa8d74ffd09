//! Windowed views over a backing engine
//!
//! 基于底层引擎的窗口视图

use std::cell::Cell;
use super::access::{check_seek, check_span, RandomAccess, RandomAccessMut};
use super::error::{Error, Result};

/// Non-owning `[start, end)` window with its own cursor
///
/// 拥有独立游标的非占有窗口 `[start, end)`
///
/// Every access is delegated to the backing engine after adding `start`, and is
/// bounds-checked against the window's logical size `end - start`, never the
/// backing file's size. Views borrow the backing engine immutably, so any number
/// of them may coexist; creating, nesting and dropping views never touches a
/// mapping.
///
/// 每次访问都在加上 `start` 后委托给底层引擎，并以窗口的逻辑大小 `end - start`
/// （而非底层文件大小）做越界检查。视图以不可变方式借用底层引擎，
/// 因此可以同时存在任意多个；创建、嵌套和销毁视图都不会触及映射。
///
/// # Examples
///
/// ```
/// use paged_mmap::{PagedReader, PagedWriter, RandomAccess, RandomAccessMut, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("views.bin");
/// let mut writer = PagedWriter::create(&path)?;
/// for i in 0..8 {
///     writer.put_i32(i)?;
/// }
/// writer.close()?;
///
/// let reader = PagedReader::open(&path)?;
/// let left = reader.view(0, 16)?;
/// let right = reader.view(16, 32)?;
///
/// assert_eq!(left.get_i32()?, 0);
/// assert_eq!(right.get_i32()?, 4);
/// assert_eq!(left.get_i32()?, 1);
/// assert_eq!(right.len(), 16);
///
/// // Nested views compose absolute ranges
/// // 嵌套视图组合绝对范围
/// let inner = right.view(4, 8)?;
/// assert_eq!((inner.start(), inner.end()), (20, 24));
/// assert_eq!(inner.get_i32()?, 5);
/// # Ok(())
/// # }
/// ```
pub struct WindowedView<'a, R> {
    backing: &'a R,
    start: u64,
    end: u64,
    cursor: Cell<u64>,
}

impl<'a, R: RandomAccess> WindowedView<'a, R> {
    /// Create a window over `backing`
    ///
    /// 在 `backing` 上创建窗口
    ///
    /// # Errors
    /// `InvalidRange` if `start > end`
    pub fn new(backing: &'a R, start: u64, end: u64) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self {
            backing,
            start,
            end,
            cursor: Cell::new(0),
        })
    }

    /// Absolute start offset in the backing engine
    ///
    /// 在底层引擎中的绝对起始偏移
    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Absolute end offset (exclusive) in the backing engine
    ///
    /// 在底层引擎中的绝对结束偏移（不包含）
    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    #[inline]
    pub fn backing(&self) -> &'a R {
        self.backing
    }

    /// Window `[start, end)` relative to this view
    ///
    /// 相对于此视图的窗口 `[start, end)`
    ///
    /// # Errors
    /// `InvalidRange` if the range is inverted or exceeds this view
    pub fn view(&self, start: u64, end: u64) -> Result<WindowedView<'a, R>> {
        if start > end || end > self.len() {
            return Err(Error::InvalidRange { start, end });
        }
        WindowedView::new(self.backing, self.start + start, self.start + end)
    }
}

impl<R: RandomAccess> RandomAccess for WindowedView<'_, R> {
    #[inline]
    fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    fn position(&self) -> u64 {
        self.cursor.get()
    }

    fn seek(&self, pos: u64) -> Result<()> {
        check_seek(pos, self.len())?;
        self.cursor.set(pos);
        Ok(())
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        check_span(offset, buf.len() as u64, self.len())?;
        self.backing.read_at(self.start + offset, buf)
    }

    #[inline]
    fn read_array_at<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        check_span(offset, N as u64, self.len())?;
        self.backing.read_array_at(self.start + offset)
    }
}

impl<R: RandomAccessMut> RandomAccessMut for WindowedView<'_, R> {
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_span(offset, data.len() as u64, self.len())?;
        self.backing.write_at(self.start + offset, data)
    }

    #[inline]
    fn write_array_at<const N: usize>(&self, offset: u64, bytes: [u8; N]) -> Result<()> {
        check_span(offset, N as u64, self.len())?;
        self.backing.write_array_at(self.start + offset, bytes)
    }
}

impl<R> std::fmt::Debug for WindowedView<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowedView")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("position", &self.cursor.get())
            .finish()
    }
}
