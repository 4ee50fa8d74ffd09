//! Positioned get/put contract shared by every engine and view
//!
//! 所有引擎与视图共享的定位读写约定
//!
//! All multi-byte primitives are little-endian. Strings are an `i32` length, or
//! `-1` for null, followed by that many one-byte characters.
//!
//! 所有多字节基本类型均为小端序。字符串由 `i32` 长度（null 时为 `-1`）
//! 及随后相应数量的单字节字符组成。

use super::error::{Error, Result};
use super::varint;

/// Null sentinel of the string length prefix
///
/// 字符串长度前缀的 null 标记
pub const NULL_STRING_LEN: i32 = -1;

macro_rules! typed_getters {
    ($($ty:ty => $get:ident, $get_at:ident;)*) => {$(
        #[doc = concat!("Read a little-endian `", stringify!($ty), "` at the cursor and advance past it")]
        #[inline]
        fn $get(&self) -> Result<$ty> {
            Ok(<$ty>::from_le_bytes(self.take_array()?))
        }

        #[doc = concat!("Read a little-endian `", stringify!($ty), "` at `offset` without moving the cursor")]
        #[inline]
        fn $get_at(&self, offset: u64) -> Result<$ty> {
            Ok(<$ty>::from_le_bytes(self.read_array_at(offset)?))
        }
    )*};
}

macro_rules! typed_putters {
    ($($ty:ty => $put:ident, $put_at:ident;)*) => {$(
        #[doc = concat!("Write a little-endian `", stringify!($ty), "` at the cursor and advance past it")]
        #[inline]
        fn $put(&self, value: $ty) -> Result<()> {
            self.put_array(value.to_le_bytes())
        }

        #[doc = concat!("Write a little-endian `", stringify!($ty), "` at `offset` without moving the cursor")]
        #[inline]
        fn $put_at(&self, offset: u64, value: $ty) -> Result<()> {
            self.write_array_at(offset, value.to_le_bytes())
        }
    )*};
}

/// Read side of the positioned access contract
///
/// 定位访问约定的读取端
///
/// Implementors provide the size, a cursor and a raw positional read; every
/// typed getter is derived from those. Methods take `&self`: cursors and page
/// caches live behind interior mutability, which lets many views borrow one
/// engine at once.
///
/// 实现者提供大小、游标和原始定位读取；所有类型化读取方法都由它们派生。
/// 方法接收 `&self`：游标和页面缓存使用内部可变性，
/// 因此多个视图可以同时借用同一个引擎。
///
/// # Examples
///
/// ```
/// use paged_mmap::{PagedReader, PagedWriter, RandomAccess, RandomAccessMut, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("typed.bin");
/// let mut writer = PagedWriter::create(&path)?;
/// writer.put_i32(7)?;
/// writer.put_f64(2.5)?;
/// writer.put_string(Some("chr1"))?;
/// writer.close()?;
///
/// let reader = PagedReader::open(&path)?;
/// assert_eq!(reader.get_i32()?, 7);
/// assert_eq!(reader.get_f64()?, 2.5);
/// assert_eq!(reader.get_string()?.as_deref(), Some("chr1"));
/// assert!(!reader.has_remaining());
/// # Ok(())
/// # }
/// ```
pub trait RandomAccess {
    /// Logical size in bytes
    ///
    /// 逻辑大小（字节）
    fn len(&self) -> u64;

    /// Current cursor
    ///
    /// 当前游标
    fn position(&self) -> u64;

    /// Move the cursor to `pos`
    ///
    /// 将游标移动到 `pos`
    ///
    /// # Errors
    /// `OutOfBounds` if `pos > len()`
    fn seek(&self, pos: u64) -> Result<()>;

    /// Fill `buf` from `offset`, across as many pages as needed
    ///
    /// 从 `offset` 开始填充 `buf`，可跨越任意数量的页面
    ///
    /// # Errors
    /// `OutOfBounds` if `offset + buf.len() > len()`
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Read exactly `N` bytes at `offset`
    ///
    /// 在 `offset` 处读取恰好 `N` 字节
    ///
    /// Paged engines override this with a single-page access whenever `N` fits
    /// the overlap region.
    ///
    /// 分页引擎在 `N` 不超过重叠区时以单页访问重写此方法。
    #[inline]
    fn read_array_at<const N: usize>(&self, offset: u64) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.read_at(offset, &mut out)?;
        Ok(out)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes between the cursor and the end
    ///
    /// 游标到末尾之间的字节数
    #[inline]
    fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    #[inline]
    fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Advance the cursor by `n` bytes
    ///
    /// 将游标前移 `n` 字节
    fn skip(&self, n: u64) -> Result<()> {
        let pos = self.position();
        let target = pos.checked_add(n).ok_or(Error::OutOfBounds {
            offset: pos,
            len: n,
            size: self.len(),
        })?;
        self.seek(target)
    }

    /// Read `N` bytes at the cursor and advance past them
    ///
    /// 在游标处读取 `N` 字节并前移游标
    #[inline]
    fn take_array<const N: usize>(&self) -> Result<[u8; N]> {
        let pos = self.position();
        let out = self.read_array_at::<N>(pos)?;
        self.seek(pos + N as u64)?;
        Ok(out)
    }

    typed_getters! {
        u8 => get_u8, get_u8_at;
        i8 => get_i8, get_i8_at;
        u16 => get_char16, get_char16_at;
        i16 => get_i16, get_i16_at;
        i32 => get_i32, get_i32_at;
        i64 => get_i64, get_i64_at;
        f32 => get_f32, get_f32_at;
        f64 => get_f64, get_f64_at;
    }

    /// Read a one-byte character at the cursor
    ///
    /// 在游标处读取单字节字符
    #[inline]
    fn get_ascii(&self) -> Result<char> {
        Ok(char::from(self.get_u8()?))
    }

    #[inline]
    fn get_ascii_at(&self, offset: u64) -> Result<char> {
        Ok(char::from(self.get_u8_at(offset)?))
    }

    /// Read a length-prefixed string at the cursor; `None` is the null string
    ///
    /// 在游标处读取带长度前缀的字符串；`None` 表示 null 字符串
    ///
    /// # Errors
    /// `NegativeLength` for a prefix below `-1`; `OutOfBounds` if the body runs
    /// past the end.
    fn get_string(&self) -> Result<Option<String>> {
        let pos = self.position();
        let (value, consumed) = string_at(self, pos)?;
        self.seek(pos + consumed)?;
        Ok(value)
    }

    fn get_string_at(&self, offset: u64) -> Result<Option<String>> {
        string_at(self, offset).map(|(value, _)| value)
    }

    /// Fill `buf` from the cursor and advance past it
    ///
    /// 从游标处填充 `buf` 并前移游标
    fn get_bytes(&self, buf: &mut [u8]) -> Result<()> {
        let pos = self.position();
        self.read_at(pos, buf)?;
        self.seek(pos + buf.len() as u64)
    }

    #[inline]
    fn get_bytes_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.read_at(offset, buf)
    }

    /// Read `len` bytes at the cursor into a new `Vec`
    ///
    /// 在游标处读取 `len` 字节到新的 `Vec`
    fn get_vec(&self, len: usize) -> Result<Vec<u8>> {
        let pos = self.position();
        check_span(pos, len as u64, self.len())?;
        let mut out = vec![0u8; len];
        self.get_bytes(&mut out)?;
        Ok(out)
    }

    /// Read a short-family varint at the cursor
    ///
    /// 在游标处读取短整型族 varint
    fn get_var_i16(&self) -> Result<i16> {
        let width = varint::width_i16(self.get_u8_at(self.position())?);
        let mut buf = [0u8; 2];
        self.get_bytes(&mut buf[..width])?;
        varint::decode_i16(&buf[..width])
    }

    /// Read an int-family varint at the cursor
    ///
    /// 在游标处读取整型族 varint
    fn get_var_i32(&self) -> Result<i32> {
        let width = varint::width_i32(self.get_u8_at(self.position())?);
        let mut buf = [0u8; 4];
        self.get_bytes(&mut buf[..width])?;
        varint::decode_i32(&buf[..width])
    }

    /// Read a long-family varint at the cursor
    ///
    /// 在游标处读取长整型族 varint
    fn get_var_i64(&self) -> Result<i64> {
        let width = varint::width_i64(self.get_u8_at(self.position())?);
        let mut buf = [0u8; 8];
        self.get_bytes(&mut buf[..width])?;
        varint::decode_i64(&buf[..width])
    }
}

/// Write side of the positioned access contract
///
/// 定位访问约定的写入端
pub trait RandomAccessMut: RandomAccess {
    /// Write `data` at `offset`, across as many pages as needed
    ///
    /// 在 `offset` 处写入 `data`，可跨越任意数量的页面
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()>;

    #[inline]
    fn write_array_at<const N: usize>(&self, offset: u64, bytes: [u8; N]) -> Result<()> {
        self.write_at(offset, &bytes)
    }

    /// Write `N` bytes at the cursor and advance past them
    ///
    /// 在游标处写入 `N` 字节并前移游标
    #[inline]
    fn put_array<const N: usize>(&self, bytes: [u8; N]) -> Result<()> {
        let pos = self.position();
        self.write_array_at(pos, bytes)?;
        self.seek(pos + N as u64)
    }

    typed_putters! {
        u8 => put_u8, put_u8_at;
        i8 => put_i8, put_i8_at;
        u16 => put_char16, put_char16_at;
        i16 => put_i16, put_i16_at;
        i32 => put_i32, put_i32_at;
        i64 => put_i64, put_i64_at;
        f32 => put_f32, put_f32_at;
        f64 => put_f64, put_f64_at;
    }

    /// Write a one-byte character at the cursor
    ///
    /// 在游标处写入单字节字符
    ///
    /// # Errors
    /// `NonAscii` if `ch` is not ASCII
    fn put_ascii(&self, ch: char) -> Result<()> {
        self.put_u8(ascii_byte(ch)?)
    }

    fn put_ascii_at(&self, offset: u64, ch: char) -> Result<()> {
        self.put_u8_at(offset, ascii_byte(ch)?)
    }

    /// Write a length-prefixed string at the cursor; `None` writes the null sentinel
    ///
    /// 在游标处写入带长度前缀的字符串；`None` 写入 null 标记
    ///
    /// # Errors
    /// `NonAscii` if any character needs more than one byte; nothing is written
    /// in that case.
    ///
    /// # Errors
    /// 若任一字符需要多于一个字节则返回 `NonAscii`，此时不写入任何内容。
    fn put_string(&self, value: Option<&str>) -> Result<()> {
        let pos = self.position();
        let written = write_string_at(self, pos, value)?;
        self.seek(pos + written)
    }

    fn put_string_at(&self, offset: u64, value: Option<&str>) -> Result<()> {
        write_string_at(self, offset, value).map(|_| ())
    }

    /// Write raw bytes at the cursor and advance past them
    ///
    /// 在游标处写入原始字节并前移游标
    fn put_bytes(&self, data: &[u8]) -> Result<()> {
        let pos = self.position();
        self.write_at(pos, data)?;
        self.seek(pos + data.len() as u64)
    }

    #[inline]
    fn put_bytes_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.write_at(offset, data)
    }

    fn put_var_i16(&self, value: i16) -> Result<()> {
        let mut buf = [0u8; 2];
        let width = varint::encode_i16(value, &mut buf)?;
        self.put_bytes(&buf[..width])
    }

    fn put_var_i32(&self, value: i32) -> Result<()> {
        let mut buf = [0u8; 4];
        let width = varint::encode_i32(value, &mut buf)?;
        self.put_bytes(&buf[..width])
    }

    fn put_var_i64(&self, value: i64) -> Result<()> {
        let mut buf = [0u8; 8];
        let width = varint::encode_i64(value, &mut buf)?;
        self.put_bytes(&buf[..width])
    }
}

/// Fail unless `[offset, offset + len)` lies within `size`
///
/// 除非 `[offset, offset + len)` 位于 `size` 之内，否则返回错误
#[inline]
pub(crate) fn check_span(offset: u64, len: u64, size: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::OutOfBounds { offset, len, size }),
    }
}

/// Cursor targets must stay within `[0, size]`
#[inline]
pub(crate) fn check_seek(pos: u64, size: u64) -> Result<()> {
    if pos > size {
        return Err(Error::OutOfBounds { offset: pos, len: 0, size });
    }
    Ok(())
}

fn string_at<R: RandomAccess + ?Sized>(source: &R, offset: u64) -> Result<(Option<String>, u64)> {
    let len = source.get_i32_at(offset)?;
    if len == NULL_STRING_LEN {
        return Ok((None, 4));
    }
    if len < 0 {
        return Err(Error::NegativeLength { len });
    }
    check_span(offset + 4, len as u64, source.len())?;
    let mut bytes = vec![0u8; len as usize];
    source.read_at(offset + 4, &mut bytes)?;
    // Each byte is the code point of the same value, so single-byte files
    // written by other tools still decode losslessly
    let value = bytes.into_iter().map(char::from).collect();
    Ok((Some(value), 4 + len as u64))
}

fn write_string_at<W: RandomAccessMut + ?Sized>(sink: &W, offset: u64, value: Option<&str>) -> Result<u64> {
    let Some(value) = value else {
        sink.put_i32_at(offset, NULL_STRING_LEN)?;
        return Ok(4);
    };
    if let Some(ch) = value.chars().find(|c| !c.is_ascii()) {
        return Err(Error::NonAscii { ch });
    }
    let len = i32::try_from(value.len()).map_err(|_| Error::LengthOverflow { len: value.len() })?;
    sink.put_i32_at(offset, len)?;
    sink.write_at(offset + 4, value.as_bytes())?;
    Ok(4 + value.len() as u64)
}

fn ascii_byte(ch: char) -> Result<u8> {
    if ch.is_ascii() {
        Ok(ch as u8)
    } else {
        Err(Error::NonAscii { ch })
    }
}
