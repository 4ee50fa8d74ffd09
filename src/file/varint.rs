//! Compact encoding for small non-negative integers
//!
//! 小型非负整数的紧凑编码
//!
//! Every encoding starts with a tag byte. Its top bits select a width class and
//! its remaining bits hold the most significant part of the value; the rest of
//! the value follows in big-endian continuation bytes.
//!
//! 每个编码以标记字节开头。其高位选择宽度类别，其余位保存值的最高部分；
//! 值的剩余部分以大端序的后续字节跟随。
//!
//! | family | tag bits | widths (bytes) | value range          |
//! |--------|----------|----------------|----------------------|
//! | short  | 1        | 1, 2           | `[0, i16::MAX / 2]`  |
//! | int    | 2        | 1, 2, 3, 4     | `[0, i32::MAX / 2]`  |
//! | long   | 2        | 1, 2, 4, 8     | `[0, i64::MAX / 2]`  |
//!
//! # Examples
//!
//! ```
//! use paged_mmap::varint;
//!
//! let mut buf = [0u8; 4];
//! let width = varint::encode_i32(300, &mut buf).unwrap();
//! assert_eq!(width, 2);
//! assert_eq!(varint::width_i32(buf[0]), 2);
//! assert_eq!(varint::decode_i32(&buf[..width]).unwrap(), 300);
//!
//! assert!(varint::encode_i32(-1, &mut buf).is_err());
//! ```

use super::error::{Error, Result};

pub const MAX_I16: i16 = i16::MAX / 2;
pub const MAX_I32: i32 = i32::MAX / 2;
pub const MAX_I64: i64 = i64::MAX / 2;

const I16_WIDTHS: [usize; 2] = [1, 2];
const I32_WIDTHS: [usize; 4] = [1, 2, 3, 4];
const I64_WIDTHS: [usize; 4] = [1, 2, 4, 8];

/// Number of bytes, tag included, announced by a short-family tag
///
/// 短整型族标记字节所声明的总字节数（含标记）
#[inline]
pub fn width_i16(tag: u8) -> usize {
    I16_WIDTHS[(tag >> 7) as usize]
}

/// Number of bytes, tag included, announced by an int-family tag
///
/// 整型族标记字节所声明的总字节数（含标记）
#[inline]
pub fn width_i32(tag: u8) -> usize {
    I32_WIDTHS[(tag >> 6) as usize]
}

/// Number of bytes, tag included, announced by a long-family tag
///
/// 长整型族标记字节所声明的总字节数（含标记）
#[inline]
pub fn width_i64(tag: u8) -> usize {
    I64_WIDTHS[(tag >> 6) as usize]
}

/// Encode `value` into `out`, returning the width used
///
/// 将 `value` 编码到 `out`，返回使用的宽度
///
/// # Errors
/// `VarintRange` if `value` is negative or above [`MAX_I16`]; `OutOfBounds` if
/// `out` is shorter than the chosen width.
pub fn encode_i16(value: i16, out: &mut [u8]) -> Result<usize> {
    if !(0..=MAX_I16).contains(&value) {
        return Err(Error::VarintRange { value: value as i64, max: MAX_I16 as i64 });
    }
    encode(value as u64, &I16_WIDTHS, 1, out)
}

/// Encode `value` into `out`, returning the width used
///
/// 将 `value` 编码到 `out`，返回使用的宽度
///
/// # Errors
/// `VarintRange` if `value` is negative or above [`MAX_I32`]; `OutOfBounds` if
/// `out` is shorter than the chosen width.
pub fn encode_i32(value: i32, out: &mut [u8]) -> Result<usize> {
    if !(0..=MAX_I32).contains(&value) {
        return Err(Error::VarintRange { value: value as i64, max: MAX_I32 as i64 });
    }
    encode(value as u64, &I32_WIDTHS, 2, out)
}

/// Encode `value` into `out`, returning the width used
///
/// 将 `value` 编码到 `out`，返回使用的宽度
///
/// # Errors
/// `VarintRange` if `value` is negative or above [`MAX_I64`]; `OutOfBounds` if
/// `out` is shorter than the chosen width.
pub fn encode_i64(value: i64, out: &mut [u8]) -> Result<usize> {
    if !(0..=MAX_I64).contains(&value) {
        return Err(Error::VarintRange { value, max: MAX_I64 });
    }
    encode(value as u64, &I64_WIDTHS, 2, out)
}

/// Decode a short-family varint from the start of `bytes`
///
/// 从 `bytes` 开头解码短整型族 varint
pub fn decode_i16(bytes: &[u8]) -> Result<i16> {
    let tag = first(bytes)?;
    Ok(decode(bytes, width_i16(tag), 1)? as i16)
}

/// Decode an int-family varint from the start of `bytes`
///
/// 从 `bytes` 开头解码整型族 varint
pub fn decode_i32(bytes: &[u8]) -> Result<i32> {
    let tag = first(bytes)?;
    Ok(decode(bytes, width_i32(tag), 2)? as i32)
}

/// Decode a long-family varint from the start of `bytes`
///
/// 从 `bytes` 开头解码长整型族 varint
pub fn decode_i64(bytes: &[u8]) -> Result<i64> {
    let tag = first(bytes)?;
    Ok(decode(bytes, width_i64(tag), 2)? as i64)
}

fn first(bytes: &[u8]) -> Result<u8> {
    bytes.first().copied().ok_or(Error::OutOfBounds { offset: 0, len: 1, size: 0 })
}

fn encode(value: u64, widths: &[usize], tag_bits: u32, out: &mut [u8]) -> Result<usize> {
    // Smallest class whose value bits hold `value`; the range check above
    // guarantees the last class always fits.
    let class = widths
        .iter()
        .position(|&w| value_bits(w, tag_bits) >= 64 - value.leading_zeros())
        .unwrap_or(widths.len() - 1);
    let width = widths[class];

    if out.len() < width {
        return Err(Error::OutOfBounds {
            offset: 0,
            len: width as u64,
            size: out.len() as u64,
        });
    }

    let tagged = value | ((class as u64) << value_bits(width, tag_bits));
    let be = tagged.to_be_bytes();
    out[..width].copy_from_slice(&be[8 - width..]);
    Ok(width)
}

fn decode(bytes: &[u8], width: usize, tag_bits: u32) -> Result<u64> {
    if bytes.len() < width {
        return Err(Error::OutOfBounds {
            offset: 0,
            len: width as u64,
            size: bytes.len() as u64,
        });
    }
    let mut be = [0u8; 8];
    be[8 - width..].copy_from_slice(&bytes[..width]);
    let mask = (1u64 << value_bits(width, tag_bits)) - 1;
    Ok(u64::from_be_bytes(be) & mask)
}

#[inline]
fn value_bits(width: usize, tag_bits: u32) -> u32 {
    width as u32 * 8 - tag_bits
}
