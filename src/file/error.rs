//! Error types for paged-mmap
//!
//! paged-mmap 的错误类型

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Broad class of an [`Error`]
///
/// [`Error`] 的大类
///
/// Bounds and format errors are programmer errors: they are reported immediately
/// and never clamped, truncated or wrapped.
///
/// 越界错误和格式错误属于编程错误：会立即报告，绝不截断或回绕。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Position or length outside the addressable range
    ///
    /// 位置或长度超出可寻址范围
    Bounds,

    /// Operating system or filesystem failure
    ///
    /// 操作系统或文件系统失败
    Io,

    /// Value cannot be encoded, or bytes cannot be decoded
    ///
    /// 值无法编码，或字节无法解码
    Format,

    /// Instance used after close
    ///
    /// 关闭后继续使用实例
    Lifecycle,
}

/// Error type for paged-mmap operations
///
/// paged-mmap 操作的错误类型
#[derive(Debug)]
pub enum Error {
    /// I/O error, with the operation and, when known, the path and offset
    ///
    /// I/O 错误，附带操作名以及（已知时）路径和偏移
    Io {
        op: &'static str,
        path: Option<PathBuf>,
        offset: Option<u64>,
        source: io::Error,
    },

    /// Another handle holds the exclusive advisory lock
    ///
    /// 另一个句柄持有独占建议锁
    Locked {
        path: PathBuf,
    },

    /// Access of `len` bytes at `offset` exceeds the addressable size
    ///
    /// 在 `offset` 处访问 `len` 字节超出可寻址大小
    OutOfBounds {
        offset: u64,
        len: u64,
        size: u64,
    },

    /// Range `[start, end)` is inverted or exceeds its parent
    ///
    /// 范围 `[start, end)` 颠倒或超出父范围
    InvalidRange {
        start: u64,
        end: u64,
    },

    /// Value outside the supported varint half-range
    ///
    /// 值超出 varint 支持的半范围
    VarintRange {
        value: i64,
        max: i64,
    },

    /// String length prefix below the null sentinel `-1`
    ///
    /// 字符串长度前缀小于 null 标记 `-1`
    NegativeLength {
        len: i32,
    },

    /// Character cannot be stored in one byte
    ///
    /// 字符无法用单字节存储
    NonAscii {
        ch: char,
    },

    /// Byte length does not fit the length prefix
    ///
    /// 字节长度超出长度前缀的表示范围
    LengthOverflow {
        len: usize,
    },

    /// Rejected page configuration
    ///
    /// 页面配置无效
    InvalidConfig {
        reason: &'static str,
    },

    /// Instance already closed
    ///
    /// 实例已关闭
    Closed,
}

impl Error {
    /// Classify the error
    ///
    /// 获取错误大类
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } | Error::Locked { .. } => ErrorKind::Io,
            Error::OutOfBounds { .. } | Error::InvalidRange { .. } => ErrorKind::Bounds,
            Error::VarintRange { .. }
            | Error::NegativeLength { .. }
            | Error::NonAscii { .. }
            | Error::LengthOverflow { .. }
            | Error::InvalidConfig { .. } => ErrorKind::Format,
            Error::Closed => ErrorKind::Lifecycle,
        }
    }

    /// Build an adapter attaching operation, path and offset to an `io::Error`
    ///
    /// 构造一个为 `io::Error` 附加操作、路径和偏移的适配器
    pub(crate) fn io_at<'a>(
        op: &'static str,
        path: &'a Path,
        offset: Option<u64>,
    ) -> impl FnOnce(io::Error) -> Error + 'a {
        move |source| Error::Io {
            op,
            path: Some(path.to_path_buf()),
            offset,
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io { op, path, offset, source } => {
                write!(f, "I/O error during {}", op)?;
                if let Some(path) = path {
                    write!(f, " (path: {})", path.display())?;
                }
                if let Some(offset) = offset {
                    write!(f, " (offset: {})", offset)?;
                }
                write!(f, ": {}", source)
            }
            Error::Locked { path } => {
                write!(f, "File {} is locked by another writer / 文件已被其他写入者锁定", path.display())
            }
            Error::OutOfBounds { offset, len, size } => {
                write!(
                    f,
                    "Access of {} bytes at offset {} exceeds size {} / 在偏移 {} 处访问 {} 字节超出大小 {}",
                    len, offset, size, offset, len, size
                )
            }
            Error::InvalidRange { start, end } => {
                write!(f, "Invalid range [{}, {}) / 无效范围 [{}, {})", start, end, start, end)
            }
            Error::VarintRange { value, max } => {
                write!(
                    f,
                    "Value {} outside varint range [0, {}] / 值 {} 超出 varint 范围 [0, {}]",
                    value, max, value, max
                )
            }
            Error::NegativeLength { len } => {
                write!(f, "Malformed string length {} / 字符串长度 {} 无效", len, len)
            }
            Error::NonAscii { ch } => {
                write!(f, "Character {:?} is not ASCII / 字符 {:?} 不是 ASCII", ch, ch)
            }
            Error::LengthOverflow { len } => {
                write!(f, "Length {} does not fit an i32 prefix / 长度 {} 超出 i32 前缀", len, len)
            }
            Error::InvalidConfig { reason } => {
                write!(f, "Invalid page configuration: {} / 页面配置无效", reason)
            }
            Error::Closed => write!(f, "Instance is closed / 实例已关闭"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convert from io::Error to Error
///
/// 从 io::Error 转换到 Error
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io {
            op: "io",
            path: None,
            offset: None,
            source: err,
        }
    }
}

/// Convert from Error to io::Error for compatibility
///
/// 从 Error 转换到 io::Error 以保持兼容性
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io { source, .. } => source,
            Error::Locked { .. } => io::Error::new(io::ErrorKind::WouldBlock, err.to_string()),
            Error::OutOfBounds { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, err.to_string()),
            Error::Closed => io::Error::new(io::ErrorKind::NotConnected, err.to_string()),
            Error::InvalidRange { .. } | Error::InvalidConfig { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
            }
            Error::VarintRange { .. }
            | Error::NegativeLength { .. }
            | Error::NonAscii { .. }
            | Error::LengthOverflow { .. } => io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
        }
    }
}

/// Result type alias using our custom Error type
///
/// 使用自定义 Error 类型的 Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
