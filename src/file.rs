//! Paged file access based on memmap2
//!
//! 基于 memmap2 的分页文件访问
//!
//! Provides three engines behind one get/put contract:
//! - [`PagedReader`]: read-only, maps one page at a time
//! - [`PagedWriter`]: growable read-write, truncates to the bytes written on close
//! - [`SeekReader`]: no mapping at all, one seek and one read per access
//!
//! 在同一套读写约定之下提供三种引擎：
//! - [`PagedReader`]：只读，每次映射一个页面
//! - [`PagedWriter`]：可增长的读写引擎，关闭时截断到已写入的字节
//! - [`SeekReader`]：完全不映射，每次访问一次 seek 和一次 read
//!
//! and two kinds of windows over them:
//! - [`WindowedView`]: `[start, end)` sub-range with its own cursor
//! - [`ConcurrentWindowedView`]: same, over a [`SharedPagedReader`], with a per-thread cursor
//!
//! 以及两种窗口：
//! - [`WindowedView`]：拥有独立游标的 `[start, end)` 子范围
//! - [`ConcurrentWindowedView`]：基于 [`SharedPagedReader`]，游标按线程独立
//!
//! # Why pages
//!
//! A single mapping call cannot address arbitrarily large files, and keeping
//! many mappings alive exhausts address space. Each engine therefore keeps a
//! small cache of mapped pages (one by default) and unmaps eagerly when a page
//! is evicted. Every page is mapped with an overlap region past its nominal end,
//! so a primitive that starts near the end of a page is still read or written
//! with one slice access.
//!
//! # 为什么分页
//!
//! 单次映射调用无法寻址任意大的文件，而保留大量映射会耗尽地址空间。
//! 因此每个引擎只缓存少量已映射页面（默认一个），并在页面被淘汰时立即解除映射。
//! 每个页面都在名义末尾之后额外映射一段重叠区，
//! 使得起始于页面末尾附近的基本类型仍可通过一次切片访问完成读写。
//!
//! # On-disk format
//!
//! No header is imposed. Multi-byte primitives are little-endian; strings are an
//! `i32` length (or `-1` for null) followed by one byte per character; varints
//! follow [`varint`].
//!
//! # 磁盘格式
//!
//! 不附加任何文件头。多字节基本类型为小端序；字符串由 `i32` 长度（null 为 `-1`）
//! 加每字符一个字节组成；varint 格式见 [`varint`]。

mod access;
mod concurrent_view;
mod config;
mod error;
mod page;
mod paged_reader;
mod paged_writer;
mod seek_reader;
mod stream;
pub mod varint;
mod view;

#[cfg(test)]
mod tests;

// Re-export public API
// 重新导出公共 API
pub use access::{RandomAccess, RandomAccessMut, NULL_STRING_LEN};
pub use concurrent_view::{ConcurrentWindowedView, SharedPagedReader};
pub use config::{PageConfig, MAX_FILE_LEN, MAX_MAP_LEN, MIN_OVERLAP};
pub use error::{Error, ErrorKind, Result};
pub use paged_reader::PagedReader;
pub use paged_writer::PagedWriter;
pub use seek_reader::SeekReader;
pub use stream::{stream_records, write_records, Decode, Encode, RecordStream};
pub use view::WindowedView;
