//! Paged, random-access binary file I/O
//!
//! 分页式随机访问二进制文件 I/O
//!
//! This library gives byte-addressable, typed access to files larger than a
//! single memory mapping can cover. Files are mapped one page at a time, pages
//! are unmapped eagerly, and values that straddle a page boundary are handled
//! by an overlap region rather than by special cases.
//!
//! 本库为超出单次内存映射范围的文件提供按字节寻址的类型化访问。
//! 文件逐页映射，页面被立即解除映射，跨越页面边界的值由重叠区处理而非特殊分支。
//!
//! # Features
//!
//! - **Typed access**: little-endian primitives, length-prefixed strings and varints
//! - **Growable writer**: file grows in pages and is truncated to the bytes written
//! - **Cheap views**: `[start, end)` windows that never touch a mapping
//! - **Concurrent readers**: per-thread cursors over one shared page cache
//! - **Streaming**: lazy record iteration through [`stream_records`]
//!
//! # 特性
//!
//! - **类型化访问**：小端序基本类型、带长度前缀的字符串以及 varint
//! - **可增长写入器**：文件按页增长，并截断到已写入的字节
//! - **廉价视图**：`[start, end)` 窗口，从不触及映射
//! - **并发读取**：多个线程在同一共享页面缓存上拥有各自的游标
//! - **流式处理**：通过 [`stream_records`] 惰性迭代记录
//!
//! # Quick Start
//!
//! ```
//! use paged_mmap::{PagedWriter, RandomAccess, RandomAccessMut, Result};
//! # use tempfile::tempdir;
//! # fn main() -> Result<()> {
//! # let dir = tempdir()?;
//! # let path = dir.path().join("quick.bin");
//!
//! // Write, growing the file as needed
//! // 写入，文件按需增长
//! let writer = PagedWriter::create(&path)?;
//! writer.put_i32(42)?;
//! writer.put_string(Some("hello"))?;
//! writer.put_var_i64(1 << 40)?;
//!
//! // Close and reopen for reading
//! // 关闭并重新打开以读取
//! let reader = writer.into_reader()?;
//! assert_eq!(reader.get_i32()?, 42);
//! assert_eq!(reader.get_string()?.as_deref(), Some("hello"));
//! assert_eq!(reader.get_var_i64()?, 1 << 40);
//! assert!(reader.get_u8().is_err());
//! # Ok(())
//! # }
//! ```
//!
//! # Main Types
//!
//! - [`PagedReader`]: read-only paged engine
//! - [`PagedWriter`]: growable read-write paged engine
//! - [`SeekReader`]: seek-and-read engine without mappings
//! - [`WindowedView`]: sub-range with its own cursor
//! - [`SharedPagedReader`] / [`ConcurrentWindowedView`]: thread-safe reading
//! - [`RandomAccess`] / [`RandomAccessMut`]: the get/put contract
//!
//! # 主要类型
//!
//! - [`PagedReader`]：只读分页引擎
//! - [`PagedWriter`]：可增长的读写分页引擎
//! - [`SeekReader`]：不使用映射的 seek + read 引擎
//! - [`WindowedView`]：拥有独立游标的子范围
//! - [`SharedPagedReader`] / [`ConcurrentWindowedView`]：线程安全读取
//! - [`RandomAccess`] / [`RandomAccessMut`]：读写约定

mod file;

pub use file::{
    stream_records, varint, write_records, ConcurrentWindowedView, Decode, Encode, Error, ErrorKind,
    PageConfig, PagedReader, PagedWriter, RandomAccess, RandomAccessMut, RecordStream, Result,
    SeekReader, SharedPagedReader, WindowedView, MAX_FILE_LEN, MAX_MAP_LEN, MIN_OVERLAP, NULL_STRING_LEN,
};
