//! Lazy, forward-only record streaming over any reader or view
//!
//! 基于任意读取器或视图的惰性、只进记录流

use std::marker::PhantomData;
use super::access::{RandomAccess, RandomAccessMut};
use super::error::Result;

/// A record that rebuilds itself from the bytes at a reader's cursor
///
/// 从读取器游标处的字节重建自身的记录
pub trait Decode {
    /// Overwrite `self` with the record at `source`'s cursor, advancing it
    ///
    /// 用 `source` 游标处的记录覆盖 `self`，并前移游标
    fn decode_from<R: RandomAccess>(&mut self, source: &R) -> Result<()>;
}

/// A record that writes itself at a writer's cursor
///
/// 在写入器游标处写出自身的记录
pub trait Encode {
    fn encode_to<W: RandomAccessMut>(&self, sink: &W) -> Result<()>;
}

/// Single-pass iterator over the records of a reader or view
///
/// 遍历读取器或视图中记录的单次迭代器
///
/// Yields `Ok(record)` while the source has bytes left past its cursor, then
/// `None`. After the first error the stream yields that error once and then
/// `None`, so a malformed tail is never turned into garbage records.
///
/// 当数据源游标之后仍有字节时产出 `Ok(record)`，之后产出 `None`。
/// 第一次出错时产出该错误一次，随后一直产出 `None`，因此损坏的尾部不会变成垃圾记录。
pub struct RecordStream<'a, R, T, F> {
    source: &'a R,
    factory: F,
    done: bool,
    _record: PhantomData<fn() -> T>,
}

/// Stream records from `source`, building each one from `factory`
///
/// 从 `source` 流式读取记录，每条记录由 `factory` 构造
///
/// # Examples
///
/// ```
/// use paged_mmap::{stream_records, write_records, Decode, Encode, PagedReader, PagedWriter};
/// use paged_mmap::{RandomAccess, RandomAccessMut, Result};
/// # use tempfile::tempdir;
///
/// #[derive(Default, Debug, PartialEq)]
/// struct Hit {
///     id: i32,
///     score: f64,
/// }
///
/// impl Encode for Hit {
///     fn encode_to<W: RandomAccessMut>(&self, sink: &W) -> Result<()> {
///         sink.put_i32(self.id)?;
///         sink.put_f64(self.score)
///     }
/// }
///
/// impl Decode for Hit {
///     fn decode_from<R: RandomAccess>(&mut self, source: &R) -> Result<()> {
///         self.id = source.get_i32()?;
///         self.score = source.get_f64()?;
///         Ok(())
///     }
/// }
///
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("hits.bin");
/// let writer = PagedWriter::create(&path)?;
/// write_records(&writer, &[Hit { id: 1, score: 0.5 }, Hit { id: 2, score: 0.25 }])?;
///
/// let reader = writer.into_reader()?;
/// let hits: Vec<Hit> = stream_records(&reader, Hit::default).collect::<Result<_>>()?;
/// assert_eq!(hits, vec![Hit { id: 1, score: 0.5 }, Hit { id: 2, score: 0.25 }]);
/// # Ok(())
/// # }
/// ```
pub fn stream_records<R, T, F>(source: &R, factory: F) -> RecordStream<'_, R, T, F>
where
    R: RandomAccess,
    T: Decode,
    F: FnMut() -> T,
{
    RecordStream {
        source,
        factory,
        done: false,
        _record: PhantomData,
    }
}

impl<R, T, F> Iterator for RecordStream<'_, R, T, F>
where
    R: RandomAccess,
    T: Decode,
    F: FnMut() -> T,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !self.source.has_remaining() {
            self.done = true;
            return None;
        }
        let mut record = (self.factory)();
        match record.decode_from(self.source) {
            Ok(()) => Some(Ok(record)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<R, T, F> std::iter::FusedIterator for RecordStream<'_, R, T, F>
where
    R: RandomAccess,
    T: Decode,
    F: FnMut() -> T,
{
}

/// Encode every record at `sink`'s cursor, returning how many were written
///
/// 在 `sink` 游标处编码所有记录，返回写入的条数
pub fn write_records<'r, W, T, I>(sink: &W, records: I) -> Result<u64>
where
    W: RandomAccessMut,
    T: Encode + 'r,
    I: IntoIterator<Item = &'r T>,
{
    let mut count = 0;
    for record in records {
        record.encode_to(sink)?;
        count += 1;
    }
    tracing::trace!(count, "wrote records");
    Ok(count)
}
