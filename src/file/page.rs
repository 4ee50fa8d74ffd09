//! Mapped pages and the per-instance page cache
//!
//! 映射页面与每实例页面缓存

use memmap2::{Mmap, MmapMut, MmapOptions};
use std::collections::VecDeque;
use std::fs::File;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use super::config::PageConfig;
use super::error::{Error, Result};

/// One mapped page
///
/// 一个已映射的页面
///
/// The mapping is released when the page is dropped, so evicting a page from
/// its cache slot unmaps it exactly once, synchronously.
///
/// 页面被 drop 时释放映射，因此从缓存槽中淘汰页面会同步且恰好一次地解除映射。
pub(crate) struct Page<M> {
    index: u64,
    map: M,
}

impl Page<Mmap> {
    /// Map page `index` read-only, clipped to `file_len`
    ///
    /// 只读映射第 `index` 页，长度截至 `file_len`
    pub(crate) fn map_read(
        file: &File,
        path: &Path,
        index: u64,
        config: &PageConfig,
        file_len: u64,
    ) -> Result<Self> {
        let start = config.page_start(index);
        let len = config.mapped_len().min(file_len.saturating_sub(start));

        // Safety: the file is opened read-only by this process; concurrent
        // truncation by another process is outside this layer's contract
        // Safety: 文件由本进程只读打开；其他进程并发截断不在本层约定内
        let map = unsafe {
            MmapOptions::new()
                .offset(start)
                .len(len as usize)
                .map(file)
                .map_err(Error::io_at("map page", path, Some(start)))?
        };

        tracing::trace!(path = %path.display(), page = index, offset = start, len, "mapped read-only page");
        Ok(Self { index, map })
    }
}

impl Page<MmapMut> {
    /// Map page `index` read-write; the file must already cover the full page
    ///
    /// 读写映射第 `index` 页；文件必须已覆盖整个页面
    pub(crate) fn map_write(file: &File, path: &Path, index: u64, config: &PageConfig) -> Result<Self> {
        let start = config.page_start(index);
        let len = config.mapped_len();

        // Safety: the writer holds an exclusive advisory lock and the file was
        // grown to cover `[start, start + len)` before mapping
        // Safety: 写入者持有独占建议锁，且映射前文件已扩展至覆盖 `[start, start + len)`
        let map = unsafe {
            MmapOptions::new()
                .offset(start)
                .len(len as usize)
                .map_mut(file)
                .map_err(Error::io_at("map page", path, Some(start)))?
        };

        tracing::trace!(path = %path.display(), page = index, offset = start, len, "mapped read-write page");
        Ok(Self { index, map })
    }

    pub(crate) fn flush(&self) -> std::io::Result<()> {
        self.map.flush()
    }
}

impl<M: Deref<Target = [u8]>> Page<M> {
    #[inline]
    pub(crate) fn bytes(&self) -> &[u8] {
        &self.map
    }
}

impl<M: DerefMut<Target = [u8]>> Page<M> {
    #[inline]
    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

impl<M> Drop for Page<M> {
    fn drop(&mut self) {
        tracing::trace!(page = self.index, "unmapping page");
    }
}

/// Anything the cache can look up by page index
///
/// 可按页索引查找的缓存条目
pub(crate) trait Indexed {
    fn index(&self) -> u64;
}

impl<M> Indexed for Page<M> {
    #[inline]
    fn index(&self) -> u64 {
        self.index
    }
}

impl<P: Indexed> Indexed for Arc<P> {
    #[inline]
    fn index(&self) -> u64 {
        (**self).index()
    }
}

/// Most-recently-used cache of mapped pages
///
/// 已映射页面的最近使用缓存
///
/// Slot 0 holds the most recently used page. The cache never holds more than
/// `capacity` pages; room is made before a new page is mapped, so the previous
/// mapping is gone before the next one exists.
///
/// 槽 0 存放最近使用的页面。缓存最多容纳 `capacity` 个页面；
/// 在映射新页面之前先腾出空间，因此旧映射会在新映射建立前释放。
pub(crate) struct PageCache<P> {
    slots: VecDeque<P>,
    capacity: usize,
}

impl<P: Indexed> PageCache<P> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Look up page `index`, promoting it to most recently used
    ///
    /// 查找第 `index` 页并将其提升为最近使用
    pub(crate) fn get(&mut self, index: u64) -> Option<&mut P> {
        let pos = self.slots.iter().position(|p| p.index() == index)?;
        if pos != 0 {
            let page = self.slots.remove(pos)?;
            self.slots.push_front(page);
        }
        self.slots.front_mut()
    }

    /// Evict least recently used pages until one slot is free
    ///
    /// 淘汰最久未使用的页面直到空出一个槽位
    pub(crate) fn make_room(&mut self) {
        while self.slots.len() >= self.capacity {
            if let Some(evicted) = self.slots.pop_back() {
                tracing::debug!(page = evicted.index(), "evicting page");
            }
        }
    }

    /// Insert a freshly mapped page as most recently used
    ///
    /// 将新映射的页面作为最近使用插入
    pub(crate) fn insert(&mut self, page: P) -> &mut P {
        self.make_room();
        self.slots.push_front(page);
        &mut self.slots[0]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &P> {
        self.slots.iter()
    }

    /// Drop every cached page
    ///
    /// 丢弃所有缓存页面
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Copy `buf.len()` bytes starting at `offset`, one page at a time
///
/// 从 `offset` 开始逐页拷贝 `buf.len()` 字节
///
/// `copy` receives `(page index, in-page offset, destination)` and returns how
/// many bytes it served from that page.
pub(crate) fn read_paged<F>(config: &PageConfig, offset: u64, buf: &mut [u8], mut copy: F) -> Result<()>
where
    F: FnMut(u64, usize, &mut [u8]) -> Result<usize>,
{
    let mut done = 0;
    while done < buf.len() {
        let (index, in_page) = config.locate(offset + done as u64);
        done += copy(index, in_page, &mut buf[done..])?;
    }
    Ok(())
}

/// Write `data` starting at `offset`, one page at a time
///
/// 从 `offset` 开始逐页写入 `data`
pub(crate) fn write_paged<F>(config: &PageConfig, offset: u64, data: &[u8], mut copy: F) -> Result<()>
where
    F: FnMut(u64, usize, &[u8]) -> Result<usize>,
{
    let mut done = 0;
    while done < data.len() {
        let (index, in_page) = config.locate(offset + done as u64);
        done += copy(index, in_page, &data[done..])?;
    }
    Ok(())
}

/// Bytes of `src` starting at `in_page` that fit into `dst`
#[inline]
pub(crate) fn copy_from_page(src: &[u8], in_page: usize, dst: &mut [u8]) -> usize {
    let n = dst.len().min(src.len() - in_page);
    dst[..n].copy_from_slice(&src[in_page..in_page + n]);
    n
}

#[inline]
pub(crate) fn copy_into_page(dst: &mut [u8], in_page: usize, src: &[u8]) -> usize {
    let n = src.len().min(dst.len() - in_page);
    dst[in_page..in_page + n].copy_from_slice(&src[..n]);
    n
}
