//! Page geometry configuration
//!
//! 页面几何配置

use super::error::{Error, Result};

/// Largest length a single mapping call accepts on this target
///
/// 当前目标平台单次映射调用可接受的最大长度
pub const MAX_MAP_LEN: u64 = isize::MAX as u64;

/// Largest file length the writer will grow to; `set_len` takes an `i64` underneath
///
/// 写入器可扩展到的最大文件长度；`set_len` 底层接受 `i64`
pub const MAX_FILE_LEN: u64 = i64::MAX as u64;

/// Smallest overlap that still covers every fixed-width primitive
///
/// 能覆盖所有定长基本类型的最小重叠区大小
pub const MIN_OVERLAP: u64 = 8;

/// Page geometry and cache policy shared by the paged engines
///
/// 分页引擎共享的页面几何与缓存策略
///
/// A page covers `[index * page_size, index * page_size + page_size + overlap)`.
/// The overlap lets any value of at most `overlap` bytes that starts inside the
/// nominal page be served from that page alone.
///
/// 一个页面覆盖 `[index * page_size, index * page_size + page_size + overlap)`。
/// 重叠区使得任何起始于名义页面内、宽度不超过 `overlap` 的值都能仅由该页面提供。
///
/// # Examples
///
/// ```
/// use paged_mmap::PageConfig;
///
/// let config = PageConfig::writer().with_page_size(4096).with_cache_pages(2);
/// assert_eq!(config.page_size(), 4096);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageConfig {
    page_size: u64,
    overlap: u64,
    cache_pages: usize,
}

impl PageConfig {
    /// Default reader page size: as large as the address space comfortably allows
    ///
    /// 默认读取页面大小：在地址空间允许的范围内尽量大
    #[cfg(target_pointer_width = "64")]
    pub const READER_PAGE_SIZE: u64 = 1 << 30;
    #[cfg(not(target_pointer_width = "64"))]
    pub const READER_PAGE_SIZE: u64 = 1 << 26;

    /// Default writer page size, smaller so growth stays cheap
    ///
    /// 默认写入页面大小，较小以降低扩展开销
    pub const WRITER_PAGE_SIZE: u64 = 16 << 20;

    /// Default overlap region
    ///
    /// 默认重叠区大小
    pub const DEFAULT_OVERLAP: u64 = 1024;

    /// Geometry tuned for read-only access
    ///
    /// 为只读访问调优的配置
    pub const fn reader() -> Self {
        Self {
            page_size: Self::READER_PAGE_SIZE,
            overlap: Self::DEFAULT_OVERLAP,
            cache_pages: 1,
        }
    }

    /// Geometry tuned for growable writes
    ///
    /// 为可增长写入调优的配置
    pub const fn writer() -> Self {
        Self {
            page_size: Self::WRITER_PAGE_SIZE,
            overlap: Self::DEFAULT_OVERLAP,
            cache_pages: 1,
        }
    }

    pub const fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub const fn with_overlap(mut self, overlap: u64) -> Self {
        self.overlap = overlap;
        self
    }

    /// Number of pages kept mapped at once (default 1)
    ///
    /// 同时保持映射的页面数（默认 1）
    pub const fn with_cache_pages(mut self, cache_pages: usize) -> Self {
        self.cache_pages = cache_pages;
        self
    }

    #[inline]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    #[inline]
    pub fn overlap(&self) -> u64 {
        self.overlap
    }

    #[inline]
    pub fn cache_pages(&self) -> usize {
        self.cache_pages
    }

    /// Check the geometry before any file is touched
    ///
    /// 在访问任何文件之前检查配置
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a zero page size, an overlap below
    /// [`MIN_OVERLAP`], a zero cache capacity, or a page that exceeds
    /// [`MAX_MAP_LEN`].
    ///
    /// # Errors
    /// 页面大小为 0、重叠区小于 [`MIN_OVERLAP`]、缓存容量为 0 或页面超过
    /// [`MAX_MAP_LEN`] 时返回 `InvalidConfig`。
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig { reason: "page size must be non-zero" });
        }
        if self.overlap < MIN_OVERLAP {
            return Err(Error::InvalidConfig { reason: "overlap must be at least 8 bytes" });
        }
        if self.cache_pages == 0 {
            return Err(Error::InvalidConfig { reason: "cache must hold at least one page" });
        }
        match self.page_size.checked_add(self.overlap) {
            Some(len) if len <= MAX_MAP_LEN => Ok(()),
            _ => Err(Error::InvalidConfig { reason: "page exceeds the maximum mapping length" }),
        }
    }

    /// Translate an absolute offset into `(page index, in-page offset)`
    ///
    /// 将绝对偏移转换为 `(页索引, 页内偏移)`
    #[inline]
    pub(crate) fn locate(&self, offset: u64) -> (u64, usize) {
        (offset / self.page_size, (offset % self.page_size) as usize)
    }

    /// Absolute offset of the first byte of page `index`
    #[inline]
    pub(crate) fn page_start(&self, index: u64) -> u64 {
        index * self.page_size
    }

    /// Full mapped length of a page, overlap included
    #[inline]
    pub(crate) fn mapped_len(&self) -> u64 {
        self.page_size + self.overlap
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self::reader()
    }
}
