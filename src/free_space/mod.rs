//! Free Space Module
//!
//! Page-granular accounting of the file's page area.
//!
//! ## Responsibilities
//! - Track which pages are allocated with a one-bit-per-page bitmap
//! - Serve first-fit contiguous allocations
//! - Grow the file exponentially when no run fits (pages are never shrunk)
//!
//! The bitmap is not persisted. It is rebuilt from the directory region at
//! open, which keeps the directory the single durable source of truth.

mod manager;

pub use manager::FreeSpaceManager;

/// A contiguous run of pages in the page area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    /// First page index
    pub start: u64,
    /// Number of pages, always > 0
    pub count: u64,
}

impl PageRange {
    /// Byte offset of this range's first page (page 0 sits one page past the
    /// header page)
    pub fn byte_offset(&self, page_size: u64) -> u64 {
        page_size * (1 + self.start)
    }

    /// Exclusive end page index
    pub fn end(&self) -> u64 {
        self.start + self.count
    }
}

/// Number of pages needed to hold `len` bytes
pub fn pages_for(len: u64, page_size: u64) -> u64 {
    len.div_ceil(page_size)
}

/// Page range covering the bytes `[offset, offset + len)`, given that
/// `offset` is page-aligned within the page area
pub fn range_for(offset: u64, len: u64, page_size: u64) -> PageRange {
    PageRange {
        start: offset / page_size - 1,
        count: pages_for(len, page_size),
    }
}
