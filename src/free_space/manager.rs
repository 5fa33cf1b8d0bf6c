//! Free space manager
//!
//! First-fit page allocator over a word-packed bitmap (set bit = allocated).
//! Runs are found by scanning 64 pages at a time with `trailing_zeros`
//! rather than bit-by-bit probing.
//!
//! ## Directory shielding
//! The directory region lives just past the page area. When the area grows,
//! new pages overlap the bytes of the last written directory; those pages
//! are shielded (marked allocated) so no block can land on them until a
//! later flush commits the directory at its new location. This is the
//! "old space is freed only after the new write succeeds" rule applied to
//! the directory itself.
//!
//! ## Concurrency
//! All state sits behind one internal mutex. Allocation (caller tasks) and
//! freeing (the batch writer) interleave; scan + extend + mark happens under
//! a single lock hold so two allocations can never claim the same run.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BasaltError, Result};
use crate::file::StorageFile;

use super::PageRange;

/// A directory region location in byte coordinates
#[derive(Debug, Clone, Copy)]
struct DirRegion {
    offset: u64,
    len: u64,
}

/// Page allocator for the file's page area
#[derive(Debug)]
pub struct FreeSpaceManager {
    file: Arc<StorageFile>,
    page_size: u64,
    min_extension_pages: u64,
    growth_factor: u64,
    inner: Mutex<State>,
}

#[derive(Debug)]
struct State {
    bitmap: Bitmap,
    /// Last durably committed directory location
    durable_dir: Option<DirRegion>,
    /// Directory location a checkpoint is currently writing to
    staged_dir: Option<DirRegion>,
    /// Pages reserved because they overlap a protected directory region
    shielded: Vec<PageRange>,
}

impl FreeSpaceManager {
    /// Allocator for a fresh file: zero pages, nothing allocated.
    pub fn new(
        file: Arc<StorageFile>,
        page_size: u64,
        min_extension_pages: u64,
        growth_factor: u64,
    ) -> Self {
        Self::with_total(file, page_size, min_extension_pages, growth_factor, 0)
    }

    /// Allocator over an existing page area of `total_pages`, all free.
    /// Recovery marks live directory entries afterwards.
    pub fn with_total(
        file: Arc<StorageFile>,
        page_size: u64,
        min_extension_pages: u64,
        growth_factor: u64,
        total_pages: u64,
    ) -> Self {
        Self {
            file,
            page_size,
            min_extension_pages,
            growth_factor,
            inner: Mutex::new(State {
                bitmap: Bitmap::with_total(total_pages),
                durable_dir: None,
                staged_dir: None,
                shielded: Vec::new(),
            }),
        }
    }

    /// First-fit allocation of `count` contiguous pages.
    ///
    /// When no run fits, the file is extended by
    /// `max(min_extension_pages, max(count, total_pages / growth_factor))`
    /// pages in one length-set call, then the scan is retried. Extension
    /// failure is a `Capacity` error and is never retried automatically.
    pub fn allocate(&self, count: u64) -> Result<PageRange> {
        if count == 0 {
            return Err(BasaltError::InvalidArgument(
                "cannot allocate zero pages".to_string(),
            ));
        }

        let mut inner = self.inner.lock();
        // An extension can lose some of its new pages to directory shields,
        // so one round is not always enough. Every round adds >= count pages
        // and the shieldable regions are finite, so this settles fast.
        let start = loop {
            if let Some(start) = inner.bitmap.find_free_run(count) {
                break start;
            }
            let grow_by = self
                .min_extension_pages
                .max(count.max(inner.bitmap.total_pages / self.growth_factor));
            self.extend_locked(&mut inner, grow_by)?;
        };

        let range = PageRange { start, count };
        inner.bitmap.mark_allocated(range)?;
        Ok(range)
    }

    /// Return a range to the free pool. The file never shrinks.
    pub fn free(&self, range: PageRange) {
        self.inner.lock().bitmap.clear_range(range);
    }

    /// Mark a range allocated without going through the scan. Used during
    /// recovery for live directory entries; overlap with an already
    /// allocated page is reported as corruption.
    pub fn mark_allocated(&self, range: PageRange) -> Result<()> {
        self.inner.lock().bitmap.mark_allocated(range)
    }

    /// Grow the page area by exactly `pages`, reserving the space up front
    /// with one file-length set.
    pub fn extend(&self, pages: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        self.extend_locked(&mut inner, pages)
    }

    // =========================================================================
    // Directory Placement
    // =========================================================================

    /// Record where recovery found the committed directory.
    pub fn set_durable_directory(&self, offset: u64, len: u64) {
        self.inner.lock().durable_dir = (len > 0).then_some(DirRegion { offset, len });
    }

    /// Pick the spot for a checkpoint's directory write: the current end of
    /// the page area. The location is staged under the lock, so an
    /// extension racing the checkpoint shields it before any block can be
    /// placed there.
    pub fn reserve_directory(&self, len: u64) -> (u64, u64) {
        let mut inner = self.inner.lock();
        let total_pages = inner.bitmap.total_pages;
        let offset = self.page_area_end_locked(&inner);
        inner.staged_dir = (len > 0).then_some(DirRegion { offset, len });
        (total_pages, offset)
    }

    /// The staged directory write and its header commit both succeeded: the
    /// staged location becomes durable and shields protecting older
    /// locations are released.
    pub fn commit_directory(&self) {
        let mut inner = self.inner.lock();
        inner.durable_dir = inner.staged_dir.take();
        self.prune_shields(&mut inner);
    }

    /// The staged directory write failed; the previous durable location
    /// stays protected and anything shielding the failed location is freed.
    pub fn abort_directory(&self) {
        let mut inner = self.inner.lock();
        inner.staged_dir = None;
        self.prune_shields(&mut inner);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn total_pages(&self) -> u64 {
        self.inner.lock().bitmap.total_pages
    }

    pub fn free_pages(&self) -> u64 {
        self.inner.lock().bitmap.free_pages
    }

    pub fn allocated_pages(&self) -> u64 {
        let inner = self.inner.lock();
        inner.bitmap.total_pages - inner.bitmap.free_pages
    }

    /// Byte offset one past the last page; where a flush places the
    /// directory region.
    pub fn page_area_end(&self) -> u64 {
        let inner = self.inner.lock();
        self.page_area_end_locked(&inner)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn page_area_end_locked(&self, inner: &State) -> u64 {
        self.page_size * (1 + inner.bitmap.total_pages)
    }

    fn extend_locked(&self, inner: &mut State, pages: u64) -> Result<()> {
        let old_total = inner.bitmap.total_pages;
        let new_total = old_total + pages;
        let new_len = self.page_size * (1 + new_total);
        if let Err(err) = self.file.set_len(new_len) {
            return Err(match err {
                BasaltError::Io(source) => BasaltError::Capacity {
                    requested_pages: pages,
                    source,
                },
                other => other,
            });
        }
        inner.bitmap.grow_to(new_total);
        self.shield_directories(inner, old_total, new_total);
        Ok(())
    }

    /// Reserve the new pages that overlap a protected directory region.
    fn shield_directories(&self, inner: &mut State, old_total: u64, new_total: u64) {
        for region in [inner.durable_dir, inner.staged_dir].into_iter().flatten() {
            let Some(overlap) = self.overlap_pages(region, old_total, new_total) else {
                continue;
            };
            // Freshly grown pages are free by construction, so the mark
            // cannot report an overlap
            if inner.bitmap.mark_allocated(overlap).is_ok() {
                inner.shielded.push(overlap);
            }
        }
    }

    /// Pages in `[from, to)` whose bytes intersect `region`.
    fn overlap_pages(&self, region: DirRegion, from: u64, to: u64) -> Option<PageRange> {
        let first = region.offset / self.page_size - 1;
        let end = (region.offset + region.len).div_ceil(self.page_size) - 1;
        let start = first.max(from);
        let stop = end.min(to);
        (start < stop).then(|| PageRange {
            start,
            count: stop - start,
        })
    }

    /// Free every shield that no longer protects the durable directory.
    fn prune_shields(&self, inner: &mut State) {
        let durable = inner.durable_dir;
        let page_size = self.page_size;
        let keep = move |range: &PageRange| match durable {
            None => false,
            Some(region) => {
                let first = region.offset / page_size - 1;
                let end = (region.offset + region.len).div_ceil(page_size) - 1;
                range.start < end && range.end() > first
            }
        };
        let (kept, released): (Vec<_>, Vec<_>) = inner.shielded.drain(..).partition(keep);
        inner.shielded = kept;
        for range in released {
            inner.bitmap.clear_range(range);
        }
    }
}

// =============================================================================
// Bitmap
// =============================================================================

/// Word-packed allocation bitmap, one bit per page, set = allocated
#[derive(Debug)]
struct Bitmap {
    words: Vec<u64>,
    total_pages: u64,
    free_pages: u64,
}

impl Bitmap {
    fn with_total(total_pages: u64) -> Self {
        Self {
            words: vec![0u64; total_pages.div_ceil(64) as usize],
            total_pages,
            free_pages: total_pages,
        }
    }

    fn grow_to(&mut self, new_total: u64) {
        self.words.resize(new_total.div_ceil(64) as usize, 0);
        self.free_pages += new_total - self.total_pages;
        self.total_pages = new_total;
    }

    /// First page in `[from, to)` whose allocated-bit matches `allocated`,
    /// scanning whole words and finishing with `trailing_zeros`. Words
    /// partially outside the range are masked so stray bits cannot match.
    fn find_first(&self, from: u64, to: u64, allocated: bool) -> Option<u64> {
        if from >= to {
            return None;
        }
        let word_start = (from / 64) as usize;
        let word_end = to.div_ceil(64) as usize;
        let first_offset = from % 64;

        for wi in word_start..word_end {
            let mut word = self.words[wi];
            if !allocated {
                word = !word;
            }
            if wi == word_start && first_offset != 0 {
                word &= (!0u64) << first_offset;
            }
            if wi == word_end - 1 {
                let end_offset = to % 64;
                if end_offset != 0 {
                    word &= (1u64 << end_offset) - 1;
                }
            }
            if word != 0 {
                return Some(wi as u64 * 64 + word.trailing_zeros() as u64);
            }
        }
        None
    }

    /// First-fit scan for `count` contiguous free pages. Each blocked
    /// candidate advances the cursor past the allocated page that broke the
    /// run, so every page is visited at most twice.
    fn find_free_run(&self, count: u64) -> Option<u64> {
        let mut cursor = 0u64;
        while cursor + count <= self.total_pages {
            let start = self.find_first(cursor, self.total_pages, false)?;
            if start + count > self.total_pages {
                return None;
            }
            match self.find_first(start, start + count, true) {
                None => return Some(start),
                Some(blocker) => cursor = blocker + 1,
            }
        }
        None
    }

    fn mark_allocated(&mut self, range: PageRange) -> Result<()> {
        if range.end() > self.total_pages {
            return Err(BasaltError::Corrupted(format!(
                "page range {}..{} lies beyond the page area ({} pages)",
                range.start,
                range.end(),
                self.total_pages
            )));
        }
        if let Some(page) = self.find_first(range.start, range.end(), true) {
            return Err(BasaltError::Corrupted(format!(
                "page {} is allocated twice",
                page
            )));
        }
        for page in range.start..range.end() {
            self.words[(page / 64) as usize] |= 1u64 << (page % 64);
        }
        self.free_pages -= range.count;
        Ok(())
    }

    /// Clear a range's bits. Only pages that were actually allocated count
    /// towards the freed total, so accounting stays exact.
    fn clear_range(&mut self, range: PageRange) {
        for page in range.start..range.end().min(self.total_pages) {
            let word = (page / 64) as usize;
            let bit = 1u64 << (page % 64);
            if self.words[word] & bit != 0 {
                self.words[word] &= !bit;
                self.free_pages += 1;
            }
        }
    }
}
