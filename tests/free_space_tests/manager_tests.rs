//! Tests for the free space manager
//!
//! These tests verify:
//! - First-fit allocation and hole reuse
//! - Exponential file growth and its lower bounds
//! - Free accounting (the file never shrinks)
//! - Recovery-time marking and overlap detection
//! - Directory region shielding across extensions

use std::sync::Arc;

use basalt::file::StorageFile;
use basalt::free_space::{pages_for, range_for, FreeSpaceManager, PageRange};
use tempfile::TempDir;

const PAGE: u64 = 4096;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_file() -> (TempDir, Arc<StorageFile>) {
    let temp_dir = TempDir::new().unwrap();
    let (file, fresh) = StorageFile::open(&temp_dir.path().join("space.db")).unwrap();
    assert!(fresh);
    (temp_dir, Arc::new(file))
}

/// Manager that grows by exactly what each allocation needs
fn exact_growth(file: Arc<StorageFile>) -> FreeSpaceManager {
    FreeSpaceManager::new(file, PAGE, 1, u64::MAX)
}

// =============================================================================
// Allocation Tests
// =============================================================================

#[test]
fn test_first_fit_reuses_freed_hole() {
    let (_temp, file) = setup_file();
    let manager = FreeSpaceManager::with_total(file, PAGE, 1, u64::MAX, 8);

    let a = manager.allocate(2).unwrap();
    let b = manager.allocate(3).unwrap();
    let c = manager.allocate(1).unwrap();
    assert_eq!((a.start, b.start, c.start), (0, 2, 5));

    manager.free(b);
    assert_eq!(manager.free_pages(), 5);

    // The freed hole is the lowest fit
    let again = manager.allocate(3).unwrap();
    assert_eq!(again.start, 2);
}

#[test]
fn test_smaller_request_lands_in_first_hole() {
    let (_temp, file) = setup_file();
    let manager = FreeSpaceManager::with_total(file, PAGE, 1, u64::MAX, 10);

    let a = manager.allocate(2).unwrap();
    let _b = manager.allocate(2).unwrap();
    manager.free(a);

    // A one-page request takes the start of the first hole, not the tail
    let small = manager.allocate(1).unwrap();
    assert_eq!(small.start, 0);
}

#[test]
fn test_zero_page_allocation_rejected() {
    let (_temp, file) = setup_file();
    let manager = exact_growth(file);

    let err = manager.allocate(0).unwrap_err();
    assert!(matches!(err, basalt::BasaltError::InvalidArgument(_)));
}

// =============================================================================
// Growth Tests
// =============================================================================

#[test]
fn test_growth_follows_the_larger_of_request_and_fraction() {
    let (_temp, file) = setup_file();
    // Grow by at least 4 pages, or half the current total, or the request
    let manager = FreeSpaceManager::new(Arc::clone(&file), PAGE, 4, 2);

    // Empty file: the minimum wins
    manager.allocate(1).unwrap();
    assert_eq!(manager.total_pages(), 4);

    // Fill up, then the fraction is still below the minimum
    manager.allocate(3).unwrap();
    manager.allocate(1).unwrap();
    assert_eq!(manager.total_pages(), 8);

    // Large request: the request wins over minimum and fraction
    manager.allocate(3).unwrap();
    manager.allocate(20).unwrap();
    assert_eq!(manager.total_pages(), 28);

    // The file was extended up front in page units (plus the header page)
    assert_eq!(file.len().unwrap(), PAGE * (1 + 28));
}

#[test]
fn test_growth_fraction_wins_when_file_is_large() {
    let (_temp, file) = setup_file();
    let manager = FreeSpaceManager::with_total(Arc::clone(&file), PAGE, 1, 2, 40);

    // 40 pages allocated, next allocation cannot fit
    manager.allocate(40).unwrap();
    manager.allocate(1).unwrap();

    // Grew by total/2 = 20, not by the 1-page request
    assert_eq!(manager.total_pages(), 60);
}

#[test]
fn test_free_never_shrinks_the_file() {
    let (_temp, file) = setup_file();
    let manager = exact_growth(Arc::clone(&file));

    let range = manager.allocate(6).unwrap();
    let len_after_growth = file.len().unwrap();
    manager.free(range);

    assert_eq!(manager.total_pages(), 6);
    assert_eq!(manager.free_pages(), 6);
    assert_eq!(file.len().unwrap(), len_after_growth);
}

#[test]
fn test_explicit_extension() {
    let (_temp, file) = setup_file();
    let manager = exact_growth(Arc::clone(&file));

    manager.extend(5).unwrap();

    assert_eq!(manager.total_pages(), 5);
    assert_eq!(manager.free_pages(), 5);
    assert_eq!(file.len().unwrap(), PAGE * 6);
}

// =============================================================================
// Recovery Marking Tests
// =============================================================================

#[test]
fn test_mark_allocated_records_live_ranges() {
    let (_temp, file) = setup_file();
    let manager = FreeSpaceManager::with_total(file, PAGE, 1, u64::MAX, 8);

    manager
        .mark_allocated(PageRange { start: 0, count: 3 })
        .unwrap();
    manager
        .mark_allocated(PageRange { start: 5, count: 2 })
        .unwrap();

    assert_eq!(manager.free_pages(), 3);
    // The hole between the marked ranges is the first fit
    let range = manager.allocate(2).unwrap();
    assert_eq!(range.start, 3);
}

#[test]
fn test_overlapping_marks_are_corruption() {
    let (_temp, file) = setup_file();
    let manager = FreeSpaceManager::with_total(file, PAGE, 1, u64::MAX, 8);

    manager
        .mark_allocated(PageRange { start: 0, count: 3 })
        .unwrap();
    let err = manager
        .mark_allocated(PageRange { start: 2, count: 2 })
        .unwrap_err();

    assert!(matches!(err, basalt::BasaltError::Corrupted(_)));
}

#[test]
fn test_marks_beyond_page_area_are_corruption() {
    let (_temp, file) = setup_file();
    let manager = FreeSpaceManager::with_total(file, PAGE, 1, u64::MAX, 4);

    let err = manager
        .mark_allocated(PageRange { start: 2, count: 5 })
        .unwrap_err();

    assert!(matches!(err, basalt::BasaltError::Corrupted(_)));
}

// =============================================================================
// Directory Shielding Tests
// =============================================================================

#[test]
fn test_extension_shields_durable_directory_until_commit() {
    let (_temp, file) = setup_file();
    let manager = FreeSpaceManager::with_total(file, PAGE, 1, u64::MAX, 4);

    // Durable directory sits just past the current page area (page index 4)
    manager.set_durable_directory(PAGE * 5, 100);
    manager.extend(4).unwrap();

    // Pages 4..8 were added; page 4 holds directory bytes and is withheld
    assert_eq!(manager.total_pages(), 8);
    assert_eq!(manager.free_pages(), 7);

    // A new checkpoint lands at the new page area end and commits
    let (total, offset) = manager.reserve_directory(100);
    assert_eq!((total, offset), (8, PAGE * 9));
    manager.commit_directory();

    // The old location is no longer protected
    assert_eq!(manager.free_pages(), 8);
}

#[test]
fn test_abort_keeps_previous_directory_protected() {
    let (_temp, file) = setup_file();
    let manager = FreeSpaceManager::with_total(file, PAGE, 1, u64::MAX, 4);

    manager.set_durable_directory(PAGE * 5, 100);
    manager.extend(4).unwrap();
    assert_eq!(manager.free_pages(), 7);

    // A staged checkpoint gets shielded by a racing extension, then fails
    let (_, staged_offset) = manager.reserve_directory(100);
    assert_eq!(staged_offset, PAGE * 9);
    manager.extend(2).unwrap();
    assert_eq!(manager.free_pages(), 8); // pages 8..10 added, page 8 withheld
    manager.abort_directory();

    // The staged shield is released; the durable one (page 4) stays
    assert_eq!(manager.total_pages(), 10);
    assert_eq!(manager.free_pages(), 9);
}

// =============================================================================
// Page Geometry Tests
// =============================================================================

#[test]
fn test_page_byte_offsets_skip_the_header_page() {
    assert_eq!(PageRange { start: 0, count: 1 }.byte_offset(PAGE), PAGE);
    assert_eq!(PageRange { start: 3, count: 2 }.byte_offset(PAGE), PAGE * 4);
}

#[test]
fn test_pages_for_rounds_up() {
    assert_eq!(pages_for(0, PAGE), 0);
    assert_eq!(pages_for(1, PAGE), 1);
    assert_eq!(pages_for(PAGE, PAGE), 1);
    assert_eq!(pages_for(PAGE + 1, PAGE), 2);
}

#[test]
fn test_range_for_inverts_byte_offset() {
    let range = range_for(PAGE * 4, PAGE + 10, PAGE);
    assert_eq!(range, PageRange { start: 3, count: 2 });
    assert_eq!(range.byte_offset(PAGE), PAGE * 4);
}
