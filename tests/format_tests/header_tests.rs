//! Tests for the file header codec
//!
//! These tests verify:
//! - Encoding to the fixed 64-byte form
//! - Decode validation: magic, version, header CRC, page size
//! - Fresh-file header defaults

use basalt::format::FileHeader;
use basalt::BasaltError;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_header() -> FileHeader {
    FileHeader {
        page_size: 4096,
        total_pages: 12,
        directory_offset: 53248,
        directory_len: 230,
        directory_entries: 4,
        directory_crc: 0xdead_beef,
    }
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encoded_header_is_64_bytes() {
    let buf = sample_header().encode();

    assert_eq!(buf.len(), 64);
    assert_eq!(&buf[0..4], b"BSLT");
}

#[test]
fn test_decode_restores_all_fields() {
    let header = sample_header();
    let decoded = FileHeader::decode(&header.encode()).unwrap();

    assert_eq!(decoded, header);
}

#[test]
fn test_fresh_header_points_past_header_page() {
    let header = FileHeader::new(4096);

    assert_eq!(header.total_pages, 0);
    assert_eq!(header.directory_offset, 4096);
    assert_eq!(header.directory_len, 0);
    assert_eq!(header.directory_entries, 0);
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_rejects_wrong_magic() {
    let mut buf = sample_header().encode();
    buf[0] = b'X';

    let err = FileHeader::decode(&buf).unwrap_err();
    assert!(matches!(err, BasaltError::Corrupted(_)));
    assert!(err.to_string().contains("magic"));
}

#[test]
fn test_rejects_unknown_version() {
    let mut buf = sample_header().encode();
    // Version field sits right after the 4 magic bytes
    buf[4] = 0xfe;

    let err = FileHeader::decode(&buf).unwrap_err();
    assert!(matches!(err, BasaltError::Corrupted(_)));
    assert!(err.to_string().contains("version"));
}

#[test]
fn test_rejects_torn_write() {
    let mut buf = sample_header().encode();
    // Flip a bit in the middle of the payload fields
    buf[20] ^= 0x40;

    let err = FileHeader::decode(&buf).unwrap_err();
    assert!(matches!(err, BasaltError::Corrupted(_)));
    assert!(err.is_integrity());
}

#[test]
fn test_rejects_short_buffer() {
    let buf = sample_header().encode();

    let err = FileHeader::decode(&buf[..32]).unwrap_err();
    assert!(matches!(err, BasaltError::Corrupted(_)));
}
