//! Tests for block checksums
//!
//! These tests verify:
//! - Digest stability for equal payloads
//! - Sensitivity to any payload change
//! - Raw-byte and hex renderings

use basalt::format::Checksum;

// =============================================================================
// Digest Tests
// =============================================================================

#[test]
fn test_same_payload_same_digest() {
    let a = Checksum::compute(b"block payload");
    let b = Checksum::compute(b"block payload");

    assert_eq!(a, b);
}

#[test]
fn test_single_bit_changes_digest() {
    let a = Checksum::compute(b"block payload");
    let b = Checksum::compute(b"block payloae");

    assert_ne!(a, b);
}

#[test]
fn test_empty_payload_has_digest() {
    // Zero-length blocks still carry a checksum in the directory
    let empty = Checksum::compute(b"");
    let nonempty = Checksum::compute(b"x");

    assert_ne!(empty, nonempty);
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_round_trips_through_raw_bytes() {
    let original = Checksum::compute(b"some data");
    let restored = Checksum::from_bytes(*original.as_bytes());

    assert_eq!(original, restored);
}

#[test]
fn test_hex_rendering() {
    let checksum = Checksum::compute(b"abc");
    let hex = checksum.to_hex();

    // 32 bytes, two hex digits each
    assert_eq!(hex.len(), 64);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    // Known SHA-256 of "abc"
    assert_eq!(
        hex,
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(format!("{}", checksum), hex);
}
