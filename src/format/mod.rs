//! On-Disk Format Module
//!
//! Layout constants and codecs for the single storage file.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (64 bytes, rest of page 0 zero-padded)               │
//! │   Magic: "BSLT" (4) | Version: u16 (2) | PageSize: u32 (4)  │
//! │   TotalPages: u64 (8)                                       │
//! │   DirOffset: u64 (8) | DirLen: u64 (8) | DirEntries: u64(8) │
//! │   DirCRC: u32 (4) | HeaderCRC: u32 (4) | Padding (14)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Page Area (TotalPages * PageSize bytes)                     │
//! │   page i begins at PageSize * (1 + i)                       │
//! │   a block occupies ceil(len / PageSize) contiguous pages    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Directory Region (DirLen bytes at DirOffset)                │
//! │   [NameLen: u16][Name][Offset: u64][Len: u64][Checksum: 32] │
//! │   ... repeated for each live block ...                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The header is the commit point: a flush writes the directory region at the
//! current end of the page area, then rewrites the header to reference it.
//! Recovery trusts only what the header references; a torn directory write is
//! caught by DirCRC and a torn header write by HeaderCRC.

mod checksum;
mod header;

pub use checksum::{Checksum, CHECKSUM_SIZE};
pub use header::FileHeader;

// =============================================================================
// Shared Constants (used by header, registry, provider)
// =============================================================================

/// Magic bytes identifying a basalt storage file
pub(crate) const MAGIC: &[u8; 4] = b"BSLT";

/// Current file format version
pub(crate) const VERSION: u16 = 1;

/// Encoded header size in bytes; the rest of page 0 is zero padding
pub(crate) const HEADER_SIZE: usize = 64;
