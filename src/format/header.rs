//! File header codec
//!
//! The 64-byte header at offset 0 is the durability commit point: it names
//! the directory region that recovery will trust. It carries its own CRC32 so
//! a torn header write surfaces as corruption instead of a bogus layout.

use crc32fast::Hasher;

use crate::error::{BasaltError, Result};
use crate::format::{HEADER_SIZE, MAGIC, VERSION};

// Byte offsets within the encoded header
const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_PAGE_SIZE: usize = 6;
const OFF_TOTAL_PAGES: usize = 10;
const OFF_DIR_OFFSET: usize = 18;
const OFF_DIR_LEN: usize = 26;
const OFF_DIR_ENTRIES: usize = 34;
const OFF_DIR_CRC: usize = 42;
const OFF_HEADER_CRC: usize = 46;

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Page size the file was created with (authoritative over config)
    pub page_size: u32,
    /// Number of pages in the page area
    pub total_pages: u64,
    /// Byte offset of the directory region
    pub directory_offset: u64,
    /// Byte length of the directory region
    pub directory_len: u64,
    /// Number of entries in the directory region
    pub directory_entries: u64,
    /// CRC32 of the directory region bytes
    pub directory_crc: u32,
}

impl FileHeader {
    /// Header for a freshly created, empty file
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            total_pages: 0,
            directory_offset: page_size as u64,
            directory_len: 0,
            directory_entries: 0,
            directory_crc: 0,
        }
    }

    /// Encode into the fixed 64-byte on-disk form
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(MAGIC);
        buf[OFF_VERSION..OFF_VERSION + 2].copy_from_slice(&VERSION.to_le_bytes());
        buf[OFF_PAGE_SIZE..OFF_PAGE_SIZE + 4].copy_from_slice(&self.page_size.to_le_bytes());
        buf[OFF_TOTAL_PAGES..OFF_TOTAL_PAGES + 8].copy_from_slice(&self.total_pages.to_le_bytes());
        buf[OFF_DIR_OFFSET..OFF_DIR_OFFSET + 8]
            .copy_from_slice(&self.directory_offset.to_le_bytes());
        buf[OFF_DIR_LEN..OFF_DIR_LEN + 8].copy_from_slice(&self.directory_len.to_le_bytes());
        buf[OFF_DIR_ENTRIES..OFF_DIR_ENTRIES + 8]
            .copy_from_slice(&self.directory_entries.to_le_bytes());
        buf[OFF_DIR_CRC..OFF_DIR_CRC + 4].copy_from_slice(&self.directory_crc.to_le_bytes());

        let mut hasher = Hasher::new();
        hasher.update(&buf[..OFF_HEADER_CRC]);
        let crc = hasher.finalize();
        buf[OFF_HEADER_CRC..OFF_HEADER_CRC + 4].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decode and validate a header read from offset 0.
    ///
    /// Returns `Corrupted` for anything that cannot be trusted:
    /// - wrong magic (not a basalt file)
    /// - unsupported format version
    /// - header CRC mismatch (torn header write)
    /// - nonsensical page size
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(BasaltError::Corrupted(format!(
                "file too small for header: {} bytes",
                buf.len()
            )));
        }
        if &buf[OFF_MAGIC..OFF_MAGIC + 4] != MAGIC {
            return Err(BasaltError::Corrupted(
                "invalid magic bytes: not a basalt storage file".to_string(),
            ));
        }

        let version = u16::from_le_bytes(buf[OFF_VERSION..OFF_VERSION + 2].try_into().unwrap());
        if version != VERSION {
            return Err(BasaltError::Corrupted(format!(
                "unsupported format version {} (current: {})",
                version, VERSION
            )));
        }

        let stored_crc =
            u32::from_le_bytes(buf[OFF_HEADER_CRC..OFF_HEADER_CRC + 4].try_into().unwrap());
        let mut hasher = Hasher::new();
        hasher.update(&buf[..OFF_HEADER_CRC]);
        if hasher.finalize() != stored_crc {
            return Err(BasaltError::Corrupted(
                "header checksum mismatch (torn header write)".to_string(),
            ));
        }

        let page_size =
            u32::from_le_bytes(buf[OFF_PAGE_SIZE..OFF_PAGE_SIZE + 4].try_into().unwrap());
        if page_size < 512 || !page_size.is_power_of_two() {
            return Err(BasaltError::Corrupted(format!(
                "invalid page size in header: {}",
                page_size
            )));
        }

        Ok(Self {
            page_size,
            total_pages: u64::from_le_bytes(
                buf[OFF_TOTAL_PAGES..OFF_TOTAL_PAGES + 8].try_into().unwrap(),
            ),
            directory_offset: u64::from_le_bytes(
                buf[OFF_DIR_OFFSET..OFF_DIR_OFFSET + 8].try_into().unwrap(),
            ),
            directory_len: u64::from_le_bytes(buf[OFF_DIR_LEN..OFF_DIR_LEN + 8].try_into().unwrap()),
            directory_entries: u64::from_le_bytes(
                buf[OFF_DIR_ENTRIES..OFF_DIR_ENTRIES + 8].try_into().unwrap(),
            ),
            directory_crc: u32::from_le_bytes(buf[OFF_DIR_CRC..OFF_DIR_CRC + 4].try_into().unwrap()),
        })
    }
}
