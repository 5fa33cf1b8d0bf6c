//! Directory entry codec
//!
//! One entry per live block, concatenated into the directory region:
//!
//! ```text
//! [NameLen: u16][NameBytes][Offset: u64][Length: u64][Checksum: 32 bytes]
//! ```
//!
//! Little-endian, no alignment padding. Names are UTF-8, 1..=65535 bytes.

use crate::error::{BasaltError, Result};
use crate::format::{Checksum, CHECKSUM_SIZE};
use crate::free_space::{pages_for, PageRange};

/// Fixed bytes per entry besides the name itself
pub(crate) const ENTRY_FIXED_SIZE: usize = 2 + 8 + 8 + CHECKSUM_SIZE;

/// Longest allowed block name in bytes (NameLen is a u16)
pub(crate) const MAX_NAME_LEN: usize = u16::MAX as usize;

/// Where a block's bytes live and how to verify them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    /// Byte offset of the first page; 0 for zero-length blocks
    pub offset: u64,
    /// Payload length in bytes (not page-aligned)
    pub length: u64,
    /// SHA-256 digest of the payload
    pub checksum: Checksum,
}

impl BlockEntry {
    /// Pages this block occupies
    pub fn page_count(&self, page_size: u64) -> u64 {
        pages_for(self.length, page_size)
    }

    /// Page range holding this block, `None` for zero-length blocks
    pub fn page_range(&self, page_size: u64) -> Option<PageRange> {
        if self.length == 0 {
            return None;
        }
        Some(PageRange {
            start: self.offset / page_size - 1,
            count: self.page_count(page_size),
        })
    }

    /// Append the encoded entry to `buf`. The name is validated before an
    /// entry ever exists, so the length always fits the u16.
    pub(crate) fn encode_into(&self, name: &str, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.length.to_le_bytes());
        buf.extend_from_slice(self.checksum.as_bytes());
    }

    /// Decode one entry at `*pos`, advancing `*pos` past it.
    pub(crate) fn decode_from(buf: &[u8], pos: &mut usize) -> Result<(String, BlockEntry)> {
        let remaining = buf.len() - *pos;
        if remaining < 2 {
            return Err(BasaltError::Corrupted(
                "directory entry truncated before name length".to_string(),
            ));
        }
        let name_len =
            u16::from_le_bytes(buf[*pos..*pos + 2].try_into().unwrap()) as usize;
        if name_len == 0 {
            return Err(BasaltError::Corrupted(
                "directory entry has empty name".to_string(),
            ));
        }
        if remaining < ENTRY_FIXED_SIZE + name_len {
            return Err(BasaltError::Corrupted(format!(
                "directory entry truncated: need {} bytes, have {}",
                ENTRY_FIXED_SIZE + name_len,
                remaining
            )));
        }
        let mut cursor = *pos + 2;

        let name = std::str::from_utf8(&buf[cursor..cursor + name_len])
            .map_err(|_| {
                BasaltError::Corrupted("directory entry name is not valid UTF-8".to_string())
            })?
            .to_string();
        cursor += name_len;

        let offset = u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
        cursor += 8;
        let length = u64::from_le_bytes(buf[cursor..cursor + 8].try_into().unwrap());
        cursor += 8;
        let mut digest = [0u8; CHECKSUM_SIZE];
        digest.copy_from_slice(&buf[cursor..cursor + CHECKSUM_SIZE]);
        cursor += CHECKSUM_SIZE;

        *pos = cursor;
        Ok((
            name,
            BlockEntry {
                offset,
                length,
                checksum: Checksum::from_bytes(digest),
            },
        ))
    }
}
