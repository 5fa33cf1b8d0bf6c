//! In-memory block directory with dirty tracking
//!
//! ## Concurrency
//! One mutex guards the map and the dirty counter. Caller tasks update
//! entries through it; the periodic flush loop checks the dirty count under
//! the same lock before deciding to serialize. Serialization happens under
//! the lock too (entries are small), so a snapshot is always internally
//! consistent.

use std::collections::BTreeMap;

use crc32fast::Hasher;
use parking_lot::Mutex;

use crate::error::{BasaltError, Result};
use crate::registry::entry::{BlockEntry, MAX_NAME_LEN};

/// Name → placement map for every live block
#[derive(Debug)]
pub struct BlockRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    entries: BTreeMap<String, BlockEntry>,
    /// Updates since the last successful flush; zero means Clean
    dirty: usize,
}

/// A consistent serialization of the directory, taken under the lock.
///
/// `mark_flushed` consumes the dirty count captured here, so updates that
/// land while the region is being written stay dirty for the next flush.
pub struct RegistrySnapshot {
    /// Encoded directory region
    pub bytes: Vec<u8>,
    /// Number of entries encoded
    pub entry_count: u64,
    /// CRC32 of `bytes`, stored in the file header
    pub crc: u32,
    dirty_taken: usize,
}

impl BlockRegistry {
    /// Empty registry for a fresh file
    pub fn new() -> Self {
        Self::from_entries(BTreeMap::new())
    }

    /// Registry recovered from a parsed directory region. Starts Clean.
    pub fn from_entries(entries: BTreeMap<String, BlockEntry>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner { entries, dirty: 0 }),
        }
    }

    /// Insert or replace an entry, returning the previous one. Dirties the
    /// registry.
    pub fn upsert(&self, name: String, entry: BlockEntry) -> Option<BlockEntry> {
        let mut inner = self.inner.lock();
        inner.dirty += 1;
        inner.entries.insert(name, entry)
    }

    /// Look up a block's placement
    pub fn get(&self, name: &str) -> Option<BlockEntry> {
        self.inner.lock().entries.get(name).copied()
    }

    /// Remove an entry, returning it. Removal dirties the registry; `None`
    /// leaves it untouched.
    pub fn remove(&self, name: &str) -> Option<BlockEntry> {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(name);
        if removed.is_some() {
            inner.dirty += 1;
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// All live block names, sorted
    pub fn names(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    /// Updates since the last successful flush
    pub fn dirty_count(&self) -> usize {
        self.inner.lock().dirty
    }

    /// Clean means the persisted directory matches memory
    pub fn is_dirty(&self) -> bool {
        self.dirty_count() > 0
    }

    /// Serialize the directory region. Returns `None` when Clean, so callers
    /// skip the write entirely.
    pub fn snapshot_if_dirty(&self) -> Option<RegistrySnapshot> {
        let inner = self.inner.lock();
        if inner.dirty == 0 {
            return None;
        }
        Some(Self::snapshot_locked(&inner))
    }

    /// Serialize the directory region unconditionally (file creation writes
    /// an empty region once).
    pub fn snapshot(&self) -> RegistrySnapshot {
        Self::snapshot_locked(&self.inner.lock())
    }

    /// Subtract the snapshot's dirty share after its region write and header
    /// commit both succeeded. A failed flush skips this, leaving the registry
    /// Dirty for the next tick to retry.
    pub fn mark_flushed(&self, snapshot: &RegistrySnapshot) {
        let mut inner = self.inner.lock();
        inner.dirty = inner.dirty.saturating_sub(snapshot.dirty_taken);
    }

    /// Parse a directory region read back from the file. The caller has
    /// already verified the region CRC against the header.
    pub fn decode_region(bytes: &[u8], expected_entries: u64) -> Result<BTreeMap<String, BlockEntry>> {
        let mut entries = BTreeMap::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            let (name, entry) = BlockEntry::decode_from(bytes, &mut pos)?;
            if name.len() > MAX_NAME_LEN {
                return Err(BasaltError::Corrupted(format!(
                    "directory entry name exceeds {} bytes",
                    MAX_NAME_LEN
                )));
            }
            if entries.insert(name.clone(), entry).is_some() {
                return Err(BasaltError::Corrupted(format!(
                    "duplicate directory entry for block '{}'",
                    name
                )));
            }
        }
        if entries.len() as u64 != expected_entries {
            return Err(BasaltError::Corrupted(format!(
                "directory entry count mismatch: header says {}, region holds {}",
                expected_entries,
                entries.len()
            )));
        }
        Ok(entries)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn snapshot_locked(inner: &RegistryInner) -> RegistrySnapshot {
        let mut bytes = Vec::new();
        for (name, entry) in &inner.entries {
            entry.encode_into(name, &mut bytes);
        }
        let mut hasher = Hasher::new();
        hasher.update(&bytes);
        RegistrySnapshot {
            entry_count: inner.entries.len() as u64,
            crc: hasher.finalize(),
            bytes,
            dirty_taken: inner.dirty,
        }
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
