//! Pending-write shadow
//!
//! Holds the payload of every queued-but-unapplied write, keyed by block
//! name. Reads consult it before touching the file, which is what makes
//! writes immediately visible to their submitter ("read your writes") while
//! the bytes are still in flight.
//!
//! Each entry records the sequence number of the write that produced it.
//! Retirement is conditional on that sequence, so a slow batch can never
//! evict the shadow of a newer overwrite.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug)]
struct PendingEntry {
    seq: u64,
    data: Bytes,
}

/// Name → in-flight payload map
#[derive(Debug, Default)]
pub struct PendingWrites {
    inner: Mutex<HashMap<String, PendingEntry>>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a queued write's payload. Replaces any older in-flight entry
    /// for the same name.
    pub fn publish(&self, name: &str, seq: u64, data: Bytes) {
        self.inner
            .lock()
            .insert(name.to_string(), PendingEntry { seq, data });
    }

    /// Payload of the newest in-flight write for `name`, if any. The clone
    /// is cheap; `Bytes` shares the queued buffer.
    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.inner.lock().get(name).map(|entry| entry.data.clone())
    }

    /// Retire the shadow entry for `name` if it still belongs to `seq`.
    /// Called after the write applied (the file now serves those bytes) and
    /// after a failed batch abandons the op (the bytes can never become
    /// durable, so no reader should see them again).
    pub fn retire(&self, name: &str, seq: u64) {
        let mut inner = self.inner.lock();
        if inner.get(name).is_some_and(|entry| entry.seq == seq) {
            inner.remove(name);
        }
    }

    /// Drop the entry for `name` regardless of sequence (the delete path).
    pub fn remove(&self, name: &str) {
        self.inner.lock().remove(name);
    }

    /// Number of in-flight entries
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
