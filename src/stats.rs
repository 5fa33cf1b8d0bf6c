//! Storage operation counters
//!
//! Monotonic counters shared between the provider and its background tasks.
//! Tests use them to observe batching behavior (flush idempotence, O(1)
//! registry flushes) without reaching into internals.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated with relaxed atomics
#[derive(Debug, Default)]
pub struct StorageStats {
    pub(crate) writes_enqueued: AtomicU64,
    pub(crate) writes_applied: AtomicU64,
    pub(crate) batches_applied: AtomicU64,
    pub(crate) batch_failures: AtomicU64,
    pub(crate) registry_flushes: AtomicU64,
    pub(crate) syncs: AtomicU64,
    pub(crate) checksum_retries: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Write operations accepted into the queue
    pub writes_enqueued: u64,
    /// Write operations physically applied to the file
    pub writes_applied: u64,
    /// Batches fully applied
    pub batches_applied: u64,
    /// Batches that stopped on an I/O error
    pub batch_failures: u64,
    /// Directory region writes (threshold, periodic, or forced)
    pub registry_flushes: u64,
    /// Durable fsync calls
    pub syncs: u64,
    /// Reads that needed the single re-read after a checksum mismatch
    pub checksum_retries: u64,
}

impl StorageStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            writes_enqueued: self.writes_enqueued.load(Ordering::Relaxed),
            writes_applied: self.writes_applied.load(Ordering::Relaxed),
            batches_applied: self.batches_applied.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
            registry_flushes: self.registry_flushes.load(Ordering::Relaxed),
            syncs: self.syncs.load(Ordering::Relaxed),
            checksum_retries: self.checksum_retries.load(Ordering::Relaxed),
        }
    }
}
