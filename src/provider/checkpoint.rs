//! Directory checkpoints
//!
//! Persisting the registry means writing the directory region at the
//! current end of the page area, then rewriting the header to reference it.
//! The header write is the commit point: a crash in between leaves the old
//! header pointing at the old (still shielded) region, and recovery loads
//! the previous consistent state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::Result;
use crate::file::StorageFile;
use crate::format::FileHeader;
use crate::free_space::FreeSpaceManager;
use crate::registry::BlockRegistry;
use crate::stats::StorageStats;

/// Everything a directory checkpoint touches
#[derive(Debug)]
pub(crate) struct Checkpointer {
    pub file: Arc<StorageFile>,
    pub free_space: Arc<FreeSpaceManager>,
    pub registry: Arc<BlockRegistry>,
    pub stats: Arc<StorageStats>,
    pub file_dirty: Arc<AtomicBool>,
    pub page_size: u32,
    /// One checkpoint at a time; the flush path and the periodic loop can
    /// both ask for one
    pub ckpt_lock: Mutex<()>,
}

impl Checkpointer {
    /// Write the directory region and commit the header, if the registry is
    /// dirty. Returns whether anything was written.
    ///
    /// Blocking: async callers go through `spawn_blocking`.
    pub fn write_directory(&self) -> Result<bool> {
        let _guard = self.ckpt_lock.lock();
        let Some(snapshot) = self.registry.snapshot_if_dirty() else {
            return Ok(false);
        };

        let dir_len = snapshot.bytes.len() as u64;
        let (total_pages, dir_offset) = self.free_space.reserve_directory(dir_len);
        let header = FileHeader {
            page_size: self.page_size,
            total_pages,
            directory_offset: dir_offset,
            directory_len: dir_len,
            directory_entries: snapshot.entry_count,
            directory_crc: snapshot.crc,
        };

        let outcome = self
            .file
            .write_all_at(&snapshot.bytes, dir_offset)
            .and_then(|_| self.file.write_all_at(&header.encode(), 0));

        match outcome {
            Ok(()) => {
                self.free_space.commit_directory();
                self.registry.mark_flushed(&snapshot);
                self.file_dirty.store(true, Ordering::Release);
                StorageStats::incr(&self.stats.registry_flushes);
                debug!(
                    entries = snapshot.entry_count,
                    bytes = dir_len,
                    "directory checkpoint written"
                );
                Ok(true)
            }
            Err(err) => {
                self.free_space.abort_directory();
                warn!(error = %err, "directory checkpoint failed; registry stays dirty");
                Err(err)
            }
        }
    }
}

/// Periodic and threshold-kicked registry persistence.
///
/// Runs until the stop signal flips. Checkpoint failures are logged and the
/// registry stays dirty, so the next tick retries; nothing is dropped
/// silently.
pub(crate) async fn registry_flush_loop(
    checkpointer: Arc<Checkpointer>,
    kick: Arc<Notify>,
    mut stop: watch::Receiver<bool>,
    interval_ms: u64,
) {
    let mut ticker = interval(Duration::from_millis(interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it
    ticker.tick().await;

    debug!("registry flush loop started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = kick.notified() => {}
            _ = stop.changed() => {
                if *stop.borrow() {
                    break;
                }
                continue;
            }
        }
        if !checkpointer.registry.is_dirty() {
            continue;
        }
        let ckpt = Arc::clone(&checkpointer);
        // Errors are already logged by the checkpointer; the dirty state
        // carries the retry
        let _ = tokio::task::spawn_blocking(move || ckpt.write_directory()).await;
    }
    debug!("registry flush loop stopped");
}
