//! Batch writer
//!
//! The one task that mutates file bytes. It turns the queue's command
//! stream into offset-sorted batches and applies them with positioned
//! writes on the blocking pool.
//!
//! ## Batch lifecycle
//! 1. Block on the queue for the first command
//! 2. Collect more until the batch is full or the fill timeout expires;
//!    a flush or shutdown marker also ends collection
//! 3. Stable-sort by offset, apply sequentially, then free superseded
//!    ranges and retire shadow entries for everything that landed
//! 4. Answer any marker that ended the batch
//!
//! An I/O error abandons the rest of the batch (applied ops stay applied),
//! latches the error for the next flush waiter, and the loop continues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, error};

use crate::error::{BasaltError, Result};
use crate::file::StorageFile;
use crate::free_space::FreeSpaceManager;
use crate::stats::StorageStats;
use crate::write_behind::queue::QueueCommand;
use crate::write_behind::PendingWrites;

/// State the writer shares with the provider
pub struct WriterShared {
    pub file: Arc<StorageFile>,
    pub free_space: Arc<FreeSpaceManager>,
    pub pending: Arc<PendingWrites>,
    pub stats: Arc<StorageStats>,
    /// Raised whenever bytes land on the file; a flush lowers it and skips
    /// the durable sync when nothing was raised in between
    pub file_dirty: Arc<AtomicBool>,
}

/// Background applier of queued write commands
pub struct BatchWriter {
    rx: mpsc::Receiver<QueueCommand>,
    stop: watch::Receiver<bool>,
    shared: WriterShared,
    batch_size: usize,
    batch_timeout: Duration,
    /// First batch error since the last flush marker
    latched_error: Option<BasaltError>,
}

impl BatchWriter {
    pub fn new(
        rx: mpsc::Receiver<QueueCommand>,
        stop: watch::Receiver<bool>,
        shared: WriterShared,
        batch_size: usize,
        batch_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            stop,
            shared,
            batch_size,
            batch_timeout,
            latched_error: None,
        }
    }

    /// Consume the queue until shutdown or channel closure.
    pub async fn run(mut self) {
        debug!("batch writer started");
        loop {
            let Some(first) = self.rx.recv().await else {
                break;
            };

            let mut batch: Vec<QueueCommand> = Vec::with_capacity(self.batch_size);
            let mut flush_reply = None;
            let mut shutdown_reply = None;
            let mut channel_closed = false;

            match first {
                QueueCommand::Flush(reply) => flush_reply = Some(reply),
                QueueCommand::Shutdown(reply) => shutdown_reply = Some(reply),
                op => {
                    batch.push(op);
                    let deadline = Instant::now() + self.batch_timeout;
                    while batch.len() < self.batch_size {
                        match timeout_at(deadline, self.rx.recv()).await {
                            // Fill timeout expired: ship what we have
                            Err(_) => break,
                            Ok(None) => {
                                channel_closed = true;
                                break;
                            }
                            Ok(Some(QueueCommand::Flush(reply))) => {
                                flush_reply = Some(reply);
                                break;
                            }
                            Ok(Some(QueueCommand::Shutdown(reply))) => {
                                shutdown_reply = Some(reply);
                                break;
                            }
                            Ok(Some(op)) => batch.push(op),
                        }
                    }
                }
            }

            if !batch.is_empty() {
                // The provider was dropped mid-flight: stop touching the
                // file so a reopened instance cannot race these writes
                if *self.stop.borrow() {
                    break;
                }
                match self.apply_batch(batch).await {
                    Ok(()) => StorageStats::incr(&self.shared.stats.batches_applied),
                    Err(err) => {
                        error!(error = %err, "batch write failed");
                        StorageStats::incr(&self.shared.stats.batch_failures);
                        if self.latched_error.is_none() {
                            self.latched_error = Some(err);
                        }
                    }
                }
            }

            if let Some(reply) = flush_reply {
                let result = match self.latched_error.take() {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            if let Some(reply) = shutdown_reply {
                let _ = reply.send(());
                debug!("batch writer stopped");
                return;
            }
            if channel_closed {
                break;
            }
        }
        debug!("batch writer exited");
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Sort and apply one batch; free and retire for every op that landed.
    async fn apply_batch(&mut self, mut batch: Vec<QueueCommand>) -> Result<()> {
        batch.sort_by_key(QueueCommand::sort_offset);
        let ops = batch.len();
        let payload_bytes: u64 = batch
            .iter()
            .map(|command| match command {
                QueueCommand::Write(op) => op.data.len() as u64,
                _ => 0,
            })
            .sum();

        let file = Arc::clone(&self.shared.file);
        let (batch, applied, io_error) = tokio::task::spawn_blocking(move || {
            let mut applied = 0usize;
            for command in &batch {
                if let QueueCommand::Write(op) = command {
                    if !op.data.is_empty() {
                        if let Err(err) = file.write_all_at(&op.data, op.offset) {
                            return (batch, applied, Some(err));
                        }
                    }
                }
                applied += 1;
            }
            (batch, applied, None)
        })
        .await
        .map_err(|err| BasaltError::Io(std::io::Error::other(err.to_string())))?;

        let mut wrote_bytes = false;
        for (index, command) in batch.iter().enumerate() {
            let landed = index < applied;
            match command {
                QueueCommand::Write(op) => {
                    if landed {
                        if let Some(release) = op.release {
                            self.shared.free_space.free(release);
                        }
                        wrote_bytes |= !op.data.is_empty();
                        StorageStats::incr(&self.shared.stats.writes_applied);
                    }
                    // Landed ops are served from the file now; abandoned ops
                    // can never become durable and must stop being served
                    self.shared.pending.retire(&op.name, op.seq);
                }
                QueueCommand::Release { range } => {
                    if landed {
                        self.shared.free_space.free(*range);
                    }
                }
                _ => {}
            }
        }
        // A failed op may still have put partial bytes on the file
        if wrote_bytes || io_error.is_some() {
            self.shared.file_dirty.store(true, Ordering::Release);
        }

        match io_error {
            Some(err) => Err(err),
            None => {
                debug!(ops, payload_bytes, "applied write batch");
                Ok(())
            }
        }
    }
}
