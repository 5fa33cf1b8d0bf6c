//! Single-File Storage Provider
//!
//! The façade that owns one storage file and coordinates every component
//! around it.
//!
//! ```text
//!   write_block ──► admission ──► [bounded queue] ──► BatchWriter
//!        │            (permit)                            │
//!        ├──► PendingWrites  (read-your-writes shadow)    ▼
//!        └──► BlockRegistry ──► Checkpointer ──► directory + header
//!                                                         │
//!   read_block ──► shadow ──► registry ──► verified read ◄┘
//! ```
//!
//! ## Responsibilities
//! - Admission control and placement for block writes
//! - Verified reads with a single self-heal re-read
//! - Flush: drain the queue, checkpoint the registry, one durable sync
//! - Background task lifecycle (batch writer, registry flush loop)

mod checkpoint;
mod recovery;

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{watch, Mutex, Notify, Semaphore};
use tokio::task::{self, JoinHandle};
use tokio::time::Duration;
use tracing::{info, warn};

use crate::config::BasaltConfig;
use crate::error::{BasaltError, Result};
use crate::file::StorageFile;
use crate::format::Checksum;
use crate::free_space::{pages_for, range_for, FreeSpaceManager, PageRange};
use crate::registry::{BlockEntry, BlockRegistry, MAX_NAME_LEN};
use crate::stats::{StatsSnapshot, StorageStats};
use crate::write_behind::{
    BatchWriter, PendingWrites, QueueCommand, WriteBehindQueue, WriteOperation, WriterShared,
};

use checkpoint::Checkpointer;

/// Block storage over a single file
///
/// ## Concurrency Model: Serialized Writers / Concurrent Readers
///
/// - **Writes** (write_block/delete_block): queue admission first (may
///   suspend on backpressure), then serialized by `write_lock` for
///   placement and visibility. The physical write happens later on the
///   batch writer task.
/// - **Reads** (read_block): never take `write_lock`. Bounded by the read
///   semaphore; served from the pending shadow or from verified file bytes.
/// - **Flushes**: serialized by `flush_lock`; run concurrently with reads
///   and with new writes (which land after the flush point).
#[derive(Debug)]
pub struct SingleFileProvider {
    config: BasaltConfig,

    /// The one storage file, shared with the background tasks
    file: Arc<StorageFile>,

    /// Page size the file was created with (authoritative over config)
    page_size: u64,

    free_space: Arc<FreeSpaceManager>,
    registry: Arc<BlockRegistry>,

    /// Read-your-writes shadow for enqueued-but-unapplied blocks
    pending: Arc<PendingWrites>,

    /// Sending half of the write-behind queue
    queue: WriteBehindQueue,

    checkpointer: Arc<Checkpointer>,
    stats: Arc<StorageStats>,

    /// Raised when file bytes changed since the last durable sync
    file_dirty: Arc<AtomicBool>,

    /// Serializes placement + visibility of writes and deletes
    write_lock: Mutex<()>,

    /// Serializes flush/close against each other
    flush_lock: Mutex<()>,

    /// Bounds concurrent blocking reads
    read_permits: Semaphore,

    /// Ties each write to its pending-shadow entry
    seq: AtomicU64,

    closed: AtomicBool,

    /// Tells the background tasks to stop without draining
    stop_tx: watch::Sender<bool>,

    /// Wakes the registry flush loop when the dirty threshold is crossed
    kick: Arc<Notify>,

    writer_task: SyncMutex<Option<JoinHandle<()>>>,
    flush_loop_task: SyncMutex<Option<JoinHandle<()>>>,
}

impl SingleFileProvider {
    /// Open or create the storage file named by the config and start the
    /// background tasks.
    ///
    /// On startup:
    /// 1. Open the file; recover header, directory, and page bitmap
    /// 2. Start the batch writer on the write-behind queue
    /// 3. Start the registry flush loop
    pub async fn open(config: BasaltConfig) -> Result<Self> {
        config.validate()?;

        // Step 1: open or recover on the blocking pool
        let cfg = config.clone();
        let opened = task::spawn_blocking(move || recovery::open_or_create(&cfg))
            .await
            .map_err(|err| BasaltError::Io(io::Error::other(err.to_string())))??;

        let page_size = opened.page_size as u64;
        let stats = Arc::new(StorageStats::default());
        let pending = Arc::new(PendingWrites::new());
        let file_dirty = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = watch::channel(false);
        let (queue, queue_rx) = WriteBehindQueue::new(config.write_queue_capacity);

        // Step 2: batch writer
        let writer = BatchWriter::new(
            queue_rx,
            stop_rx.clone(),
            WriterShared {
                file: Arc::clone(&opened.file),
                free_space: Arc::clone(&opened.free_space),
                pending: Arc::clone(&pending),
                stats: Arc::clone(&stats),
                file_dirty: Arc::clone(&file_dirty),
            },
            config.write_batch_size,
            Duration::from_millis(config.write_batch_timeout_ms),
        );
        let writer_task = tokio::spawn(writer.run());

        // Step 3: registry flush loop
        let checkpointer = Arc::new(Checkpointer {
            file: Arc::clone(&opened.file),
            free_space: Arc::clone(&opened.free_space),
            registry: Arc::clone(&opened.registry),
            stats: Arc::clone(&stats),
            file_dirty: Arc::clone(&file_dirty),
            page_size: opened.page_size,
            ckpt_lock: SyncMutex::new(()),
        });
        let kick = Arc::new(Notify::new());
        let flush_loop_task = tokio::spawn(checkpoint::registry_flush_loop(
            Arc::clone(&checkpointer),
            Arc::clone(&kick),
            stop_rx,
            config.registry_flush_interval_ms,
        ));

        info!(
            path = %opened.file.path().display(),
            blocks = opened.registry.len(),
            "storage provider ready"
        );

        Ok(Self {
            read_permits: Semaphore::new(config.read_permits),
            config,
            file: opened.file,
            page_size,
            free_space: opened.free_space,
            registry: opened.registry,
            pending,
            queue,
            checkpointer,
            stats,
            file_dirty,
            write_lock: Mutex::new(()),
            flush_lock: Mutex::new(()),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            stop_tx,
            kick,
            writer_task: SyncMutex::new(Some(writer_task)),
            flush_loop_task: SyncMutex::new(Some(flush_loop_task)),
        })
    }

    // =========================================================================
    // Block Operations
    // =========================================================================

    /// Write a named block. Returns once the write is admitted and visible
    /// to readers; the bytes reach the file asynchronously.
    ///
    /// Steps:
    /// 1. Reserve a queue slot (suspends when the queue is full)
    /// 2. Acquire the write lock and pick a placement
    /// 3. Publish the shadow, update the registry, enqueue the operation
    pub async fn write_block(&self, name: &str, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        validate_name(name)?;

        let checksum = Checksum::compute(data);
        let data = Bytes::copy_from_slice(data);
        let length = data.len() as u64;

        // Step 1: admission BEFORE the write lock, so backpressure suspends
        // here instead of while holding the lock
        let permit = self.queue.reserve().await?;

        // Step 2: placement, serialized with other writers
        let _guard = self.write_lock.lock().await;
        self.ensure_open()?;

        let previous = self.registry.get(name);
        let needed = pages_for(length, self.page_size);

        let (offset, release) = match previous {
            // Rewrite that still fits: keep the offset, shed tail pages
            // once the new bytes land
            Some(prev)
                if length > 0 && prev.length > 0 && needed <= prev.page_count(self.page_size) =>
            {
                let prev_range = range_for(prev.offset, prev.length, self.page_size);
                let tail = prev_range.count - needed;
                let release = (tail > 0).then(|| PageRange {
                    start: prev_range.start + needed,
                    count: tail,
                });
                (prev.offset, release)
            }
            // Fresh placement; the superseded range (if any) is freed only
            // after the new write applies
            _ => {
                let release = previous.and_then(|prev| prev.page_range(self.page_size));
                if length == 0 {
                    (0, release)
                } else {
                    let range = self.free_space.allocate(needed)?;
                    (range.byte_offset(self.page_size), release)
                }
            }
        };

        // Step 3: visibility, then the infallible enqueue. Shadow before
        // registry: a reader that sees the new entry must also see the
        // shadow until the bytes are durable.
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let entry = BlockEntry {
            offset,
            length,
            checksum,
        };
        if length == 0 {
            // No bytes will reach the file; the registry entry alone serves
            // reads. A release still rides the queue so pages outlive any
            // earlier queued write to them.
            self.pending.remove(name);
            self.registry.upsert(name.to_string(), entry);
            match release {
                Some(range) => permit.send(QueueCommand::Release { range }),
                None => drop(permit),
            }
        } else {
            self.pending.publish(name, seq, data.clone());
            self.registry.upsert(name.to_string(), entry);
            permit.send(QueueCommand::Write(WriteOperation {
                seq,
                name: name.to_string(),
                offset,
                data,
                release,
            }));
        }
        StorageStats::incr(&self.stats.writes_enqueued);

        if self.registry.dirty_count() >= self.config.registry_flush_threshold {
            self.kick.notify_one();
        }
        Ok(())
    }

    /// Read a named block, newest version wins.
    ///
    /// Resolution order: pending shadow, then the registry entry with the
    /// file bytes verified against the stored checksum. A failed compare
    /// gets one more resolution pass (it usually means the read raced an
    /// in-place rewrite) before the block is declared damaged.
    pub async fn read_block(&self, name: &str) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let _permit = self
            .read_permits
            .acquire()
            .await
            .map_err(|_| BasaltError::Closed)?;

        if let TryRead::Data(data) = self.try_read(name).await? {
            return Ok(data);
        }

        StorageStats::incr(&self.stats.checksum_retries);
        warn!(block = name, "checksum mismatch on read, retrying once");
        match self.try_read(name).await? {
            TryRead::Data(data) => Ok(data),
            TryRead::Mismatch { entry, computed } => Err(BasaltError::ChecksumMismatch {
                name: name.to_string(),
                stored: entry.checksum.to_hex(),
                computed: computed.to_hex(),
            }),
        }
    }

    /// Remove a named block. The registry forgets it immediately; its pages
    /// return to the free pool only after every earlier queued write to
    /// them has been applied.
    pub async fn delete_block(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        validate_name(name)?;

        let permit = self.queue.reserve().await?;
        let _guard = self.write_lock.lock().await;
        self.ensure_open()?;

        let Some(entry) = self.registry.remove(name) else {
            return Err(BasaltError::BlockNotFound(name.to_string()));
        };
        self.pending.remove(name);

        match entry.page_range(self.page_size) {
            Some(range) => permit.send(QueueCommand::Release { range }),
            None => drop(permit),
        }

        if self.registry.dirty_count() >= self.config.registry_flush_threshold {
            self.kick.notify_one();
        }
        Ok(())
    }

    /// True if a block with this name currently exists.
    pub fn contains_block(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Names of all live blocks, sorted.
    pub fn block_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Number of live blocks.
    pub fn block_count(&self) -> usize {
        self.registry.len()
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Make everything written so far durable.
    ///
    /// Steps:
    /// 1. Drain the write-behind queue up to this point
    /// 2. Checkpoint the registry if it changed
    /// 3. One durable sync, skipped when nothing touched the file
    ///
    /// Idempotent: a second flush with no writes in between does no disk
    /// I/O at all.
    pub async fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.flush_lock.lock().await;
        self.flush_inner().await
    }

    async fn flush_inner(&self) -> Result<()> {
        // Step 1: drain
        self.queue.flush().await?;

        // Step 2: checkpoint
        let ckpt = Arc::clone(&self.checkpointer);
        task::spawn_blocking(move || ckpt.write_directory())
            .await
            .map_err(|err| BasaltError::Io(io::Error::other(err.to_string())))??;

        // Step 3: sync
        if self.file_dirty.swap(false, Ordering::AcqRel) {
            let file = Arc::clone(&self.file);
            let synced = task::spawn_blocking(move || file.sync_all())
                .await
                .map_err(|err| BasaltError::Io(io::Error::other(err.to_string())))?;
            if let Err(err) = synced {
                // The sync did not happen; the next flush must try again
                self.file_dirty.store(true, Ordering::Release);
                return Err(err);
            }
            StorageStats::incr(&self.stats.syncs);
        }
        Ok(())
    }

    /// Synchronously checkpoint the registry and sync the file.
    ///
    /// For shutdown hooks and other non-async callers. Inside a runtime
    /// this parks the current worker thread, so it requires the
    /// multi-threaded flavor; async callers should prefer [`flush`].
    ///
    /// [`flush`]: SingleFileProvider::flush
    pub fn force_save(&self) -> Result<()> {
        self.ensure_open()?;
        let save = || -> Result<()> {
            self.checkpointer.write_directory()?;
            if self.file_dirty.swap(false, Ordering::AcqRel) {
                if let Err(err) = self.file.sync_all() {
                    self.file_dirty.store(true, Ordering::Release);
                    return Err(err);
                }
                StorageStats::incr(&self.stats.syncs);
            }
            Ok(())
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            task::block_in_place(save)
        } else {
            save()
        }
    }

    /// Flush everything and stop the background tasks. Further operations
    /// return [`BasaltError::Closed`]. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Step 1: final flush while the queue still accepts markers
        let flushed = {
            let _guard = self.flush_lock.lock().await;
            self.flush_inner().await
        };

        // Step 2: drain and stop the batch writer, then the flush loop
        let _ = self.queue.shutdown().await;
        let _ = self.stop_tx.send(true);

        let writer = self.writer_task.lock().take();
        if let Some(task) = writer {
            let _ = task.await;
        }
        let flush_loop = self.flush_loop_task.lock().take();
        if let Some(task) = flush_loop {
            let _ = task.await;
        }

        info!(path = %self.file.path().display(), "storage provider closed");
        flushed
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Path of the storage file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Page size the file was created with
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Pages in the page area
    pub fn total_pages(&self) -> u64 {
        self.free_space.total_pages()
    }

    /// Currently unallocated pages
    pub fn free_pages(&self) -> u64 {
        self.free_space.free_pages()
    }

    /// Operation counters since open
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Writes admitted but not yet applied to the file
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Get the configuration
    pub fn config(&self) -> &BasaltConfig {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BasaltError::Closed);
        }
        Ok(())
    }

    /// One resolution pass: shadow, then registry, then verified file read.
    async fn try_read(&self, name: &str) -> Result<TryRead> {
        if let Some(bytes) = self.pending.get(name) {
            return Ok(TryRead::Data(bytes.to_vec()));
        }

        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| BasaltError::BlockNotFound(name.to_string()))?;
        if entry.length == 0 {
            return Ok(TryRead::Data(Vec::new()));
        }

        let buf = self.read_at(entry.offset, entry.length).await?;
        let computed = Checksum::compute(&buf);
        if computed == entry.checksum {
            Ok(TryRead::Data(buf))
        } else {
            Ok(TryRead::Mismatch { entry, computed })
        }
    }

    async fn read_at(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        let file = Arc::clone(&self.file);
        task::spawn_blocking(move || {
            let mut buf = vec![0u8; length as usize];
            file.read_exact_at(&mut buf, offset)?;
            Ok(buf)
        })
        .await
        .map_err(|err| BasaltError::Io(io::Error::other(err.to_string())))?
    }
}

impl Drop for SingleFileProvider {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            // Simulated-crash path: stop the writer without draining and
            // never checkpoint, so reopening recovers the last durable
            // state. Queued writes are discarded.
            let _ = self.stop_tx.send(true);
            warn!(
                path = %self.file.path().display(),
                dropped_writes = self.pending.len(),
                "storage provider dropped without close"
            );
        }
    }
}

/// Outcome of one read resolution pass
enum TryRead {
    Data(Vec<u8>),
    Mismatch { entry: BlockEntry, computed: Checksum },
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BasaltError::InvalidArgument(
            "block name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(BasaltError::InvalidArgument(format!(
            "block name exceeds {MAX_NAME_LEN} bytes"
        )));
    }
    Ok(())
}
