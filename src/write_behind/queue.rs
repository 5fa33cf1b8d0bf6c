//! Bounded write queue
//!
//! A tokio mpsc channel carrying write, release, flush, and shutdown
//! commands to the batch writer. Capacity is the admission-control knob: a
//! full channel suspends `reserve` callers until the writer drains.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::{BasaltError, Result};
use crate::free_space::PageRange;

/// One queued block write, applied by the batch writer
#[derive(Debug)]
pub struct WriteOperation {
    /// Submission sequence; ties this op to its pending-shadow entry
    pub seq: u64,
    pub name: String,
    /// Byte offset of the first page; 0 for zero-length blocks
    pub offset: u64,
    pub data: Bytes,
    /// Superseded page range of a rewrite, freed only after this op applies
    pub release: Option<PageRange>,
}

/// Commands flowing through the queue, in strict submission order
#[derive(Debug)]
pub enum QueueCommand {
    /// Apply a block's bytes
    Write(WriteOperation),
    /// Return pages to the allocator once every earlier queued write to
    /// them has been applied (the delete path)
    Release { range: PageRange },
    /// Batch boundary: everything enqueued before this marker is applied,
    /// then the latched batch error (if any) is delivered to the sender
    Flush(oneshot::Sender<Result<()>>),
    /// Drain best-effort and exit the writer loop
    Shutdown(oneshot::Sender<()>),
}

impl QueueCommand {
    /// Batch sort key. Writes order by file offset (stable sort keeps equal
    /// offsets in submission order); releases sort last so pages are never
    /// handed back while the batch still writes to them.
    pub(crate) fn sort_offset(&self) -> u64 {
        match self {
            QueueCommand::Write(op) => op.offset,
            _ => u64::MAX,
        }
    }
}

/// Sending half of the write-behind queue
#[derive(Debug)]
pub struct WriteBehindQueue {
    tx: mpsc::Sender<QueueCommand>,
}

impl WriteBehindQueue {
    /// Create the queue. The caller hands the receiver to a [`BatchWriter`];
    /// a queue with no running writer accepts exactly `capacity` commands
    /// and then suspends producers.
    ///
    /// [`BatchWriter`]: crate::write_behind::BatchWriter
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueueCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Reserve a queue slot, suspending while the queue is full. The permit
    /// makes publication infallible, so callers can update visible state
    /// (registry, shadow) between admission and send without a failure path
    /// in between.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, QueueCommand>> {
        self.tx.reserve().await.map_err(|_| BasaltError::Closed)
    }

    /// Enqueue a flush marker and wait for the writer to reach it. The
    /// reply carries the first batch error latched since the previous
    /// marker, if any.
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(QueueCommand::Flush(reply_tx))
            .await
            .map_err(|_| BasaltError::Closed)?;
        reply_rx.await.map_err(|_| BasaltError::Closed)?
    }

    /// Ask the writer to drain and exit. Used by close; dropping the queue
    /// without this is the simulated-crash path.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(QueueCommand::Shutdown(reply_tx))
            .await
            .map_err(|_| BasaltError::Closed)?;
        reply_rx.await.map_err(|_| BasaltError::Closed)
    }
}
