//! Write-Behind Module
//!
//! Decouples write acknowledgement from disk latency.
//!
//! ## Responsibilities
//! - Bounded admission: producers reserve a queue slot and suspend when the
//!   queue is full (backpressure instead of unbounded memory)
//! - Batch formation: drain up to `write_batch_size` operations or wait at
//!   most `write_batch_timeout_ms`, whichever comes first
//! - Sequential application: one background task stable-sorts each batch by
//!   file offset and applies it with positioned writes
//! - Read-your-writes: a pending-write shadow serves queued data until the
//!   bytes are on the file
//!
//! Semantics are at-least-once: operations already applied when a batch
//! fails are not rolled back, the failure is latched for the next flush
//! waiter, and the loop moves on to the next batch. Durability comes only
//! from an explicit flush; queued operations die with the process.

mod pending;
mod queue;
mod writer;

pub use pending::PendingWrites;
pub use queue::{QueueCommand, WriteBehindQueue, WriteOperation};
pub use writer::{BatchWriter, WriterShared};
