//! Block Registry Module
//!
//! The in-memory directory of live blocks: name → (offset, length, checksum).
//!
//! ## Responsibilities
//! - O(1) lookup for every read and placement decision
//! - Track dirtiness so metadata persistence can be batched
//! - Serialize/parse the on-disk directory region (format described in
//!   [`crate::format`])
//!
//! Updates take effect in memory immediately; the directory region is only
//! rewritten when the dirty count passes a threshold, a periodic tick fires,
//! or a flush forces it. A crash in between loses exactly the unflushed
//! metadata updates, by contract.

mod directory;
mod entry;

pub use directory::{BlockRegistry, RegistrySnapshot};
pub use entry::BlockEntry;
pub(crate) use entry::MAX_NAME_LEN;
