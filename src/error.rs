//! Error types for basalt
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using BasaltError
pub type Result<T> = std::result::Result<T, BasaltError>;

/// Unified error type for basalt operations
#[derive(Debug, Error)]
pub enum BasaltError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Block Errors
    // -------------------------------------------------------------------------
    #[error("block not found: {0}")]
    BlockNotFound(String),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    /// Stored checksum and recomputed checksum disagree after the single
    /// re-read attempt. The block's bytes cannot be trusted.
    #[error("checksum mismatch for block '{name}': stored {stored}, computed {computed}")]
    ChecksumMismatch {
        name: String,
        stored: String,
        computed: String,
    },

    #[error("storage file corrupted: {0}")]
    Corrupted(String),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    /// Extending the file failed (disk full, permissions). Fatal for the
    /// triggering operation; never retried automatically.
    #[error("failed to extend storage file by {requested_pages} pages: {source}")]
    Capacity {
        requested_pages: u64,
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("storage provider is closed")]
    Closed,
}

impl BasaltError {
    /// True for lookup failures on names that have no live block.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BasaltError::BlockNotFound(_))
    }

    /// True for integrity failures (checksum mismatch or corrupted file
    /// structures).
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            BasaltError::ChecksumMismatch { .. } | BasaltError::Corrupted(_)
        )
    }
}
