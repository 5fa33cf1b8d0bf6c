//! Engine Selection
//!
//! One on-disk format per engine kind, chosen exactly once when the
//! database opens. The variant set is closed: every kind the configuration
//! can name has a branch here, and kinds this crate does not implement fail
//! at open instead of at first use.

use std::path::PathBuf;

use crate::config::{BasaltConfig, EngineKind};
use crate::error::{BasaltError, Result};
use crate::provider::SingleFileProvider;
use crate::stats::StatsSnapshot;

/// A running storage engine
///
/// Only the single-file engine exists in this crate; the page-based and
/// columnar kinds are reserved names in the configuration surface.
#[derive(Debug)]
pub enum StorageEngine {
    SingleFile(SingleFileProvider),
}

impl StorageEngine {
    /// Open the engine kind the config names.
    pub async fn open(config: BasaltConfig) -> Result<Self> {
        match config.engine {
            EngineKind::SingleFile => Ok(StorageEngine::SingleFile(
                SingleFileProvider::open(config).await?,
            )),
            kind @ (EngineKind::PageBased | EngineKind::Columnar) => Err(BasaltError::Config(
                format!("engine kind {kind:?} is not available in this build"),
            )),
        }
    }

    /// Open a single-file engine at `path` with default settings
    /// (convenience method).
    pub async fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(BasaltConfig::builder().path(path).build()).await
    }

    /// Write a named block. See [`SingleFileProvider::write_block`].
    pub async fn write_block(&self, name: &str, data: &[u8]) -> Result<()> {
        match self {
            StorageEngine::SingleFile(provider) => provider.write_block(name, data).await,
        }
    }

    /// Read a named block. See [`SingleFileProvider::read_block`].
    pub async fn read_block(&self, name: &str) -> Result<Vec<u8>> {
        match self {
            StorageEngine::SingleFile(provider) => provider.read_block(name).await,
        }
    }

    /// Delete a named block. See [`SingleFileProvider::delete_block`].
    pub async fn delete_block(&self, name: &str) -> Result<()> {
        match self {
            StorageEngine::SingleFile(provider) => provider.delete_block(name).await,
        }
    }

    /// True if a block with this name currently exists.
    pub fn contains_block(&self, name: &str) -> bool {
        match self {
            StorageEngine::SingleFile(provider) => provider.contains_block(name),
        }
    }

    /// Names of all live blocks, sorted.
    pub fn block_names(&self) -> Vec<String> {
        match self {
            StorageEngine::SingleFile(provider) => provider.block_names(),
        }
    }

    /// Number of live blocks.
    pub fn block_count(&self) -> usize {
        match self {
            StorageEngine::SingleFile(provider) => provider.block_count(),
        }
    }

    /// Make everything written so far durable.
    pub async fn flush(&self) -> Result<()> {
        match self {
            StorageEngine::SingleFile(provider) => provider.flush().await,
        }
    }

    /// Synchronous metadata save for non-async callers.
    pub fn force_save(&self) -> Result<()> {
        match self {
            StorageEngine::SingleFile(provider) => provider.force_save(),
        }
    }

    /// Flush and stop background tasks.
    pub async fn close(&self) -> Result<()> {
        match self {
            StorageEngine::SingleFile(provider) => provider.close().await,
        }
    }

    /// Operation counters since open.
    pub fn stats(&self) -> StatsSnapshot {
        match self {
            StorageEngine::SingleFile(provider) => provider.stats(),
        }
    }

    /// Page size of the underlying storage file.
    pub fn page_size(&self) -> u64 {
        match self {
            StorageEngine::SingleFile(provider) => provider.page_size(),
        }
    }

    /// Pages in the underlying page area.
    pub fn total_pages(&self) -> u64 {
        match self {
            StorageEngine::SingleFile(provider) => provider.total_pages(),
        }
    }
}
