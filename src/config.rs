//! Configuration for basalt
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BasaltError, Result};

/// Main configuration for a basalt storage instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasaltConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the single storage file. Created if absent, recovered if
    /// present.
    pub path: PathBuf,

    /// Which storage engine variant to construct at open time
    pub engine: EngineKind,

    /// Page size in bytes (power of two, >= 512). Fixed at file creation;
    /// on reopen the value recorded in the file header wins.
    pub page_size: u32,

    // -------------------------------------------------------------------------
    // Free Space Configuration
    // -------------------------------------------------------------------------
    /// Minimum number of pages added by one file extension
    pub min_extension_pages: u64,

    /// Extension also adds at least `total_pages / growth_factor` pages,
    /// keeping the number of extensions logarithmic in file size
    pub growth_factor: u64,

    // -------------------------------------------------------------------------
    // Write-Behind Configuration
    // -------------------------------------------------------------------------
    /// Bounded write queue capacity; a full queue suspends producers
    pub write_queue_capacity: usize,

    /// Max operations drained into one batch
    pub write_batch_size: usize,

    /// Max time the batch writer waits to fill a batch (milliseconds)
    pub write_batch_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Read Configuration
    // -------------------------------------------------------------------------
    /// Max concurrent positioned reads against the file handle
    pub read_permits: usize,

    // -------------------------------------------------------------------------
    // Registry Configuration
    // -------------------------------------------------------------------------
    /// Dirty-entry count that triggers a registry flush between ticks
    pub registry_flush_threshold: usize,

    /// Periodic registry flush interval (milliseconds)
    pub registry_flush_interval_ms: u64,
}

/// Storage engine variant, chosen once when the database opens.
///
/// Only `SingleFile` is implemented by this crate; the page-buffer-pool and
/// columnar engines live in separate subsystems and fail construction here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// All blocks in one file: header, page area, directory region
    SingleFile,

    /// Page-buffer-pool engine with an LRU cache (not part of this crate)
    PageBased,

    /// Column-oriented engine (not part of this crate)
    Columnar,
}

impl Default for BasaltConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./basalt.db"),
            engine: EngineKind::SingleFile,
            page_size: 4096,
            min_extension_pages: 64,       // 256 KiB at the default page size
            growth_factor: 2,              // grow by at least half the file
            write_queue_capacity: 256,
            write_batch_size: 64,
            write_batch_timeout_ms: 20,
            read_permits: 16,
            registry_flush_threshold: 128,
            registry_flush_interval_ms: 500,
        }
    }
}

impl BasaltConfig {
    /// Create a new config builder
    pub fn builder() -> BasaltConfigBuilder {
        BasaltConfigBuilder::default()
    }

    /// Reject tunables the engine cannot operate with.
    ///
    /// Called once during open; a default config always passes.
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(BasaltError::Config("storage path is empty".to_string()));
        }
        if self.page_size < 512 || !self.page_size.is_power_of_two() {
            return Err(BasaltError::Config(format!(
                "page_size must be a power of two >= 512, got {}",
                self.page_size
            )));
        }
        if self.min_extension_pages == 0 {
            return Err(BasaltError::Config(
                "min_extension_pages must be at least 1".to_string(),
            ));
        }
        if self.growth_factor == 0 {
            return Err(BasaltError::Config(
                "growth_factor must be at least 1".to_string(),
            ));
        }
        if self.write_queue_capacity == 0 {
            return Err(BasaltError::Config(
                "write_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.write_batch_size == 0 {
            return Err(BasaltError::Config(
                "write_batch_size must be at least 1".to_string(),
            ));
        }
        if self.read_permits == 0 {
            return Err(BasaltError::Config(
                "read_permits must be at least 1".to_string(),
            ));
        }
        if self.registry_flush_threshold == 0 {
            return Err(BasaltError::Config(
                "registry_flush_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for BasaltConfig
#[derive(Default)]
pub struct BasaltConfigBuilder {
    config: BasaltConfig,
}

impl BasaltConfigBuilder {
    /// Set the storage file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the engine variant to construct
    pub fn engine(mut self, kind: EngineKind) -> Self {
        self.config.engine = kind;
        self
    }

    /// Set the page size in bytes (power of two, >= 512)
    pub fn page_size(mut self, bytes: u32) -> Self {
        self.config.page_size = bytes;
        self
    }

    /// Set the minimum pages added per file extension
    pub fn min_extension_pages(mut self, pages: u64) -> Self {
        self.config.min_extension_pages = pages;
        self
    }

    /// Set the exponential growth divisor
    pub fn growth_factor(mut self, factor: u64) -> Self {
        self.config.growth_factor = factor;
        self
    }

    /// Set the bounded write queue capacity
    pub fn write_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.write_queue_capacity = capacity;
        self
    }

    /// Set the max operations per write batch
    pub fn write_batch_size(mut self, size: usize) -> Self {
        self.config.write_batch_size = size;
        self
    }

    /// Set the batch fill timeout (in milliseconds)
    pub fn write_batch_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_batch_timeout_ms = ms;
        self
    }

    /// Set the max concurrent reads against the file handle
    pub fn read_permits(mut self, permits: usize) -> Self {
        self.config.read_permits = permits;
        self
    }

    /// Set the dirty-count threshold for registry flushes
    pub fn registry_flush_threshold(mut self, count: usize) -> Self {
        self.config.registry_flush_threshold = count;
        self
    }

    /// Set the periodic registry flush interval (in milliseconds)
    pub fn registry_flush_interval_ms(mut self, ms: u64) -> Self {
        self.config.registry_flush_interval_ms = ms;
        self
    }

    pub fn build(self) -> BasaltConfig {
        self.config
    }
}
