//! # Basalt
//!
//! An embedded single-file block storage engine with:
//! - Named blocks of arbitrary bytes in one storage file
//! - Page-level space management with first-fit allocation
//! - Write-behind batching with bounded-queue backpressure
//! - Checksummed reads and crash recovery from the file header
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                            │
//! │              (engine kind chosen at open)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 SingleFileProvider                           │
//! │        (admission, placement, verified reads, flush)         │
//! └──────┬──────────────┬──────────────┬────────────────────────┘
//!        │              │              │
//!        ▼              ▼              ▼
//! ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//! │ WriteBehind │ │  Registry   │ │  FreeSpace  │
//! │ (batching)  │ │ (directory) │ │  (bitmap)   │
//! └──────┬──────┘ └──────┬──────┘ └──────┬──────┘
//!        │               │               │
//!        └───────────────▼───────────────┘
//!                ┌──────────────┐
//!                │ Storage File │
//!                │ (one file)   │
//!                └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod format;
pub mod file;
pub mod free_space;
pub mod registry;
pub mod write_behind;
pub mod provider;
pub mod stats;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{BasaltConfig, BasaltConfigBuilder, EngineKind};
pub use engine::StorageEngine;
pub use error::{BasaltError, Result};
pub use provider::SingleFileProvider;
pub use stats::StatsSnapshot;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of basalt
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
