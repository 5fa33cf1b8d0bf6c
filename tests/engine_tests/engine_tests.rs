//! Tests for engine selection
//!
//! These tests verify:
//! - The configured kind decides which engine open constructs
//! - Kinds this crate does not implement fail at open, not at first use
//! - Engine calls reach the provider underneath
//! - The path-only constructor applies default settings

use basalt::{BasaltConfig, BasaltError, EngineKind, StorageEngine};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(temp_dir: &TempDir) -> BasaltConfig {
    BasaltConfig::builder()
        .path(temp_dir.path().join("engine.db"))
        .write_batch_timeout_ms(5)
        .registry_flush_interval_ms(600_000)
        .build()
}

// =============================================================================
// Engine Selection Tests
// =============================================================================

#[tokio::test]
async fn test_single_file_engine_round_trip() {
    let temp_dir = TempDir::new().unwrap();

    let engine = StorageEngine::open(test_config(&temp_dir)).await.unwrap();
    engine.write_block("greeting", b"hello, disk").await.unwrap();
    engine.flush().await.unwrap();
    engine.close().await.unwrap();

    let reopened = StorageEngine::open(test_config(&temp_dir)).await.unwrap();
    assert_eq!(reopened.read_block("greeting").await.unwrap(), b"hello, disk");
}

#[tokio::test]
async fn test_unimplemented_kinds_fail_at_open() {
    for kind in [EngineKind::PageBased, EngineKind::Columnar] {
        let temp_dir = TempDir::new().unwrap();
        let config = BasaltConfig::builder()
            .path(temp_dir.path().join("engine.db"))
            .engine(kind)
            .build();

        let err = StorageEngine::open(config).await.unwrap_err();
        assert!(matches!(err, BasaltError::Config(_)));
        assert!(err.to_string().contains("not available"));
        // Constructing the engine must not have created the file
        assert!(!temp_dir.path().join("engine.db").exists());
    }
}

#[tokio::test]
async fn test_open_path_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();

    let engine = StorageEngine::open_path(temp_dir.path().join("plain.db"))
        .await
        .unwrap();
    engine.write_block("k", b"v").await.unwrap();
    assert_eq!(engine.read_block("k").await.unwrap(), b"v");
    engine.close().await.unwrap();
}

// =============================================================================
// Delegation Tests
// =============================================================================

#[tokio::test]
async fn test_engine_delegates_to_provider() {
    let temp_dir = TempDir::new().unwrap();
    let engine = StorageEngine::open(test_config(&temp_dir)).await.unwrap();

    engine.write_block("beta", b"2").await.unwrap();
    engine.write_block("alpha", b"1").await.unwrap();
    engine.write_block("gamma", b"3").await.unwrap();

    assert!(engine.contains_block("alpha"));
    assert_eq!(engine.block_names(), vec!["alpha", "beta", "gamma"]);
    assert_eq!(engine.block_count(), 3);
    assert_eq!(engine.page_size(), 4096);
    assert!(engine.total_pages() >= 3);

    engine.delete_block("beta").await.unwrap();
    engine.flush().await.unwrap();

    let stats = engine.stats();
    assert_eq!(stats.writes_enqueued, 3);
    assert_eq!(stats.writes_applied, 3);
    assert_eq!(stats.syncs, 1);

    engine.close().await.unwrap();

    let reopened = StorageEngine::open(test_config(&temp_dir)).await.unwrap();
    assert_eq!(reopened.block_names(), vec!["alpha", "gamma"]);
    assert_eq!(reopened.read_block("alpha").await.unwrap(), b"1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_force_save_through_engine() {
    let temp_dir = TempDir::new().unwrap();
    let engine = StorageEngine::open(test_config(&temp_dir)).await.unwrap();

    engine.write_block("saved", b"payload").await.unwrap();
    engine.flush().await.unwrap();
    engine.force_save().unwrap();

    // Nothing new to save, so the forced save was a no-op
    assert_eq!(engine.stats().registry_flushes, 1);
    engine.close().await.unwrap();
}
