//! Tests for Store lifecycle
//!
//! These tests verify:
//! - Boot load before `open` returns
//! - Strict vs. allow-empty boot policy
//! - Lifecycle transitions and their one-shot nature
//! - Shutdown ordering and the completion signal
//! - Ingestion queue closure stopping the store

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::unbounded;
use romdb::config::{Backend, BootPolicy};
use romdb::loader::{self, SSTableLoader};
use romdb::store::Lifecycle;
use romdb::{RomError, Store};
use tempfile::TempDir;

use crate::helpers::{replace_sstable, test_config, wait_until, write_sstable, ScriptedLoader};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store() -> (TempDir, PathBuf, Store) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!"), ("fuga", "fuga!")]);

    let store = Store::open(test_config(&path, Backend::SSTable)).unwrap();
    (temp, path, store)
}

// =============================================================================
// Boot Tests
// =============================================================================

#[test]
fn test_open_serves_initial_snapshot() {
    let (_temp, _path, store) = setup_store();

    assert_eq!(store.lifecycle(), Lifecycle::Started);
    assert_eq!(store.generation(), 1);
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(b"hoge").unwrap(), &b"hoge!"[..]);
    assert_eq!(store.get(b"fuga").unwrap(), &b"fuga!"[..]);
}

#[test]
fn test_get_missing_key_is_key_not_found() {
    let (_temp, _path, store) = setup_store();

    assert!(matches!(store.get(b"hogehoge"), Err(RomError::KeyNotFound)));
    assert!(matches!(store.get(b"HOGE"), Err(RomError::KeyNotFound)));
    assert!(matches!(store.get(b""), Err(RomError::KeyNotFound)));
}

#[test]
fn test_strict_boot_fails_without_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing.sst");

    let result = Store::open(test_config(&path, Backend::SSTable));

    assert!(matches!(result, Err(RomError::Format(_))));
}

#[test]
fn test_strict_boot_fails_on_wrong_format() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);

    let result = Store::open(test_config(&path, Backend::Json));

    assert!(matches!(result, Err(RomError::Format(_))));
}

#[test]
fn test_allow_empty_boot_then_watcher_loads() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("later.sst");

    let mut config = test_config(&path, Backend::SSTable);
    config.boot_policy = BootPolicy::AllowEmpty;
    let store = Store::open(config).unwrap();

    assert!(store.is_empty());
    assert_eq!(store.generation(), 0);
    assert!(matches!(store.get(b"hoge"), Err(RomError::KeyNotFound)));

    replace_sstable(&path, &[("hoge", "hoge!")]);

    assert!(wait_until(Duration::from_secs(5), || store.get(b"hoge").is_ok()));
    assert_eq!(store.get(b"hoge").unwrap(), &b"hoge!"[..]);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_start_moves_to_running_once() {
    let (_temp, _path, store) = setup_store();

    let _done = store.start().unwrap();
    assert_eq!(store.lifecycle(), Lifecycle::Running);

    assert!(matches!(store.start(), Err(RomError::Lifecycle(_))));
}

#[test]
fn test_shutdown_stops_both_units() {
    let (_temp, _path, store) = setup_store();
    let done = store.start().unwrap();

    assert!(!done.is_done());

    store.shutdown().unwrap();

    assert_eq!(store.lifecycle(), Lifecycle::Stopped);
    assert!(done.wait_timeout(Duration::from_millis(100)));
}

#[test]
fn test_shutdown_is_idempotent() {
    let (_temp, _path, store) = setup_store();

    store.shutdown().unwrap();
    store.shutdown().unwrap();

    assert_eq!(store.lifecycle(), Lifecycle::Stopped);
    assert!(matches!(store.start(), Err(RomError::Lifecycle(_))));
}

#[test]
fn test_shutdown_from_another_thread_releases_waiter() {
    let (_temp, _path, store) = setup_store();
    let store = Arc::new(store);
    let done = store.start().unwrap();

    let stopper = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || store.shutdown())
    };

    assert!(done.wait_timeout(Duration::from_secs(5)));
    stopper.join().unwrap().unwrap();
}

#[test]
fn test_shutdown_reports_unit_stuck_past_deadline() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);

    let mut config = test_config(&path, Backend::SSTable);
    config.shutdown_timeout_ms = 100;
    let loader = Arc::new(ScriptedLoader::slow(Duration::from_millis(1500)));
    let store = Store::open_with_loader(config, loader.clone()).unwrap();
    let done = store.start().unwrap();

    // Park the watcher inside a slow reload
    replace_sstable(&path, &[("hoge", "slow")]);
    assert!(wait_until(Duration::from_secs(5), || loader.calls() >= 2));

    assert!(matches!(store.shutdown(), Err(RomError::Shutdown(_))));
    assert_eq!(store.lifecycle(), Lifecycle::ShuttingDown);

    // Retrying while the watcher is still loading must not claim success
    assert!(matches!(store.shutdown(), Err(RomError::Shutdown(_))));
    assert!(!done.is_done());

    // Once the load returns the watcher sees its stop signal
    assert!(wait_until(Duration::from_secs(5), || store.shutdown().is_ok()));
    assert_eq!(store.lifecycle(), Lifecycle::Stopped);
    assert!(done.is_done());
    // The node was stopped first, so the slow load was never published
    assert_eq!(store.get(b"hoge").unwrap(), &b"hoge!"[..]);
}

#[test]
fn test_zero_watch_interval_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);

    let mut config = test_config(&path, Backend::SSTable);
    config.watch_interval_ms = 0;

    assert!(matches!(Store::open(config), Err(RomError::Config(_))));
}

#[test]
fn test_get_still_answers_after_shutdown() {
    let (_temp, _path, store) = setup_store();
    store.shutdown().unwrap();

    // The last snapshot stays readable; only reloads are refused
    assert_eq!(store.get(b"hoge").unwrap(), &b"hoge!"[..]);
}

#[test]
fn test_load_after_shutdown_is_rejected() {
    let (_temp, path, store) = setup_store();
    store.shutdown().unwrap();

    assert!(matches!(store.load(&path), Err(RomError::Shutdown(_))));
}

// =============================================================================
// Ingestion Queue Tests
// =============================================================================

#[test]
fn test_closing_ingest_queue_stops_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);

    let (ingest_tx, ingest_rx) = unbounded();
    let store = Store::open_with_ingest(
        test_config(&path, Backend::SSTable),
        Arc::new(SSTableLoader),
        ingest_rx,
    )
    .unwrap();
    let done = store.start().unwrap();

    drop(ingest_tx);

    assert!(done.wait_timeout(Duration::from_secs(5)));
    assert_eq!(store.lifecycle(), Lifecycle::Stopped);
    assert!(matches!(store.load(&path), Err(RomError::Shutdown(_))));

    store.shutdown().unwrap();
    assert_eq!(store.lifecycle(), Lifecycle::Stopped);
}

#[test]
fn test_ingested_path_becomes_current() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);
    let dropin = temp.path().join("dropin.sst");
    write_sstable(&dropin, &[("hoge", "ingested")]);

    let (ingest_tx, ingest_rx) = unbounded();
    let store = Store::open_with_ingest(
        test_config(&path, Backend::SSTable),
        loader::from_backend(Backend::SSTable),
        ingest_rx,
    )
    .unwrap();

    ingest_tx.send(dropin).unwrap();

    assert!(wait_until(Duration::from_secs(5), || store.generation() >= 2));
    assert_eq!(store.get(b"hoge").unwrap(), &b"ingested"[..]);
}
