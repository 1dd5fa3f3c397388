//! Tests for Store reloads
//!
//! These tests verify:
//! - Explicit `Store::load` switches the dataset
//! - Failed loads leave the current snapshot untouched
//! - Watcher picks up replaced files and retries broken ones
//! - Readers never see a torn value or go back to an older snapshot

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use romdb::config::Backend;
use romdb::{RomError, Store};
use tempfile::TempDir;

use crate::helpers::{
    replace_raw, replace_sstable, test_config, wait_until, write_sstable, ScriptedLoader,
};

const VALUE_LEN: usize = 4096;

/// Value for round `i`: the digit repeated, so a torn value is detectable
fn round_value(i: usize) -> String {
    std::iter::repeat(char::from(b'0' + i as u8))
        .take(VALUE_LEN)
        .collect()
}

/// Parse a round value back; panics if it is torn
fn round_of(value: &[u8]) -> usize {
    assert_eq!(value.len(), VALUE_LEN, "torn value length");
    let first = value[0];
    assert!(value.iter().all(|&b| b == first), "torn value content");
    (first - b'0') as usize
}

// =============================================================================
// Explicit Reload Tests
// =============================================================================

#[test]
fn test_explicit_load_switches_dataset() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!"), ("gone", "soon")]);
    let store = Store::open(test_config(&path, Backend::SSTable)).unwrap();

    let next = temp.path().join("next.sst");
    write_sstable(&next, &[("hoge", "hoge!!"), ("new", "here")]);
    store.load(&next).unwrap();

    assert_eq!(store.generation(), 2);
    assert_eq!(store.get(b"hoge").unwrap(), &b"hoge!!"[..]);
    assert_eq!(store.get(b"new").unwrap(), &b"here"[..]);
    // Nothing from the previous snapshot leaks through
    assert!(matches!(store.get(b"gone"), Err(RomError::KeyNotFound)));
}

#[test]
fn test_failed_load_keeps_current_snapshot() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);
    let store = Store::open(test_config(&path, Backend::SSTable)).unwrap();

    let cases = [
        (temp.path().join("data.sst.hoge"), None),
        (temp.path().join("data.json"), Some(r#"{"hoge": "json"}"#)),
        (temp.path().join("garbage.sst"), Some("not an sstable at all, just text")),
    ];

    for (bad, contents) in cases {
        if let Some(contents) = contents {
            std::fs::write(&bad, contents).unwrap();
        }
        let result = store.load(&bad);
        assert!(matches!(result, Err(RomError::Format(_))), "{:?}", bad);
        assert_eq!(store.get(b"hoge").unwrap(), &b"hoge!"[..]);
        assert_eq!(store.generation(), 1);
    }
}

#[test]
fn test_ten_replacements_with_concurrent_reader() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", round_value(0).as_str())]);
    let store = Arc::new(Store::open(test_config(&path, Backend::SSTable)).unwrap());

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let store = Arc::clone(&store);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut last = 0;
            let mut reads = 0u64;
            while !stop.load(Ordering::SeqCst) {
                let value = store.get(b"hoge").expect("reader saw an error");
                let round = round_of(&value);
                assert!(round >= last, "went back from round {} to {}", last, round);
                last = round;
                reads += 1;
            }
            reads
        })
    };

    let dropin = temp.path().join("dropin.sst");
    for i in 0..10 {
        replace_sstable(&dropin, &[("hoge", round_value(i).as_str())]);
        store.load(&dropin).unwrap();
    }

    stop.store(true, Ordering::SeqCst);
    let reads = reader.join().unwrap();
    assert!(reads > 0);

    assert_eq!(round_of(&store.get(b"hoge").unwrap()), 9);
    assert_eq!(store.generation(), 11);
}

#[test]
fn test_many_readers_never_see_superseded_snapshot() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", round_value(1).as_str())]);
    let store = Arc::new(Store::open(test_config(&path, Backend::SSTable)).unwrap());

    let next = temp.path().join("next.sst");
    write_sstable(&next, &[("hoge", round_value(2).as_str())]);
    store.load(&next).unwrap();

    // Publish has completed: every later read anywhere sees round 2
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..1000 {
                    assert_eq!(round_of(&store.get(b"hoge").unwrap()), 2);
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }
}

// =============================================================================
// Watcher Tests
// =============================================================================

#[test]
fn test_watcher_reloads_replaced_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);
    let store = Store::open(test_config(&path, Backend::SSTable)).unwrap();

    replace_sstable(&path, &[("hoge", "reloaded")]);

    assert!(wait_until(Duration::from_secs(5), || store.generation() >= 2));
    assert_eq!(store.get(b"hoge").unwrap(), &b"reloaded"[..]);
}

#[test]
fn test_watcher_ignores_unchanged_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);
    let store = Store::open(test_config(&path, Backend::SSTable)).unwrap();

    thread::sleep(Duration::from_millis(200));

    assert_eq!(store.generation(), 1);
}

#[test]
fn test_watcher_retries_until_file_is_fixed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);
    let store = Store::open(test_config(&path, Backend::SSTable)).unwrap();

    replace_raw(&path, b"half-written garbage");
    thread::sleep(Duration::from_millis(200));

    // Broken file never displaces the good snapshot
    assert_eq!(store.generation(), 1);
    assert_eq!(store.get(b"hoge").unwrap(), &b"hoge!"[..]);

    replace_sstable(&path, &[("hoge", "fixed")]);

    assert!(wait_until(Duration::from_secs(5), || store.generation() >= 2));
    assert_eq!(store.get(b"hoge").unwrap(), &b"fixed"[..]);
}

#[test]
fn test_watcher_retries_same_change_after_failed_reloads() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);

    let loader = Arc::new(ScriptedLoader::failing(3));
    let store = Store::open_with_loader(test_config(&path, Backend::SSTable), loader.clone()).unwrap();

    // One change, never touched again: only a retry of it can succeed
    replace_sstable(&path, &[("hoge", "changed")]);

    assert!(wait_until(Duration::from_secs(5), || store.generation() >= 2));
    assert_eq!(store.get(b"hoge").unwrap(), &b"changed"[..]);
    // boot + three failures + the success
    assert!(loader.calls() >= 5);

    thread::sleep(Duration::from_millis(100));
    assert_eq!(store.generation(), 2);
}

#[test]
fn test_watcher_survives_file_removal() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.sst");
    write_sstable(&path, &[("hoge", "hoge!")]);
    let store = Store::open(test_config(&path, Backend::SSTable)).unwrap();

    std::fs::remove_file(&path).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(store.get(b"hoge").unwrap(), &b"hoge!"[..]);

    replace_sstable(&path, &[("hoge", "back")]);

    assert!(wait_until(Duration::from_secs(5), || store.generation() >= 2));
    assert_eq!(store.get(b"hoge").unwrap(), &b"back"[..]);
}
