//! Integration tests for the shared deduplication ledger
//!
//! These tests exercise the ledger the way concurrent workers use it,
//! together with its on-disk history.

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use listing_watch::app::ledger::{Ledger, LedgerStore};

/// Test check-and-insert is atomic under contention
///
/// Sixteen threads race over the same identifiers; each identifier must be
/// reported novel exactly once.
#[test]
fn test_concurrent_check_and_insert_is_atomic() {
    let ledger = Arc::new(Ledger::new(10_000));
    let ids: Arc<Vec<String>> = Arc::new((0..500).map(|i| format!("item-{}", i)).collect());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let ids = Arc::clone(&ids);
            thread::spawn(move || {
                ids.iter()
                    .filter(|id| ledger.check_and_insert(id))
                    .count()
            })
        })
        .collect();

    let novel: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(novel, 500);
    assert_eq!(ledger.len(), 500);

    let stats = ledger.stats();
    assert_eq!(stats.inserted, 500);
    assert_eq!(stats.duplicates, 500 * 15);
}

/// Test the oldest identifier is evicted at capacity
#[test]
fn test_bounded_eviction_order() {
    let ledger = Ledger::new(3);
    for id in ["a", "b", "c", "d"] {
        assert!(ledger.check_and_insert(id));
    }

    assert_eq!(ledger.len(), 3);
    assert!(!ledger.contains("a"));
    assert_eq!(ledger.snapshot(), vec!["b", "c", "d"]);

    // An evicted identifier counts as novel again
    assert!(ledger.check_and_insert("a"));
    assert!(!ledger.contains("b"));
    assert_eq!(ledger.stats().evicted, 2);
}

/// Test a saved history reseeds a new ledger in order
#[tokio::test]
async fn test_history_round_trip_through_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = LedgerStore::new(temp_dir.path().join("seen.txt"));

    let ledger = Ledger::new(10);
    for id in ["x", "y", "z"] {
        ledger.check_and_insert(id);
    }
    let outcome = store.save(&ledger.snapshot()).await.unwrap();
    assert!(!outcome.compacted);

    let reloaded = Ledger::with_seed(2, store.load().await.unwrap());
    assert_eq!(reloaded.snapshot(), vec!["y", "z"]);
    assert!(!reloaded.check_and_insert("z"));
    assert!(reloaded.check_and_insert("x"));
}

/// Test a missing history file is an empty history
#[tokio::test]
async fn test_missing_history_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = LedgerStore::new(temp_dir.path().join("absent.txt"));

    assert!(store.load().await.unwrap().is_empty());
    assert!(store.file_stats().await.unwrap().is_none());
}

/// Test saving past the threshold keeps the newer half
#[tokio::test]
async fn test_save_compacts_oversized_history() {
    let temp_dir = TempDir::new().unwrap();
    let store = LedgerStore::new(temp_dir.path().join("seen.txt")).with_compaction_threshold(100);

    let ids: Vec<String> = (0..40).map(|i| format!("listing-{:03}", i)).collect();
    let outcome = store.save(&ids).await.unwrap();

    assert!(outcome.compacted);
    assert_eq!(outcome.lines_before, 40);
    assert_eq!(outcome.lines_after, 20);
    let kept = store.load().await.unwrap();
    assert_eq!(kept.first().map(String::as_str), Some("listing-020"));
    assert_eq!(kept.last().map(String::as_str), Some("listing-039"));
}
