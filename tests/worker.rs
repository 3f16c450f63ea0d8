//! Integration tests for monitor workers and the broadcast hub
//!
//! Workers are driven one cycle at a time against scripted fetchers, with a
//! real ledger and hub behind them.

mod common;

use std::sync::Arc;

use listing_watch::app::fetcher::Fetcher;
use listing_watch::app::hub::BroadcastHub;
use listing_watch::app::ledger::Ledger;
use listing_watch::app::models::QueryConfig;
use listing_watch::app::worker::{CycleOutcome, MonitorWorker};

use common::{body, fast_query, url_for, FailingSink, FlakyFetcher, RecordingSink, ScriptedFetcher};

fn build(
    query: QueryConfig,
    fetcher: Arc<dyn Fetcher>,
    ledger: Arc<Ledger>,
    hub: Arc<BroadcastHub>,
) -> MonitorWorker {
    MonitorWorker::builder()
        .query(Arc::new(query))
        .ledger(ledger)
        .hub(hub)
        .fetcher(fetcher)
        .build()
        .unwrap()
}

fn summary(outcome: CycleOutcome) -> listing_watch::app::worker::PassSummary {
    match outcome {
        CycleOutcome::Processed(summary) => summary,
        other => panic!("expected a processed cycle, got {:?}", other),
    }
}

/// Test only items that appear after startup are delivered
///
/// Cycle one sees `a, b` and stays silent; cycle two sees `a, c` and
/// delivers `c` alone.
#[tokio::test]
async fn test_first_cycle_then_new_listing() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![body(&["a", "b"]), body(&["a", "c"])]));
    let ledger = Arc::new(Ledger::new(100));
    let hub = Arc::new(BroadcastHub::default());
    let mut subscriber = hub.subscribe();
    let mut worker = build(fast_query("boots"), fetcher, Arc::clone(&ledger), Arc::clone(&hub));

    let first = summary(worker.run_cycle().await);
    assert!(first.first_cycle);
    assert_eq!(first.suppressed, 2);
    assert!(subscriber.try_recv().is_none());

    let second = summary(worker.run_cycle().await);
    assert!(!second.first_cycle);
    assert_eq!(second.novel, 1);
    assert_eq!(second.broadcast, 1);
    assert_eq!(subscriber.recv().await, Some(url_for("c")));

    // The same page again yields nothing new
    let third = summary(worker.run_cycle().await);
    assert_eq!(third.novel, 0);
    assert!(subscriber.try_recv().is_none());
    assert_eq!(hub.stats().broadcasts, 1);
}

/// Test two workers sharing a ledger never deliver the same listing twice
#[tokio::test]
async fn test_shared_ledger_across_queries() {
    let ledger = Arc::new(Ledger::new(100));
    let hub = Arc::new(BroadcastHub::default());
    let mut subscriber = hub.subscribe();

    let script = vec![body(&[]), body(&["shared", "x"])];
    let mut first = build(
        fast_query("first"),
        Arc::new(ScriptedFetcher::new(script.clone())),
        Arc::clone(&ledger),
        Arc::clone(&hub),
    );
    let mut second = build(
        fast_query("second"),
        Arc::new(ScriptedFetcher::new(script)),
        Arc::clone(&ledger),
        Arc::clone(&hub),
    );

    first.run_cycle().await;
    second.run_cycle().await;
    let a = summary(first.run_cycle().await);
    let b = summary(second.run_cycle().await);

    assert_eq!(a.broadcast + b.broadcast, 2);
    assert_eq!(subscriber.recv().await, Some(url_for("shared")));
    assert_eq!(subscriber.recv().await, Some(url_for("x")));
    assert!(subscriber.try_recv().is_none());
}

/// Test a fetch that keeps failing ends the cycle after the attempt budget
#[tokio::test]
async fn test_retry_exhaustion() {
    let fetcher = Arc::new(FlakyFetcher::new(u32::MAX, body(&[])));
    let ledger = Arc::new(Ledger::new(100));
    let mut worker = build(
        fast_query("down"),
        fetcher.clone(),
        Arc::clone(&ledger),
        Arc::new(BroadcastHub::default()),
    );

    assert_eq!(worker.run_cycle().await, CycleOutcome::FetchExhausted);
    assert_eq!(fetcher.calls(), 3);
    assert!(ledger.is_empty());
    assert!(worker.is_first_cycle());
}

/// Test a transient failure is absorbed by the retry policy
#[tokio::test]
async fn test_success_on_second_attempt() {
    let fetcher = Arc::new(FlakyFetcher::new(1, body(&["a"])));
    let ledger = Arc::new(Ledger::new(100));
    let mut worker = build(
        fast_query("flaky"),
        fetcher.clone(),
        Arc::clone(&ledger),
        Arc::new(BroadcastHub::default()),
    );

    let pass = summary(worker.run_cycle().await);
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(pass.parsed, 1);
    assert!(ledger.contains("a"));
}

/// Test one failing subscriber does not affect the others
#[tokio::test]
async fn test_broadcast_isolation() {
    let hub = BroadcastHub::default();
    let healthy_a = Arc::new(RecordingSink::default());
    let healthy_b = Arc::new(RecordingSink::default());
    hub.attach(healthy_a.clone());
    let broken = hub.attach(Arc::new(FailingSink));
    hub.attach(healthy_b.clone());

    let report = hub.broadcast("https://market.example/items/1").await;
    assert_eq!(report.delivered, 2);
    assert_eq!(report.removed, vec![broken]);
    assert_eq!(hub.subscriber_count(), 2);

    let report = hub.broadcast("https://market.example/items/2").await;
    assert_eq!(report.delivered, 2);
    assert!(report.removed.is_empty());

    for sink in [&healthy_a, &healthy_b] {
        assert_eq!(
            sink.messages(),
            vec!["https://market.example/items/1", "https://market.example/items/2"]
        );
    }
    assert_eq!(hub.stats().failures, 1);
}

/// Test a dropped channel subscriber is removed on the next broadcast
#[tokio::test]
async fn test_dropped_subscriber_removed() {
    let hub = BroadcastHub::default();
    let kept = hub.subscribe();
    let dropped = hub.subscribe();
    drop(dropped);

    let report = hub.broadcast("hello").await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.removed.len(), 1);
    assert!(hub.unsubscribe(kept.id()));
    assert_eq!(hub.subscriber_count(), 0);
}
