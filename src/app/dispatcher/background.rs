//! Background task management for the dispatcher
//!
//! Periodic status logging and ledger snapshots. Every task runs a
//! `select!` over its interval and the shutdown channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app::hub::BroadcastHub;
use crate::app::ledger::{Ledger, LedgerStore};
use crate::app::worker::WorkerStats;
use crate::constants::dispatcher;

/// Background task manager for status and persistence tasks
pub struct BackgroundTaskManager {
    tasks: Vec<JoinHandle<()>>,
}

impl BackgroundTaskManager {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Start periodic status logging
    pub fn start_status_task(
        &mut self,
        ledger: Arc<Ledger>,
        hub: Arc<BroadcastHub>,
        workers: Vec<(String, Arc<WorkerStats>)>,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let ledger_stats = ledger.stats();
                        let hub_stats = hub.stats();
                        info!(
                            ledger_len = ledger_stats.len,
                            ledger_capacity = ledger_stats.capacity,
                            evicted = ledger_stats.evicted,
                            subscribers = hub_stats.subscribers,
                            broadcasts = hub_stats.broadcasts,
                            "Status"
                        );
                        for (name, stats) in &workers {
                            let snapshot = stats.snapshot();
                            info!(
                                query = %name,
                                state = %stats.state(),
                                cycles = snapshot.cycles,
                                novel = snapshot.novel,
                                broadcast = snapshot.broadcast,
                                exhausted = snapshot.fetch_exhausted,
                                restarts = snapshot.restarts,
                                "Worker status"
                            );
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Status task received shutdown signal");
                        break;
                    }
                }
            }
        });

        self.tasks.push(task);
    }

    /// Start periodic ledger snapshots
    pub fn start_snapshot_task(
        &mut self,
        ledger: Arc<Ledger>,
        store: LedgerStore,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let ids = ledger.snapshot();
                        match store.save(&ids).await {
                            Ok(outcome) => debug!(
                                path = %store.path().display(),
                                ids = ids.len(),
                                compacted = outcome.compacted,
                                "Ledger snapshot written"
                            ),
                            Err(e) => warn!(error = %e, "Ledger snapshot failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Snapshot task received shutdown signal");
                        break;
                    }
                }
            }
        });

        self.tasks.push(task);
    }

    /// Shutdown all background tasks with timeout
    pub async fn shutdown_all(self) {
        debug!("Initiating background task shutdown");

        for task in self.tasks {
            if tokio::time::timeout(dispatcher::TASK_SHUTDOWN_TIMEOUT, task)
                .await
                .is_err()
            {
                warn!(
                    "Background task shutdown timed out after {:?}",
                    dispatcher::TASK_SHUTDOWN_TIMEOUT
                );
            }
        }

        debug!("All background tasks shutdown complete");
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

impl Default for BackgroundTaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_task_manager_creation() {
        let manager = BackgroundTaskManager::new();
        assert_eq!(manager.task_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_task_persists_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let store = LedgerStore::new(temp_dir.path().join("seen.txt"));
        let ledger = Arc::new(Ledger::new(10));
        ledger.check_and_insert("a");
        ledger.check_and_insert("b");

        let (tx, _) = broadcast::channel(1);
        let mut manager = BackgroundTaskManager::new();
        manager.start_snapshot_task(
            Arc::clone(&ledger),
            store.clone(),
            Duration::from_millis(20),
            tx.subscribe(),
        );

        let mut loaded = Vec::new();
        for _ in 0..100 {
            loaded = store.load().await.unwrap();
            if !loaded.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(loaded, vec!["a".to_string(), "b".to_string()]);

        let _ = tx.send(());
        manager.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_graceful_shutdown() {
        let ledger = Arc::new(Ledger::new(10));
        let hub = Arc::new(BroadcastHub::default());
        let workers = vec![("q".to_string(), Arc::new(WorkerStats::new()))];
        let (tx, _) = broadcast::channel(1);

        let mut manager = BackgroundTaskManager::new();
        manager.start_status_task(
            ledger,
            hub,
            workers,
            Duration::from_millis(10),
            tx.subscribe(),
        );
        assert_eq!(manager.task_count(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = tx.send(());

        let shutdown_start = std::time::Instant::now();
        manager.shutdown_all().await;
        assert!(shutdown_start.elapsed() < dispatcher::TASK_SHUTDOWN_TIMEOUT);
    }
}
