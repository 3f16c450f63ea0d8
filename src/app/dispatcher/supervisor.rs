//! Worker supervision
//!
//! Each query gets a supervisor task that runs its worker on a child task.
//! A worker only returns once it observed shutdown; a panic is logged and the
//! worker is rebuilt after the restart delay, with a fresh first cycle and the
//! same counters.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use super::signals::shutdown_requested;
use crate::app::fetcher::Fetcher;
use crate::app::hub::BroadcastHub;
use crate::app::ledger::Ledger;
use crate::app::models::QueryConfig;
use crate::app::notify::Notifier;
use crate::app::worker::{MonitorWorker, WorkerConfig, WorkerStats, WorkerStatsSnapshot};
use crate::errors::WorkerError;

/// Everything needed to (re)build one query's worker
#[derive(Clone)]
pub(crate) struct WorkerSpec {
    pub query: Arc<QueryConfig>,
    pub ledger: Arc<Ledger>,
    pub hub: Arc<BroadcastHub>,
    pub fetcher: Arc<dyn Fetcher>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub config: WorkerConfig,
    pub stats: Arc<WorkerStats>,
}

impl WorkerSpec {
    fn build(&self) -> Result<MonitorWorker, crate::errors::ConfigError> {
        MonitorWorker::builder()
            .query(Arc::clone(&self.query))
            .ledger(Arc::clone(&self.ledger))
            .hub(Arc::clone(&self.hub))
            .fetcher(Arc::clone(&self.fetcher))
            .notifier(self.notifier.clone())
            .config(self.config.clone())
            .stats(Arc::clone(&self.stats))
            .build()
    }
}

/// Keep one query's worker running until shutdown
pub(crate) async fn supervise(
    spec: WorkerSpec,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    restart_delay: Duration,
) -> WorkerStatsSnapshot {
    let name = spec.query.name.clone();

    loop {
        // Subscribe before checking so a shutdown sent in between is not lost
        let worker_rx = shutdown_tx.subscribe();
        if shutdown_requested(&mut shutdown_rx) {
            break;
        }

        let worker = match spec.build() {
            Ok(worker) => worker,
            Err(e) => {
                error!(query = %name, error = %e, "Cannot build worker");
                break;
            }
        };

        let task = tokio::spawn(worker.run(worker_rx));
        let _abort_worker = AbortOnDrop(task.abort_handle());

        match task.await {
            Ok(_) => break,
            Err(join_error) if join_error.is_panic() => {
                let failure = WorkerError::Panicked {
                    query: name.clone(),
                    message: panic_message(join_error.into_panic()),
                };
                error!(query = %name, error = %failure, "Worker died, restarting in {:?}", restart_delay);
                spec.stats.record_restart();
            }
            Err(_) => {
                warn!(query = %name, error = %WorkerError::Cancelled { query: name.clone() }, "Worker task cancelled");
                break;
            }
        }

        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(restart_delay) => {
                info!(query = %name, "Restarting worker");
            }
        }
    }

    spec.stats.snapshot()
}

/// Aborts the worker task if the supervisor is cancelled while awaiting it
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
