//! Worker orchestration and shutdown coordination
//!
//! The dispatcher owns the shared [`Ledger`] and [`BroadcastHub`], starts one
//! supervised worker per configured query, serves the subscription endpoint,
//! and runs until cancelled. Query configuration errors are the only fatal
//! errors and are reported by [`Dispatcher::new`] before anything is
//! scheduled.
//!
//! # Architecture
//!
//! - [`config`] - Runtime settings and validation
//! - [`supervisor`] - Restart-on-panic wrapper around each worker
//! - [`signals`] - Ctrl-C / SIGTERM handling
//! - [`background`] - Status logging and ledger snapshots
//! - [`stats`] - Final run summary
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use listing_watch::app::dispatcher::{Dispatcher, DispatcherConfig};
//! use listing_watch::app::fetcher::{FetcherConfig, HttpFetcher};
//! use listing_watch::app::models::QueryConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let queries = vec![QueryConfig::new("boots", "https://example.com/api/items".parse()?)];
//! let fetcher = Arc::new(HttpFetcher::new(&FetcherConfig::default())?);
//!
//! let config = DispatcherConfig::default().with_listen_addr("0.0.0.0:3454".parse()?);
//! let dispatcher = Dispatcher::new(config, queries, fetcher, None).await?;
//! let summary = dispatcher.run_until_signal().await?;
//! println!("broadcast {} items", summary.total_broadcast());
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod config;
pub mod signals;
pub mod stats;
pub(crate) mod supervisor;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::app::fetcher::Fetcher;
use crate::app::hub::{BroadcastHub, SubscriptionServer};
use crate::app::ledger::Ledger;
use crate::app::models::QueryConfig;
use crate::app::notify::Notifier;
use crate::app::worker::{validate_query, WorkerStats};
use crate::errors::{ConfigError, Result};

pub use background::BackgroundTaskManager;
pub use config::DispatcherConfig;
pub use signals::{create_shutdown_channel, SignalHandler};
pub use stats::{DispatchSummary, WorkerReport};

use supervisor::{supervise, WorkerSpec};

/// Triggers cooperative shutdown of a running dispatcher
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Ask every worker, the accept loop and background tasks to stop
    pub fn trigger(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Runs one supervised worker per query over a shared ledger and hub
pub struct Dispatcher {
    config: DispatcherConfig,
    specs: Vec<WorkerSpec>,
    ledger: Arc<Ledger>,
    hub: Arc<BroadcastHub>,
    server: Option<SubscriptionServer>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Dispatcher {
    /// Validate the queries, seed the ledger and bind the subscription endpoint
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for invalid queries or settings, `LedgerError` if
    /// the persisted history cannot be read, and `ServerError` if the
    /// endpoint cannot be bound.
    pub async fn new(
        config: DispatcherConfig,
        queries: Vec<QueryConfig>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Result<Self> {
        config.validate()?;
        validate_queries(&queries)?;

        let ledger = match &config.ledger_store {
            Some(store) => {
                let ids = store.load().await?;
                let ledger = Ledger::with_seed(config.ledger_capacity, ids);
                info!(
                    seeded = ledger.len(),
                    path = %store.path().display(),
                    "Ledger seeded from disk"
                );
                ledger
            }
            None => Ledger::new(config.ledger_capacity),
        };
        let ledger = Arc::new(ledger);
        let hub = Arc::new(BroadcastHub::new(config.hub.clone()));

        let server = match config.listen_addr {
            Some(addr) => Some(SubscriptionServer::bind(addr, Arc::clone(&hub)).await?),
            None => None,
        };

        let specs = queries
            .into_iter()
            .map(|query| WorkerSpec {
                query: Arc::new(query),
                ledger: Arc::clone(&ledger),
                hub: Arc::clone(&hub),
                fetcher: Arc::clone(&fetcher),
                notifier: notifier.clone(),
                config: config.worker.clone(),
                stats: Arc::new(WorkerStats::new()),
            })
            .collect();

        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        Ok(Self {
            config,
            specs,
            ledger,
            hub,
            server,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    pub fn hub(&self) -> Arc<BroadcastHub> {
        Arc::clone(&self.hub)
    }

    /// Bound address of the subscription endpoint, if serving
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(SubscriptionServer::local_addr)
    }

    /// Live counters per query, in configuration order
    pub fn worker_stats(&self) -> Vec<(String, Arc<WorkerStats>)> {
        self.specs
            .iter()
            .map(|spec| (spec.query.name.clone(), Arc::clone(&spec.stats)))
            .collect()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Run until Ctrl-C, SIGTERM or a [`ShutdownHandle`] trigger
    pub async fn run_until_signal(self) -> Result<DispatchSummary> {
        let signal_task = SignalHandler::new(self.shutdown_tx.clone()).setup();
        let summary = self.run().await;
        signal_task.abort();
        summary
    }

    /// Run until a [`ShutdownHandle`] is triggered
    pub async fn run(self) -> Result<DispatchSummary> {
        let started = Instant::now();
        let mut shutdown_errors = Vec::new();

        info!(
            workers = self.specs.len(),
            ledger_capacity = self.ledger.capacity(),
            endpoint = ?self.local_addr(),
            "Dispatcher starting"
        );
        let mut shutdown_rx = self.shutdown_rx;

        let server_task = self.server.map(|server| {
            let rx = self.shutdown_tx.subscribe();
            tokio::spawn(server.run(rx))
        });

        let mut background = BackgroundTaskManager::new();
        if let Some(period) = self.config.status_log_interval {
            let workers = self
                .specs
                .iter()
                .map(|spec| (spec.query.name.clone(), Arc::clone(&spec.stats)))
                .collect();
            background.start_status_task(
                Arc::clone(&self.ledger),
                Arc::clone(&self.hub),
                workers,
                period,
                self.shutdown_tx.subscribe(),
            );
        }
        if let (Some(store), Some(period)) =
            (self.config.ledger_store.clone(), self.config.snapshot_interval)
        {
            background.start_snapshot_task(
                Arc::clone(&self.ledger),
                store,
                period,
                self.shutdown_tx.subscribe(),
            );
        }

        let supervisors: Vec<_> = self
            .specs
            .iter()
            .map(|spec| {
                tokio::spawn(supervise(
                    spec.clone(),
                    self.shutdown_tx.clone(),
                    self.shutdown_tx.subscribe(),
                    self.config.restart_delay,
                ))
            })
            .collect();

        let _ = shutdown_rx.recv().await;
        info!("Shutdown requested, stopping workers");
        // Reach receivers subscribed after an early trigger
        let _ = self.shutdown_tx.send(());

        let aborts: Vec<_> = supervisors.iter().map(|h| h.abort_handle()).collect();
        let results = match tokio::time::timeout(self.config.shutdown_timeout, join_all(supervisors)).await {
            Ok(results) => results,
            Err(_) => {
                warn!(timeout = ?self.config.shutdown_timeout, "Workers did not stop in time, aborting");
                shutdown_errors.push("workers did not stop within the shutdown timeout".to_string());
                for abort in aborts {
                    abort.abort();
                }
                Vec::new()
            }
        };
        for result in &results {
            if let Err(e) = result {
                shutdown_errors.push(format!("supervisor task failed: {}", e));
            }
        }

        if let Some(task) = server_task {
            let abort = task.abort_handle();
            if tokio::time::timeout(self.config.shutdown_timeout, task).await.is_err() {
                warn!("Subscription endpoint did not stop in time, aborting");
                abort.abort();
            }
        }
        background.shutdown_all().await;

        let persisted = match &self.config.ledger_store {
            Some(store) => match store.save(&self.ledger.snapshot()).await {
                Ok(outcome) => {
                    info!(
                        path = %store.path().display(),
                        entries = self.ledger.len(),
                        "Ledger persisted"
                    );
                    Some(outcome)
                }
                Err(e) => {
                    error!(error = %e, "Failed to persist ledger");
                    shutdown_errors.push(e.to_string());
                    None
                }
            },
            None => None,
        };

        let workers = self
            .specs
            .iter()
            .map(|spec| WorkerReport {
                query: spec.query.name.clone(),
                stats: spec.stats.snapshot(),
            })
            .collect();

        let summary = DispatchSummary {
            uptime: started.elapsed(),
            ledger: self.ledger.stats(),
            hub: self.hub.stats(),
            workers,
            persisted,
            shutdown_errors,
        };
        info!(
            uptime = ?summary.uptime,
            broadcast = summary.total_broadcast(),
            restarts = summary.total_restarts(),
            "Dispatcher stopped"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queries", &self.specs.iter().map(|s| &s.query.name).collect::<Vec<_>>())
            .field("ledger", &self.ledger.stats())
            .field("endpoint", &self.local_addr())
            .finish()
    }
}

/// Startup checks across all queries; every problem is reported at once
fn validate_queries(queries: &[QueryConfig]) -> std::result::Result<(), ConfigError> {
    if queries.is_empty() {
        return Err(ConfigError::ValidationFailed {
            errors: vec!["at least one query must be configured".to_string()],
        });
    }

    let mut errors = Vec::new();
    let mut names = HashSet::new();
    for query in queries {
        if !names.insert(query.name.as_str()) {
            errors.push(format!("duplicate query name '{}'", query.name));
        }
        match validate_query(query) {
            Ok(()) => {}
            Err(ConfigError::ValidationFailed { errors: query_errors }) => errors.extend(query_errors),
            Err(other) => errors.push(other.to_string()),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationFailed { errors })
    }
}
