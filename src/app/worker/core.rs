//! Core monitor worker implementation
//!
//! A [`MonitorWorker`] owns one query configuration and loops
//! fetch -> parse -> dedup -> deliver -> sleep until cancelled. Every failure
//! inside a cycle is absorbed here: exhausted fetches shorten the next sleep
//! to the recovery interval, unusable payloads count as zero items.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use super::config::{validate_query, WorkerConfig};
use super::types::{CycleOutcome, PassSummary, WorkerState, WorkerStats, WorkerStatsSnapshot};
use crate::app::fetcher::{FetchRequest, Fetcher, RawPayload};
use crate::app::hub::BroadcastHub;
use crate::app::ledger::Ledger;
use crate::app::models::{Item, ItemDetails, Notification, QueryConfig};
use crate::app::notify::{self, Notifier};
use crate::app::parser::parse_items;
use crate::errors::{ConfigError, ConfigResult, FetchError, FetchExhausted};

/// Polls one query and delivers novel items
pub struct MonitorWorker {
    /// Query this worker owns
    query: Arc<QueryConfig>,
    /// Shared deduplication ledger
    ledger: Arc<Ledger>,
    /// Shared broadcast hub
    hub: Arc<BroadcastHub>,
    /// Upstream fetcher
    fetcher: Arc<dyn Fetcher>,
    /// Optional chat-bot notifier
    notifier: Option<Arc<dyn Notifier>>,
    /// Delivery settings
    config: WorkerConfig,
    /// Counters shared with the supervisor
    stats: Arc<WorkerStats>,
    /// True until the first successful parse pass
    first_cycle: bool,
}

impl MonitorWorker {
    /// Start a builder
    pub fn builder() -> MonitorWorkerBuilder {
        MonitorWorkerBuilder::new()
    }

    pub fn query(&self) -> &QueryConfig {
        &self.query
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> WorkerState {
        self.stats.state()
    }

    /// Whether the next successful pass will be suppressed
    pub fn is_first_cycle(&self) -> bool {
        self.first_cycle
    }

    fn set_state(&self, state: WorkerState) {
        trace!(query = %self.query.name, %state, "Worker state change");
        self.stats.set_state(state);
    }

    /// Run the poll loop until shutdown is signalled
    ///
    /// Cancellation is observed between cycles and while sleeping; a cycle
    /// interrupted mid-fetch is simply dropped. Ledger updates are atomic, so
    /// no partial state is left behind.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> WorkerStatsSnapshot {
        info!(query = %self.query.name, endpoint = %self.query.endpoint, "Worker starting");

        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                outcome = self.run_cycle() => outcome,
            };

            let pause = match outcome {
                CycleOutcome::FetchExhausted => self.query.recovery_interval,
                _ => self.query.next_poll_delay(),
            };

            self.set_state(WorkerState::Sleeping);
            if pause.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        self.set_state(WorkerState::Aborted);
        info!(query = %self.query.name, "Worker stopped");
        self.stats.snapshot()
    }

    /// Execute one fetch/parse/deliver cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.stats.record_cycle();

        self.set_state(WorkerState::Fetching);
        let raw = match self.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    query = %self.query.name,
                    attempts = e.attempts,
                    error = %e.last_error,
                    "No data this cycle"
                );
                self.stats.record_fetch_exhausted();
                return CycleOutcome::FetchExhausted;
            }
        };

        self.set_state(WorkerState::Parsing);
        let items = match parse_items(&raw, &self.query.payload, Utc::now()) {
            Ok(items) => items,
            Err(e) => {
                warn!(query = %self.query.name, error = %e, "Unusable payload, treating as empty");
                self.stats.record_parse_failure();
                return CycleOutcome::ParseFailed;
            }
        };

        self.set_state(WorkerState::Delivering);
        let summary = self.deliver(items).await;
        self.first_cycle = false;
        self.stats.record_pass(&summary);

        debug!(
            query = %self.query.name,
            parsed = summary.parsed,
            novel = summary.novel,
            broadcast = summary.broadcast,
            stale = summary.stale,
            "Cycle complete"
        );
        CycleOutcome::Processed(summary)
    }

    /// Fetch through the retry policy with a fresh request and an outer timeout per attempt
    async fn fetch(&self) -> Result<RawPayload, FetchExhausted> {
        let request = FetchRequest::for_query(&self.query, Utc::now());
        let request = &request;
        let fetcher: &dyn Fetcher = self.fetcher.as_ref();
        let timeout = self.query.fetch_timeout;

        self.query
            .retry
            .call(&self.query.name, move |attempt| async move {
                trace!(query = %request.query, attempt, url = %request.url, "Fetching");
                match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        millis: timeout.as_millis() as u64,
                    }),
                }
            })
            .await
    }

    /// Check the leading items against the ledger and deliver the novel ones
    async fn deliver(&self, items: Vec<Item>) -> PassSummary {
        let mut summary = PassSummary {
            parsed: items.len(),
            first_cycle: self.first_cycle,
            ..Default::default()
        };
        let now = Utc::now();

        for item in items.into_iter().take(self.query.items_per_pass) {
            summary.considered += 1;

            if !self
                .ledger
                .check_and_insert(item.dedup_key(self.query.dedup_key))
            {
                continue;
            }
            summary.novel += 1;

            if self.first_cycle {
                summary.suppressed += 1;
                continue;
            }

            if let Some(window) = self.query.freshness_window {
                if !item.is_fresh(now, window) {
                    debug!(query = %self.query.name, id = %item.id, "Skipping stale item");
                    summary.stale += 1;
                    continue;
                }
            }

            let details = ItemDetails::extract(&item, &self.query.payload);
            let notification = Notification::new(self.query.name.as_str(), item).with_details(details);
            let message = notification.render(self.config.message_format);
            let report = self.hub.broadcast(&message).await;
            summary.broadcast += 1;
            summary.deliveries += report.delivered;

            info!(
                query = %self.query.name,
                id = %notification.item.id,
                url = %notification.item.url,
                subscribers = report.delivered,
                "New item"
            );

            if let Some(notifier) = &self.notifier {
                notify::dispatch(Arc::clone(notifier), notification, self.config.notify_timeout);
                summary.notified += 1;
            }
        }

        if summary.first_cycle && summary.suppressed > 0 {
            info!(
                query = %self.query.name,
                recorded = summary.suppressed,
                "First pass recorded without delivery"
            );
        }
        summary
    }
}

impl std::fmt::Debug for MonitorWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorWorker")
            .field("query", &self.query.name)
            .field("fetcher", &self.fetcher.name())
            .field("first_cycle", &self.first_cycle)
            .field("state", &self.stats.state())
            .finish()
    }
}

/// Builder for creating monitor workers
#[derive(Default)]
pub struct MonitorWorkerBuilder {
    query: Option<Arc<QueryConfig>>,
    ledger: Option<Arc<Ledger>>,
    hub: Option<Arc<BroadcastHub>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    notifier: Option<Arc<dyn Notifier>>,
    config: WorkerConfig,
    stats: Option<Arc<WorkerStats>>,
}

impl MonitorWorkerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query this worker owns
    pub fn query(mut self, query: Arc<QueryConfig>) -> Self {
        self.query = Some(query);
        self
    }

    /// Set the shared ledger
    pub fn ledger(mut self, ledger: Arc<Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the shared hub
    pub fn hub(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Set the fetcher
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set an optional chat-bot notifier
    pub fn notifier(mut self, notifier: Option<Arc<dyn Notifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set delivery settings
    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Reuse existing counters (kept across supervised restarts)
    pub fn stats(mut self, stats: Arc<WorkerStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Build the worker (validates all required fields are set)
    pub fn build(self) -> ConfigResult<MonitorWorker> {
        let query = self.query.ok_or_else(|| missing("query"))?;
        let ledger = self.ledger.ok_or_else(|| missing("ledger"))?;
        let hub = self.hub.ok_or_else(|| missing("hub"))?;
        let fetcher = self.fetcher.ok_or_else(|| missing("fetcher"))?;

        validate_query(&query)?;
        self.config.validate()?;

        let stats = self.stats.unwrap_or_default();
        stats.set_state(WorkerState::Idle);

        Ok(MonitorWorker {
            query,
            ledger,
            hub,
            fetcher,
            notifier: self.notifier,
            config: self.config,
            stats,
            first_cycle: true,
        })
    }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingField {
        field: format!("worker.{}", field),
    }
}
