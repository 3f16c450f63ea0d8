//! Query monitor workers
//!
//! Each configured query is owned by exactly one [`MonitorWorker`]. A worker
//! loops fetch -> parse -> dedup -> deliver -> sleep until cancelled, sharing
//! only the [`Ledger`](crate::app::ledger::Ledger) and the
//! [`BroadcastHub`](crate::app::hub::BroadcastHub) with its siblings.
//!
//! # Behaviour
//!
//! - **First-cycle suppression**: the first successful pass records every
//!   item it considers without delivering any, so a restart never replays
//!   the current backlog
//! - **Bounded pass**: only the leading `items_per_pass` items are checked
//! - **Freshness filter**: novel items older than the window are recorded
//!   silently
//! - **Non-fatal failures**: exhausted retries shorten the next sleep to the
//!   recovery interval; unusable payloads count as zero items
//!
//! # Module Organization
//!
//! - [`config`] - Delivery settings and query validation
//! - [`types`] - Worker state, cycle outcomes and counters
//! - [`core`] - The worker loop and its builder
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use listing_watch::app::fetcher::{FetcherConfig, HttpFetcher};
//! use listing_watch::app::hub::BroadcastHub;
//! use listing_watch::app::ledger::Ledger;
//! use listing_watch::app::models::QueryConfig;
//! use listing_watch::app::worker::MonitorWorker;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let query = QueryConfig::new("boots", "https://example.com/api/items".parse()?)
//!     .with_param("search_text", "boots");
//! let worker = MonitorWorker::builder()
//!     .query(Arc::new(query))
//!     .ledger(Arc::new(Ledger::default()))
//!     .hub(Arc::new(BroadcastHub::default()))
//!     .fetcher(Arc::new(HttpFetcher::new(&FetcherConfig::default())?))
//!     .build()?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
//! let stats = worker.run(shutdown_rx).await;
//! println!("cycles: {}", stats.cycles);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod types;

pub use self::core::{MonitorWorker, MonitorWorkerBuilder};
pub use config::{validate_query, WorkerConfig};
pub use types::{CycleOutcome, PassSummary, WorkerState, WorkerStats, WorkerStatsSnapshot};
