//! Core application logic for Listing Watch
//!
//! This module contains the polling workers, the shared deduplication
//! ledger, the broadcast hub with its WebSocket endpoint, optional chat-bot
//! notification, and the dispatcher that ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use listing_watch::app::{BroadcastHub, HubConfig, Ledger, QueryConfig};
//! use listing_watch::app::{FetcherConfig, HttpFetcher, MonitorWorker};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let query = QueryConfig::new("boots", "https://example.com/api/items".parse()?);
//! let mut worker = MonitorWorker::builder()
//!     .query(Arc::new(query))
//!     .ledger(Arc::new(Ledger::new(2000)))
//!     .hub(Arc::new(BroadcastHub::new(HubConfig::default())))
//!     .fetcher(Arc::new(HttpFetcher::new(&FetcherConfig::default())?))
//!     .build()?;
//!
//! // One poll; the first cycle only records what is already listed
//! let outcome = worker.run_cycle().await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod fetcher;
pub mod hub;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod parser;
pub mod retry;
pub mod worker;

// Re-export main public API
pub use dispatcher::{DispatchSummary, Dispatcher, DispatcherConfig, ShutdownHandle};
pub use fetcher::{FetchRequest, Fetcher, FetcherConfig, HttpFetcher, RawPayload};
pub use hub::{BroadcastHub, HubConfig, HubStats, SubscriptionServer};
pub use ledger::{Ledger, LedgerStats, LedgerStore};
pub use models::{DedupKey, Item, ItemDetails, MessageFormat, Notification, PayloadLayout, QueryConfig};
pub use notify::{Notifier, TelegramConfig, TelegramNotifier};
pub use parser::parse_items;
pub use retry::{BackoffStrategy, RetryPolicy};
pub use worker::{CycleOutcome, MonitorWorker, WorkerConfig, WorkerStats, WorkerStatsSnapshot};
