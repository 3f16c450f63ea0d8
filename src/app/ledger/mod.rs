//! Deduplication ledger shared by all workers
//!
//! The ledger decides whether an observed identifier is novel. It is a
//! bounded, insertion-ordered set: once `capacity` identifiers are held, each
//! new one evicts the oldest. The history can be persisted to a flat file and
//! used to reseed the ledger on the next start.
//!
//! # Module Organization
//!
//! - [`core`] - The in-memory ledger and its atomic check-and-insert
//! - [`store`] - Line-oriented file persistence with size-based compaction
//!
//! # Examples
//!
//! ```rust
//! use listing_watch::app::ledger::Ledger;
//!
//! let ledger = Ledger::new(2);
//! assert!(ledger.check_and_insert("a"));
//! assert!(!ledger.check_and_insert("a"));
//! ledger.check_and_insert("b");
//! ledger.check_and_insert("c"); // evicts "a"
//! assert!(!ledger.contains("a"));
//! ```

pub mod core;
pub mod store;

pub use self::core::{Ledger, LedgerStats};
pub use store::{CompactionOutcome, LedgerFileStats, LedgerStore};
