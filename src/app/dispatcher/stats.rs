//! Final dispatcher statistics

use std::time::Duration;

use serde::Serialize;

use crate::app::hub::HubStats;
use crate::app::ledger::{CompactionOutcome, LedgerStats};
use crate::app::worker::WorkerStatsSnapshot;

/// Counters for one query's worker over the dispatcher's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub query: String,
    pub stats: WorkerStatsSnapshot,
}

/// Outcome of a dispatcher run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    /// Time from start to completed shutdown
    pub uptime: Duration,
    pub ledger: LedgerStats,
    pub hub: HubStats,
    /// One entry per configured query, in configuration order
    pub workers: Vec<WorkerReport>,
    /// Result of the final ledger write, when persistence is enabled and succeeded
    pub persisted: Option<CompactionOutcome>,
    /// Problems encountered while shutting down
    pub shutdown_errors: Vec<String>,
}

impl DispatchSummary {
    /// Report for the named query
    pub fn worker(&self, query: &str) -> Option<&WorkerReport> {
        self.workers.iter().find(|w| w.query == query)
    }

    /// Items broadcast across all workers
    pub fn total_broadcast(&self) -> u64 {
        self.workers.iter().map(|w| w.stats.broadcast).sum()
    }

    /// Supervised restarts across all workers
    pub fn total_restarts(&self) -> u64 {
        self.workers.iter().map(|w| w.stats.restarts).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.shutdown_errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let report = |query: &str, broadcast, restarts| WorkerReport {
            query: query.to_string(),
            stats: WorkerStatsSnapshot {
                broadcast,
                restarts,
                ..Default::default()
            },
        };
        let summary = DispatchSummary {
            uptime: Duration::from_secs(1),
            ledger: LedgerStats::default(),
            hub: HubStats::default(),
            workers: vec![report("a", 3, 0), report("b", 2, 1)],
            persisted: None,
            shutdown_errors: Vec::new(),
        };

        assert_eq!(summary.total_broadcast(), 5);
        assert_eq!(summary.total_restarts(), 1);
        assert_eq!(summary.worker("b").map(|w| w.stats.broadcast), Some(2));
        assert!(summary.worker("c").is_none());
        assert!(summary.is_clean());
    }
}
