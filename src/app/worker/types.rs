//! Worker state, cycle outcomes and statistics

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

/// Position of a worker in its poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Idle,
    Fetching,
    Parsing,
    Delivering,
    Sleeping,
    /// Stopped by cancellation; terminal
    Aborted,
}

impl WorkerState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Fetching => 1,
            Self::Parsing => 2,
            Self::Delivering => 3,
            Self::Sleeping => 4,
            Self::Aborted => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fetching,
            2 => Self::Parsing,
            3 => Self::Delivering,
            4 => Self::Sleeping,
            5 => Self::Aborted,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Delivering => "delivering",
            Self::Sleeping => "sleeping",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// What happened during one parse pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Items parsed from the payload
    pub parsed: usize,
    /// Leading items checked against the ledger
    pub considered: usize,
    /// Items the ledger had not seen
    pub novel: usize,
    /// Novel items recorded silently because this was the first pass
    pub suppressed: usize,
    /// Novel items recorded silently because they were too old
    pub stale: usize,
    /// Items handed to the hub
    pub broadcast: usize,
    /// Subscriber deliveries across all broadcasts
    pub deliveries: usize,
    /// Items handed to the chat-bot notifier
    pub notified: usize,
    /// Whether this was the worker's first successful pass
    pub first_cycle: bool,
}

/// Result of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Retry budget spent, no data this cycle
    FetchExhausted,
    /// Payload unusable, treated as zero items
    ParseFailed,
    /// Items parsed and delivered
    Processed(PassSummary),
}

/// Point-in-time copy of a worker's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub cycles: u64,
    pub fetch_exhausted: u64,
    pub parse_failures: u64,
    pub items_considered: u64,
    pub novel: u64,
    pub suppressed: u64,
    pub stale: u64,
    pub broadcast: u64,
    pub notified: u64,
    pub restarts: u64,
    pub state: Option<WorkerState>,
}

/// Counters shared between a worker, its supervisor and status logging
#[derive(Debug, Default)]
pub struct WorkerStats {
    cycles: AtomicU64,
    fetch_exhausted: AtomicU64,
    parse_failures: AtomicU64,
    items_considered: AtomicU64,
    novel: AtomicU64,
    suppressed: AtomicU64,
    stale: AtomicU64,
    broadcast: AtomicU64,
    notified: AtomicU64,
    restarts: AtomicU64,
    state: AtomicU8,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_exhausted(&self) {
        self.fetch_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self, summary: &PassSummary) {
        self.items_considered
            .fetch_add(summary.considered as u64, Ordering::Relaxed);
        self.novel.fetch_add(summary.novel as u64, Ordering::Relaxed);
        self.suppressed
            .fetch_add(summary.suppressed as u64, Ordering::Relaxed);
        self.stale.fetch_add(summary.stale as u64, Ordering::Relaxed);
        self.broadcast
            .fetch_add(summary.broadcast as u64, Ordering::Relaxed);
        self.notified
            .fetch_add(summary.notified as u64, Ordering::Relaxed);
    }

    pub fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Relaxed);
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            fetch_exhausted: self.fetch_exhausted.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            items_considered: self.items_considered.load(Ordering::Relaxed),
            novel: self.novel.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            broadcast: self.broadcast.load(Ordering::Relaxed),
            notified: self.notified.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            state: Some(self.state()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_atomic() {
        let stats = WorkerStats::new();
        assert_eq!(stats.state(), WorkerState::Idle);
        for state in [
            WorkerState::Fetching,
            WorkerState::Parsing,
            WorkerState::Delivering,
            WorkerState::Sleeping,
            WorkerState::Aborted,
        ] {
            stats.set_state(state);
            assert_eq!(stats.state(), state);
        }
    }

    #[test]
    fn test_record_pass_accumulates() {
        let stats = WorkerStats::new();
        let summary = PassSummary {
            considered: 5,
            novel: 2,
            stale: 1,
            broadcast: 1,
            ..Default::default()
        };
        stats.record_pass(&summary);
        stats.record_pass(&summary);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.items_considered, 10);
        assert_eq!(snapshot.novel, 4);
        assert_eq!(snapshot.stale, 2);
        assert_eq!(snapshot.broadcast, 2);
    }
}
