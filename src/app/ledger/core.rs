//! Bounded, insertion-ordered deduplication store

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::trace;

/// Ordered sequence plus membership set over the same identifiers
#[derive(Debug, Default)]
struct LedgerState {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl LedgerState {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Returns the evicted identifier, if any
    fn insert(&mut self, id: &str, capacity: usize) -> Option<String> {
        let mut evicted = None;
        if self.order.len() >= capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.members.insert(id.to_string());
        evicted
    }
}

/// Counters describing ledger activity since startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// Identifiers currently held
    pub len: usize,
    /// Maximum identifiers held
    pub capacity: usize,
    /// Novel identifiers recorded
    pub inserted: u64,
    /// Calls that found the identifier already present
    pub duplicates: u64,
    /// Identifiers dropped to make room
    pub evicted: u64,
}

/// Deduplication ledger shared by all workers
///
/// The only mutation is [`Ledger::check_and_insert`], a single critical
/// section: two concurrent calls for the same identifier can never both see
/// it as absent. When full, the oldest identifier by global insertion order
/// is evicted, regardless of which worker inserted it.
#[derive(Debug)]
pub struct Ledger {
    state: Mutex<LedgerState>,
    capacity: usize,
    inserted: AtomicU64,
    duplicates: AtomicU64,
    evicted: AtomicU64,
}

impl Ledger {
    /// Create an empty ledger holding at most `capacity` identifiers
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(LedgerState::with_capacity(capacity)),
            capacity,
            inserted: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Create a ledger seeded with previously persisted identifiers
    ///
    /// Identifiers are taken oldest-first; duplicates are skipped and only the
    /// newest `capacity` survive.
    pub fn with_seed<I, S>(capacity: usize, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ledger = Self::new(capacity);
        {
            let mut state = ledger.lock();
            for id in ids {
                let id = id.as_ref();
                if !state.members.contains(id) {
                    state.insert(id, ledger.capacity);
                }
            }
        }
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // The critical sections below cannot panic half-way through, so a
        // poisoned lock still guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `id` if unseen
    ///
    /// Returns `true` when the identifier was novel and has been recorded,
    /// evicting the oldest record at capacity. Returns `false` and leaves the
    /// ledger untouched when it was already present.
    pub fn check_and_insert(&self, id: &str) -> bool {
        let evicted = {
            let mut state = self.lock();
            if state.members.contains(id) {
                drop(state);
                self.duplicates.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            state.insert(id, self.capacity)
        };

        self.inserted.fetch_add(1, Ordering::Relaxed);
        if let Some(oldest) = evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            trace!(evicted = %oldest, "Ledger at capacity, evicted oldest id");
        }
        true
    }

    /// Whether `id` is currently recorded
    pub fn contains(&self, id: &str) -> bool {
        self.lock().members.contains(id)
    }

    /// Number of identifiers currently held
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the held identifiers, oldest first, for persistence
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            len: self.len(),
            capacity: self.capacity,
            inserted: self.inserted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(crate::constants::ledger::DEFAULT_CAPACITY)
    }
}
