//! Broadcast hub for live subscribers
//!
//! The hub owns the set of connected subscribers. Workers only ever call
//! [`BroadcastHub::broadcast`]; they never hold references to individual
//! subscribers. A broadcast takes a snapshot of the current set under the
//! lock, releases it, then delivers to every subscriber concurrently. A
//! subscriber whose delivery fails is removed, without affecting the others.
//!
//! # Module Organization
//!
//! - [`server`] - WebSocket subscription endpoint feeding the hub

pub mod server;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::constants::hub;
use crate::errors::DeliveryError;

pub use server::SubscriptionServer;

/// Unique handle of a registered subscriber
pub type SubscriberId = u64;

/// Destination for broadcast messages
#[async_trait]
pub trait SubscriberSink: Send + Sync {
    /// Deliver one single-line message
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError>;
}

/// Sink backed by a bounded channel, drained by the subscriber's connection task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SubscriberSink for ChannelSink {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        self.sender
            .send(message.to_string())
            .await
            .map_err(|_| DeliveryError::ChannelClosed)
    }
}

/// Receiving side of a channel subscription
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriberId,
    receiver: mpsc::Receiver<String>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next message, `None` once the hub dropped this subscriber
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Next message if one is already queued
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}

/// Hub tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Outbound queue size per channel subscriber
    pub channel_capacity: usize,
    /// Time a subscriber gets to accept one message before it is dropped
    #[serde(with = "humantime_serde")]
    pub delivery_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: hub::CHANNEL_CAPACITY,
            delivery_timeout: hub::DELIVERY_TIMEOUT,
        }
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that accepted the message
    pub delivered: usize,
    /// Subscribers removed because delivery failed
    pub removed: Vec<SubscriberId>,
}

/// Cumulative hub counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub subscribers: usize,
    pub broadcasts: u64,
    pub deliveries: u64,
    pub failures: u64,
}

/// Fans notifications out to every connected subscriber
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, Arc<dyn SubscriberSink>>>,
    next_id: AtomicU64,
    config: HubConfig,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    failures: AtomicU64,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
            broadcasts: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<dyn SubscriberSink>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a channel subscriber and return its receiving handle
    pub fn subscribe(&self) -> SubscriptionHandle {
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let id = self.attach(Arc::new(ChannelSink::new(sender)));
        SubscriptionHandle { id, receiver }
    }

    /// Register an arbitrary sink
    pub fn attach(&self, sink: Arc<dyn SubscriberSink>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, sink);
            subscribers.len()
        };
        debug!(subscriber = id, total = count, "Subscriber attached");
        id
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(subscriber = id, "Subscriber detached");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `message` to every current subscriber concurrently
    ///
    /// Failing or slow subscribers are removed; the rest are unaffected.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let snapshot: Vec<(SubscriberId, Arc<dyn SubscriberSink>)> = self
            .lock()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect();

        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        if snapshot.is_empty() {
            debug!("Broadcast with no subscribers");
            return BroadcastReport::default();
        }

        let timeout = self.config.delivery_timeout;
        let deliveries = snapshot.iter().map(|(id, sink)| async move {
            let result = match tokio::time::timeout(timeout, sink.deliver(message)).await {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout {
                    millis: timeout.as_millis() as u64,
                }),
            };
            (*id, result)
        });
        let results = join_all(deliveries).await;

        let mut report = BroadcastReport::default();
        for (id, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(subscriber = id, error = %e, "Delivery failed, dropping subscriber");
                    report.removed.push(id);
                }
            }
        }

        if !report.removed.is_empty() {
            let mut subscribers = self.lock();
            for id in &report.removed {
                subscribers.remove(id);
            }
        }

        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.failures
            .fetch_add(report.removed.len() as u64, Ordering::Relaxed);
        if report.delivered > 0 {
            debug!(
                delivered = report.delivered,
                dropped = report.removed.len(),
                "Broadcast {}",
                message
            );
        }
        report
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.subscriber_count(),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}
