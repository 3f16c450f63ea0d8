//! Data models for Listing Watch
//!
//! This module defines the core data structures shared by the workers, the
//! ledger and the broadcast hub: observed items, the immutable per-query
//! configuration, and the notification messages sent to subscribers.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::retry::RetryPolicy;
use crate::constants::{payload, worker};

/// Which item field is used as the deduplication key
///
/// Ids are stable across polls. URLs may carry volatile query strings, so
/// `Url` should only be used for upstreams that do not assign ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupKey {
    #[default]
    Id,
    Url,
}

/// How a delivered item is rendered for subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// The item URL on its own
    #[default]
    Url,
    /// A compact single-line JSON object
    Json,
}

/// JSON pointers describing where item fields live in an upstream payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadLayout {
    /// Pointer to the item array within the payload
    pub items: String,
    /// Pointer to the identifier within one item
    pub id: String,
    /// Pointer to the listing link within one item
    pub url: String,
    /// Pointer to the listing's publish time within one item
    pub published_at: Option<String>,
    /// Pointer to an image URL within one item
    pub image: Option<String>,
    /// Pointer to a title within one item
    pub title: Option<String>,
    /// Pointer to a price within one item
    pub price: Option<String>,
}

impl Default for PayloadLayout {
    fn default() -> Self {
        Self {
            items: payload::ITEMS_POINTER.to_string(),
            id: payload::ID_POINTER.to_string(),
            url: payload::URL_POINTER.to_string(),
            published_at: Some(payload::PUBLISHED_AT_POINTER.to_string()),
            image: None,
            title: None,
            price: None,
        }
    }
}

/// Immutable description of one upstream poll target
///
/// One worker owns exactly one query configuration for its lifetime.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Unique name used in logs and notifications
    pub name: String,
    /// Endpoint polled each cycle
    pub endpoint: Url,
    /// Site-specific request parameters
    pub params: BTreeMap<String, String>,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// Parameter refreshed with the current unix time every cycle
    pub timestamp_param: Option<String>,
    /// Pause between cycles
    pub poll_interval: Duration,
    /// Upper bound of random extra pause between cycles
    pub poll_jitter: Duration,
    /// Outer timeout around each fetch attempt
    pub fetch_timeout: Duration,
    /// Retry budget and backoff for each fetch
    pub retry: RetryPolicy,
    /// Pause after a cycle whose fetch exhausted its retries
    pub recovery_interval: Duration,
    /// Number of leading items considered per parse pass
    pub items_per_pass: usize,
    /// Maximum listing age for live delivery; `None` disables the filter
    pub freshness_window: Option<Duration>,
    /// Field used for deduplication
    pub dedup_key: DedupKey,
    /// Where item fields live in the payload
    pub payload: PayloadLayout,
}

impl QueryConfig {
    /// Create a query configuration with default polling behaviour
    pub fn new(name: impl Into<String>, endpoint: Url) -> Self {
        Self {
            name: name.into(),
            endpoint,
            params: BTreeMap::new(),
            headers: BTreeMap::new(),
            timestamp_param: Some(worker::TIMESTAMP_PARAM.to_string()),
            poll_interval: worker::POLL_INTERVAL,
            poll_jitter: Duration::ZERO,
            fetch_timeout: worker::FETCH_TIMEOUT,
            retry: RetryPolicy::default(),
            recovery_interval: worker::RECOVERY_INTERVAL,
            items_per_pass: worker::ITEMS_PER_PASS,
            freshness_window: Some(worker::FRESHNESS_WINDOW),
            dedup_key: DedupKey::default(),
            payload: PayloadLayout::default(),
        }
    }

    /// Set a request parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the poll interval and jitter
    pub fn with_poll_interval(mut self, interval: Duration, jitter: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_jitter = jitter;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the freshness window
    pub fn with_freshness_window(mut self, window: Option<Duration>) -> Self {
        self.freshness_window = window;
        self
    }

    /// Set the deduplication key
    pub fn with_dedup_key(mut self, key: DedupKey) -> Self {
        self.dedup_key = key;
        self
    }

    /// Request parameters for one cycle, with the timestamp parameter refreshed
    pub fn request_params(&self, now: DateTime<Utc>) -> BTreeMap<String, String> {
        let mut params = self.params.clone();
        if let Some(key) = &self.timestamp_param {
            params.insert(key.clone(), now.timestamp().to_string());
        }
        params
    }

    /// Full request URL for one cycle
    pub fn request_url(&self, now: DateTime<Utc>) -> Url {
        let mut url = self.endpoint.clone();
        let params = self.request_params(now);
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
        }
        url
    }

    /// Pause before the next cycle, jitter included
    pub fn next_poll_delay(&self) -> Duration {
        let jitter_ms = self.poll_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.poll_interval;
        }
        self.poll_interval + Duration::from_millis(fastrand::u64(0..=jitter_ms))
    }
}

/// One candidate listing observed from an upstream query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Upstream-assigned identifier
    pub id: String,
    /// Canonical link to the listing
    pub url: String,
    /// When the worker obtained the item
    pub observed_at: DateTime<Utc>,
    /// The listing's own creation time, when the payload carries one
    pub published_at: Option<DateTime<Utc>>,
    /// Opaque display fields
    pub payload: serde_json::Value,
}

impl Item {
    /// Create an item observed now, with an empty payload
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            observed_at: Utc::now(),
            published_at: None,
            payload: serde_json::Value::Null,
        }
    }

    /// Set the publish time
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Set the display payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Key this item is deduplicated by
    pub fn dedup_key(&self, key: DedupKey) -> &str {
        match key {
            DedupKey::Id => &self.id,
            DedupKey::Url => &self.url,
        }
    }

    /// Whether the item is recent enough for live delivery
    ///
    /// Items without a publish time cannot be judged and pass the filter.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let Some(published_at) = self.published_at else {
            return true;
        };
        let age = now.signed_duration_since(published_at);
        match age.to_std() {
            Ok(age) => age < window,
            // Published in the future relative to our clock
            Err(_) => true,
        }
    }

    /// Display field at a JSON pointer, rendered as text
    pub fn payload_text(&self, pointer: &str) -> Option<String> {
        match self.payload.pointer(pointer)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Object(map) => {
                // Price objects such as {"amount": "12.0", "currency_code": "EUR"}
                let amount = map.get("amount")?;
                let amount = match amount {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                match map.get("currency_code").and_then(|c| c.as_str()) {
                    Some(currency) => Some(format!("{} {}", amount, currency)),
                    None => Some(amount),
                }
            }
            _ => None,
        }
    }
}

/// Display fields pulled out of an item's payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDetails {
    pub title: Option<String>,
    pub price: Option<String>,
    pub image: Option<String>,
}

impl ItemDetails {
    /// Extract the fields `layout` points at
    pub fn extract(item: &Item, layout: &PayloadLayout) -> Self {
        let text = |pointer: &Option<String>| {
            pointer
                .as_deref()
                .and_then(|pointer| item.payload_text(pointer))
        };
        Self {
            title: text(&layout.title),
            price: text(&layout.price),
            image: text(&layout.image),
        }
    }
}

/// A novel item on its way to subscribers and notifiers
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Name of the query that produced the item
    pub query: String,
    /// The delivered item
    pub item: Item,
    /// Display fields for chat-bot delivery
    pub details: ItemDetails,
}

impl Notification {
    pub fn new(query: impl Into<String>, item: Item) -> Self {
        Self {
            query: query.into(),
            item,
            details: ItemDetails::default(),
        }
    }

    pub fn with_details(mut self, details: ItemDetails) -> Self {
        self.details = details;
        self
    }

    /// Render as a single-line subscriber message
    pub fn render(&self, format: MessageFormat) -> String {
        match format {
            MessageFormat::Url => self.item.url.clone(),
            MessageFormat::Json => serde_json::json!({
                "query": self.query,
                "id": self.item.id,
                "url": self.item.url,
                "published_at": self.item.published_at.map(|t| t.to_rfc3339()),
                "payload": self.item.payload,
            })
            .to_string(),
        }
    }
}
