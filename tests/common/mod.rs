//! Shared fixtures for integration tests
//!
//! Scripted fetchers stand in for the marketplace so tests control exactly
//! which listings each cycle sees.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use listing_watch::app::fetcher::{FetchRequest, Fetcher, RawPayload};
use listing_watch::app::hub::SubscriberSink;
use listing_watch::app::models::QueryConfig;
use listing_watch::app::retry::RetryPolicy;
use listing_watch::errors::{DeliveryError, FetchError, FetchResult};

/// Payload with one `{id, url}` object per id, in order
pub fn body(ids: &[&str]) -> String {
    let items: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({ "id": id, "url": url_for(id) }))
        .collect();
    serde_json::json!({ "items": items }).to_string()
}

/// Listing URL the fixtures use for `id`
pub fn url_for(id: &str) -> String {
    format!("https://market.example/items/{}", id)
}

/// Fast-polling query with immediate retries and no freshness filter
pub fn fast_query(name: &str) -> QueryConfig {
    QueryConfig::new(name, Url::parse("https://market.example/api/items").unwrap())
        .with_poll_interval(Duration::from_millis(5), Duration::ZERO)
        .with_retry(RetryPolicy::immediate(3))
        .with_freshness_window(None)
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Returns scripted bodies in order, then keeps repeating the last one
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<String>>,
    pub calls: AtomicU32,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> FetchResult<RawPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        next.map(RawPayload::new).ok_or(FetchError::EmptyBody)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Serves `before` until released, then `after`
pub struct GatedFetcher {
    before: String,
    after: String,
    released: AtomicBool,
}

impl GatedFetcher {
    pub fn new(before: String, after: String) -> Self {
        Self {
            before,
            after,
            released: AtomicBool::new(false),
        }
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> FetchResult<RawPayload> {
        if self.released.load(Ordering::SeqCst) {
            Ok(RawPayload::new(self.after.clone()))
        } else {
            Ok(RawPayload::new(self.before.clone()))
        }
    }
}

/// Fails the first `failures` calls, then serves `body`
pub struct FlakyFetcher {
    failures: u32,
    body: String,
    pub calls: AtomicU32,
}

impl FlakyFetcher {
    pub fn new(failures: u32, body: String) -> Self {
        Self {
            failures,
            body,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FlakyFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> FetchResult<RawPayload> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(FetchError::Status { status: 503 })
        } else {
            Ok(RawPayload::new(self.body.clone()))
        }
    }
}

/// Panics on its first call, then serves `body`
pub struct PanicOnceFetcher {
    panicked: AtomicBool,
    body: String,
}

impl PanicOnceFetcher {
    pub fn new(body: String) -> Self {
        Self {
            panicked: AtomicBool::new(false),
            body,
        }
    }
}

#[async_trait]
impl Fetcher for PanicOnceFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> FetchResult<RawPayload> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("upstream client blew up");
        }
        Ok(RawPayload::new(self.body.clone()))
    }
}

/// Sink that records every delivered message
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriberSink for RecordingSink {
    async fn deliver(&self, message: &str) -> Result<(), DeliveryError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Sink whose connection is already gone
pub struct FailingSink;

#[async_trait]
impl SubscriberSink for FailingSink {
    async fn deliver(&self, _message: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Socket("connection reset".to_string()))
    }
}

/// Wrap a fetcher for the dispatcher and worker builders
pub fn shared<F: Fetcher + 'static>(fetcher: F) -> Arc<F> {
    Arc::new(fetcher)
}
