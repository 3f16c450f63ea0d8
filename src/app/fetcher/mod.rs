//! Upstream fetching
//!
//! A [`Fetcher`] performs exactly one round trip for one query and reports
//! failure as a value. Retrying and the outer timeout are the worker's job,
//! so implementations stay simple and independent across calls.
//!
//! - [`http`] - reqwest-based fetcher with a shared rate limiter

pub mod http;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::app::models::QueryConfig;
use crate::errors::FetchResult;

pub use http::{FetcherConfig, HttpFetcher};

/// One request, built fresh for every cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Name of the query issuing the request
    pub query: String,
    /// Full URL including the refreshed parameters
    pub url: Url,
    /// Extra headers for this query
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    /// Build the request for `query` at time `now`
    pub fn for_query(query: &QueryConfig, now: DateTime<Utc>) -> Self {
        Self {
            query: query.name.clone(),
            url: query.request_url(now),
            headers: query.headers.clone(),
        }
    }
}

/// Raw upstream response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawPayload {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// Performs one network round trip for one query
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the raw payload for `request`
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<RawPayload>;

    /// Short name for logs
    fn name(&self) -> &str {
        "fetcher"
    }
}
