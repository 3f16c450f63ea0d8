//! HTTP fetcher with rate limiting
//!
//! Issues one GET per call. Status handling maps throttling and server
//! errors to [`FetchError`] variants; nothing is retried here.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FetchRequest, Fetcher, RawPayload};
use crate::constants::http;
use crate::errors::{ConfigError, ConfigResult, FetchError, FetchResult};

/// Configuration for the HTTP fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Connection pool idle timeout
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
    /// Requests per second shared by all workers
    pub rate_limit_rps: u32,
    /// Keep cookies between requests (some upstreams require a session cookie)
    pub cookie_store: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_idle_timeout: http::POOL_IDLE_TIMEOUT,
            user_agent: http::USER_AGENT.to_string(),
            rate_limit_rps: http::DEFAULT_RATE_LIMIT_RPS,
            cookie_store: true,
        }
    }
}

impl FetcherConfig {
    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetcher.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be non-zero".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "fetcher.request_timeout".to_string(),
                value: "0s".to_string(),
                reason: "Request timeout must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Build the underlying reqwest client
    fn build_client(&self) -> FetchResult<Client> {
        let client = Client::builder()
            .cookie_store(self.cookie_store)
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .user_agent(self.user_agent.as_str())
            .tcp_nodelay(true)
            .build()?;
        Ok(client)
    }
}

/// reqwest-backed [`Fetcher`] shared by all workers
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    rate_limiter: RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpFetcher {
    /// Create a fetcher from configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the rate limit is zero or the client cannot be built
    pub fn new(config: &FetcherConfig) -> ConfigResult<Self> {
        config.validate()?;
        let client = config
            .build_client()
            .map_err(|e| ConfigError::InvalidValue {
                field: "fetcher".to_string(),
                value: config.user_agent.clone(),
                reason: e.to_string(),
            })?;
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> ConfigResult<RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>> {
        let quota = Quota::per_second(NonZeroU32::new(rate_limit_rps).ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "fetcher.rate_limit_rps".to_string(),
                value: rate_limit_rps.to_string(),
                reason: "Rate limit must be non-zero".to_string(),
            }
        })?);
        Ok(RateLimiter::direct(quota))
    }

    fn header_map(request: &FetchRequest) -> FetchResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::Other(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::Other(format!("Invalid header value: {}", e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<RawPayload> {
        // Apply rate limiting with jitter to avoid workers firing in lockstep
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(http::RATE_LIMIT_JITTER))
            .await;

        let response = self
            .client
            .get(request.url.clone())
            .headers(Self::header_map(request)?)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }

        debug!(query = %request.query, bytes = body.len(), "Fetched payload");
        Ok(RawPayload::new(body))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    /// Serve a single canned HTTP response on an ephemeral port
    async fn serve_once(status_line: &'static str, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        Url::parse(&format!("http://{}/api/items", addr)).unwrap()
    }

    fn request(url: Url) -> FetchRequest {
        FetchRequest {
            query: "test".to_string(),
            url,
            headers: BTreeMap::from([("Accept".to_string(), "application/json".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let url = serve_once("200 OK", r#"{"items":[]}"#).await;
        let fetcher = HttpFetcher::new(&FetcherConfig::default()).unwrap();

        let payload = fetcher.fetch(&request(url)).await.unwrap();
        assert_eq!(payload.body, r#"{"items":[]}"#);
    }

    #[tokio::test]
    async fn test_fetch_maps_rate_limit() {
        let url = serve_once("429 Too Many Requests", "slow down").await;
        let fetcher = HttpFetcher::new(&FetcherConfig::default()).unwrap();

        let err = fetcher.fetch(&request(url)).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimited));
    }

    #[tokio::test]
    async fn test_fetch_maps_server_error() {
        let url = serve_once("503 Service Unavailable", "down").await;
        let fetcher = HttpFetcher::new(&FetcherConfig::default()).unwrap();

        let err = fetcher.fetch(&request(url)).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_body() {
        let url = serve_once("200 OK", "  ").await;
        let fetcher = HttpFetcher::new(&FetcherConfig::default()).unwrap();

        let err = fetcher.fetch(&request(url)).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyBody));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let config = FetcherConfig {
            rate_limit_rps: 0,
            ..Default::default()
        };
        assert!(HttpFetcher::new(&config).is_err());
    }
}
