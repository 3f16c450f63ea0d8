//! Error types for Listing Watch
//!
//! Errors are split by concern so that each layer can decide locally what is
//! recoverable. Only configuration errors are fatal, and only before the
//! dispatcher starts scheduling workers; everything raised inside a poll cycle
//! is absorbed and logged by the worker that produced it.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Single fetch attempt failures, recovered locally by the retry policy
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Attempt exceeded the outer per-call timeout
    #[error("Fetch timed out after {millis} ms")]
    Timeout { millis: u64 },

    /// Upstream returned a non-success status
    #[error("Upstream returned HTTP {status}")]
    Status { status: u16 },

    /// Upstream throttled us
    #[error("Rate limited by upstream (HTTP 429)")]
    RateLimited,

    /// Request URL could not be built from the query configuration
    #[error("Invalid request URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Upstream answered with an empty body
    #[error("Upstream returned an empty body")]
    EmptyBody,

    /// Generic error for other fetcher implementations
    #[error("{0}")]
    Other(String),
}

/// Retry budget exhausted for one query
///
/// Callers treat this as "no data this cycle"; it never terminates a worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Fetch for '{query}' exhausted after {attempts} attempts (last error: {last_error})")]
pub struct FetchExhausted {
    pub query: String,
    pub attempts: u32,
    pub last_error: String,
}

/// Payload present but unusable
#[derive(Error, Debug)]
pub enum ParseError {
    /// Body is not valid JSON
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// JSON pointer to the item list did not resolve
    #[error("Item list not found at pointer '{pointer}'")]
    MissingItems { pointer: String },

    /// JSON pointer resolved to something other than an array
    #[error("Value at pointer '{pointer}' is not an array")]
    NotAnArray { pointer: String },
}

/// Delivery to a single subscriber failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Subscriber's receiving side is gone
    #[error("Subscriber channel closed")]
    ChannelClosed,

    /// Subscriber did not accept the message in time
    #[error("Subscriber delivery timed out after {millis} ms")]
    Timeout { millis: u64 },

    /// Underlying socket write failed
    #[error("Subscriber socket error: {0}")]
    Socket(String),
}

/// Ledger persistence errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// I/O error reading or writing the ledger file
    #[error("Ledger file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Atomic replace of the ledger file failed
    #[error("Could not replace ledger file {path}: {reason}")]
    PersistFailed { path: PathBuf, reason: String },

    /// Background persistence task failed to complete
    #[error("Ledger persistence task failed: {0}")]
    TaskFailed(String),
}

/// Outbound chat-bot notification errors
#[derive(Error, Debug)]
pub enum NotifyError {
    /// HTTP request error
    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API rejected the request
    #[error("Notification API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Notification did not complete in time
    #[error("Notification timed out after {millis} ms")]
    Timeout { millis: u64 },

    /// Notifier credentials missing
    #[error("Missing notifier credentials: {field}")]
    MissingCredentials { field: String },
}

/// Subscription endpoint errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Could not bind the listening socket
    #[error("Failed to bind subscription endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Invalid listen address
    #[error("Invalid listen address '{address}'")]
    InvalidAddress { address: String },

    /// WebSocket handshake failed
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Worker supervision errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker task panicked
    #[error("Worker for '{query}' panicked: {message}")]
    Panicked { query: String, message: String },

    /// Worker task was cancelled before it could exit cleanly
    #[error("Worker for '{query}' was cancelled")]
    Cancelled { query: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Transient fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Retry budget exhausted
    #[error(transparent)]
    FetchExhausted(#[from] FetchExhausted),

    /// Payload parse error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Subscriber delivery error
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Ledger persistence error
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Chat-bot notification error
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Subscription endpoint error
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Worker supervision error
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(_)
            | AppError::FetchExhausted(_)
            | AppError::Parse(_)
            | AppError::Delivery(_)
            | AppError::Notify(_)
            | AppError::Worker(_) => true,

            AppError::Config(_) | AppError::Server(ServerError::Bind { .. }) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::FetchExhausted(_) => "fetch_exhausted",
            AppError::Parse(_) => "parse",
            AppError::Delivery(_) => "delivery",
            AppError::Ledger(_) => "ledger",
            AppError::Notify(_) => "notify",
            AppError::Server(_) => "server",
            AppError::Worker(_) => "worker",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Parse result type alias
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Ledger persistence result type alias
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Notification result type alias
pub type NotifyResult<T> = std::result::Result<T, NotifyError>;

/// Subscription endpoint result type alias
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let exhausted = AppError::from(FetchExhausted {
            query: "shoes".to_string(),
            attempts: 3,
            last_error: "timeout".to_string(),
        });
        assert_eq!(exhausted.category(), "fetch_exhausted");
        assert!(exhausted.is_recoverable());

        let config = AppError::from(ConfigError::MissingField {
            field: "queries".to_string(),
        });
        assert_eq!(config.category(), "config");
        assert!(!config.is_recoverable());
    }

    #[test]
    fn test_fetch_exhausted_message_carries_context() {
        let err = FetchExhausted {
            query: "shoes".to_string(),
            attempts: 4,
            last_error: "Upstream returned HTTP 503".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("shoes"));
        assert!(message.contains("4 attempts"));
        assert!(message.contains("503"));
    }
}
