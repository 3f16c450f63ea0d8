//! Listing Watch Library
//!
//! A Rust library for watching marketplace search queries and pushing newly
//! published listings to live subscribers. Each query is polled by its own
//! worker; a shared, bounded ledger makes sure every listing is delivered
//! at most once.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(ledger::DEFAULT_CAPACITY, 2000);
        assert_eq!(env::TELEGRAM_TOKEN, "LISTING_WATCH_TELEGRAM_TOKEN");
        assert!(http::USER_AGENT.contains("Listing-Watch"));
    }

    #[test]
    fn test_error_types() {
        let app_error = AppError::from(errors::ConfigError::MissingField {
            field: "queries".to_string(),
        });

        assert_eq!(app_error.category(), "config");
        assert!(!app_error.is_recoverable());
    }
}
