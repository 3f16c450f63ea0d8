//! Configuration structures for the dispatcher
//!
//! Runtime settings for supervision, shutdown, background tasks and the
//! subscription endpoint. The on-disk form lives in [`crate::config`].

use std::net::SocketAddr;
use std::time::Duration;

use crate::app::hub::HubConfig;
use crate::app::ledger::LedgerStore;
use crate::app::worker::WorkerConfig;
use crate::constants::{dispatcher, ledger, persistence};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Address of the WebSocket subscription endpoint; `None` disables it
    pub listen_addr: Option<SocketAddr>,
    /// Maximum time to wait for workers and the accept loop to stop
    pub shutdown_timeout: Duration,
    /// Pause before restarting a worker that died
    pub restart_delay: Duration,
    /// How often to log status; `None` disables status logging
    pub status_log_interval: Option<Duration>,
    /// How often to persist the ledger; `None` persists on shutdown only
    pub snapshot_interval: Option<Duration>,
    /// Ledger history depth
    pub ledger_capacity: usize,
    /// Flat-file persistence for the ledger
    pub ledger_store: Option<LedgerStore>,
    /// Hub tuning
    pub hub: HubConfig,
    /// Delivery settings shared by every worker
    pub worker: WorkerConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            listen_addr: None,
            shutdown_timeout: dispatcher::SHUTDOWN_TIMEOUT,
            restart_delay: dispatcher::RESTART_DELAY,
            status_log_interval: Some(dispatcher::STATUS_LOG_INTERVAL),
            snapshot_interval: Some(persistence::SNAPSHOT_INTERVAL),
            ledger_capacity: ledger::DEFAULT_CAPACITY,
            ledger_store: None,
            hub: HubConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl DispatcherConfig {
    /// Serve subscriptions on `addr`
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = Some(addr);
        self
    }

    /// Persist the ledger through `store`
    pub fn with_ledger_store(mut self, store: LedgerStore) -> Self {
        self.ledger_store = Some(store);
        self
    }

    /// Set the ledger capacity
    pub fn with_ledger_capacity(mut self, capacity: usize) -> Self {
        self.ledger_capacity = capacity;
        self
    }

    /// Set the restart delay
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Set shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.ledger_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ledger.capacity".to_string(),
                value: "0".to_string(),
                reason: "Capacity must be at least 1".to_string(),
            });
        }
        if self.shutdown_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "dispatcher.shutdown_timeout".to_string(),
                value: "0s".to_string(),
                reason: "Shutdown timeout cannot be zero".to_string(),
            });
        }
        if self.hub.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "hub.channel_capacity".to_string(),
                value: "0".to_string(),
                reason: "Channel capacity must be at least 1".to_string(),
            });
        }
        if matches!(self.status_log_interval, Some(d) if d.is_zero())
            || matches!(self.snapshot_interval, Some(d) if d.is_zero())
        {
            return Err(ConfigError::InvalidValue {
                field: "dispatcher intervals".to_string(),
                value: "0s".to_string(),
                reason: "Intervals must be positive (omit to disable)".to_string(),
            });
        }
        self.worker.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DispatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ledger_capacity, 2000);
        assert!(config.listen_addr.is_none());
    }

    #[test]
    fn test_config_builder_methods() {
        let addr: SocketAddr = "127.0.0.1:3454".parse().unwrap();
        let config = DispatcherConfig::default()
            .with_listen_addr(addr)
            .with_ledger_capacity(10)
            .with_restart_delay(Duration::from_millis(5))
            .with_shutdown_timeout(Duration::from_secs(1));

        assert_eq!(config.listen_addr, Some(addr));
        assert_eq!(config.ledger_capacity, 10);
        assert_eq!(config.restart_delay, Duration::from_millis(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = DispatcherConfig::default().with_ledger_capacity(0);
        assert!(config.validate().is_err());

        let config = DispatcherConfig {
            snapshot_interval: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DispatcherConfig::default().with_shutdown_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
