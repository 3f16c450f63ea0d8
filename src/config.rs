//! Configuration management for Listing Watch
//!
//! One TOML file describes the dispatcher, the shared ledger, the fetcher,
//! the hub, the optional Telegram notifier, logging, and every query to
//! watch. Durations are human readable (`"5s"`, `"20m"`). Missing sections
//! fall back to defaults; only the query list has to be written by hand.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::app::dispatcher::DispatcherConfig;
use crate::app::fetcher::FetcherConfig;
use crate::app::hub::server::resolve_listen_addr;
use crate::app::hub::HubConfig;
use crate::app::ledger::LedgerStore;
use crate::app::models::{DedupKey, MessageFormat, PayloadLayout, QueryConfig};
use crate::app::notify::TelegramConfig;
use crate::app::retry::{BackoffStrategy, RetryPolicy};
use crate::app::worker::{validate_query, WorkerConfig};
use crate::constants::{dispatcher, env, hub, ledger, logging, notify, persistence, retry, worker};
use crate::errors::{ConfigError, ConfigResult, Result};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "listing-watch.toml";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub dispatcher: DispatcherSection,
    pub ledger: LedgerSection,
    pub fetcher: FetcherConfig,
    pub hub: HubConfig,
    /// Present only when chat-bot delivery is wanted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,
    pub logging: LoggingConfig,
    pub queries: Vec<QueryConfigToml>,
}

/// `[dispatcher]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSection {
    /// Interface for the subscription endpoint
    pub host: String,
    /// Port for the subscription endpoint
    pub port: u16,
    /// Serve the WebSocket endpoint at all
    pub serve_subscriptions: bool,
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub restart_delay: Duration,
    /// How hub messages are rendered
    pub message_format: MessageFormat,
    /// Empty string disables status logging
    #[serde(with = "optional_duration")]
    pub status_log_interval: Option<Duration>,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            host: hub::DEFAULT_HOST.to_string(),
            port: hub::DEFAULT_PORT,
            serve_subscriptions: true,
            shutdown_timeout: dispatcher::SHUTDOWN_TIMEOUT,
            restart_delay: dispatcher::RESTART_DELAY,
            message_format: MessageFormat::default(),
            status_log_interval: Some(dispatcher::STATUS_LOG_INTERVAL),
        }
    }
}

/// `[ledger]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// History depth shared by all queries
    pub capacity: usize,
    /// Flat file holding the persisted history; unset keeps it in memory only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// File size above which the stored history is halved
    pub compaction_threshold_bytes: u64,
    /// Empty string persists on shutdown only
    #[serde(with = "optional_duration")]
    pub snapshot_interval: Option<Duration>,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            capacity: ledger::DEFAULT_CAPACITY,
            file: None,
            compaction_threshold_bytes: persistence::COMPACTION_THRESHOLD_BYTES,
            snapshot_interval: Some(persistence::SNAPSHOT_INTERVAL),
        }
    }
}

impl LedgerSection {
    /// Store for the configured file, if any
    pub fn store(&self) -> Option<LedgerStore> {
        self.file.as_ref().map(|path| {
            LedgerStore::new(path.clone()).with_compaction_threshold(self.compaction_threshold_bytes)
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Write logs to this file instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Truncate the log file at startup once it exceeds this size
    pub max_file_size_mb: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
            file: None,
            max_file_size_mb: logging::MAX_FILE_SIZE_MB,
        }
    }
}

impl LoggingConfig {
    /// Size limit of the log file in bytes, saturating for huge settings
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// One `[[queries]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfigToml {
    pub name: String,
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    /// Parameter stamped with the unix time every cycle; empty disables
    pub timestamp_param: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_jitter: Duration,
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: BackoffStrategy,
    #[serde(with = "humantime_serde")]
    pub recovery_interval: Duration,
    pub items_per_pass: usize,
    /// Empty string disables the freshness filter
    #[serde(with = "optional_duration")]
    pub freshness_window: Option<Duration>,
    pub dedup_key: DedupKey,
    pub payload: PayloadLayout,
}

impl Default for QueryConfigToml {
    fn default() -> Self {
        Self {
            name: String::new(),
            endpoint: String::new(),
            params: BTreeMap::new(),
            headers: BTreeMap::new(),
            timestamp_param: worker::TIMESTAMP_PARAM.to_string(),
            poll_interval: worker::POLL_INTERVAL,
            poll_jitter: Duration::ZERO,
            fetch_timeout: worker::FETCH_TIMEOUT,
            max_attempts: retry::MAX_ATTEMPTS,
            retry_backoff: BackoffStrategy::default(),
            recovery_interval: worker::RECOVERY_INTERVAL,
            items_per_pass: worker::ITEMS_PER_PASS,
            freshness_window: Some(worker::FRESHNESS_WINDOW),
            dedup_key: DedupKey::default(),
            payload: PayloadLayout::default(),
        }
    }
}

impl QueryConfigToml {
    /// Convert to runtime QueryConfig
    pub fn to_runtime_config(&self) -> ConfigResult<QueryConfig> {
        let endpoint = Url::parse(&self.endpoint).map_err(|e| ConfigError::InvalidValue {
            field: format!("queries.{}.endpoint", self.name),
            value: self.endpoint.clone(),
            reason: e.to_string(),
        })?;

        Ok(QueryConfig {
            name: self.name.clone(),
            endpoint,
            params: self.params.clone(),
            headers: self.headers.clone(),
            timestamp_param: Some(self.timestamp_param.clone()).filter(|p| !p.is_empty()),
            poll_interval: self.poll_interval,
            poll_jitter: self.poll_jitter,
            fetch_timeout: self.fetch_timeout,
            retry: RetryPolicy::new(self.max_attempts, self.retry_backoff.clone()),
            recovery_interval: self.recovery_interval,
            items_per_pass: self.items_per_pass,
            freshness_window: self.freshness_window,
            dedup_key: self.dedup_key,
            payload: self.payload.clone(),
        })
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (explicit path, then standard locations)
    /// 3. Environment variables
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let mut config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(LOCAL_CONFIG_FILE)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Per-user config path: `<config_dir>/listing-watch/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("listing-watch").join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `LISTING_WATCH_TELEGRAM_*` from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply Telegram credential overrides from `lookup`
    ///
    /// Either variable being set enables the `[telegram]` section.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(env::TELEGRAM_TOKEN).filter(|v| !v.is_empty());
        let chat_id = lookup(env::TELEGRAM_CHAT_ID).filter(|v| !v.is_empty());
        if token.is_none() && chat_id.is_none() {
            return;
        }

        let telegram = self.telegram.get_or_insert_with(TelegramConfig::default);
        if let Some(token) = token {
            debug!("Telegram token taken from {}", env::TELEGRAM_TOKEN);
            telegram.token = Some(token);
        }
        if let Some(chat_id) = chat_id {
            debug!("Telegram chat id taken from {}", env::TELEGRAM_CHAT_ID);
            telegram.chat_id = Some(chat_id);
        }
    }

    /// Runtime query configurations, in file order
    pub fn query_configs(&self) -> ConfigResult<Vec<QueryConfig>> {
        self.queries
            .iter()
            .map(QueryConfigToml::to_runtime_config)
            .collect()
    }

    /// Runtime dispatcher configuration
    pub fn dispatcher_config(&self) -> ConfigResult<DispatcherConfig> {
        let listen_addr = if self.dispatcher.serve_subscriptions {
            let addr = resolve_listen_addr(&self.dispatcher.host, self.dispatcher.port).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "dispatcher.host".to_string(),
                    value: self.dispatcher.host.clone(),
                    reason: e.to_string(),
                }
            })?;
            Some(addr)
        } else {
            None
        };

        Ok(DispatcherConfig {
            listen_addr,
            shutdown_timeout: self.dispatcher.shutdown_timeout,
            restart_delay: self.dispatcher.restart_delay,
            status_log_interval: self.dispatcher.status_log_interval,
            snapshot_interval: self.ledger.snapshot_interval,
            ledger_capacity: self.ledger.capacity,
            ledger_store: self.ledger.store(),
            hub: self.hub.clone(),
            worker: WorkerConfig {
                message_format: self.dispatcher.message_format,
                notify_timeout: self
                    .telegram
                    .as_ref()
                    .map(|t| t.timeout)
                    .unwrap_or(notify::TIMEOUT),
            },
        })
    }

    /// Validate everything that would stop the dispatcher from starting
    ///
    /// All problems are collected and reported together.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.queries.is_empty() {
            errors.push("at least one [[queries]] entry is required".to_string());
        }
        let mut names = HashSet::new();
        for query in &self.queries {
            if !query.name.is_empty() && !names.insert(query.name.as_str()) {
                errors.push(format!("duplicate query name '{}'", query.name));
            }
            match query.to_runtime_config() {
                Ok(runtime) => {
                    if let Err(e) = validate_query(&runtime) {
                        collect(&mut errors, e);
                    }
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        if let Err(e) = self.fetcher.validate() {
            errors.push(e.to_string());
        }
        match self.dispatcher_config() {
            Ok(runtime) => {
                if let Err(e) = runtime.validate() {
                    errors.push(e.to_string());
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
        if let Some(telegram) = &self.telegram {
            if telegram.token.as_deref().unwrap_or("").is_empty()
                || telegram.chat_id.as_deref().unwrap_or("").is_empty()
            {
                errors.push(format!(
                    "[telegram] needs token and chat_id (or {} / {})",
                    env::TELEGRAM_TOKEN,
                    env::TELEGRAM_CHAT_ID
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Write the commented default file to `path`
    ///
    /// # Errors
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub async fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "path".to_string(),
                value: path.display().to_string(),
                reason: "File already exists (use --force to overwrite)".to_string(),
            }
            .into());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, Self::generate_default_config_content()).await?;
        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# Listing Watch Configuration
# Durations are human readable: "500ms", "5s", "20m".

[dispatcher]
# WebSocket subscription endpoint
host = "{host}"
port = {port}
serve_subscriptions = true
shutdown_timeout = "10s"
# Pause before restarting a worker that died
restart_delay = "5s"
# "url" sends the listing link, "json" a single-line object
message_format = "url"
# Empty string disables periodic status logging
status_log_interval = "1m"

[ledger]
# Identifiers remembered across all queries
capacity = {capacity}
# Persist the history between runs (uncomment to enable)
# file = "{ledger_file}"
# Halve the stored history once the file passes this size
compaction_threshold_bytes = {threshold}
snapshot_interval = "5m"

[fetcher]
request_timeout = "20s"
connect_timeout = "10s"
pool_idle_timeout = "90s"
user_agent = "{user_agent}"
# Requests per second across all queries
rate_limit_rps = {rps}
cookie_store = true

[hub]
channel_capacity = {channel_capacity}
delivery_timeout = "5s"

# Chat-bot delivery (uncomment to enable). Credentials may also come from
# {token_env} and {chat_env}.
# [telegram]
# token = "123456:ABC..."
# chat_id = "123456789"
# timeout = "10s"

[logging]
level = "info"  # error, warn, info, debug, trace
# file = "listing-watch.log"
max_file_size_mb = {log_mb}

[[queries]]
name = "example"
endpoint = "https://www.vinted.fr/api/v2/catalog/items"
poll_interval = "5s"
poll_jitter = "2s"
fetch_timeout = "30s"
max_attempts = {attempts}
retry_backoff = {{ kind = "jitter", min = "1s", max = "3s" }}
recovery_interval = "10s"
items_per_pass = {k}
# Empty string disables the freshness filter
freshness_window = "20m"
dedup_key = "id"

[queries.params]
search_text = "leather jacket"
order = "newest_first"
per_page = "20"

[queries.payload]
items = "/items"
id = "/id"
url = "/url"
published_at = "/photo/high_resolution/timestamp"
image = "/photo/url"
title = "/title"
price = "/price"
"#,
            host = hub::DEFAULT_HOST,
            port = hub::DEFAULT_PORT,
            capacity = ledger::DEFAULT_CAPACITY,
            ledger_file = persistence::DEFAULT_FILE_NAME,
            threshold = persistence::COMPACTION_THRESHOLD_BYTES,
            user_agent = crate::constants::http::USER_AGENT,
            rps = crate::constants::http::DEFAULT_RATE_LIMIT_RPS,
            channel_capacity = hub::CHANNEL_CAPACITY,
            token_env = env::TELEGRAM_TOKEN,
            chat_env = env::TELEGRAM_CHAT_ID,
            log_mb = logging::MAX_FILE_SIZE_MB,
            attempts = retry::MAX_ATTEMPTS,
            k = worker::ITEMS_PER_PASS,
        )
    }
}

fn collect(errors: &mut Vec<String>, error: ConfigError) {
    match error {
        ConfigError::ValidationFailed { errors: inner } => errors.extend(inner),
        other => errors.push(other.to_string()),
    }
}

/// Optional human-readable duration where an empty string means "off"
mod optional_duration {
    use std::time::Duration;

    use humantime_serde::re::humantime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("off") {
            return Ok(None);
        }
        humantime::parse_duration(text)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
[[queries]]
name = "boots"
endpoint = "https://example.com/api/items"

[queries.params]
search_text = "boots"
"#;

    #[test]
    fn test_default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.dispatcher.port, 3454);
        assert_eq!(config.dispatcher.host, "0.0.0.0");
        assert_eq!(config.ledger.capacity, 2000);
        assert_eq!(config.logging.level, "info");
        assert!(config.telegram.is_none());
        assert!(config.queries.is_empty());
    }

    #[test]
    fn test_log_file_limit_saturates() {
        let mut logging = LoggingConfig::default();
        logging.max_file_size_mb = 2;
        assert_eq!(logging.max_file_size_bytes(), 2 * 1024 * 1024);

        logging.max_file_size_mb = u64::MAX;
        assert_eq!(logging.max_file_size_bytes(), u64::MAX);
    }

    #[test]
    fn test_generated_default_is_valid() {
        let content = AppConfig::generate_default_config_content();
        let parsed = AppConfig::from_toml(&content).unwrap();

        assert!(content.starts_with("# Listing Watch Configuration"));
        assert_eq!(parsed.queries.len(), 1);
        assert_eq!(
            parsed.queries[0].freshness_window,
            Some(Duration::from_secs(1200))
        );
        assert_eq!(parsed.queries[0].payload.price.as_deref(), Some("/price"));
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_minimal_query_gets_defaults() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        let queries = config.query_configs().unwrap();
        assert_eq!(queries.len(), 1);

        let query = &queries[0];
        assert_eq!(query.poll_interval, Duration::from_secs(5));
        assert_eq!(query.fetch_timeout, Duration::from_secs(30));
        assert_eq!(query.retry.max_attempts, 3);
        assert_eq!(query.items_per_pass, 5);
        assert_eq!(query.timestamp_param.as_deref(), Some("time"));
        assert_eq!(query.dedup_key, DedupKey::Id);
        assert_eq!(query.params.get("search_text").map(String::as_str), Some("boots"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_strings_disable_optional_features() {
        let config = AppConfig::from_toml(
            r#"
[dispatcher]
status_log_interval = ""

[[queries]]
name = "q"
endpoint = "https://example.com/feed"
timestamp_param = ""
freshness_window = ""
dedup_key = "url"
retry_backoff = { kind = "exponential", base = "2s", max = "1m" }
"#,
        )
        .unwrap();

        assert_eq!(config.dispatcher.status_log_interval, None);
        let query = &config.query_configs().unwrap()[0];
        assert_eq!(query.freshness_window, None);
        assert_eq!(query.timestamp_param, None);
        assert_eq!(query.dedup_key, DedupKey::Url);
        assert_eq!(
            query.retry.backoff,
            BackoffStrategy::Exponential {
                base: Duration::from_secs(2),
                max: Duration::from_secs(60),
            }
        );
    }

    #[test]
    fn test_validation_collects_errors() {
        let config = AppConfig::from_toml(
            r#"
[ledger]
capacity = 0

[[queries]]
name = "a"
endpoint = "not a url"

[[queries]]
name = "a"
endpoint = "https://example.com"
items_per_pass = 0
"#,
        )
        .unwrap();

        match config.validate() {
            Err(ConfigError::ValidationFailed { errors }) => {
                assert!(errors.iter().any(|e| e.contains("duplicate query name")));
                assert!(errors.iter().any(|e| e.contains("endpoint")));
                assert!(errors.iter().any(|e| e.contains("items_per_pass")));
                assert!(errors.iter().any(|e| e.contains("ledger.capacity")));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_no_queries_is_invalid() {
        assert!(AppConfig::default().validate().is_err());
    }

    #[test]
    fn test_env_overrides_enable_telegram() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.apply_overrides_from(|key| match key {
            env::TELEGRAM_TOKEN => Some("123:abc".to_string()),
            env::TELEGRAM_CHAT_ID => Some("42".to_string()),
            _ => None,
        });

        let telegram = config.telegram.as_ref().unwrap();
        assert_eq!(telegram.token.as_deref(), Some("123:abc"));
        assert_eq!(telegram.chat_id.as_deref(), Some("42"));
        assert!(config.validate().is_ok());

        let mut untouched = AppConfig::from_toml(MINIMAL).unwrap();
        untouched.apply_overrides_from(|_| None);
        assert!(untouched.telegram.is_none());
    }

    #[test]
    fn test_incomplete_telegram_section_rejected() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.telegram = Some(TelegramConfig {
            token: Some("123:abc".to_string()),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dispatcher_config_conversion() {
        let mut config = AppConfig::from_toml(MINIMAL).unwrap();
        config.ledger.file = Some(PathBuf::from("seen.txt"));
        config.dispatcher.message_format = MessageFormat::Json;

        let runtime = config.dispatcher_config().unwrap();
        assert_eq!(runtime.listen_addr.map(|a| a.port()), Some(3454));
        assert_eq!(
            runtime.ledger_store.as_ref().map(|s| s.path().to_path_buf()),
            Some(PathBuf::from("seen.txt"))
        );
        assert_eq!(runtime.worker.message_format, MessageFormat::Json);

        config.dispatcher.serve_subscriptions = false;
        assert!(config.dispatcher_config().unwrap().listen_addr.is_none());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = AppConfig::from_toml(MINIMAL).unwrap();
        let text = config.to_toml().unwrap();
        let reparsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(reparsed.queries, config.queries);
        assert_eq!(reparsed.ledger, config.ledger);
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_write_default_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        AppConfig::write_default(&config_path, false).await.unwrap();
        assert!(AppConfig::write_default(&config_path, false).await.is_err());
        AppConfig::write_default(&config_path, true).await.unwrap();

        let config = AppConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(config.queries[0].name, "example");
    }
}
