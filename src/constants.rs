//! Application constants for Listing Watch
//!
//! Default values used across the application, organized by functional
//! domain. Every value here can be overridden from the configuration file.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Chat-bot token override
    pub const TELEGRAM_TOKEN: &str = "LISTING_WATCH_TELEGRAM_TOKEN";

    /// Chat-bot destination chat override
    pub const TELEGRAM_CHAT_ID: &str = "LISTING_WATCH_TELEGRAM_CHAT_ID";
}

/// Deduplication ledger defaults
pub mod ledger {
    /// Number of identifiers remembered before FIFO eviction kicks in
    pub const DEFAULT_CAPACITY: usize = 2000;
}

/// Ledger file persistence defaults
pub mod persistence {
    use super::Duration;

    /// Size above which the ledger file is halved (5MB)
    pub const COMPACTION_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;

    /// Default interval for periodic ledger snapshots
    pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(300);

    /// Default ledger file name
    pub const DEFAULT_FILE_NAME: &str = "listing-watch.seen.txt";
}

/// Retry policy defaults
pub mod retry {
    use super::Duration;

    /// Attempts per fetch before giving up for the cycle
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Lower bound of the jittered delay between attempts
    pub const JITTER_MIN: Duration = Duration::from_secs(1);

    /// Upper bound of the jittered delay between attempts
    pub const JITTER_MAX: Duration = Duration::from_secs(3);

    /// Base delay for exponential backoff
    pub const BACKOFF_BASE: Duration = Duration::from_secs(2);

    /// Ceiling for exponential backoff
    pub const BACKOFF_MAX: Duration = Duration::from_secs(60);
}

/// Worker loop defaults
pub mod worker {
    use super::Duration;

    /// Pause between poll cycles
    pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Outer timeout around each fetch attempt
    pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

    /// Short pause after a cycle whose fetch exhausted its retries
    pub const RECOVERY_INTERVAL: Duration = Duration::from_secs(10);

    /// Items considered per parse pass (most recent first)
    pub const ITEMS_PER_PASS: usize = 5;

    /// Maximum listing age for live delivery (20 minutes)
    pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(1200);

    /// Request parameter stamped with the current unix time each cycle
    pub const TIMESTAMP_PARAM: &str = "time";
}

/// Payload layout defaults (JSON pointers)
pub mod payload {
    /// Location of the item list
    pub const ITEMS_POINTER: &str = "/items";

    /// Item identifier within an item
    pub const ID_POINTER: &str = "/id";

    /// Item link within an item
    pub const URL_POINTER: &str = "/url";

    /// Listing publish time within an item
    pub const PUBLISHED_AT_POINTER: &str = "/photo/high_resolution/timestamp";

    /// Unix timestamps above this are treated as milliseconds
    pub const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;
}

/// HTTP fetcher configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Listing-Watch/0.1.0";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Shared request budget across all workers (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 5;

    /// Maximum jitter added by the rate limiter
    pub const RATE_LIMIT_JITTER: Duration = Duration::from_millis(100);
}

/// Broadcast hub and subscription endpoint
pub mod hub {
    use super::Duration;

    /// Default listen host
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    /// Default listen port
    pub const DEFAULT_PORT: u16 = 3454;

    /// Per-subscriber outbound queue size
    pub const CHANNEL_CAPACITY: usize = 64;

    /// Time a subscriber gets to accept one message
    pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Chat-bot notifier
pub mod notify {
    use super::Duration;

    /// Telegram Bot API base URL
    pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

    /// Bound on a single notification call
    pub const TIMEOUT: Duration = Duration::from_secs(10);

    /// Maximum caption length accepted by the API
    pub const MAX_CAPTION_CHARS: usize = 1024;

    /// Caption length kept when truncating, before the ellipsis
    pub const TRUNCATED_CAPTION_CHARS: usize = 1020;
}

/// Dispatcher and supervision
pub mod dispatcher {
    use super::Duration;

    /// Delay before a crashed worker is restarted
    pub const RESTART_DELAY: Duration = Duration::from_secs(5);

    /// Time allowed for workers and tasks to stop after shutdown is signalled
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

    /// Interval for periodic status logging
    pub const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

    /// Timeout for background task shutdown
    pub const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";

    /// Log file size above which it is truncated at startup (5MB)
    pub const MAX_FILE_SIZE_MB: u64 = 5;
}

// Re-export commonly used constants for convenience
pub use hub::DEFAULT_PORT;
pub use ledger::DEFAULT_CAPACITY as DEFAULT_LEDGER_CAPACITY;
pub use worker::{FRESHNESS_WINDOW, ITEMS_PER_PASS};
