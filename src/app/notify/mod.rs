//! Outbound chat-bot notifications
//!
//! A [`Notifier`] delivers one message per novel item to an external service.
//! Workers dispatch notifications on their own task under a short timeout, so
//! a slow or failing notifier never stalls polling.
//!
//! - [`telegram`] - Telegram Bot API delivery with optional photo attachment

pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::app::models::Notification;
use crate::errors::{NotifyError, NotifyResult};

pub use telegram::{TelegramConfig, TelegramNotifier};

/// Delivers one notification per novel item
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> NotifyResult<()>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Send `notification` on a background task bounded by `timeout`
///
/// Failures are logged; nothing is returned to the caller.
pub fn dispatch(notifier: Arc<dyn Notifier>, notification: Notification, timeout: Duration) {
    tokio::spawn(async move {
        let result = match tokio::time::timeout(timeout, notifier.notify(&notification)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout {
                millis: timeout.as_millis() as u64,
            }),
        };
        match result {
            Ok(()) => debug!(
                notifier = notifier.name(),
                query = %notification.query,
                id = %notification.item.id,
                "Notification sent"
            ),
            Err(e) => warn!(
                notifier = notifier.name(),
                query = %notification.query,
                id = %notification.item.id,
                error = %e,
                "Notification failed"
            ),
        }
    });
}

/// Truncate `text` to `max_chars`, ending in "..." when shortened
///
/// Text longer than `max_chars` keeps its first `keep_chars` characters.
pub fn truncate_caption(text: &str, max_chars: usize, keep_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(keep_chars).collect();
    truncated.push_str("...");
    truncated
}
