//! Telegram Bot API notifier
//!
//! Items with an image go out through `sendPhoto` with the text as caption,
//! everything else through `sendMessage`. Captions are cut to the API limit.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{truncate_caption, Notifier};
use crate::app::models::Notification;
use crate::constants::notify;
use crate::errors::{NotifyError, NotifyResult};

/// Telegram delivery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token; may come from the environment instead
    pub token: Option<String>,
    /// Destination chat; may come from the environment instead
    pub chat_id: Option<String>,
    /// API base URL
    pub api_base: String,
    /// Bound on a single API call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            api_base: notify::TELEGRAM_API_BASE.to_string(),
            timeout: notify::TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Sends one chat message per novel item
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier from configuration
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::MissingCredentials` when token or chat id is absent
    pub fn new(config: &TelegramConfig) -> NotifyResult<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NotifyError::MissingCredentials {
                field: "telegram.token".to_string(),
            })?;
        let chat_id = config
            .chat_id
            .clone()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| NotifyError::MissingCredentials {
                field: "telegram.chat_id".to_string(),
            })?;
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            chat_id,
        })
    }

    /// Message text for a notification: optional title and price, then the link
    pub fn caption(notification: &Notification) -> String {
        let details = &notification.details;
        let mut lines = Vec::with_capacity(3);
        if let Some(title) = &details.title {
            lines.push(title.clone());
        }
        if let Some(price) = &details.price {
            lines.push(format!("Price: {}", price));
        }
        lines.push(format!("Link: {}", notification.item.url));

        truncate_caption(
            &lines.join("\n"),
            notify::MAX_CAPTION_CHARS,
            notify::TRUNCATED_CAPTION_CHARS,
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn post<T: Serialize + ?Sized>(&self, method: &str, body: &T) -> NotifyResult<()> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            // The method URL embeds the bot token
            .map_err(|e| NotifyError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }
        debug!(method, "Telegram call succeeded");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, notification: &Notification) -> NotifyResult<()> {
        let caption = Self::caption(notification);
        match notification.details.image.as_deref() {
            Some(photo) => {
                self.post(
                    "sendPhoto",
                    &SendPhoto {
                        chat_id: &self.chat_id,
                        photo,
                        caption: &caption,
                    },
                )
                .await
            }
            None => {
                self.post(
                    "sendMessage",
                    &SendMessage {
                        chat_id: &self.chat_id,
                        text: &caption,
                    },
                )
                .await
            }
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
