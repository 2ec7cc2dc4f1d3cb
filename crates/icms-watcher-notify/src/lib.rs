//! Notification layer: message composition, recipient fan-out, Telegram transport.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub mod dispatch;
pub mod message;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use dispatch::{Delivery, notify_updates};
#[cfg(feature = "telegram")]
pub use telegram::TelegramClient;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[cfg(feature = "telegram")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Bot API returned {status}: {description}")]
    Api { status: u16, description: String },
    #[cfg(feature = "telegram")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sends a text message to one recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str, recipient: &str) -> Result<(), NotifyError>;
}

/// Logs every message instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn send(&self, text: &str, recipient: &str) -> Result<(), NotifyError> {
        info!(recipient, text, "dry run: message not sent");
        Ok(())
    }
}
