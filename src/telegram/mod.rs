//! Telegram Integration
//!
//! Bot API client, the relay that delivers new screenshots, and the long
//! polling host that feeds the pipeline.

pub mod bot;
pub mod client;
pub mod relay;
pub mod types;

use thiserror::Error;

pub use bot::BotHost;
pub use client::TelegramClient;
pub use relay::TelegramRelay;

/// Errors from talking to Telegram
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("Telegram API error {code}: {description}")]
    Api { code: i32, description: String },
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("no bot token configured")]
    MissingToken,
    #[error("file is not available for download")]
    FileUnavailable,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TelegramError {
    /// Wrap a reqwest error with the request URL removed, since it embeds the bot token
    pub fn http(err: reqwest::Error) -> Self {
        TelegramError::Http(err.without_url())
    }

    /// Seconds to wait when the server asked to slow down
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            TelegramError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
