//! Delivers new store screenshots to the target chat

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::client::TelegramClient;
use super::TelegramError;
use crate::pipeline::{InboundImage, Relay, RelayMode, RelayReceipt};

/// Longest rate-limit pause the relay sits through before giving up
const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

/// Relay that forwards or uploads screenshots through the Bot API
pub struct TelegramRelay {
    client: Arc<TelegramClient>,
    target_chat: String,
    source_chat_id: Option<i64>,
}

impl TelegramRelay {
    pub fn new(client: Arc<TelegramClient>, target_chat: impl Into<String>, source_chat_id: Option<i64>) -> Self {
        Self {
            client,
            target_chat: target_chat.into(),
            source_chat_id,
        }
    }
}

impl Relay for TelegramRelay {
    fn relay(&self, image: &InboundImage, mode: RelayMode) -> Result<RelayReceipt> {
        let message = match (mode, self.source_chat_id, image.source_ref) {
            (RelayMode::Forward, Some(from_chat), Some(message_id)) => {
                debug!("Forwarding message {} to {}", message_id, self.target_chat);
                with_rate_limit_retry(MAX_RETRY_WAIT, || {
                    self.client.forward_message(&self.target_chat, from_chat, message_id)
                })
                .context("forwardMessage failed")?
            }
            _ => {
                debug!("Uploading {:?} to {}", image.path, self.target_chat);
                with_rate_limit_retry(MAX_RETRY_WAIT, || self.client.send_photo(&self.target_chat, &image.path))
                    .context("sendPhoto failed")?
            }
        };

        Ok(RelayReceipt {
            message_id: message.message_id,
        })
    }
}

/// Run `call`, and run it once more after sleeping if Telegram rate-limited it.
/// Waits longer than `max_wait` are returned as the rate-limit error.
pub fn with_rate_limit_retry<T, F>(max_wait: Duration, mut call: F) -> Result<T, TelegramError>
where
    F: FnMut() -> Result<T, TelegramError>,
{
    match call() {
        Err(err) => match err.retry_after().map(Duration::from_secs) {
            Some(wait) if wait <= max_wait => {
                warn!("Rate limited by Telegram, retrying in {}s", wait.as_secs());
                std::thread::sleep(wait);
                call()
            }
            _ => Err(err),
        },
        ok => ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_retry_after_rate_limit() {
        let attempts = Cell::new(0);
        let result = with_rate_limit_retry(Duration::from_secs(1), || {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                Err(TelegramError::RateLimited { retry_after: 0 })
            } else {
                Ok(42)
            }
        });

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_retries_only_once() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = with_rate_limit_retry(Duration::from_secs(1), || {
            attempts.set(attempts.get() + 1);
            Err(TelegramError::RateLimited { retry_after: 0 })
        });

        assert!(matches!(result, Err(TelegramError::RateLimited { .. })));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_no_retry_for_other_errors() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = with_rate_limit_retry(Duration::from_secs(1), || {
            attempts.set(attempts.get() + 1);
            Err(TelegramError::Api {
                code: 400,
                description: "bad request".to_string(),
            })
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_long_wait_is_not_retried() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = with_rate_limit_retry(Duration::from_secs(1), || {
            attempts.set(attempts.get() + 1);
            Err(TelegramError::RateLimited { retry_after: 3600 })
        });

        assert_eq!(result.unwrap_err().retry_after(), Some(3600));
        assert_eq!(attempts.get(), 1);
    }
}
