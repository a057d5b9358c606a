//! Long polling bot host
//!
//! Pulls updates from the source chat one at a time and runs every photo
//! through the pipeline. Downloads live in scoped temp files, so each photo
//! is cleaned up whatever the outcome.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::client::TelegramClient;
use super::relay::TelegramRelay;
use super::types::{Message, Update};
use crate::config::AppConfig;
use crate::pipeline::{log_outcome, InboundImage, Outcome, Pipeline};
use crate::storage::files::ImageFiles;
use crate::storage::StoreDatabase;
use crate::vision::TextRecognizer;

/// Upper bound for the pause after repeated polling errors
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Telegram bot that feeds photos from one chat into the pipeline
pub struct BotHost<R> {
    client: Arc<TelegramClient>,
    pipeline: Pipeline<R, TelegramRelay>,
    files: ImageFiles,
    source_chat_id: i64,
    poll_timeout_secs: u64,
    shutdown: Arc<AtomicBool>,
}

impl<R: TextRecognizer> BotHost<R> {
    /// Connect to Telegram, resolve both chats and prepare the temp directory
    pub fn start(config: &AppConfig, recognizer: R, database: StoreDatabase) -> Result<Self> {
        config.validate_for_bot()?;
        let telegram = &config.telegram;
        let source = telegram.source_chat.as_deref().unwrap_or_default();
        let target = telegram.target_chat.as_deref().unwrap_or_default();

        let client = Arc::new(TelegramClient::new(telegram)?);

        let me = client.get_me().context("Failed to authenticate bot token")?;
        info!(
            "Logged in as {} (@{}, id {})",
            me.first_name,
            me.username.as_deref().unwrap_or("?"),
            me.id
        );

        let source_chat = client
            .get_chat(source)
            .with_context(|| format!("Failed to resolve source chat {source}"))?;
        info!(
            "Watching {} '{}' ({})",
            source_chat.kind,
            source_chat.display_name(),
            source_chat.id
        );

        let target_chat = client
            .get_chat(target)
            .with_context(|| format!("Failed to resolve target chat {target}"))?;
        info!("Relaying new stores to '{}' ({})", target_chat.display_name(), target_chat.id);

        let files = ImageFiles::new(&config.storage.temp_dir, &config.storage.image_dir)?;
        files.purge_temp_dir()?;

        let relay = TelegramRelay::new(client.clone(), target_chat.id.to_string(), Some(source_chat.id));
        let pipeline = Pipeline::new(recognizer, relay, database, config.pipeline_config());

        if pipeline.config().dry_run {
            warn!("==============================================");
            warn!("DRY RUN: nothing will be relayed or recorded");
            warn!("==============================================");
        }

        let stats = pipeline.database().get_stats()?;
        info!("{} store(s) already processed", stats.total_stores);

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        client.runtime().spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested, stopping after the current poll");
                flag.store(true, Ordering::SeqCst);
            }
        });

        Ok(Self {
            client,
            pipeline,
            files,
            source_chat_id: source_chat.id,
            poll_timeout_secs: telegram.poll_timeout_secs,
            shutdown,
        })
    }

    /// Poll until Ctrl-C
    pub fn run(&self) -> Result<()> {
        let mut offset = self.skip_backlog();
        let mut backoff = Duration::from_secs(1);

        info!("Bot is running. Press Ctrl-C to stop.");
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.client.get_updates(offset, self.poll_timeout_secs) {
                Ok(updates) => {
                    backoff = Duration::from_secs(1);
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        if let Err(e) = self.handle_update(update) {
                            error!("Failed to handle update: {:#}", e);
                        }
                        if self.shutdown.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                }
                Err(e) => match e.retry_after() {
                    Some(secs) => {
                        warn!("Rate limited while polling, sleeping {}s", secs);
                        self.sleep(Duration::from_secs(secs));
                    }
                    None => {
                        error!("Polling failed: {}. Retrying in {}s", e, backoff.as_secs());
                        self.sleep(backoff);
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                },
            }
        }

        info!("Bot stopped");
        Ok(())
    }

    /// Confirm everything queued before start-up so only new messages are handled
    fn skip_backlog(&self) -> Option<i64> {
        match self.client.get_updates(Some(-1), 0) {
            Ok(updates) => {
                let offset = next_offset(&updates);
                if let Some(next) = offset {
                    info!("Skipping pending updates up to {}", next - 1);
                }
                offset
            }
            Err(e) => {
                warn!("Failed to skip pending updates: {}", e);
                None
            }
        }
    }

    fn handle_update(&self, update: Update) -> Result<()> {
        let Some(message) = update.into_message() else {
            return Ok(());
        };
        if !is_source_photo(&message, self.source_chat_id) {
            debug!("Ignoring message {} from chat {}", message.message_id, message.chat.id);
            return Ok(());
        }
        self.handle_photo(&message)
    }

    fn handle_photo(&self, message: &Message) -> Result<()> {
        let Some(photo) = message.largest_photo() else {
            return Ok(());
        };
        info!(
            "Processing photo from message {} ({}x{})",
            message.message_id, photo.width, photo.height
        );

        let mut temp = self.files.temp_file(message.message_id, "jpg")?;
        self.client
            .download_file(&photo.file_id, &mut temp)
            .with_context(|| format!("Failed to download photo of message {}", message.message_id))?;

        let image = InboundImage::new(temp.path(), Some(message.message_id));
        let outcome = self.pipeline.process_image(&image);
        log_outcome(&image, &outcome);

        if let Ok(Outcome::Relayed { .. }) = outcome {
            if self.pipeline.config().keep_original_image {
                self.files.retain(temp, message.message_id)?;
            }
            let stats = self.pipeline.database().get_stats()?;
            info!("Total stores processed: {}", stats.total_stores);
        }
        Ok(())
    }

    /// Sleep in short steps so Ctrl-C is noticed
    fn sleep(&self, duration: Duration) {
        let step = Duration::from_millis(250);
        let mut remaining = duration;
        while !remaining.is_zero() && !self.shutdown.load(Ordering::SeqCst) {
            let chunk = remaining.min(step);
            std::thread::sleep(chunk);
            remaining -= chunk;
        }
    }
}

/// Offset that acknowledges every update in `updates`
pub fn next_offset(updates: &[Update]) -> Option<i64> {
    updates.iter().map(|u| u.update_id + 1).max()
}

/// Whether a message is a photo posted in the watched chat
pub fn is_source_photo(message: &Message, source_chat_id: i64) -> bool {
    message.chat.id == source_chat_id && message.has_photo()
}
