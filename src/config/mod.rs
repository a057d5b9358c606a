//! Application Configuration
//!
//! Settings stored in TOML format, with a few environment overrides for
//! secrets and deployment switches.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::{DEFAULT_UI_EXCLUSION_KEYWORDS, DEFAULT_VALIDATION_KEYWORDS};
use crate::pipeline::PipelineConfig;
use crate::storage::database::DEFAULT_FUZZY_THRESHOLD;

/// Environment variable names understood by [`AppConfig::apply_env_overrides`]
pub mod env {
    pub const DRY_RUN: &str = "STORE_RELAY_DRY_RUN";
    pub const LOG_LEVEL: &str = "STORE_RELAY_LOG_LEVEL";
    pub const DATABASE_PATH: &str = "STORE_RELAY_DATABASE_PATH";
    pub const BOT_TOKEN: &str = "STORE_RELAY_BOT_TOKEN";
    pub const SOURCE_CHAT: &str = "STORE_RELAY_SOURCE_CHAT";
    pub const TARGET_CHAT: &str = "STORE_RELAY_TARGET_CHAT";
}

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Screenshot pipeline settings
    pub pipeline: PipelineSettings,
    /// File and database locations
    pub storage: StorageSettings,
    /// Text recognition settings
    pub recognizer: RecognizerSettings,
    /// Telegram connection settings
    pub telegram: TelegramSettings,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Run every step except relaying and recording
    pub dry_run: bool,
    /// Log filter used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            log_level: "info".to_string(),
        }
    }
}

/// Screenshot pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Similarity (0-100) at which two store names are the same store
    pub fuzzy_threshold: u8,
    /// At least one must appear in a valid screenshot
    pub validation_keywords: Vec<String>,
    /// Texts that are never picked as the store name (exact match)
    pub ui_exclusion_keywords: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            validation_keywords: DEFAULT_VALIDATION_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            ui_exclusion_keywords: DEFAULT_UI_EXCLUSION_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// File and database locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite store history
    pub database_path: PathBuf,
    /// Scratch directory for downloads
    pub temp_dir: PathBuf,
    /// Where relayed screenshots are kept when retention is on
    pub image_dir: PathBuf,
    /// Keep relayed screenshots and send them as fresh uploads
    pub keep_original_image: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/stores.db"),
            temp_dir: PathBuf::from("./temp"),
            image_dir: PathBuf::from("./data/images"),
            keep_original_image: false,
        }
    }
}

/// Recognizer backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerBackend {
    /// Tesseract executable with TSV output
    #[default]
    Tesseract,
    /// Precomputed `<image>.ocr.json` files
    Sidecar,
}

/// Text recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    /// Which recognizer to run
    pub backend: RecognizerBackend,
    /// Tesseract executable name or path
    pub tesseract_path: String,
    /// Tesseract language code
    pub language: String,
    /// Tesseract page segmentation mode
    pub psm: u8,
    /// Only recognize the top fraction of the screenshot (0.0 - 1.0)
    pub crop_top_fraction: Option<f32>,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            backend: RecognizerBackend::Tesseract,
            tesseract_path: "tesseract".to_string(),
            language: "eng".to_string(),
            // Sparse text: UI screenshots are not one uniform block
            psm: 11,
            crop_top_fraction: None,
        }
    }
}

/// Telegram connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    /// Bot API token
    pub bot_token: Option<String>,
    /// Group to watch: numeric chat id or @username
    pub source_chat: Option<String>,
    /// Recipient of new screenshots: numeric chat id or @username
    pub target_chat: Option<String>,
    /// Long polling timeout in seconds
    pub poll_timeout_secs: u64,
    /// Bot API base URL
    pub api_base: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            source_chat: None,
            target_chat: None,
            poll_timeout_secs: 30,
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

/// Interpret an environment flag. Only true/1/yes (any case) enable it.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

impl AppConfig {
    /// Apply environment overrides on top of file settings.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup(env::DRY_RUN) {
            self.general.dry_run = parse_flag(&v);
        }
        if let Some(v) = non_empty(env::LOG_LEVEL) {
            self.general.log_level = v;
        }
        if let Some(v) = non_empty(env::DATABASE_PATH) {
            self.storage.database_path = PathBuf::from(v);
        }
        if let Some(v) = non_empty(env::BOT_TOKEN) {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = non_empty(env::SOURCE_CHAT) {
            self.telegram.source_chat = Some(v);
        }
        if let Some(v) = non_empty(env::TARGET_CHAT) {
            self.telegram.target_chat = Some(v);
        }
    }

    /// Check the settings the bot host cannot start without
    pub fn validate_for_bot(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.telegram.bot_token.is_none() {
            missing.push(env::BOT_TOKEN);
        }
        if self.telegram.source_chat.is_none() {
            missing.push(env::SOURCE_CHAT);
        }
        if self.telegram.target_chat.is_none() {
            missing.push(env::TARGET_CHAT);
        }
        if !missing.is_empty() {
            bail!("Missing required telegram settings: {}", missing.join(", "));
        }
        self.validate_common()
    }

    /// Range checks shared by all commands
    pub fn validate_common(&self) -> Result<()> {
        if self.pipeline.fuzzy_threshold > 100 {
            bail!("pipeline.fuzzy_threshold must be between 0 and 100");
        }
        if self.pipeline.validation_keywords.is_empty() {
            bail!("pipeline.validation_keywords must not be empty");
        }
        if let Some(fraction) = self.recognizer.crop_top_fraction {
            if !(fraction > 0.0 && fraction <= 1.0) {
                bail!("recognizer.crop_top_fraction must be in (0, 1]");
            }
        }
        Ok(())
    }

    /// Pipeline settings in the form the pipeline consumes
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            dry_run: self.general.dry_run,
            fuzzy_threshold: self.pipeline.fuzzy_threshold,
            validation_keywords: self.pipeline.validation_keywords.clone(),
            ui_exclusion_keywords: self.pipeline.ui_exclusion_keywords.clone(),
            keep_original_image: self.storage.keep_original_image,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
