//! Screenshot Pipeline
//!
//! recognize -> validate -> extract -> duplicate check -> relay -> record.
//!
//! A store is recorded only after the relay succeeded, so a failed relay
//! leaves no trace and the next screenshot of that store is tried again.
//! Calls are expected one at a time per database; hosts that process
//! screenshots in parallel should serialize around [`Pipeline::process_image`].

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::analysis::{self, AnalysisError};
use crate::storage::database::DEFAULT_FUZZY_THRESHOLD;
use crate::storage::{StoreDatabase, StoreError};
use crate::vision::TextRecognizer;

/// Settings the pipeline runs with
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Run every step except relaying and recording
    pub dry_run: bool,
    /// Similarity (0-100) at which two store names are the same store
    pub fuzzy_threshold: u8,
    /// At least one must appear in a valid screenshot
    pub validation_keywords: Vec<String>,
    /// Texts never picked as the store name
    pub ui_exclusion_keywords: Vec<String>,
    /// Relay a fresh upload of the local file instead of forwarding
    pub keep_original_image: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            validation_keywords: analysis::DEFAULT_VALIDATION_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ui_exclusion_keywords: analysis::DEFAULT_UI_EXCLUSION_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            keep_original_image: false,
        }
    }
}

/// A screenshot waiting to be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundImage {
    /// Local file with the image
    pub path: PathBuf,
    /// Chat message the image came from, if any
    pub source_ref: Option<i64>,
}

impl InboundImage {
    pub fn new(path: impl Into<PathBuf>, source_ref: Option<i64>) -> Self {
        Self {
            path: path.into(),
            source_ref,
        }
    }
}

/// How the relay should deliver a screenshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Forward the original chat message
    Forward,
    /// Upload the local file as a new message
    Upload,
}

/// What the relay produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReceipt {
    /// Id of the message delivered to the recipient
    pub message_id: i64,
}

/// Delivers new screenshots downstream
pub trait Relay {
    fn relay(&self, image: &InboundImage, mode: RelayMode) -> Result<RelayReceipt>;
}

impl<T: Relay + ?Sized> Relay for Box<T> {
    fn relay(&self, image: &InboundImage, mode: RelayMode) -> Result<RelayReceipt> {
        (**self).relay(image, mode)
    }
}

/// Relay used when no recipient is configured. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRelay;

impl Relay for DisabledRelay {
    fn relay(&self, _image: &InboundImage, _mode: RelayMode) -> Result<RelayReceipt> {
        anyhow::bail!("no relay target configured")
    }
}

/// Why a screenshot was dropped without a duplicate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Not a store page, or no usable name on it
    InvalidImage(String),
    /// The recognizer failed
    OcrFailure(String),
}

impl From<AnalysisError> for RejectReason {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::InvalidImage(msg) => RejectReason::InvalidImage(msg),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidImage(msg) => write!(f, "invalid image: {msg}"),
            RejectReason::OcrFailure(msg) => write!(f, "OCR failed: {msg}"),
        }
    }
}

/// Result of processing one screenshot
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// New store, relayed and recorded
    Relayed {
        name: String,
        record_id: i64,
        relay_ref: i64,
    },
    /// New store in dry-run mode; nothing was sent or recorded
    WouldRelay { name: String },
    /// Store already seen
    SkippedDuplicate { name: String, matched: String },
    /// Screenshot dropped before the duplicate check
    Rejected(RejectReason),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Relayed { name, record_id, relay_ref } => {
                write!(f, "relayed '{name}' (record {record_id}, message {relay_ref})")
            }
            Outcome::WouldRelay { name } => write!(f, "would relay '{name}' (dry run)"),
            Outcome::SkippedDuplicate { name, matched } => {
                write!(f, "skipped '{name}': duplicate of '{matched}'")
            }
            Outcome::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

/// Failures the caller has to deal with
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("relay failed: {0}")]
    RelayFailure(String),
}

/// Extraction and deduplication for one screenshot at a time
pub struct Pipeline<R, L> {
    recognizer: R,
    relay: L,
    database: StoreDatabase,
    config: PipelineConfig,
}

impl<R: TextRecognizer, L: Relay> Pipeline<R, L> {
    pub fn new(recognizer: R, relay: L, database: StoreDatabase, config: PipelineConfig) -> Self {
        let database = database.with_threshold(config.fuzzy_threshold);
        Self {
            recognizer,
            relay,
            database,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn database(&self) -> &StoreDatabase {
        &self.database
    }

    /// Run one screenshot through the pipeline
    pub fn process_image(&self, image: &InboundImage) -> Result<Outcome, PipelineError> {
        let name = match self.extract_name(image) {
            Ok(name) => name,
            Err(reason) => return Ok(Outcome::Rejected(reason)),
        };
        info!("Extracted store name: '{}'", name);

        if let Some(found) = self.database.is_duplicate(&name)? {
            info!(
                "Duplicate detected: '{}' matches existing '{}' ({:.1}%)",
                name, found.display_name, found.similarity
            );
            return Ok(Outcome::SkippedDuplicate {
                name,
                matched: found.display_name,
            });
        }

        if self.config.dry_run {
            info!("Dry run: '{}' is new and would be relayed (source {:?})", name, image.source_ref);
            return Ok(Outcome::WouldRelay { name });
        }

        let mode = self.relay_mode(image);
        debug!("Relaying '{}' via {:?}", name, mode);
        let receipt = self
            .relay
            .relay(image, mode)
            .map_err(|e| PipelineError::RelayFailure(format!("{e:#}")))?;

        let record_id = self
            .database
            .add_store(&name, image.source_ref, Some(receipt.message_id))?;

        Ok(Outcome::Relayed {
            name,
            record_id,
            relay_ref: receipt.message_id,
        })
    }

    fn extract_name(&self, image: &InboundImage) -> Result<String, RejectReason> {
        let texts = self
            .recognizer
            .recognize(&image.path)
            .map_err(|e| RejectReason::OcrFailure(format!("{e:#}")))?;
        debug!("{} recognized {} text region(s)", self.recognizer.name(), texts.len());

        analysis::validate(&texts, &self.config.validation_keywords)?;
        let name = analysis::extract(&texts, &self.config.ui_exclusion_keywords)?;
        Ok(name)
    }

    fn relay_mode(&self, image: &InboundImage) -> RelayMode {
        if self.config.keep_original_image || image.source_ref.is_none() {
            RelayMode::Upload
        } else {
            RelayMode::Forward
        }
    }
}

/// Log an outcome at the level it deserves
pub fn log_outcome(image: &InboundImage, outcome: &Result<Outcome, PipelineError>) {
    match outcome {
        Ok(o @ Outcome::Rejected(RejectReason::InvalidImage(_))) => warn!("{:?}: {}", image.path, o),
        Ok(o @ Outcome::Rejected(RejectReason::OcrFailure(_))) => error!("{:?}: {}", image.path, o),
        Ok(o) => info!("{:?}: {}", image.path, o),
        Err(e) => error!("{:?}: {}", image.path, e),
    }
}
