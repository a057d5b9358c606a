//! Screenshot Analysis
//!
//! Decides whether recognized text comes from a store page and which text
//! region is the store name.

pub mod extraction;
pub mod normalize;
pub mod similarity;
pub mod validation;

use thiserror::Error;

pub use extraction::{extract, DEFAULT_UI_EXCLUSION_KEYWORDS};
pub use normalize::{normalize_display, normalize_for_match};
pub use validation::{validate, DEFAULT_VALIDATION_KEYWORDS};

/// Why a screenshot could not yield a store name
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
}
