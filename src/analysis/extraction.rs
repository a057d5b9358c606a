//! Store name extraction
//!
//! The store name is rendered in the largest font on the page. UI labels
//! are excluded by exact match only, so a name that merely contains one
//! (e.g. "Items & More") is still eligible.

use tracing::debug;

use super::normalize::normalize_display;
use super::AnalysisError;
use crate::vision::RecognizedText;

/// UI chrome that must never be picked as the store name
pub const DEFAULT_UI_EXCLUSION_KEYWORDS: [&str; 7] =
    ["Following", "Sold", "Items", "Follow", "Message", "Share", "More"];

/// Texts shorter than this (in characters, after trimming) are ignored
const MIN_CANDIDATE_CHARS: usize = 2;

/// A text region that survived filtering
#[derive(Debug, Clone, PartialEq)]
pub struct NameCandidate {
    pub text: String,
    pub height: f32,
    pub confidence: f32,
}

/// Filter recognized texts down to name candidates, tallest first.
///
/// Ties keep recognition order.
pub fn rank_candidates<S: AsRef<str>>(texts: &[RecognizedText], exclusions: &[S]) -> Vec<NameCandidate> {
    let mut candidates: Vec<NameCandidate> = texts
        .iter()
        .filter_map(|t| {
            let trimmed = t.text.trim();
            if trimmed.chars().count() < MIN_CANDIDATE_CHARS {
                return None;
            }
            if exclusions.iter().any(|kw| kw.as_ref() == trimmed) {
                return None;
            }
            Some(NameCandidate {
                text: trimmed.to_string(),
                height: t.height(),
                confidence: t.confidence,
            })
        })
        .collect();

    // sort_by is stable
    candidates.sort_by(|a, b| b.height.total_cmp(&a.height));
    candidates
}

/// Pick the store name from a screenshot's recognized text
pub fn extract<S: AsRef<str>>(texts: &[RecognizedText], exclusions: &[S]) -> Result<String, AnalysisError> {
    if texts.is_empty() {
        return Err(AnalysisError::InvalidImage("no text found in image".to_string()));
    }

    let candidates = rank_candidates(texts, exclusions);
    let Some(best) = candidates.first() else {
        return Err(AnalysisError::InvalidImage(
            "no valid store name candidates found".to_string(),
        ));
    };

    debug!(
        "Store name candidate '{}' (height {:.1}, confidence {:.2}) out of {}",
        best.text,
        best.height,
        best.confidence,
        candidates.len()
    );

    Ok(normalize_display(&best.text))
}
