//! Screenshot signature check
//!
//! Target screenshots always show at least one of a few UI labels. Anything
//! else is a wrong capture and is rejected before the duplicate check.

use super::AnalysisError;
use crate::vision::RecognizedText;

/// Labels that identify a store page screenshot
pub const DEFAULT_VALIDATION_KEYWORDS: [&str; 3] = ["Following", "Sold", "Items"];

/// Confirm that the recognized text carries the expected UI signature.
///
/// All texts are joined with single spaces and searched case-insensitively
/// for any of `keywords`.
pub fn validate<S: AsRef<str>>(texts: &[RecognizedText], keywords: &[S]) -> Result<(), AnalysisError> {
    if texts.is_empty() {
        return Err(AnalysisError::InvalidImage("no text detected in image".to_string()));
    }

    let all_text = texts
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let found = keywords
        .iter()
        .any(|kw| all_text.contains(&kw.as_ref().to_lowercase()));

    if !found {
        let expected: Vec<&str> = keywords.iter().map(|k| k.as_ref()).collect();
        return Err(AnalysisError::InvalidImage(format!(
            "image does not contain any required keyword: {:?}",
            expected
        )));
    }

    Ok(())
}
