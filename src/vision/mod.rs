//! Vision/OCR Layer
//!
//! Turns screenshot files into recognized text regions.
//! Supports multiple backends:
//! - Tesseract executable (TSV output)
//! - Precomputed sidecar JSON files

pub mod ocr;
pub mod preprocess;
pub mod sidecar;
pub mod tesseract;

use tracing::info;

use crate::config::{RecognizerBackend, RecognizerSettings};

pub use ocr::{RecognizedText, TextRecognizer};
pub use preprocess::CroppingRecognizer;
pub use sidecar::SidecarRecognizer;
pub use tesseract::TesseractRecognizer;

/// Build the recognizer selected in the settings
pub fn build_recognizer(settings: &RecognizerSettings) -> Box<dyn TextRecognizer> {
    let recognizer: Box<dyn TextRecognizer> = match settings.backend {
        RecognizerBackend::Tesseract => {
            let tesseract = TesseractRecognizer::new(
                settings.tesseract_path.clone(),
                settings.language.clone(),
                settings.psm,
            );
            match settings.crop_top_fraction {
                Some(fraction) => Box::new(CroppingRecognizer::new(tesseract, fraction)),
                None => Box::new(tesseract),
            }
        }
        // Sidecar results describe the full image, so cropping does not apply
        RecognizerBackend::Sidecar => Box::new(SidecarRecognizer),
    };

    info!(
        "Using {} recognizer (crop: {:?})",
        recognizer.name(),
        settings.crop_top_fraction
    );
    recognizer
}
