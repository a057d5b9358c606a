//! Image preprocessing before recognition
//!
//! The store header sits at the top of the page; cropping to it keeps large
//! product text further down from outranking the store name.

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use super::ocr::{RecognizedText, TextRecognizer};

/// Keep the top `fraction` of the image. Coordinates are unchanged since the
/// origin stays at the top-left corner.
pub fn crop_top(image: &DynamicImage, fraction: f32) -> DynamicImage {
    let (width, height) = image.dimensions();
    let keep = ((height as f32 * fraction.clamp(0.0, 1.0)).ceil() as u32).clamp(1, height.max(1));
    image.crop_imm(0, 0, width, keep)
}

/// Wraps another recognizer and feeds it a cropped copy of each image
pub struct CroppingRecognizer<R> {
    inner: R,
    fraction: f32,
}

impl<R: TextRecognizer> CroppingRecognizer<R> {
    pub fn new(inner: R, fraction: f32) -> Self {
        Self { inner, fraction }
    }
}

impl<R: TextRecognizer> TextRecognizer for CroppingRecognizer<R> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn recognize(&self, path: &Path) -> Result<Vec<RecognizedText>> {
        let image = image::open(path).with_context(|| format!("Failed to decode image {:?}", path))?;
        let cropped = crop_top(&image, self.fraction);
        debug!(
            "Cropped {:?} from {}x{} to {}x{}",
            path,
            image.width(),
            image.height(),
            cropped.width(),
            cropped.height()
        );

        // Removed when dropped at the end of this call
        let temp = NamedTempFile::with_suffix(".png")?;
        cropped
            .save_with_format(temp.path(), image::ImageFormat::Png)
            .context("Failed to write cropped image")?;

        self.inner.recognize(temp.path())
    }
}
