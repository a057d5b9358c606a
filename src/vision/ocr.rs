//! OCR result types and the recognizer seam
//!
//! Recognizers are black boxes: anything that turns an image file into a
//! list of text boxes can drive the pipeline.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A corner of a text bounding quadrilateral, in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

/// Single text region produced by a recognizer
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    /// Corners in order: top-left, top-right, bottom-right, bottom-left
    pub quad: [Point; 4],
    /// Recognized text
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl RecognizedText {
    pub fn new(quad: [Point; 4], text: impl Into<String>, confidence: f32) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence,
        }
    }

    /// Build from an axis-aligned box (x, y, width, height)
    pub fn from_bounds(bounds: (f32, f32, f32, f32), text: impl Into<String>, confidence: f32) -> Self {
        let (x, y, w, h) = bounds;
        Self::new(
            [
                Point::new(x, y),
                Point::new(x + w, y),
                Point::new(x + w, y + h),
                Point::new(x, y + h),
            ],
            text,
            confidence,
        )
    }

    /// Vertical extent of the box, used as a font size proxy.
    ///
    /// Mean of the (bottom-right - top-left) and (bottom-left - top-right)
    /// vertical spans. Skewed boxes are not corrected.
    pub fn height(&self) -> f32 {
        let [p0, p1, p2, p3] = self.quad;
        ((p2.y - p0.y) + (p3.y - p1.y)) / 2.0
    }
}

/// Turns an image file into recognized text regions
pub trait TextRecognizer {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Run recognition on the image at `path`
    fn recognize(&self, path: &Path) -> Result<Vec<RecognizedText>>;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn recognize(&self, path: &Path) -> Result<Vec<RecognizedText>> {
        (**self).recognize(path)
    }
}
