//! Precomputed OCR results
//!
//! Reads `<image>.ocr.json` next to the image, in the EasyOCR layout:
//! `[[[x, y], [x, y], [x, y], [x, y]], "text", confidence]` per entry.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::ocr::{Point, RecognizedText, TextRecognizer};

type SidecarEntry = ([[f32; 2]; 4], String, f32);

/// Recognizer that loads results saved by an external OCR run
#[derive(Debug, Clone, Default)]
pub struct SidecarRecognizer;

/// Location of the results file for `image`
pub fn sidecar_path(image: &Path) -> PathBuf {
    let mut name = OsString::from(image.as_os_str());
    name.push(".ocr.json");
    PathBuf::from(name)
}

/// Parse sidecar JSON
pub fn parse_sidecar(json: &str) -> Result<Vec<RecognizedText>> {
    let entries: Vec<SidecarEntry> = serde_json::from_str(json).context("Invalid OCR sidecar JSON")?;
    Ok(entries
        .into_iter()
        .map(|(quad, text, confidence)| RecognizedText::new(quad.map(Point::from), text, confidence))
        .collect())
}

impl TextRecognizer for SidecarRecognizer {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn recognize(&self, path: &Path) -> Result<Vec<RecognizedText>> {
        let sidecar = sidecar_path(path);
        let content = std::fs::read_to_string(&sidecar)
            .with_context(|| format!("Failed to read OCR sidecar {:?}", sidecar))?;
        parse_sidecar(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"[
        [[[0, 0], [50, 0], [50, 30], [0, 30]], "Following", 0.98],
        [[[0, 40], [200, 40], [200, 120], [0, 120]], "Nike Store", 0.95]
    ]"#;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/tmp/shot.jpg")),
            PathBuf::from("/tmp/shot.jpg.ocr.json")
        );
    }

    #[test]
    fn test_parse_sidecar() {
        let texts = parse_sidecar(SAMPLE).unwrap();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1].text, "Nike Store");
        assert!((texts[1].height() - 80.0).abs() < 0.01);
        assert!((texts[0].confidence - 0.98).abs() < 0.001);
    }

    #[test]
    fn test_parse_sidecar_rejects_bad_shape() {
        assert!(parse_sidecar(r#"[["Nike Store", 0.9]]"#).is_err());
    }

    #[test]
    fn test_recognize_reads_file() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("shot.png");
        std::fs::write(&image, b"not really an image").unwrap();
        std::fs::write(sidecar_path(&image), SAMPLE).unwrap();

        let texts = SidecarRecognizer.recognize(&image).unwrap();
        assert_eq!(texts[0].text, "Following");
    }

    #[test]
    fn test_recognize_missing_sidecar() {
        let dir = TempDir::new().unwrap();
        assert!(SidecarRecognizer.recognize(&dir.path().join("none.png")).is_err());
    }
}
