//! Tesseract backend
//!
//! Runs the `tesseract` executable with TSV output and folds word rows into
//! one text box per line.

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::ocr::{RecognizedText, TextRecognizer};

/// Tesseract executable wrapper
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    executable: String,
    language: String,
    psm: u8,
}

impl TesseractRecognizer {
    pub fn new(executable: impl Into<String>, language: impl Into<String>, psm: u8) -> Self {
        Self {
            executable: executable.into(),
            language: language.into(),
            psm,
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, path: &Path) -> Result<Vec<RecognizedText>> {
        let output = Command::new(&self.executable)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .with_context(|| format!("Failed to run {}", self.executable))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let lines = parse_tsv_output(&tsv)?;
        debug!("Tesseract found {} line(s) in {:?}", lines.len(), path);
        Ok(lines)
    }
}

/// Words collected for one (block, paragraph, line)
#[derive(Default)]
struct LineAccumulator {
    words: Vec<String>,
    conf_sum: f32,
    left: f32,
    top: f32,
    right: f32,
    bottom: f32,
}

impl LineAccumulator {
    fn push(&mut self, text: &str, conf: f32, left: f32, top: f32, width: f32, height: f32) {
        if self.words.is_empty() {
            self.left = left;
            self.top = top;
            self.right = left + width;
            self.bottom = top + height;
        } else {
            self.left = self.left.min(left);
            self.top = self.top.min(top);
            self.right = self.right.max(left + width);
            self.bottom = self.bottom.max(top + height);
        }
        self.words.push(text.to_string());
        self.conf_sum += conf;
    }

    fn finish(self) -> RecognizedText {
        let confidence = (self.conf_sum / self.words.len() as f32 / 100.0).clamp(0.0, 1.0);
        RecognizedText::from_bounds(
            (self.left, self.top, self.right - self.left, self.bottom - self.top),
            self.words.join(" "),
            confidence,
        )
    }
}

/// Parse Tesseract TSV into one [`RecognizedText`] per line, in reading order.
///
/// TSV fields: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text.
pub fn parse_tsv_output(tsv: &str) -> Result<Vec<RecognizedText>> {
    let mut lines: BTreeMap<(u32, u32, u32, u32), LineAccumulator> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // Level 5 = word
        if fields[0] != "5" {
            continue;
        }

        let text = fields[11].trim();
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        let num = |i: usize| -> Result<u32> {
            fields[i]
                .parse()
                .with_context(|| format!("Bad TSV field {} in row: {}", i, row))
        };
        let key = (num(1)?, num(2)?, num(3)?, num(4)?);
        let (left, top, width, height) = (num(6)?, num(7)?, num(8)?, num(9)?);

        lines.entry(key).or_default().push(
            text,
            conf,
            left as f32,
            top as f32,
            width as f32,
            height as f32,
        );
    }

    Ok(lines.into_values().map(LineAccumulator::finish).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_groups_words_into_lines() {
        let input = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t",
            "4\t1\t1\t1\t1\t0\t10\t40\t200\t80\t-1\t",
            "5\t1\t1\t1\t1\t1\t10\t40\t90\t80\t96.5\tNike",
            "5\t1\t1\t1\t1\t2\t110\t42\t100\t78\t93.5\tStore",
            "5\t1\t2\t1\t1\t1\t10\t150\t120\t30\t91\tFollowing",
        ]);

        let lines = parse_tsv_output(&input).unwrap();
        assert_eq!(lines.len(), 2);

        assert_eq!(lines[0].text, "Nike Store");
        assert!((lines[0].height() - 80.0).abs() < 0.01);
        assert!((lines[0].confidence - 0.95).abs() < 0.001);
        assert_eq!(lines[0].quad[0].x, 10.0);
        assert_eq!(lines[0].quad[2].x, 210.0);

        assert_eq!(lines[1].text, "Following");
        assert!((lines[1].height() - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_skips_empty_and_unconfident_words() {
        let input = tsv(&[
            "5\t1\t1\t1\t1\t1\t10\t40\t90\t80\t-1\t ",
            "5\t1\t1\t1\t1\t2\t10\t40\t90\t80\t-1\tghost",
            "5\t1\t1\t1\t2\t1\t10\t140\t90\t20\t88\tSold",
        ]);

        let lines = parse_tsv_output(&input).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Sold");
    }

    #[test]
    fn test_short_rows_ignored() {
        let input = tsv(&["5\t1\t1", ""]);
        assert!(parse_tsv_output(&input).unwrap().is_empty());
    }

    #[test]
    fn test_bad_numeric_field_is_error() {
        let input = tsv(&["5\t1\t1\t1\t1\t1\tx\t40\t90\t80\t90\tword"]);
        assert!(parse_tsv_output(&input).is_err());
    }

    #[test]
    fn test_missing_executable_is_error() {
        let recognizer = TesseractRecognizer::new("definitely-not-tesseract-binary", "eng", 11);
        assert!(recognizer.recognize(Path::new("missing.png")).is_err());
    }
}
