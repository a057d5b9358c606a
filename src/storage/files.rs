//! Screenshot file housekeeping
//!
//! Downloads land in scoped temporary files that delete themselves when
//! dropped. With retention enabled, relayed screenshots are moved into the
//! image directory instead.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const TEMP_PREFIX: &str = "photo_";

/// Temp and retained image locations
#[derive(Debug, Clone)]
pub struct ImageFiles {
    temp_dir: PathBuf,
    image_dir: PathBuf,
}

impl ImageFiles {
    /// Create both directories if missing
    pub fn new(temp_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Result<Self> {
        let files = Self {
            temp_dir: temp_dir.into(),
            image_dir: image_dir.into(),
        };
        std::fs::create_dir_all(&files.temp_dir)
            .with_context(|| format!("Failed to create temp directory {:?}", files.temp_dir))?;
        std::fs::create_dir_all(&files.image_dir)
            .with_context(|| format!("Failed to create image directory {:?}", files.image_dir))?;
        Ok(files)
    }

    /// New empty temp file for a message's photo. Removed on drop.
    pub fn temp_file(&self, message_id: i64, extension: &str) -> Result<NamedTempFile> {
        let file = tempfile::Builder::new()
            .prefix(&format!("{TEMP_PREFIX}{message_id}_"))
            .suffix(&format!(".{extension}"))
            .tempfile_in(&self.temp_dir)
            .with_context(|| format!("Failed to create temp file in {:?}", self.temp_dir))?;
        debug!("Created temp file {:?}", file.path());
        Ok(file)
    }

    /// Move a downloaded photo into permanent storage
    pub fn retain(&self, file: NamedTempFile, message_id: i64) -> Result<PathBuf> {
        let extension = file
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_string();
        let target = self.image_dir.join(format!("{TEMP_PREFIX}{message_id}.{extension}"));

        // persist() is a rename and fails across filesystems
        match file.persist(&target) {
            Ok(_) => {}
            Err(err) => {
                std::fs::copy(err.file.path(), &target)
                    .with_context(|| format!("Failed to retain image at {:?}", target))?;
            }
        }

        info!("Retained screenshot at {:?}", target);
        Ok(target)
    }

    /// Remove leftovers from an earlier run that did not shut down cleanly
    pub fn purge_temp_dir(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.temp_dir)? {
            let entry = entry?;
            let path = entry.path();
            let is_ours = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(TEMP_PREFIX));
            if !is_ours || !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to delete {:?}: {}", path, e),
            }
        }
        if removed > 0 {
            info!("Removed {} stale temp file(s) from {:?}", removed, self.temp_dir);
        }
        Ok(removed)
    }
}
