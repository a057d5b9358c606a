//! Storage Layer
//!
//! Store history in SQLite, plus the on-disk locations the relay uses for
//! its database, downloads and retained screenshots.

pub mod database;
pub mod files;

use anyhow::Result;
use std::path::PathBuf;

pub use database::{StoreDatabase, StoreError};

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "storerelay", "store-relay")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
