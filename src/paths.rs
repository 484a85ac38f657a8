//! Default on-disk location for the subscription document.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const DATA_DIR: &str = ".subwatch";
const STORE_FILENAME: &str = "store.json";

/// Returns the default store path, `~/.subwatch/store.json`, creating the
/// data directory if it doesn't exist.
pub fn default_store_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let data_dir = home.join(DATA_DIR);
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join(STORE_FILENAME))
}
