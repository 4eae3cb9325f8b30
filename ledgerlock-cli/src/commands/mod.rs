//! CLI command implementations

pub mod config;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use ledgerlock_core::LedgerlockContext;

/// Get the ledgerlock directory from environment or default
pub fn get_ledgerlock_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LEDGERLOCK_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".ledgerlock"))
}

/// Build a context from the settings in the ledgerlock directory
///
/// The directory is not created here; a missing settings file means defaults.
pub fn get_context() -> Result<LedgerlockContext> {
    let dir = get_ledgerlock_dir()?;
    LedgerlockContext::new(&dir)
        .with_context(|| format!("Failed to load ledgerlock settings from {:?}", dir))
}
