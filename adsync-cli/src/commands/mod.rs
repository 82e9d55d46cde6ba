pub mod accounts;
pub mod check_config;
pub mod daemon;
pub mod once;
pub mod service;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adsync_core::SyncConfig;

/// Load and validate the config for commands that touch the directory or
/// the identity files.
pub(crate) fn load_config(path: &Path) -> Result<Arc<SyncConfig>> {
    let config = SyncConfig::load_at(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok(Arc::new(config))
}
