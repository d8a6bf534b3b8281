use anyhow::{Context, Result};
use std::path::PathBuf;

/// Directory holding the devcache config file.
///
/// Not created here; [`crate::config::Config::save_to_path`] creates it on
/// first write.
pub fn devcache_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to determine user config directory")?
        .join("devcache");
    Ok(config_dir)
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_user_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}
