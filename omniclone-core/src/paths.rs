//! Path helpers shared by the CLI and the orchestrator.
//!
//! Functions that depend on the environment have an `_at` form taking the
//! home/config directory explicitly; tests always use the `_at` form.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const CONFIG_DIR_ENV: &str = "OMNICLONE_CONFIG_DIR";
const APP_DIR: &str = "omniclone";

/// `<platform config dir>/omniclone`, e.g. `~/.config/omniclone` on Linux.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or(ConfigError::HomeNotFound)
}

/// Replace a leading `~` with `home`. Other paths are returned unchanged.
pub fn expand_home_at(raw: &str, home: &Path) -> PathBuf {
    if raw == "~" {
        return home.to_path_buf();
    }
    match raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        Some(rest) => home.join(rest),
        None => PathBuf::from(raw),
    }
}

/// Expand `~` and anchor relative paths at `base`.
pub fn resolve_local_at(raw: &str, home: &Path, base: &Path) -> PathBuf {
    let expanded = expand_home_at(raw, home);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

pub fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
