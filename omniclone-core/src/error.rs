//! Error types for omniclone-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading a configuration file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on load; includes file path and line context from serde_json.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required configuration file did not exist.
    #[error("required file not found at {path}")]
    NotFound { path: PathBuf },

    /// A key under `tasks` is neither `bisync` nor `backup`.
    #[error("unknown mode '{mode}'; expected: bisync, backup")]
    UnknownMode { mode: String },

    /// A target omitted `src` or `dst`.
    #[error("target '{target}' ({mode}) is missing required field '{field}'")]
    MissingField {
        mode: String,
        target: String,
        field: &'static str,
    },

    /// A global setting has a value the orchestrator cannot use.
    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// `dirs::home_dir()` / `dirs::config_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
