use std::path::PathBuf;

use thiserror::Error;

/// Error surface for scheduler integration and logging setup.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external scheduler tool ran and reported failure.
    #[error("{program} failed (status {status}): {output}")]
    Command {
        program: String,
        status: String,
        output: String,
    },

    #[error("{0}")]
    Unsupported(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ServiceError {
    ServiceError::Io {
        path: path.into(),
        source,
    }
}
