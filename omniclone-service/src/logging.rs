//! Process-wide tracing setup: console output on stderr plus an
//! append-mode run log in the config directory.
//!
//! The run log is reopened for every event, so rotating it while a run is
//! writing never leaves that run appending to the renamed backup.

use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::log_rotation;
use crate::paths;

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Directory holding `omniclone.log`; console-only when `None`.
    pub config_dir: Option<PathBuf>,
    pub verbose: bool,
    /// Started by the OS scheduler: plain, timestamp-free console output
    /// for the journal.
    pub service: bool,
}

impl LogOptions {
    fn default_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

/// `omniclone.log` as a tracing writer. Nothing is created until the first
/// event, and events are dropped while the config dir does not exist.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(config_dir: &Path) -> Self {
        Self {
            path: paths::log_path(config_dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct RunLogEntry<'a> {
    path: &'a Path,
}

impl<'a> MakeWriter<'a> for RunLog {
    type Writer = RunLogEntry<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogEntry { path: &self.path }
    }
}

impl Write for RunLogEntry<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match OpenOptions::new().create(true).append(true).open(self.path) {
            Ok(mut file) => {
                file.write_all(buf)?;
                Ok(buf.len())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(buf.len()),
            Err(err) => Err(err),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default level.
///
/// Calling this twice is harmless: the second subscriber is discarded.
/// Returns the run log path when file logging is enabled.
pub fn init(options: &LogOptions) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_directive()));

    let console = if options.service {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .without_time()
            .with_writer(io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_ansi(io::stderr().is_terminal())
            .with_writer(io::stderr)
            .boxed()
    };

    let run_log = options.config_dir.as_deref().map(RunLog::new);
    let log_path = run_log.as_ref().map(|log| log.path().to_path_buf());
    let file_layer = run_log.map(|log| {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(log)
            .boxed()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init();

    log_path
}

/// Rotate the run log under `config_dir`. Meant to run while the run
/// lock is held; failures are logged and never block the run.
pub fn rotate(config_dir: &Path) {
    match log_rotation::rotate_run_log(config_dir) {
        Ok(true) => tracing::debug!("rotated previous run log"),
        Ok(false) => {}
        Err(err) => tracing::warn!(error = %err, "log rotation failed"),
    }
}
