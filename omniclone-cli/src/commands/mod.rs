pub mod plan;
pub mod run;
pub mod service;

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use omniclone_core::paths::{self, CONFIG_DIR_ENV};
use omniclone_core::{config, Config};
use omniclone_sync::lock::LOCK_DIR_ENV;
use omniclone_sync::pipeline::RunOptions;

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct Globals {
    /// Directory holding config.json, flags.json and filter files.
    #[arg(long, global = true, env = CONFIG_DIR_ENV)]
    pub config_dir: Option<PathBuf>,

    /// Directory for the run lock (defaults to the system temp dir).
    #[arg(long, global = true, env = LOCK_DIR_ENV)]
    pub lock_dir: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

impl Globals {
    pub fn config_dir(&self) -> Result<PathBuf> {
        match &self.config_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_config_dir().context("could not determine config directory"),
        }
    }

    pub fn load_config(&self) -> Result<Config> {
        let dir = self.config_dir()?;
        config::load_at(&dir)
            .with_context(|| format!("failed to load configuration from {}", dir.display()))
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            lock_root: self.lock_dir.clone(),
            ..RunOptions::default()
        }
    }
}

pub(crate) fn interactive() -> bool {
    std::io::stdout().is_terminal()
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}
