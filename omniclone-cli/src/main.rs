//! omniclone: run declared rclone sync/bisync targets on a schedule.
//!
//! # Usage
//!
//! ```text
//! omniclone [--config-dir <dir>] [--lock-dir <dir>] [--verbose] <command>
//!
//! omniclone run [--service] [--json]
//! omniclone plan [--json]
//! omniclone install
//! omniclone uninstall
//! omniclone status [--json]
//! ```
//!
//! Exit codes: `0` success (including skipped runs), `1` a target failed,
//! `2` another run holds the lock, `3` fatal error.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{
    plan::PlanArgs,
    run::RunArgs,
    service::{InstallArgs, StatusArgs, UninstallArgs},
    Globals,
};
use omniclone_service::{logging, LogOptions};

const FATAL_EXIT: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "omniclone",
    version,
    about = "Run rclone sync and bisync targets from one configuration",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every enabled target once.
    Run(RunArgs),

    /// Show the commands a run would execute, without running them.
    Plan(PlanArgs),

    /// Register the periodic run with the OS scheduler.
    Install(InstallArgs),

    /// Remove the periodic run from the OS scheduler.
    Uninstall(UninstallArgs),

    /// Show scheduler registration and lock state.
    Status(StatusArgs),
}

impl Cli {
    fn log_options(&self) -> anyhow::Result<LogOptions> {
        let mut options = LogOptions {
            verbose: self.globals.verbose,
            ..LogOptions::default()
        };
        if let Commands::Run(args) = &self.command {
            options.config_dir = Some(self.globals.config_dir()?);
            options.service = args.service;
        }
        Ok(options)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if !commands::interactive() {
        colored::control::set_override(false);
    }

    match cli.log_options() {
        Ok(options) => {
            logging::init(&options);
        }
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            return ExitCode::from(FATAL_EXIT);
        }
    }

    let result = match cli.command {
        Commands::Run(args) => args.run(&cli.globals),
        Commands::Plan(args) => args.run(&cli.globals),
        Commands::Install(args) => args.run(&cli.globals),
        Commands::Uninstall(args) => args.run(&cli.globals),
        Commands::Status(args) => args.run(&cli.globals),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(FATAL_EXIT)
        }
    }
}
