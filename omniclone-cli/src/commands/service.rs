//! `omniclone install|uninstall|status`: OS scheduler registration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use omniclone_core::Config;
use omniclone_service::{platform_bridge, SchedulerBridge, ServiceSpec, ServiceStatus};
use omniclone_sync::lock::{LockManager, LockOwner, LockScope};

use super::{print_json, Globals};

#[derive(Args, Debug)]
pub struct InstallArgs {}

#[derive(Args, Debug)]
pub struct UninstallArgs {}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct LockStatus {
    path: PathBuf,
    held: bool,
    owner: Option<LockOwner>,
}

#[derive(Serialize)]
struct StatusReport {
    config_dir: PathBuf,
    scheduler: ServiceStatus,
    lock: LockStatus,
}

/// Config loaded with its directory made absolute, since the scheduler
/// starts the binary from an unrelated working directory.
fn load_absolute(globals: &Globals) -> Result<Config> {
    let mut config = globals.load_config()?;
    config.config_dir = config.config_dir.canonicalize().with_context(|| {
        format!("failed to resolve config directory {}", config.config_dir.display())
    })?;
    Ok(config)
}

fn bridge() -> Result<Box<dyn SchedulerBridge>> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    platform_bridge(&home).context("no scheduler integration for this platform")
}

fn spec_for(config: &Config) -> Result<ServiceSpec> {
    let program = std::env::current_exe().context("could not locate the omniclone binary")?;
    Ok(ServiceSpec::from_config(config, program))
}

impl InstallArgs {
    pub fn run(self, globals: &Globals) -> Result<u8> {
        let config = load_absolute(globals)?;
        let spec = spec_for(&config)?;
        let bridge = bridge()?;

        let files = bridge
            .install(&spec)
            .with_context(|| format!("failed to install {} service", bridge.backend()))?;
        println!(
            "{} installed '{}' ({}, every {} min)",
            "■".green().bold(),
            spec.name,
            bridge.backend(),
            spec.interval_minutes()
        );
        for file in files {
            println!("  ✎  {}", file.display());
        }
        Ok(0)
    }
}

impl UninstallArgs {
    pub fn run(self, globals: &Globals) -> Result<u8> {
        let config = load_absolute(globals)?;
        let spec = spec_for(&config)?;
        let bridge = bridge()?;

        bridge
            .uninstall(&spec)
            .with_context(|| format!("failed to uninstall {} service", bridge.backend()))?;
        println!("uninstalled '{}' ({})", spec.name, bridge.backend());
        Ok(0)
    }
}

impl StatusArgs {
    pub fn run(self, globals: &Globals) -> Result<u8> {
        let config = load_absolute(globals)?;
        let spec = spec_for(&config)?;
        let bridge = bridge()?;
        let scheduler = bridge
            .status(&spec)
            .with_context(|| format!("failed to query {} status", bridge.backend()))?;

        let locks = match &globals.lock_dir {
            Some(root) => LockManager::new(root),
            None => LockManager::system(),
        };
        let scope = LockScope::new(&config.settings.service_name, &config.config_dir);
        let inspected = locks.inspect(&scope);
        let lock = LockStatus {
            path: locks.lock_path(&scope),
            held: inspected.is_some(),
            owner: inspected.flatten(),
        };

        let report = StatusReport {
            config_dir: config.config_dir.clone(),
            scheduler,
            lock,
        };

        if self.json {
            print_json(&report)?;
        } else {
            print_report(&report);
        }
        Ok(0)
    }
}

fn print_report(report: &StatusReport) {
    println!("config:    {}", report.config_dir.display());

    let scheduler = &report.scheduler;
    if scheduler.installed {
        println!(
            "scheduler: {} installed ({})",
            "■".green().bold(),
            scheduler.backend
        );
        for file in &scheduler.files {
            println!("           {}", file.display());
        }
    } else {
        println!(
            "scheduler: {} not installed ({})",
            "■".bright_black().bold(),
            scheduler.backend
        );
    }

    match (&report.lock.held, &report.lock.owner) {
        (false, _) => println!("lock:      free"),
        (true, Some(owner)) => println!(
            "lock:      {} held by pid {} since {}",
            "■".yellow().bold(),
            owner.pid,
            owner.started_at.to_rfc3339()
        ),
        (true, None) => println!("lock:      {} held (owner unknown)", "■".yellow().bold()),
    }

    if !scheduler.details.is_empty() {
        println!();
        println!("{}", scheduler.details);
    }
}
