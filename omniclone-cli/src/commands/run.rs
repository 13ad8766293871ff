//! `omniclone run`: one orchestrated pass over every enabled target.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use omniclone_service::logging;
use omniclone_sync::pipeline::{self, Trigger};
use omniclone_sync::{OutcomeResult, RunStatus, RunSummary, TargetOutcome};

use super::{interactive, print_json, Globals};

/// Arguments for `omniclone run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Started by the OS scheduler; plain log output and no summary table.
    #[arg(long)]
    pub service: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "target")]
    target: String,
    #[tabled(rename = "mode")]
    mode: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "exit")]
    exit: String,
    #[tabled(rename = "time")]
    time: String,
}

impl RunArgs {
    pub fn run(self, globals: &Globals) -> Result<u8> {
        let config = globals.load_config()?;
        let mut options = globals.run_options();
        options.on_lock_held = Some(logging::rotate);
        if self.service {
            options.trigger = Trigger::Scheduled;
        }

        let summary = pipeline::run_with(
            &config,
            &options,
            &mut omniclone_sync::ProcessExecutor,
        )?;

        if self.json {
            print_json(&summary)?;
        } else if !self.service {
            print_summary(&summary);
        }

        Ok(u8::try_from(summary.exit_code()).unwrap_or(u8::MAX))
    }
}

fn print_summary(summary: &RunSummary) {
    if let RunStatus::LockedOut { lock_path, owner } = &summary.status {
        let holder = match owner {
            Some(owner) => format!("pid {} since {}", owner.pid, owner.started_at.to_rfc3339()),
            None => "unknown owner".to_string(),
        };
        println!(
            "{} another run holds {} ({holder})",
            "■".yellow().bold(),
            lock_path.display()
        );
        return;
    }

    if !summary.outcomes.is_empty() && interactive() {
        let rows: Vec<OutcomeRow> = summary.outcomes.iter().map(outcome_row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    let indicator = if summary.exit_code() == 0 {
        "■".green().bold()
    } else {
        "■".red().bold()
    };
    println!("{indicator} {}", summary.headline());
}

fn outcome_row(outcome: &TargetOutcome) -> OutcomeRow {
    let result = match outcome.result {
        OutcomeResult::Succeeded => "ok".green().to_string(),
        OutcomeResult::Failed => "failed".red().to_string(),
        OutcomeResult::NotStarted => "not started".red().to_string(),
    };
    OutcomeRow {
        target: outcome.target.to_string(),
        mode: outcome.mode.to_string(),
        result,
        exit: outcome
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string()),
        time: format!("{:.1}s", outcome.duration.as_secs_f64()),
    }
}
