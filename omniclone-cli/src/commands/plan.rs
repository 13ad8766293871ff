//! `omniclone plan`: the invocations a run would execute right now.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use omniclone_sync::pipeline;

use super::{print_json, Globals};

/// Arguments for `omniclone plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Print the planned invocations as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub fn run(self, globals: &Globals) -> Result<u8> {
        let config_dir = globals.config_dir()?;
        let plan = pipeline::plan(&config_dir, &globals.run_options())
            .with_context(|| format!("failed to plan run for {}", config_dir.display()))?;

        if self.json {
            print_json(&plan)?;
            return Ok(0);
        }

        if plan.is_empty() {
            println!("No enabled targets in {}.", config_dir.display());
            return Ok(0);
        }

        for invocation in &plan {
            println!(
                "{} [{}] {} {} {}",
                invocation.target.to_string().bold(),
                invocation.mode,
                invocation.src(),
                invocation.direction(),
                invocation.dst()
            );
            println!("  $ {invocation}");
        }
        Ok(0)
    }
}
