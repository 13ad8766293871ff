//! Shared "run now" entrypoint used by the CLI and by scheduler-triggered
//! runs.
//!
//! Loads the configuration for a scope, wires the production collaborators
//! (connectivity probe from settings, child-process executor, system lock
//! root) and hands off to [`TaskRunner`].

use std::path::{Path, PathBuf};

use omniclone_core::{config, paths, Config};

use crate::connectivity::{gate_from_settings, AlwaysAvailable, ConnectivityGate};
use crate::executor::{Executor, ProcessExecutor};
use crate::invocation::Invocation;
use crate::lock::LockManager;
use crate::runner::{default_search_dirs, RunSummary, TaskRunner};
use crate::SyncError;

/// Who started the run. Only changes log wording, never orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    #[default]
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub trigger: Trigger,
    /// Lock root; the system temp dir when `None`.
    pub lock_root: Option<PathBuf>,
    /// Skip the connectivity probe regardless of settings.
    pub skip_connectivity: bool,
    /// Runs with the config dir once the lock is held.
    pub on_lock_held: Option<fn(&Path)>,
}

impl RunOptions {
    fn lock_manager(&self) -> LockManager {
        match &self.lock_root {
            Some(root) => LockManager::new(root),
            None => LockManager::system(),
        }
    }
}

/// Load the scope at `config_dir` and run it with the production executor.
pub fn run(config_dir: &Path, options: &RunOptions) -> Result<RunSummary, SyncError> {
    let config = config::load_at(config_dir)?;
    run_with(&config, options, &mut ProcessExecutor)
}

/// Run an already-loaded configuration with a caller-supplied executor.
pub fn run_with(
    config: &Config,
    options: &RunOptions,
    executor: &mut dyn Executor,
) -> Result<RunSummary, SyncError> {
    match options.trigger {
        Trigger::Manual => tracing::info!("manual run for {}", config.config_dir.display()),
        Trigger::Scheduled => tracing::info!("scheduled run for {}", config.config_dir.display()),
    }

    let mut runner = runner_for(config, options)?;
    if let Some(hook) = options.on_lock_held {
        runner = runner.on_lock_held(hook);
    }
    let gate: Box<dyn ConnectivityGate> = if options.skip_connectivity {
        Box::new(AlwaysAvailable)
    } else {
        gate_from_settings(&config.settings.connectivity)
    };
    let summary = runner.run(gate.as_ref(), executor)?;
    tracing::info!("run finished: {}", summary.headline());
    Ok(summary)
}

/// Invocations a run would execute right now.
pub fn plan(config_dir: &Path, options: &RunOptions) -> Result<Vec<Invocation>, SyncError> {
    let config = config::load_at(config_dir)?;
    runner_for(&config, options)?.plan()
}

fn runner_for<'a>(config: &'a Config, options: &RunOptions) -> Result<TaskRunner<'a>, SyncError> {
    let home = paths::home_dir()?;
    Ok(TaskRunner::new(
        config,
        default_search_dirs(&config.config_dir),
        options.lock_manager(),
        home,
    ))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::runner::RunStatus;

    fn scope(config: &str) -> TempDir {
        let dir = TempDir::new().expect("config dir");
        fs::write(dir.path().join(config::CONFIG_FILE), config).expect("config");
        fs::write(dir.path().join(config::FLAGS_FILE), "{}").expect("flags");
        dir
    }

    #[test]
    fn run_with_no_targets_completes_cleanly() {
        let dir = scope(r#"{"connectivity": {"method": "none"}}"#);
        let locks = TempDir::new().expect("locks");
        let options = RunOptions {
            lock_root: Some(locks.path().to_path_buf()),
            ..RunOptions::default()
        };
        let summary = run(dir.path(), &options).expect("run");
        assert_eq!(summary.status, RunStatus::Completed);
        assert!(summary.outcomes.is_empty());
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn missing_config_is_config_error() {
        let dir = TempDir::new().expect("empty dir");
        let err = run(dir.path(), &RunOptions::default()).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)), "got: {err}");
    }

    #[test]
    fn plan_lists_only_enabled_targets() {
        let dir = scope(
            r#"{"tasks": {"backup": {
                "on":  {"src": "/data/on",  "dst": "r:on"},
                "off": {"src": "/data/off", "dst": "r:off", "disabled": true}
            }}}"#,
        );
        let plan = plan(dir.path(), &RunOptions::default()).expect("plan");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].target.0, "on");
        assert_eq!(plan[0].args[0], "sync");
    }
}
