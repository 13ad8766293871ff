//! One orchestration pass over the configured targets.
//!
//! ```text
//! INIT -> LOCK_ACQUIRING -> LOCKED_OUT                               (terminal)
//!                        -> LOCK_HELD -> CONNECTIVITY_CHECK -> SKIPPED -> LOCK_RELEASED
//!                                                          -> EXECUTING -> LOCK_RELEASED
//! ```
//!
//! While executing, each enabled target goes through build, invoke and
//! record. A non-zero exit or a failed spawn is recorded and the loop moves
//! on; only filter-file errors abort the pass. The lock is released once on
//! every path out of [`TaskRunner::run`].

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use omniclone_core::{Config, Mode, Target, TargetName};

use crate::connectivity::{Connectivity, ConnectivityGate};
use crate::error::{LockError, SyncError};
use crate::executor::Executor;
use crate::filters::FilterResolver;
use crate::flags::FlagComposer;
use crate::invocation::Invocation;
use crate::lock::{LockHandle, LockManager, LockOwner, LockScope};

// ---------------------------------------------------------------------------
// Outcome records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    LockAcquiring,
    LockedOut,
    LockHeld,
    ConnectivityCheck,
    Skipped,
    Executing,
    LockReleased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    Succeeded,
    /// The tool ran and exited non-zero (or was killed).
    Failed,
    /// The tool could not be started.
    NotStarted,
}

/// Result of one executed target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetOutcome {
    pub target: TargetName,
    pub mode: Mode,
    pub result: OutcomeResult,
    pub exit_code: Option<i32>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetOutcome {
    pub fn succeeded(&self) -> bool {
        self.result == OutcomeResult::Succeeded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NoConnectivity,
    AlreadyRunning,
}

/// A target that produced no invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTarget {
    pub target: TargetName,
    pub mode: Mode,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NoConnectivity,
    LockedOut {
        lock_path: PathBuf,
        owner: Option<LockOwner>,
    },
}

/// Final result of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// `None` when the pass ended before the probe ran.
    pub connectivity: Option<Connectivity>,
    pub outcomes: Vec<TargetOutcome>,
    pub skipped: Vec<SkippedTarget>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Disabled targets plus targets short-circuited before execution.
    pub fn skipped(&self) -> usize {
        self.skipped.len()
    }

    /// Process exit code for schedulers: `2` when locked out, `1` when any
    /// target failed, `0` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::LockedOut { .. } => 2,
            _ if self.failed() > 0 => 1,
            _ => 0,
        }
    }

    /// One-line human summary.
    pub fn headline(&self) -> String {
        match &self.status {
            RunStatus::LockedOut { .. } => "skipped (already running)".to_owned(),
            RunStatus::NoConnectivity => "skipped (no connectivity)".to_owned(),
            RunStatus::Completed => format!(
                "{} succeeded, {} failed, {} skipped",
                self.succeeded(),
                self.failed(),
                self.skipped()
            ),
        }
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

/// Per-pass state. Created by [`TaskRunner::run`], never shared.
struct RunContext<'a> {
    config: &'a Config,
    state: RunState,
    lock: Option<LockHandle>,
    connectivity: Option<Connectivity>,
    outcomes: Vec<TargetOutcome>,
    skipped: Vec<SkippedTarget>,
}

impl<'a> RunContext<'a> {
    fn new(config: &'a Config) -> Self {
        Self {
            config,
            state: RunState::Init,
            lock: None,
            connectivity: None,
            outcomes: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!("run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn skip(&mut self, target: &Target, reason: SkipReason) {
        self.skipped.push(SkippedTarget {
            target: target.name().clone(),
            mode: target.mode(),
            reason,
        });
    }

    /// Mark every enabled target as skipped for `reason`; disabled ones keep
    /// their own reason.
    fn skip_all(&mut self, reason: SkipReason) {
        let config = self.config;
        for target in config.targets_in_order() {
            let why = if target.disabled {
                SkipReason::Disabled
            } else {
                reason
            };
            self.skip(target, why);
        }
    }

    fn release_lock(&mut self) {
        if let Some(mut handle) = self.lock.take() {
            handle.release();
            self.advance(RunState::LockReleased);
        }
    }

    fn finish(self, status: RunStatus, started_at: DateTime<Utc>, started: Instant) -> RunSummary {
        RunSummary {
            status,
            started_at,
            duration: started.elapsed(),
            connectivity: self.connectivity,
            outcomes: self.outcomes,
            skipped: self.skipped,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskRunner
// ---------------------------------------------------------------------------

/// Drives a pass for one configuration scope.
pub struct TaskRunner<'a> {
    config: &'a Config,
    resolver: FilterResolver,
    locks: LockManager,
    scope: LockScope,
    home: PathBuf,
    on_lock_held: Option<fn(&Path)>,
}

impl<'a> TaskRunner<'a> {
    pub fn new(
        config: &'a Config,
        search_dirs: Vec<PathBuf>,
        locks: LockManager,
        home: impl Into<PathBuf>,
    ) -> Self {
        let resolver =
            FilterResolver::new(search_dirs).skip_empty(config.settings.filters.skip_empty);
        let scope = LockScope::new(&config.settings.service_name, &config.config_dir);
        Self {
            config,
            resolver,
            locks,
            scope,
            home: home.into(),
            on_lock_held: None,
        }
    }

    /// Call `hook` with the config dir right after the lock is taken, for
    /// housekeeping that must not race another run.
    pub fn on_lock_held(mut self, hook: fn(&Path)) -> Self {
        self.on_lock_held = Some(hook);
        self
    }

    pub fn scope(&self) -> &LockScope {
        &self.scope
    }

    pub fn lock_path(&self) -> PathBuf {
        self.locks.lock_path(&self.scope)
    }

    /// Invocations every enabled target would get, without locking, probing
    /// or executing.
    pub fn plan(&self) -> Result<Vec<Invocation>, SyncError> {
        let composer = FlagComposer::new(&self.config.flags, &self.resolver);
        self.config
            .targets_in_order()
            .filter(|t| !t.disabled)
            .map(|t| self.build(&composer, t))
            .collect()
    }

    /// Run every enabled target once.
    ///
    /// `Ok` covers completed, locked-out and no-connectivity passes; `Err`
    /// is reserved for errors that abort the pass (lock directory
    /// uncreatable, unreadable filter file).
    pub fn run(
        &self,
        gate: &dyn ConnectivityGate,
        executor: &mut dyn Executor,
    ) -> Result<RunSummary, SyncError> {
        let started = Instant::now();
        let started_at = Utc::now();
        let mut ctx = RunContext::new(self.config);

        ctx.advance(RunState::LockAcquiring);
        match self.locks.acquire(&self.scope, &self.config.config_dir) {
            Ok(handle) => {
                ctx.lock = Some(handle);
                ctx.advance(RunState::LockHeld);
                if let Some(hook) = self.on_lock_held {
                    hook(&self.config.config_dir);
                }
            }
            Err(LockError::AlreadyLocked { path, owner }) => {
                match &owner {
                    Some(o) => tracing::warn!(
                        "another instance (pid {}) has been running since {}; if not, delete {}",
                        o.pid,
                        o.started_at.to_rfc3339(),
                        path.display()
                    ),
                    None => tracing::warn!(
                        "lock directory exists, another instance may be running; if not, delete {}",
                        path.display()
                    ),
                }
                ctx.advance(RunState::LockedOut);
                ctx.skip_all(SkipReason::AlreadyRunning);
                let status = RunStatus::LockedOut {
                    lock_path: path,
                    owner,
                };
                return Ok(ctx.finish(status, started_at, started));
            }
            Err(err) => return Err(err.into()),
        }

        let result = self.run_locked(&mut ctx, gate, executor);
        ctx.release_lock();
        let status = result?;
        Ok(ctx.finish(status, started_at, started))
    }

    fn run_locked(
        &self,
        ctx: &mut RunContext<'_>,
        gate: &dyn ConnectivityGate,
        executor: &mut dyn Executor,
    ) -> Result<RunStatus, SyncError> {
        ctx.advance(RunState::ConnectivityCheck);
        let connectivity = gate.check();
        ctx.connectivity = Some(connectivity);
        if connectivity == Connectivity::Unavailable {
            tracing::error!("no internet connection, skipping sync");
            ctx.advance(RunState::Skipped);
            ctx.skip_all(SkipReason::NoConnectivity);
            return Ok(RunStatus::NoConnectivity);
        }

        // Every invocation is built before the first one starts, so a bad
        // filter file aborts the pass with nothing executed.
        let composer = FlagComposer::new(&self.config.flags, &self.resolver);
        let mut planned = Vec::new();
        for target in self.config.targets_in_order() {
            let invocation = if target.disabled {
                None
            } else {
                Some(self.build(&composer, target)?)
            };
            planned.push((target, invocation));
        }

        ctx.advance(RunState::Executing);
        for (target, invocation) in planned {
            match invocation {
                Some(invocation) => {
                    let outcome = invoke(executor, &invocation);
                    ctx.outcomes.push(outcome);
                }
                None => {
                    tracing::info!("skipping disabled task: {} ({})", target.name(), target.mode());
                    ctx.skip(target, SkipReason::Disabled);
                }
            }
        }
        Ok(RunStatus::Completed)
    }

    fn build(&self, composer: &FlagComposer<'_>, target: &Target) -> Result<Invocation, SyncError> {
        let flags = composer.compose_for(target)?;
        Ok(Invocation::build(
            &self.config.settings.executable,
            target,
            flags,
            &self.home,
            &self.config.config_dir,
        ))
    }
}

fn invoke(executor: &mut dyn Executor, invocation: &Invocation) -> TargetOutcome {
    let mode = invocation.mode;
    tracing::info!(
        "starting {mode}: {} {} {}",
        invocation.src(),
        invocation.direction(),
        invocation.dst()
    );
    tracing::debug!("command: {invocation}");

    let started = Instant::now();
    let (result, exit_code, error) = match executor.execute(invocation) {
        Ok(report) if report.success() => {
            tracing::info!(
                "finished {mode}: {} {} {}",
                invocation.src(),
                invocation.direction(),
                invocation.dst()
            );
            (OutcomeResult::Succeeded, report.code, None)
        }
        Ok(report) => {
            let code = report
                .code
                .map_or_else(|| "none (terminated by signal)".to_owned(), |c| c.to_string());
            tracing::error!("{mode} failed for {} with exit code {code}", invocation.src());
            (OutcomeResult::Failed, report.code, None)
        }
        Err(err) => {
            tracing::error!(
                "could not start {} for {}: {err}",
                invocation.program,
                invocation.target
            );
            (OutcomeResult::NotStarted, None, Some(err.to_string()))
        }
    };

    TargetOutcome {
        target: invocation.target.clone(),
        mode,
        result,
        exit_code,
        duration: started.elapsed(),
        command: invocation.to_string(),
        error,
    }
}

/// Directories searched for filter files: the configuration directory,
/// then the directory holding the running binary when it differs.
pub fn default_search_dirs(config_dir: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![config_dir.to_path_buf()];
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }
    dirs
}
