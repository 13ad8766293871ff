//! # omniclone-sync
//!
//! Task orchestration for the external sync tool: filter resolution, flag
//! composition, the cross-process run lock, the connectivity gate, and the
//! sequential runner that turns declared targets into child processes.
//!
//! Call [`pipeline::run`] for a complete "run now" pass over a scope, or
//! build a [`TaskRunner`] directly to supply your own gate and executor.

pub mod connectivity;
pub mod error;
pub mod executor;
pub mod filters;
pub mod flags;
pub mod invocation;
pub mod lock;
pub mod pipeline;
pub mod runner;

pub use connectivity::{Connectivity, ConnectivityGate};
pub use error::{LockError, SyncError};
pub use executor::{Executor, ExitReport, ProcessExecutor};
pub use invocation::Invocation;
pub use lock::{LockHandle, LockManager, LockOwner, LockScope};
pub use runner::{
    OutcomeResult, RunStatus, RunSummary, SkipReason, SkippedTarget, TargetOutcome, TaskRunner,
};
