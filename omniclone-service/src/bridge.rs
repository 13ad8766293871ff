//! Platform-neutral face of the OS scheduler integration.
//!
//! A [`ServiceSpec`] describes the periodic job: which binary to start, with
//! which arguments, and how often. Each backend (systemd user timer, launchd
//! agent, Windows Task Scheduler) implements [`SchedulerBridge`] for it.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use omniclone_core::Config;
use serde::Serialize;

use crate::error::{io_err, ServiceError};

/// What to register with the OS scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    /// Binary started on each tick; normally the running executable.
    pub program: PathBuf,
    pub config_dir: PathBuf,
    pub interval: Duration,
    pub enable_linger: bool,
}

impl ServiceSpec {
    pub fn from_config(config: &Config, program: impl Into<PathBuf>) -> Self {
        Self {
            name: config.settings.service_name.clone(),
            program: program.into(),
            config_dir: config.config_dir.clone(),
            interval: config.settings.schedule.interval,
            enable_linger: config.settings.schedule.enable_linger,
        }
    }

    /// Arguments passed to `program` on every scheduled run.
    pub fn run_args(&self) -> Vec<String> {
        vec![
            "--config-dir".to_string(),
            self.config_dir.display().to_string(),
            "run".to_string(),
            "--service".to_string(),
        ]
    }

    /// Interval rounded up to whole minutes, never below one.
    pub fn interval_minutes(&self) -> u64 {
        self.interval.as_secs().div_ceil(60).max(1)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub backend: &'static str,
    pub name: String,
    pub installed: bool,
    /// Files the backend owns for this service.
    pub files: Vec<PathBuf>,
    /// Free-form report from the scheduler tool (timer listing, task info).
    pub details: String,
}

pub trait SchedulerBridge {
    fn backend(&self) -> &'static str;

    /// Register and activate the periodic job. Returns the files written.
    fn install(&self, spec: &ServiceSpec) -> Result<Vec<PathBuf>, ServiceError>;

    /// Deactivate and remove the job. Removing a job that is not installed
    /// is not an error.
    fn uninstall(&self, spec: &ServiceSpec) -> Result<(), ServiceError>;

    fn status(&self, spec: &ServiceSpec) -> Result<ServiceStatus, ServiceError>;
}

/// The bridge for the platform this binary was built for.
#[cfg(target_os = "linux")]
pub fn platform_bridge(home: &Path) -> Result<Box<dyn SchedulerBridge>, ServiceError> {
    Ok(Box::new(crate::systemd::SystemdBridge::new(home)))
}

#[cfg(target_os = "macos")]
pub fn platform_bridge(home: &Path) -> Result<Box<dyn SchedulerBridge>, ServiceError> {
    Ok(Box::new(crate::launchd::LaunchdBridge::new(home)))
}

#[cfg(windows)]
pub fn platform_bridge(_home: &Path) -> Result<Box<dyn SchedulerBridge>, ServiceError> {
    Ok(Box::new(crate::schtasks::TaskSchedulerBridge))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
pub fn platform_bridge(_home: &Path) -> Result<Box<dyn SchedulerBridge>, ServiceError> {
    Err(ServiceError::Unsupported(format!(
        "no scheduler integration for {}",
        std::env::consts::OS
    )))
}

/// Run a scheduler tool to completion, capturing its output.
///
/// A non-zero exit becomes [`ServiceError::Command`] unless `ignore_failure`
/// is set, in which case the output is returned for inspection.
pub(crate) fn run_tool(
    program: &str,
    args: &[&str],
    ignore_failure: bool,
) -> Result<Output, ServiceError> {
    tracing::debug!("running {program} {}", args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| io_err(program, e))?;

    if output.status.success() || ignore_failure {
        return Ok(output);
    }

    Err(ServiceError::Command {
        program: program.to_string(),
        status: output.status.to_string(),
        output: combined_output(&output),
    })
}

pub(crate) fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{} {}", stdout.trim(), stderr.trim())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ServiceSpec {
        ServiceSpec {
            name: "omniclone".to_string(),
            program: PathBuf::from("/usr/local/bin/omniclone"),
            config_dir: PathBuf::from("/home/tester/.config/omniclone"),
            interval: Duration::from_secs(15 * 60),
            enable_linger: true,
        }
    }

    #[test]
    fn run_args_point_back_at_the_config_dir() {
        assert_eq!(
            spec().run_args(),
            vec![
                "--config-dir",
                "/home/tester/.config/omniclone",
                "run",
                "--service"
            ]
        );
    }

    #[test]
    fn interval_rounds_up_to_whole_minutes() {
        let mut s = spec();
        assert_eq!(s.interval_minutes(), 15);
        s.interval = Duration::from_secs(61);
        assert_eq!(s.interval_minutes(), 2);
        s.interval = Duration::from_secs(0);
        assert_eq!(s.interval_minutes(), 1);
    }

    #[test]
    fn spec_is_derived_from_config_settings() {
        let config = omniclone_core::config::from_json_str(
            PathBuf::from("/srv/omniclone"),
            r#"{"service_name": "nightly", "schedule": {"interval_minutes": 30, "enable_linger": false}}"#,
            "{}",
        )
        .expect("config");
        let s = ServiceSpec::from_config(&config, "/opt/omniclone");
        assert_eq!(s.name, "nightly");
        assert_eq!(s.interval_minutes(), 30);
        assert!(!s.enable_linger);
        assert_eq!(s.config_dir, PathBuf::from("/srv/omniclone"));
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_reports_failures_unless_ignored() {
        let err = run_tool("sh", &["-c", "echo nope >&2; exit 4"], false).unwrap_err();
        match err {
            ServiceError::Command { program, output, .. } => {
                assert_eq!(program, "sh");
                assert_eq!(output, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
        let output = run_tool("sh", &["-c", "exit 4"], true).expect("ignored failure");
        assert_eq!(output.status.code(), Some(4));
    }
}
