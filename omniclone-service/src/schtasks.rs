//! Windows Task Scheduler backend driven through PowerShell's
//! `ScheduledTasks` module.
//!
//! The task runs as the current user with S4U logon so it fires whether or
//! not the user is signed in; registering it needs an elevated shell.

use std::path::PathBuf;

use crate::bridge::{combined_output, run_tool, SchedulerBridge, ServiceSpec, ServiceStatus};
use crate::error::ServiceError;

const POWERSHELL: &str = "powershell.exe";

/// Script that registers (or replaces) the scheduled task for `spec`.
pub fn generate_register_script(spec: &ServiceSpec) -> String {
    let arguments = spec
        .run_args()
        .iter()
        .map(|arg| windows_quote(arg))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "$ErrorActionPreference = 'Stop'
$action = New-ScheduledTaskAction -Execute {program} -Argument {arguments}
$trigger = New-ScheduledTaskTrigger -Once -At (Get-Date) -RepetitionInterval (New-TimeSpan -Minutes {minutes})
$principal = New-ScheduledTaskPrincipal -UserId \"$env:USERDOMAIN\\$env:USERNAME\" -LogonType S4U
$settings = New-ScheduledTaskSettingsSet -AllowStartIfOnBatteries -DontStopIfGoingOnBatteries -StartWhenAvailable -MultipleInstances IgnoreNew
Register-ScheduledTask -TaskName {name} -Action $action -Trigger $trigger -Principal $principal -Settings $settings -Force | Out-Null
",
        program = ps_literal(&spec.program.display().to_string()),
        arguments = ps_literal(&arguments),
        minutes = spec.interval_minutes(),
        name = ps_literal(&spec.name)
    )
}

pub fn generate_unregister_script(spec: &ServiceSpec) -> String {
    format!(
        "Unregister-ScheduledTask -TaskName {name} -Confirm:$false -ErrorAction SilentlyContinue\n",
        name = ps_literal(&spec.name)
    )
}

/// Single-quoted PowerShell string literal.
fn ps_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Quote one word of a Windows command line.
fn windows_quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|c| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }
    let mut quoted = String::from("\"");
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.push_str(&"\\".repeat(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            other => {
                quoted.push_str(&"\\".repeat(backslashes));
                quoted.push(other);
                backslashes = 0;
            }
        }
    }
    quoted.push_str(&"\\".repeat(backslashes * 2));
    quoted.push('"');
    quoted
}

fn run_powershell(script: &str, ignore_failure: bool) -> Result<(), ServiceError> {
    run_tool(
        POWERSHELL,
        &["-NoProfile", "-NonInteractive", "-Command", script],
        ignore_failure,
    )?;
    Ok(())
}

pub struct TaskSchedulerBridge;

impl SchedulerBridge for TaskSchedulerBridge {
    fn backend(&self) -> &'static str {
        "task-scheduler"
    }

    fn install(&self, spec: &ServiceSpec) -> Result<Vec<PathBuf>, ServiceError> {
        run_powershell(&generate_register_script(spec), false).map_err(|err| match err {
            ServiceError::Command { output, .. } if output.contains("Access is denied") => {
                ServiceError::Unsupported(
                    "registering the scheduled task requires an elevated (administrator) shell"
                        .to_string(),
                )
            }
            other => other,
        })?;
        tracing::info!("registered scheduled task {}", spec.name);
        Ok(Vec::new())
    }

    fn uninstall(&self, spec: &ServiceSpec) -> Result<(), ServiceError> {
        run_powershell(&generate_unregister_script(spec), true)
    }

    fn status(&self, spec: &ServiceSpec) -> Result<ServiceStatus, ServiceError> {
        let output = run_tool(
            "schtasks",
            &["/Query", "/TN", &spec.name, "/V", "/FO", "LIST"],
            true,
        )?;
        let installed = output.status.success();
        Ok(ServiceStatus {
            backend: self.backend(),
            name: spec.name.clone(),
            installed,
            files: Vec::new(),
            details: if installed {
                combined_output(&output)
            } else {
                String::new()
            },
        })
    }
}
