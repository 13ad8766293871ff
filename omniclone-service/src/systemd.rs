//! systemd user-unit backend: a oneshot service plus a timer that starts it
//! every `interval_minutes`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::bridge::{combined_output, run_tool, SchedulerBridge, ServiceSpec, ServiceStatus};
use crate::error::{io_err, ServiceError};
use crate::paths::{systemd_service_path, systemd_timer_path, systemd_user_dir};

/// Delay after boot before the first scheduled run.
pub const BOOT_DELAY: &str = "5min";

pub fn generate_service_unit(spec: &ServiceSpec) -> String {
    let mut exec = vec![systemd_quote(&spec.program.display().to_string())];
    exec.extend(spec.run_args().iter().map(|arg| systemd_quote(arg)));

    format!(
        "[Unit]
Description=omniclone sync run ({name})
Wants=network-online.target
After=network-online.target

[Service]
Type=oneshot
ExecStart={exec}
",
        name = spec.name,
        exec = exec.join(" ")
    )
}

pub fn generate_timer_unit(spec: &ServiceSpec) -> String {
    format!(
        "[Unit]
Description=Periodic omniclone sync ({name})

[Timer]
OnBootSec={boot}
OnUnitActiveSec={minutes}min
Unit={name}.service

[Install]
WantedBy=timers.target
",
        name = spec.name,
        boot = BOOT_DELAY,
        minutes = spec.interval_minutes()
    )
}

/// Quote one `ExecStart=` word. Specifier (`%`) and variable (`$`)
/// characters are escaped so paths reach the process literally.
fn systemd_quote(arg: &str) -> String {
    let escaped = arg.replace('%', "%%").replace('$', "$$");
    let needs_quotes = escaped.is_empty()
        || escaped
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ';'));
    if !needs_quotes {
        return escaped;
    }
    let inner = escaped.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{inner}\"")
}

pub struct SystemdBridge {
    home: PathBuf,
}

impl SystemdBridge {
    pub fn new(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
        }
    }

    fn timer_name(spec: &ServiceSpec) -> String {
        format!("{}.timer", spec.name)
    }
}

impl SchedulerBridge for SystemdBridge {
    fn backend(&self) -> &'static str {
        "systemd"
    }

    fn install(&self, spec: &ServiceSpec) -> Result<Vec<PathBuf>, ServiceError> {
        let unit_dir = systemd_user_dir(&self.home);
        fs::create_dir_all(&unit_dir).map_err(|e| io_err(&unit_dir, e))?;

        let service = systemd_service_path(&self.home, &spec.name);
        let timer = systemd_timer_path(&self.home, &spec.name);
        fs::write(&service, generate_service_unit(spec)).map_err(|e| io_err(&service, e))?;
        fs::write(&timer, generate_timer_unit(spec)).map_err(|e| io_err(&timer, e))?;
        tracing::info!("wrote {} and {}", service.display(), timer.display());

        run_tool("systemctl", &["--user", "daemon-reload"], false)?;
        let timer_name = Self::timer_name(spec);
        run_tool("systemctl", &["--user", "enable", "--now", &timer_name], false)?;

        if spec.enable_linger {
            let output = run_tool("loginctl", &["enable-linger"], true)?;
            if !output.status.success() {
                tracing::warn!(
                    "could not enable lingering; the timer only runs while you are logged in: {}",
                    combined_output(&output)
                );
            }
        }

        Ok(vec![service, timer])
    }

    fn uninstall(&self, spec: &ServiceSpec) -> Result<(), ServiceError> {
        let timer_name = Self::timer_name(spec);
        run_tool("systemctl", &["--user", "disable", "--now", &timer_name], true)?;

        for unit in [
            systemd_timer_path(&self.home, &spec.name),
            systemd_service_path(&self.home, &spec.name),
        ] {
            if unit.exists() {
                fs::remove_file(&unit).map_err(|e| io_err(&unit, e))?;
                tracing::info!("removed {}", unit.display());
            }
        }

        run_tool("systemctl", &["--user", "daemon-reload"], true)?;
        Ok(())
    }

    fn status(&self, spec: &ServiceSpec) -> Result<ServiceStatus, ServiceError> {
        let files: Vec<PathBuf> = [
            systemd_service_path(&self.home, &spec.name),
            systemd_timer_path(&self.home, &spec.name),
        ]
        .into_iter()
        .filter(|p| p.exists())
        .collect();
        let installed = files.len() == 2;

        let details = if installed {
            let timer_name = Self::timer_name(spec);
            let output = run_tool(
                "systemctl",
                &["--user", "list-timers", "--all", "--no-pager", &timer_name],
                true,
            )?;
            let unit = format!("{}.service", spec.name);
            let journal = run_tool(
                "journalctl",
                &["--user", "-u", &unit, "-n", "20", "--no-pager"],
                true,
            )?;
            format!("{}\n\n{}", combined_output(&output), combined_output(&journal))
        } else {
            String::new()
        };

        Ok(ServiceStatus {
            backend: self.backend(),
            name: spec.name.clone(),
            installed,
            files,
            details,
        })
    }
}
