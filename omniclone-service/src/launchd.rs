use std::fs;
use std::path::{Path, PathBuf};

use crate::bridge::{combined_output, run_tool, SchedulerBridge, ServiceSpec, ServiceStatus};
use crate::error::{io_err, ServiceError};
use crate::paths::{
    launch_agents_dir, launchd_label, launchd_plist_path, LAUNCHD_STDERR_LOG, LAUNCHD_STDOUT_LOG,
};

/// Generate a launchd agent plist that runs the service every
/// `interval_minutes` and once at load.
pub fn generate_plist(spec: &ServiceSpec) -> String {
    let stdout = spec.config_dir.join(LAUNCHD_STDOUT_LOG).display().to_string();
    let stderr = spec.config_dir.join(LAUNCHD_STDERR_LOG).display().to_string();

    let mut arguments = String::new();
    let program = spec.program.display().to_string();
    for arg in std::iter::once(program).chain(spec.run_args()) {
        arguments.push_str(&format!("    <string>{}</string>\n", xml_escape(&arg)));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
{arguments}  </array>
  <key>StartInterval</key>
  <integer>{interval}</integer>
  <key>RunAtLoad</key>
  <true/>
  <key>StandardOutPath</key>
  <string>{stdout}</string>
  <key>StandardErrorPath</key>
  <string>{stderr}</string>
</dict>
</plist>
"#,
        label = xml_escape(&launchd_label(&spec.name)),
        arguments = arguments,
        interval = spec.interval_minutes() * 60,
        stdout = xml_escape(&stdout),
        stderr = xml_escape(&stderr)
    )
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub struct LaunchdBridge {
    home: PathBuf,
}

impl LaunchdBridge {
    pub fn new(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
        }
    }
}

impl SchedulerBridge for LaunchdBridge {
    fn backend(&self) -> &'static str {
        "launchd"
    }

    /// Write the agent plist and bootstrap it into the user's GUI domain.
    fn install(&self, spec: &ServiceSpec) -> Result<Vec<PathBuf>, ServiceError> {
        ensure_macos()?;

        let launch_agents = launch_agents_dir(&self.home);
        if !launch_agents.exists() {
            fs::create_dir_all(&launch_agents).map_err(|e| io_err(&launch_agents, e))?;
        }

        let plist = launchd_plist_path(&self.home, &spec.name);
        fs::write(&plist, generate_plist(spec)).map_err(|e| io_err(&plist, e))?;

        let domain = launchctl_domain()?;
        let service = format!("{domain}/{}", launchd_label(&spec.name));
        let plist_arg = plist.display().to_string();

        run_tool("launchctl", &["bootout", &service], true)?;
        run_tool("launchctl", &["bootstrap", &domain, &plist_arg], false)?;

        Ok(vec![plist])
    }

    /// Boot out the agent and remove its plist.
    fn uninstall(&self, spec: &ServiceSpec) -> Result<(), ServiceError> {
        ensure_macos()?;

        let plist = launchd_plist_path(&self.home, &spec.name);
        if plist.exists() {
            let domain = launchctl_domain()?;
            let service = format!("{domain}/{}", launchd_label(&spec.name));
            run_tool("launchctl", &["bootout", &service], true)?;
            fs::remove_file(&plist).map_err(|e| io_err(&plist, e))?;
        }

        Ok(())
    }

    fn status(&self, spec: &ServiceSpec) -> Result<ServiceStatus, ServiceError> {
        let plist = launchd_plist_path(&self.home, &spec.name);
        let installed = plist.exists();

        let details = if installed && cfg!(target_os = "macos") {
            let service = format!("{}/{}", launchctl_domain()?, launchd_label(&spec.name));
            combined_output(&run_tool("launchctl", &["print", &service], true)?)
        } else {
            String::new()
        };

        Ok(ServiceStatus {
            backend: self.backend(),
            name: spec.name.clone(),
            installed,
            files: if installed { vec![plist] } else { Vec::new() },
            details,
        })
    }
}

#[cfg(target_os = "macos")]
fn ensure_macos() -> Result<(), ServiceError> {
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn ensure_macos() -> Result<(), ServiceError> {
    Err(ServiceError::Unsupported(
        "launchd management is only supported on macOS".to_string(),
    ))
}

fn launchctl_domain() -> Result<String, ServiceError> {
    let output = run_tool("id", &["-u"], false)?;
    let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if uid.is_empty() {
        return Err(ServiceError::Unsupported(
            "current uid from `id -u` was empty".to_string(),
        ));
    }
    Ok(format!("gui/{uid}"))
}
