use std::path::{Path, PathBuf};

pub const LOG_FILE: &str = "omniclone.log";
pub const LAUNCHD_STDOUT_LOG: &str = "launchd.log";
pub const LAUNCHD_STDERR_LOG: &str = "launchd-err.log";

/// `<config_dir>/omniclone.log`
pub fn log_path(config_dir: &Path) -> PathBuf {
    config_dir.join(LOG_FILE)
}

pub fn systemd_user_dir(home: &Path) -> PathBuf {
    home.join(".config").join("systemd").join("user")
}

pub fn systemd_service_path(home: &Path, service: &str) -> PathBuf {
    systemd_user_dir(home).join(format!("{service}.service"))
}

pub fn systemd_timer_path(home: &Path, service: &str) -> PathBuf {
    systemd_user_dir(home).join(format!("{service}.timer"))
}

pub fn launch_agents_dir(home: &Path) -> PathBuf {
    home.join("Library").join("LaunchAgents")
}

/// Reverse-DNS launchd label for a service name.
pub fn launchd_label(service: &str) -> String {
    format!("dev.omniclone.{service}")
}

pub fn launchd_plist_path(home: &Path, service: &str) -> PathBuf {
    launch_agents_dir(home).join(format!("{}.plist", launchd_label(service)))
}
