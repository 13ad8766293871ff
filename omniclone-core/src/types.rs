//! Domain types for the omniclone configuration model.
//!
//! Everything here is immutable once [`crate::config`] has built it; the
//! orchestrator only ever reads these values during a run.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a target, unique within its mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetName(pub String);

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for TargetName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TargetName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Sync semantics applied to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Bidirectional mirror.
    Bisync,
    /// One-way mirror with deletions propagated.
    Backup,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Bisync, Mode::Backup];

    /// Key used in `config.json`, `flags.json` and filter file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Bisync => "bisync",
            Mode::Backup => "backup",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bisync" => Ok(Mode::Bisync),
            "backup" => Ok(Mode::Backup),
            other => Err(ConfigError::UnknownMode {
                mode: other.to_owned(),
            }),
        }
    }
}

/// How the connectivity gate probes the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityMethod {
    /// TCP connect to `address`.
    #[default]
    Tcp,
    /// One echo request through the system `ping` binary.
    Ping,
    /// No probe; the gate always reports available.
    None,
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// One synchronization unit.
///
/// `mode` has no setter: a target keeps the mode it was declared under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: TargetName,
    mode: Mode,
    /// Local path as written in the config; may start with `~`.
    pub src: String,
    /// Remote path, passed to the sync tool verbatim.
    pub dst: String,
    /// Appended last to the composed flags.
    pub extra_flags: Vec<String>,
    pub disabled: bool,
}

impl Target {
    pub fn new(
        name: impl Into<TargetName>,
        mode: Mode,
        src: impl Into<String>,
        dst: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mode,
            src: src.into(),
            dst: dst.into(),
            extra_flags: Vec::new(),
            disabled: false,
        }
    }

    pub fn with_extra_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn name(&self) -> &TargetName {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }
}

// ---------------------------------------------------------------------------
// Flag layers
// ---------------------------------------------------------------------------

/// Contents of `flags.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagLayers {
    #[serde(default)]
    pub base: Vec<String>,
    #[serde(default)]
    pub bisync: Vec<String>,
    #[serde(default)]
    pub backup: Vec<String>,
}

impl FlagLayers {
    pub fn for_mode(&self, mode: Mode) -> &[String] {
        match mode {
            Mode::Bisync => &self.bisync,
            Mode::Backup => &self.backup,
        }
    }
}

// ---------------------------------------------------------------------------
// Global settings
// ---------------------------------------------------------------------------

pub const DEFAULT_SERVICE_NAME: &str = "omniclone";
pub const DEFAULT_EXECUTABLE: &str = "rclone";
pub const DEFAULT_PROBE_ADDRESS: &str = "8.8.8.8:53";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivitySettings {
    pub method: ConnectivityMethod,
    /// `host:port` for `tcp`, bare host for `ping` (a port suffix is ignored).
    pub address: String,
    /// Bound on the probe's connection attempts. Resolving a hostname
    /// `address` adds system resolver time on top.
    pub timeout: Duration,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            method: ConnectivityMethod::default(),
            address: DEFAULT_PROBE_ADDRESS.to_owned(),
            timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSettings {
    /// Drop zero-length filter files from the filter set.
    pub skip_empty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub interval: Duration,
    /// Linux only: keep the user manager alive after logout.
    pub enable_linger: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            enable_linger: true,
        }
    }
}

/// Global parameters from `config.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Only read by the scheduler bridge and the lock scope key.
    pub service_name: String,
    pub executable: String,
    pub connectivity: ConnectivitySettings,
    pub filters: FilterSettings,
    pub schedule: ScheduleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_owned(),
            executable: DEFAULT_EXECUTABLE.to_owned(),
            connectivity: ConnectivitySettings::default(),
            filters: FilterSettings::default(),
            schedule: ScheduleSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
