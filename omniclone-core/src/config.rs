//! Typed configuration model.
//!
//! # Storage layout
//!
//! ```text
//! <config_dir>/
//!   config.json                   (targets + global settings, required)
//!   flags.json                    (base / bisync / backup flag layers, required)
//!   filters.<mode>.txt            (optional, mode-global filter rules)
//!   filters.<mode>.<target>.txt   (optional, target-specific filter rules)
//! ```
//!
//! The JSON is first read into loose `Raw*` structs and then validated into
//! [`Config`]; nothing downstream ever sees the raw shape.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{io_err, ConfigError};
use crate::types::{
    ConnectivityMethod, ConnectivitySettings, FilterSettings, FlagLayers, Mode,
    ScheduleSettings, Settings, Target, TargetName, DEFAULT_EXECUTABLE, DEFAULT_INTERVAL_MINUTES,
    DEFAULT_PROBE_ADDRESS, DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_SERVICE_NAME,
};

pub const CONFIG_FILE: &str = "config.json";
pub const FLAGS_FILE: &str = "flags.json";

/// Targets grouped by mode, both levels in declaration order.
pub type TargetMap = IndexMap<Mode, IndexMap<TargetName, Target>>;

/// The validated configuration for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory the configuration was loaded from.
    pub config_dir: PathBuf,
    pub settings: Settings,
    pub flags: FlagLayers,
    pub targets: TargetMap,
}

impl Config {
    /// All targets in run order: mode declaration order, then target
    /// declaration order inside the mode. Disabled targets are included.
    pub fn targets_in_order(&self) -> impl Iterator<Item = &Target> {
        self.targets.values().flat_map(|targets| targets.values())
    }

    pub fn target(&self, mode: Mode, name: &TargetName) -> Option<&Target> {
        self.targets.get(&mode).and_then(|targets| targets.get(name))
    }
}

// ---------------------------------------------------------------------------
// Raw JSON shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    service_name: Option<String>,
    executable: Option<String>,
    #[serde(default)]
    connectivity: RawConnectivity,
    #[serde(default)]
    filters: RawFilters,
    #[serde(default)]
    schedule: RawSchedule,
    #[serde(default)]
    tasks: IndexMap<String, IndexMap<String, RawTarget>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConnectivity {
    method: Option<ConnectivityMethod>,
    address: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFilters {
    #[serde(default)]
    skip_empty: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawSchedule {
    interval_minutes: Option<u64>,
    enable_linger: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    src: Option<String>,
    dst: Option<String>,
    #[serde(default)]
    extra_flags: Vec<String>,
    #[serde(default)]
    disabled: bool,
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load `config.json` and `flags.json` from `config_dir`.
///
/// Returns `ConfigError::NotFound` if either file is absent and
/// `ConfigError::Parse` (with path + line context) if either is malformed.
pub fn load_at(config_dir: &Path) -> Result<Config, ConfigError> {
    let config_path = config_dir.join(CONFIG_FILE);
    let flags_path = config_dir.join(FLAGS_FILE);

    let config_text = read_required(&config_path)?;
    let flags_text = read_required(&flags_path)?;

    let raw: RawConfig = serde_json::from_str(&config_text).map_err(|e| ConfigError::Parse {
        path: config_path,
        source: e,
    })?;
    let flags: FlagLayers = serde_json::from_str(&flags_text).map_err(|e| ConfigError::Parse {
        path: flags_path,
        source: e,
    })?;

    build(config_dir.to_path_buf(), raw, flags)
}

/// Build a [`Config`] from already-read JSON text. Used by tests and by
/// callers that keep configuration somewhere other than the filesystem.
pub fn from_json_str(
    config_dir: PathBuf,
    config_json: &str,
    flags_json: &str,
) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_json::from_str(config_json).map_err(|e| ConfigError::Parse {
        path: config_dir.join(CONFIG_FILE),
        source: e,
    })?;
    let flags: FlagLayers = serde_json::from_str(flags_json).map_err(|e| ConfigError::Parse {
        path: config_dir.join(FLAGS_FILE),
        source: e,
    })?;
    build(config_dir, raw, flags)
}

fn read_required(path: &Path) -> Result<String, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(io_err(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn build(config_dir: PathBuf, raw: RawConfig, flags: FlagLayers) -> Result<Config, ConfigError> {
    let settings = build_settings(&raw)?;

    let mut targets = TargetMap::new();
    for (mode_key, entries) in raw.tasks {
        let mode: Mode = mode_key.parse()?;
        let bucket = targets.entry(mode).or_default();
        for (name, entry) in entries {
            let target = build_target(mode, name, entry)?;
            bucket.insert(target.name().clone(), target);
        }
    }

    Ok(Config {
        config_dir,
        settings,
        flags,
        targets,
    })
}

fn build_target(mode: Mode, name: String, raw: RawTarget) -> Result<Target, ConfigError> {
    let missing = |field: &'static str| ConfigError::MissingField {
        mode: mode.to_string(),
        target: name.clone(),
        field,
    };
    let src = raw.src.ok_or_else(|| missing("src"))?;
    let dst = raw.dst.ok_or_else(|| missing("dst"))?;

    Ok(Target::new(name, mode, src, dst)
        .with_extra_flags(raw.extra_flags)
        .with_disabled(raw.disabled))
}

fn build_settings(raw: &RawConfig) -> Result<Settings, ConfigError> {
    let service_name = raw
        .service_name
        .clone()
        .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_owned());
    if service_name.is_empty()
        || !service_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ConfigError::InvalidSetting {
            field: "service_name",
            reason: format!("'{service_name}' must match [A-Za-z0-9_.-]+"),
        });
    }

    let executable = raw
        .executable
        .clone()
        .unwrap_or_else(|| DEFAULT_EXECUTABLE.to_owned());
    if executable.trim().is_empty() {
        return Err(ConfigError::InvalidSetting {
            field: "executable",
            reason: "must not be empty".to_owned(),
        });
    }

    let timeout_secs = raw
        .connectivity
        .timeout_secs
        .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(ConfigError::InvalidSetting {
            field: "connectivity.timeout_secs",
            reason: "must be at least 1".to_owned(),
        });
    }

    let interval_minutes = raw
        .schedule
        .interval_minutes
        .unwrap_or(DEFAULT_INTERVAL_MINUTES);
    if interval_minutes == 0 {
        return Err(ConfigError::InvalidSetting {
            field: "schedule.interval_minutes",
            reason: "must be at least 1".to_owned(),
        });
    }

    Ok(Settings {
        service_name,
        executable,
        connectivity: ConnectivitySettings {
            method: raw.connectivity.method.unwrap_or_default(),
            address: raw
                .connectivity
                .address
                .clone()
                .unwrap_or_else(|| DEFAULT_PROBE_ADDRESS.to_owned()),
            timeout: Duration::from_secs(timeout_secs),
        },
        filters: FilterSettings {
            skip_empty: raw.filters.skip_empty,
        },
        schedule: ScheduleSettings {
            interval: Duration::from_secs(interval_minutes * 60),
            enable_linger: raw.schedule.enable_linger.unwrap_or(true),
        },
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
