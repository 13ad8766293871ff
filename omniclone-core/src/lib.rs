//! omniclone core library: configuration model, path helpers, errors.
//!
//! - [`types`]: targets, modes, flag layers, global settings
//! - [`config`]: load + validate `config.json` / `flags.json`
//! - [`paths`]: config dir resolution and `~` expansion
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{Config, TargetMap};
pub use error::ConfigError;
pub use types::{
    ConnectivityMethod, ConnectivitySettings, FilterSettings, FlagLayers, Mode, ScheduleSettings,
    Settings, Target, TargetName,
};
