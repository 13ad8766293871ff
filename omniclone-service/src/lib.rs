//! OS integration for omniclone: run logging and registration of the
//! periodic run with the platform scheduler (systemd user timers, launchd
//! agents, Windows Task Scheduler).

pub mod bridge;
mod error;
pub mod launchd;
pub mod log_rotation;
pub mod logging;
pub mod paths;
pub mod schtasks;
pub mod systemd;

pub use bridge::{platform_bridge, SchedulerBridge, ServiceSpec, ServiceStatus};
pub use error::ServiceError;
pub use logging::LogOptions;
