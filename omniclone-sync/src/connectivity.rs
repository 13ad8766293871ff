//! Network reachability gate, checked once per run before any target.
//!
//! Every probe is bounded by a timeout and maps failure of any kind to
//! [`Connectivity::Unavailable`]; the gate never errors.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::Serialize;

use omniclone_core::{ConnectivityMethod, ConnectivitySettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Available,
    Unavailable,
}

pub trait ConnectivityGate {
    fn check(&self) -> Connectivity;
}

/// TCP connect to `address` within `timeout`.
///
/// `timeout` bounds all connection attempts together, across every address
/// a hostname resolves to. Resolving a hostname goes through the system
/// resolver and is not covered by it; an IP literal never touches it.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub address: String,
    pub timeout: Duration,
}

impl ConnectivityGate for TcpProbe {
    fn check(&self) -> Connectivity {
        let addrs = match self.address.to_socket_addrs() {
            Ok(addrs) => addrs.collect::<Vec<_>>(),
            Err(err) => {
                tracing::warn!("cannot resolve probe address {}: {err}", self.address);
                return Connectivity::Unavailable;
            }
        };
        connect_within(&addrs, self.timeout)
    }
}

/// Try `addrs` in order until one accepts, sharing one `budget`.
fn connect_within(addrs: &[SocketAddr], budget: Duration) -> Connectivity {
    let deadline = Instant::now() + budget;
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!("probe deadline reached before trying {addr}");
            break;
        }
        match TcpStream::connect_timeout(addr, remaining) {
            Ok(_) => return Connectivity::Available,
            Err(err) => tracing::debug!("probe {addr} failed: {err}"),
        }
    }
    Connectivity::Unavailable
}

/// Which `ping` command line the host platform understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingFlavor {
    /// `-n count -w millis`
    Windows,
    /// macOS and FreeBSD: `-W` is in milliseconds there, `-t` is the
    /// overall timeout in seconds.
    Bsd,
    /// iputils/busybox: `-W` is the reply wait in seconds.
    Linux,
}

impl PingFlavor {
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(any(target_os = "macos", target_os = "freebsd")) {
            Self::Bsd
        } else {
            Self::Linux
        }
    }
}

/// One echo request through the system `ping`, with the deadline passed to
/// `ping` itself.
#[derive(Debug, Clone)]
pub struct PingProbe {
    pub host: String,
    pub timeout: Duration,
}

impl PingProbe {
    pub fn command_args(&self) -> Vec<String> {
        self.command_args_for(PingFlavor::host())
    }

    pub fn command_args_for(&self, flavor: PingFlavor) -> Vec<String> {
        let secs = self.timeout.as_secs().max(1);
        let (count_flag, wait_flag, wait) = match flavor {
            PingFlavor::Windows => ("-n", "-w", (secs * 1000).to_string()),
            PingFlavor::Bsd => ("-c", "-t", secs.to_string()),
            PingFlavor::Linux => ("-c", "-W", secs.to_string()),
        };
        vec![
            count_flag.into(),
            "1".into(),
            wait_flag.into(),
            wait,
            self.host.clone(),
        ]
    }
}

impl ConnectivityGate for PingProbe {
    fn check(&self) -> Connectivity {
        let status = Command::new("ping")
            .args(self.command_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => Connectivity::Available,
            Ok(s) => {
                tracing::debug!("ping {} exited with {s}", self.host);
                Connectivity::Unavailable
            }
            Err(err) => {
                tracing::warn!("cannot run ping: {err}");
                Connectivity::Unavailable
            }
        }
    }
}

/// Gate for `method: none` and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAvailable;

impl ConnectivityGate for AlwaysAvailable {
    fn check(&self) -> Connectivity {
        Connectivity::Available
    }
}

/// Build the gate selected in `config.json`.
pub fn gate_from_settings(settings: &ConnectivitySettings) -> Box<dyn ConnectivityGate> {
    match settings.method {
        ConnectivityMethod::Tcp => Box::new(TcpProbe {
            address: settings.address.clone(),
            timeout: settings.timeout,
        }),
        ConnectivityMethod::Ping => Box::new(PingProbe {
            host: strip_port(&settings.address).to_owned(),
            timeout: settings.timeout,
        }),
        ConnectivityMethod::None => Box::new(AlwaysAvailable),
    }
}

fn strip_port(address: &str) -> &str {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn tcp_probe_reaches_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let probe = TcpProbe {
            address: listener.local_addr().unwrap().to_string(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(probe.check(), Connectivity::Available);
    }

    #[test]
    fn tcp_probe_refused_is_unavailable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let probe = TcpProbe {
            address: format!("127.0.0.1:{port}"),
            timeout: Duration::from_millis(500),
        };
        assert_eq!(probe.check(), Connectivity::Unavailable);
    }

    #[test]
    fn unresolvable_address_is_unavailable() {
        let probe = TcpProbe {
            address: "not an address".into(),
            timeout: Duration::from_millis(100),
        };
        assert_eq!(probe.check(), Connectivity::Unavailable);
    }

    #[test]
    fn exhausted_budget_skips_remaining_addresses() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addrs = [listener.local_addr().unwrap()];
        assert_eq!(connect_within(&addrs, Duration::ZERO), Connectivity::Unavailable);
    }

    #[test]
    fn later_address_is_tried_within_budget() {
        let refused = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addrs = [refused, listener.local_addr().unwrap()];
        assert_eq!(
            connect_within(&addrs, Duration::from_secs(2)),
            Connectivity::Available
        );
    }

    fn ping(secs: u64) -> PingProbe {
        PingProbe {
            host: "8.8.8.8".into(),
            timeout: Duration::from_secs(secs),
        }
    }

    #[test]
    fn ping_args_per_flavor() {
        let probe = ping(5);
        assert_eq!(
            probe.command_args_for(PingFlavor::Linux),
            ["-c", "1", "-W", "5", "8.8.8.8"]
        );
        assert_eq!(
            probe.command_args_for(PingFlavor::Bsd),
            ["-c", "1", "-t", "5", "8.8.8.8"]
        );
        assert_eq!(
            probe.command_args_for(PingFlavor::Windows),
            ["-n", "1", "-w", "5000", "8.8.8.8"]
        );
    }

    #[test]
    fn sub_second_ping_timeout_rounds_up() {
        let probe = PingProbe {
            host: "h".into(),
            timeout: Duration::from_millis(200),
        };
        assert_eq!(probe.command_args_for(PingFlavor::Linux)[3], "1");
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn macos_ping_timeout_is_in_seconds() {
        assert_eq!(PingFlavor::host(), PingFlavor::Bsd);
        assert_eq!(ping(5).command_args(), ["-c", "1", "-t", "5", "8.8.8.8"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn linux_ping_waits_in_seconds() {
        assert_eq!(ping(5).command_args(), ["-c", "1", "-W", "5", "8.8.8.8"]);
    }

    #[test]
    fn strip_port_handles_host_forms() {
        assert_eq!(strip_port("8.8.8.8:53"), "8.8.8.8");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("::1"), "::1");
    }

    #[test]
    fn none_method_is_always_available() {
        let settings = ConnectivitySettings {
            method: ConnectivityMethod::None,
            ..ConnectivitySettings::default()
        };
        assert_eq!(gate_from_settings(&settings).check(), Connectivity::Available);
    }
}
