//! Seatwarden configuration.
//!
//! Daemon and client settings, plus the rules for finding the license
//! server: `SEATWARDEN_SERVER`, then a `license.host` file on the search
//! path, then the `seatwarden` DNS alias.

use crate::identity::local::resolve_ipv4;
use crate::protocol::io::DEFAULT_IO_TIMEOUT;
use crate::SeatwardenError;
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Service name looked up in `/etc/services`.
pub const SERVICE_NAME: &str = "seatwarden";

/// Registered port used when `/etc/services` has no entry.
pub const DEFAULT_PORT: u16 = 6114;

/// Port older daemons listened on; clients try it when the registered port
/// refuses the connection and no port was given explicitly.
pub const LEGACY_PORT: u16 = 3010;

/// Environment variable naming the license server (`host[:port]`).
pub const SERVER_ENV: &str = "SEATWARDEN_SERVER";

/// File on the search path naming the license server.
pub const SERVER_HOST_FILE: &str = "license.host";

/// DNS alias tried when nothing else names a server.
pub const SERVER_ALIAS: &str = "seatwarden";

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "SEATWARDEN_LOG";

/// License directory used when none is given.
pub const DEFAULT_LICENSE_DIR: &str = "/usr/local/seatwarden/license";

/// Location of the services database.
const SERVICES_FILE: &str = "/etc/services";

/// A license server address with an optional explicit port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    /// Host name or address.
    pub host: String,
    /// Port given with the host, if any.
    pub port: Option<u16>,
}

impl ServerAddr {
    /// Server on `host` with the default port selection.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
        }
    }

    /// Server on `host` at an explicit port.
    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
        }
    }

    /// Ports to try, in order. An explicit port is the only choice;
    /// otherwise the service port, then the legacy port.
    pub fn ports(&self) -> Vec<u16> {
        match self.port {
            Some(port) => vec![port],
            None => {
                let primary = service_port();
                if primary == LEGACY_PORT {
                    vec![primary]
                } else {
                    vec![primary, LEGACY_PORT]
                }
            }
        }
    }
}

impl FromStr for ServerAddr {
    type Err = SeatwardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    SeatwardenError::ConfigError(format!("invalid port in server address: {}", s))
                })?;
                (host, Some(port))
            }
            None => (s, None),
        };
        if host.is_empty() {
            return Err(SeatwardenError::ConfigError(
                "server host cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => f.write_str(&self.host),
        }
    }
}

/// Where a server address came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerSource {
    /// The `SEATWARDEN_SERVER` environment variable.
    Env,
    /// A `license.host` file.
    HostFile(PathBuf),
    /// The `seatwarden` DNS alias.
    DnsAlias,
}

/// Find the license server for clients.
///
/// Returns `Ok(None)` when no server is configured, meaning the license
/// file should be read directly.
pub fn locate_server(
    search_path: &str,
) -> Result<Option<(ServerAddr, ServerSource)>, SeatwardenError> {
    locate_server_with(
        std::env::var(SERVER_ENV).ok(),
        search_path,
        |alias| !resolve_ipv4(alias).is_empty(),
    )
}

/// [`locate_server`] with the environment and DNS check supplied.
pub fn locate_server_with(
    env_value: Option<String>,
    search_path: &str,
    alias_resolves: impl Fn(&str) -> bool,
) -> Result<Option<(ServerAddr, ServerSource)>, SeatwardenError> {
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return Ok(Some((value.parse()?, ServerSource::Env)));
    }

    for dir in search_path.split(':').filter(|d| !d.is_empty()) {
        let path = Path::new(dir).join(SERVER_HOST_FILE);
        if let Some(addr) = read_host_file(&path)? {
            return Ok(Some((addr, ServerSource::HostFile(path))));
        }
    }

    if alias_resolves(SERVER_ALIAS) {
        return Ok(Some((ServerAddr::new(SERVER_ALIAS), ServerSource::DnsAlias)));
    }

    Ok(None)
}

/// First non-blank, non-comment line of a `license.host` file.
fn read_host_file(path: &Path) -> Result<Option<ServerAddr>, SeatwardenError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SeatwardenError::ConfigError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::parse)
        .transpose()
}

/// TCP port for [`SERVICE_NAME`] from the services database, else
/// [`DEFAULT_PORT`].
pub fn service_port() -> u16 {
    fs::read_to_string(SERVICES_FILE)
        .ok()
        .and_then(|text| parse_services(&text, SERVICE_NAME))
        .unwrap_or(DEFAULT_PORT)
}

/// Look up a TCP service port in `/etc/services` text.
pub fn parse_services(text: &str, service: &str) -> Option<u16> {
    text.lines().find_map(|line| {
        let line = line.split('#').next().unwrap_or_default();
        let mut fields = line.split_whitespace();
        let name = fields.next()?;
        let (port, proto) = fields.next()?.split_once('/')?;
        let named = name == service || fields.any(|alias| alias == service);
        if named && proto == "tcp" {
            port.parse().ok()
        } else {
            None
        }
    })
}

/// Configuration for the license daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Directory holding `license.xt`.
    pub license_dir: PathBuf,

    /// Log file; `None` logs to stderr.
    pub log_file: Option<PathBuf>,

    /// Directory to change into after daemonizing.
    pub workdir: Option<PathBuf>,

    /// Listening port; `None` uses the service port.
    pub port: Option<u16>,

    /// Address to bind.
    pub bind_addr: IpAddr,

    /// Suppress startup output on the terminal.
    pub silent: bool,

    /// Stay attached to the terminal instead of daemonizing.
    pub foreground: bool,

    /// Refuse to start unless the license file grants the server code
    /// to this host.
    pub require_server_license: bool,

    /// Per-operation socket timeout.
    pub io_timeout: Duration,

    /// Maintenance timer period.
    pub sweep_interval: Duration,

    /// Sessions not checked within this long are evicted.
    pub stale_threshold: Duration,

    /// Check the log size every this many timer ticks.
    pub rotate_every: u32,

    /// Rotate the log once it exceeds this many bytes.
    pub log_max_bytes: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            license_dir: PathBuf::from(DEFAULT_LICENSE_DIR),
            log_file: None,
            workdir: None,
            port: None,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            silent: false,
            foreground: false,
            require_server_license: false,
            io_timeout: DEFAULT_IO_TIMEOUT,
            sweep_interval: Duration::from_secs(300),
            stale_threshold: Duration::from_secs(900),
            rotate_every: 4,
            log_max_bytes: 100 * 1024,
        }
    }
}

impl DaemonConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), SeatwardenError> {
        if self.license_dir.as_os_str().is_empty() {
            return Err(SeatwardenError::ConfigError(
                "license_dir cannot be empty".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(SeatwardenError::ConfigError(
                "sweep_interval must be positive".to_string(),
            ));
        }
        if self.io_timeout.is_zero() {
            return Err(SeatwardenError::ConfigError(
                "io_timeout must be positive".to_string(),
            ));
        }
        if self.rotate_every == 0 {
            return Err(SeatwardenError::ConfigError(
                "rotate_every must be at least 1".to_string(),
            ));
        }
        if self.stale_threshold.as_secs() > u32::MAX as u64 {
            return Err(SeatwardenError::ConfigError(format!(
                "stale_threshold too large: {}s",
                self.stale_threshold.as_secs()
            )));
        }
        Ok(())
    }

    /// Port to listen on.
    pub fn listen_port(&self) -> u16 {
        self.port.unwrap_or_else(service_port)
    }

    /// Path of the license file the daemon serves.
    pub fn license_path(&self) -> PathBuf {
        self.license_dir.join(crate::record::file::LICENSE_FILE_NAME)
    }
}

/// Configuration for license clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Daemon to use; `None` locates one with [`locate_server`].
    pub server: Option<ServerAddr>,

    /// Read the license file directly even if a server is configured.
    pub local_only: bool,

    /// Per-operation socket timeout.
    pub io_timeout: Duration,

    /// How long heartbeats may fail before the session must end.
    pub heartbeat_grace: Duration,

    /// Directory for the quick-revalidate stamp; `None` uses the user
    /// data directory.
    pub stamp_dir: Option<PathBuf>,

    /// Quick-revalidate window.
    pub quick_window: Duration,

    /// User name sent to the daemon; `None` reads `USER`/`LOGNAME`.
    pub user: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: None,
            local_only: false,
            io_timeout: DEFAULT_IO_TIMEOUT,
            heartbeat_grace: Duration::from_secs(1800),
            stamp_dir: None,
            quick_window: Duration::from_secs(5),
            user: None,
        }
    }
}

impl ClientConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), SeatwardenError> {
        if self.io_timeout.is_zero() {
            return Err(SeatwardenError::ConfigError(
                "io_timeout must be positive".to_string(),
            ));
        }
        if let Some(server) = &self.server {
            if server.host.trim().is_empty() {
                return Err(SeatwardenError::ConfigError(
                    "server host cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// User name to report.
    pub fn user_name(&self) -> String {
        self.user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("LOGNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
