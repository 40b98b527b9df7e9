//! License Manager - the main public API for Seatwarden clients.
//!
//! The `LicenseManager` answers "may this program run here?":
//! - Remote validation through the license daemon when one is configured
//! - Local validation against the license file otherwise
//! - Identity fallback across hardware ids and network interfaces
//! - Umbrella-code downgrade to the best level that validates
//! - Heartbeats and release for daemon sessions

use crate::cache::stamp::{QuickStamp, StampRecord};
use crate::client::local::{load_license, validate_identities};
use crate::client::remote::DaemonClient;
use crate::clock::{Clock, SystemClock};
use crate::config::{locate_server, ClientConfig, ServerAddr};
use crate::crypto::secret::SharedSecret;
use crate::identity::local::{Identity, LocalIdentity};
use crate::messages::{text, Msg};
use crate::program::ProgramCode;
use crate::SeatwardenError;
use std::sync::Arc;

/// How a session was authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Checked against the license file directly.
    Local,
    /// Granted by the daemon at this address.
    Remote(ServerAddr),
    /// Reused a validation made moments earlier.
    QuickRevalidate,
}

/// An authorized program run.
#[derive(Debug, Clone)]
pub struct Session {
    /// Program level granted; may be below the requested umbrella code.
    pub program: ProgramCode,
    /// Identity the grant was made for.
    pub identity: Identity,
    /// How the grant was obtained.
    pub mode: SessionMode,
    /// Process id reported to the daemon.
    pub pid: u32,
    /// User reported to the daemon.
    pub user: String,
    last_contact: u32,
}

/// Result of a heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatStatus {
    /// Session confirmed.
    Ok,
    /// Daemon unreachable, still within the grace period.
    Warning(String),
    /// Session must end.
    Terminate(String),
}

/// Main license manager for Seatwarden clients.
///
/// Create one instance per process and reuse it for every check.
pub struct LicenseManager {
    config: ClientConfig,
    secret: SharedSecret,
    clock: Arc<dyn Clock>,
    local: LocalIdentity,
}

impl LicenseManager {
    /// Create a new license manager with the given configuration.
    ///
    /// Uses the system clock, the secret from the environment (or the
    /// built-in one), and this machine's identity.
    ///
    /// # Errors
    /// - Configuration validation fails
    /// - `SEATWARDEN_SECRET` is set but invalid
    pub fn new(config: ClientConfig) -> Result<Self, SeatwardenError> {
        config.validate()?;
        Ok(Self {
            config,
            secret: SharedSecret::from_env()?,
            clock: Arc::new(SystemClock),
            local: LocalIdentity::collect(),
        })
    }

    /// Create a license manager with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: ClientConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SeatwardenError> {
        let mut manager = Self::new(config)?;
        manager.clock = clock;
        Ok(manager)
    }

    /// Present `local` instead of the collected machine identity.
    pub fn with_identity(mut self, local: LocalIdentity) -> Self {
        self.local = local;
        self
    }

    /// Use `secret` instead of the environment's.
    pub fn with_secret(mut self, secret: SharedSecret) -> Self {
        self.secret = secret;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The identity presented to license checks.
    pub fn identity(&self) -> &LocalIdentity {
        &self.local
    }

    /// Validate `code`, looking for license data along `search_path`.
    ///
    /// The umbrella code falls back through its downgrade chain and the
    /// session carries the highest level granted. When nothing validates,
    /// the error for the requested level is returned.
    ///
    /// # Errors
    /// - `NoLicenseFile` / `ChecksumMismatch` / `ReadError` - license data is
    ///   unusable; no further identities or levels are tried
    /// - `NotLicensed` - no identity has a record
    /// - `Expired` / `SeatLimitReached` - the matched record's policy failed
    /// - `Timeout` / `Transport` / `AckForged` - the daemon could not be used
    pub fn validate(&self, code: ProgramCode, search_path: &str) -> Result<Session, SeatwardenError> {
        if let Some(session) = self.quick_revalidate(code) {
            return Ok(session);
        }

        let server = if self.config.local_only {
            None
        } else {
            match &self.config.server {
                Some(server) => Some(server.clone()),
                None => locate_server(search_path)?.map(|(addr, source)| {
                    tracing::debug!(server = %addr, source = ?source, "license server located");
                    addr
                }),
            }
        };

        let mut top_error = None;
        for level in code.downgrade_chain() {
            let attempt = match &server {
                Some(server) => self.validate_remote(*level, server),
                None => self.validate_local(*level, search_path),
            };
            match attempt {
                Ok(session) => {
                    tracing::info!(
                        requested = %code,
                        granted = %session.program,
                        host = %session.identity.host,
                        "license granted"
                    );
                    self.record_stamp(&session);
                    return Ok(session);
                }
                Err(e) if e.is_license_data_error() => return Err(e),
                Err(e) => {
                    tracing::debug!(program = %level, error = %e, "level not granted");
                    top_error.get_or_insert(e);
                }
            }
        }

        Err(top_error.unwrap_or(SeatwardenError::Unknown))
    }

    /// Validate, or print why not and exit with status 1.
    pub fn authorize_or_exit(&self, code: ProgramCode, search_path: &str) -> Session {
        match self.validate(code, search_path) {
            Ok(session) => session,
            Err(e) => {
                eprintln!("{}", self.failure_message(&e));
                std::process::exit(1);
            }
        }
    }

    /// Text shown when validation fails: host, reason and advice.
    pub fn failure_message(&self, error: &SeatwardenError) -> String {
        format!(
            "{} for host {}: {} ({}).\n{}",
            text(Msg::AuthFailed),
            self.local.hostname,
            error,
            crate::messages::explain(error.code()),
            text(Msg::ContactAdmin)
        )
    }

    /// Confirm a daemon session is still held.
    ///
    /// Local sessions always report `Ok`. A denial from the daemon ends the
    /// session at once; an unreachable daemon is tolerated for the grace
    /// period since the last successful contact.
    pub fn heartbeat(&self, session: &mut Session) -> HeartbeatStatus {
        let server = match &session.mode {
            SessionMode::Remote(server) => server.clone(),
            SessionMode::Local | SessionMode::QuickRevalidate => return HeartbeatStatus::Ok,
        };

        let now = self.clock.now_epoch();
        match self.client(server).check(
            &session.identity,
            &session.user,
            session.pid,
            session.program,
        ) {
            Ok(()) => {
                session.last_contact = now;
                HeartbeatStatus::Ok
            }
            Err(e) if e.is_retryable() && !matches!(e, SeatwardenError::NotLicensed { .. }) => {
                let silent_for = now.saturating_sub(session.last_contact) as u64;
                if silent_for > self.config.heartbeat_grace.as_secs() {
                    HeartbeatStatus::Terminate(format!("{}: {}", text(Msg::HeartbeatTerminate), e))
                } else {
                    tracing::warn!(error = %e, silent_for, "heartbeat failed");
                    HeartbeatStatus::Warning(format!("{}: {}", text(Msg::HeartbeatLost), e))
                }
            }
            Err(e) => HeartbeatStatus::Terminate(self.failure_message(&e)),
        }
    }

    /// End a session. Daemon sessions send CLOSE; local ones do nothing.
    pub fn release(&self, session: Session) -> Result<(), SeatwardenError> {
        match session.mode {
            SessionMode::Remote(server) => {
                self.client(server).close(&session.identity.host, session.pid)?;
                tracing::debug!(host = %session.identity.host, pid = session.pid, "session released");
                Ok(())
            }
            SessionMode::Local | SessionMode::QuickRevalidate => Ok(()),
        }
    }

    fn client(&self, server: ServerAddr) -> DaemonClient {
        DaemonClient::new(server, self.secret.clone(), self.config.io_timeout)
    }

    fn session(&self, program: ProgramCode, identity: Identity, mode: SessionMode) -> Session {
        Session {
            program,
            identity,
            mode,
            pid: std::process::id(),
            user: self.config.user_name(),
            last_contact: self.clock.now_epoch(),
        }
    }

    fn validate_local(&self, code: ProgramCode, search_path: &str) -> Result<Session, SeatwardenError> {
        let file = load_license(search_path, &self.secret)?;
        let identity = validate_identities(
            &file,
            &self.local.candidates(),
            code,
            self.clock.now_epoch(),
            &self.secret,
        )?;
        Ok(self.session(code, identity, SessionMode::Local))
    }

    fn validate_remote(&self, code: ProgramCode, server: &ServerAddr) -> Result<Session, SeatwardenError> {
        let client = self.client(server.clone());
        let user = self.config.user_name();
        let pid = std::process::id();

        let mut first_error = None;
        for identity in self.local.candidates() {
            match client.open(&identity, &user, pid, code) {
                Ok(()) => {
                    return Ok(self.session(code, identity, SessionMode::Remote(server.clone())))
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(host = %identity.host, addr = %identity.addr, error = %e, "identity rejected");
                    first_error.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(first_error.unwrap_or(SeatwardenError::NotLicensed {
            host: self.local.hostname.clone(),
        }))
    }

    fn quick_revalidate(&self, code: ProgramCode) -> Option<Session> {
        if !code.allows_quick_revalidate() {
            return None;
        }
        let record = self
            .stamp()?
            .fresh(code, self.clock.now_epoch(), self.config.quick_window)?;
        tracing::debug!(program = %code, "reusing recent validation");
        Some(self.session(
            code,
            Identity::new(record.host, self.local.primary_addr),
            SessionMode::QuickRevalidate,
        ))
    }

    fn record_stamp(&self, session: &Session) {
        if !session.program.allows_quick_revalidate() {
            return;
        }
        let record = StampRecord {
            program: session.program,
            host: session.identity.host.clone(),
            validated_at: self.clock.now_epoch(),
        };
        if let Some(Err(e)) = self.stamp().map(|s| s.save(&record)) {
            tracing::debug!(error = %e, "could not write stamp");
        }
    }

    fn stamp(&self) -> Option<QuickStamp> {
        let stamp = match &self.config.stamp_dir {
            Some(dir) => QuickStamp::in_dir(dir),
            None => QuickStamp::new(),
        };
        stamp.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::identity::local::Interface;
    use crate::record::builder::{Grant, LicenseBuilder};
    use crate::record::file::LICENSE_FILE_NAME;
    use std::net::Ipv4Addr;
    use tempfile::TempDir;

    const ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);

    fn local_identity() -> LocalIdentity {
        LocalIdentity {
            hostname: "build1".into(),
            primary_addr: ADDR,
            resolved_addrs: vec![ADDR, Ipv4Addr::new(172, 16, 4, 2)],
            hardware_id: None,
            interfaces: vec![Interface {
                name: "eth1".into(),
                addr: Ipv4Addr::new(10, 0, 0, 7),
                hwaddr: None,
            }],
        }
    }

    fn license_dir(grants: Vec<Grant>) -> TempDir {
        let dir = TempDir::new().unwrap();
        let mut builder = LicenseBuilder::new();
        for grant in grants {
            builder.add(grant).unwrap();
        }
        builder
            .build(&SharedSecret::builtin())
            .save(&dir.path().join(LICENSE_FILE_NAME))
            .unwrap();
        dir
    }

    fn manager(stamp_dir: &TempDir, clock: Arc<dyn Clock>) -> LicenseManager {
        let config = ClientConfig {
            local_only: true,
            stamp_dir: Some(stamp_dir.path().to_path_buf()),
            ..ClientConfig::default()
        };
        LicenseManager::new_with_clock(config, clock)
            .unwrap()
            .with_identity(local_identity())
            .with_secret(SharedSecret::builtin())
    }

    #[test]
    fn test_local_validation() {
        let lic = license_dir(vec![Grant::host("build1", ADDR, ProgramCode::Xic)]);
        let stamps = TempDir::new().unwrap();
        let mgr = manager(&stamps, Arc::new(MockClock::at_epoch(1_000)));

        let session = mgr
            .validate(ProgramCode::Xic, &lic.path().display().to_string())
            .unwrap();
        assert_eq!(session.program, ProgramCode::Xic);
        assert_eq!(session.mode, SessionMode::Local);
    }

    #[test]
    fn test_falls_back_to_interface_identity() {
        let iface = Ipv4Addr::new(10, 0, 0, 7);
        let lic = license_dir(vec![Grant::host("build1", iface, ProgramCode::Xic)]);
        let stamps = TempDir::new().unwrap();
        let mgr = manager(&stamps, Arc::new(MockClock::at_epoch(1_000)));

        let session = mgr
            .validate(ProgramCode::Xic, &lic.path().display().to_string())
            .unwrap();
        assert_eq!(session.program, ProgramCode::Xic);
        assert_eq!(session.identity.addr, iface);
    }

    #[test]
    fn test_falls_back_to_secondary_resolved_address() {
        let secondary = Ipv4Addr::new(172, 16, 4, 2);
        let lic = license_dir(vec![Grant::host("build1", secondary, ProgramCode::Oa)]);
        let stamps = TempDir::new().unwrap();
        let mgr = manager(&stamps, Arc::new(MockClock::at_epoch(1_000)));

        let session = mgr
            .validate(ProgramCode::Oa, &lic.path().display().to_string())
            .unwrap();
        assert_eq!(session.identity.addr, secondary);
    }

    #[test]
    fn test_umbrella_downgrades_to_best_level() {
        let lic = license_dir(vec![Grant::host("build1", ADDR, ProgramCode::Xicii)]);
        let stamps = TempDir::new().unwrap();
        let mgr = manager(&stamps, Arc::new(MockClock::at_epoch(1_000)));

        let session = mgr
            .validate(ProgramCode::Xic, &lic.path().display().to_string())
            .unwrap();
        assert_eq!(session.program, ProgramCode::Xicii);
    }

    #[test]
    fn test_failure_reports_top_level_error() {
        let lic = license_dir(vec![Grant::host("build1", ADDR, ProgramCode::Xic).expires(500)]);
        let stamps = TempDir::new().unwrap();
        let mgr = manager(&stamps, Arc::new(MockClock::at_epoch(1_000)));

        let result = mgr.validate(ProgramCode::Xic, &lic.path().display().to_string());
        assert!(matches!(result, Err(SeatwardenError::Expired { .. })));
    }

    #[test]
    fn test_missing_license_is_terminal() {
        let empty = TempDir::new().unwrap();
        let stamps = TempDir::new().unwrap();
        let mgr = manager(&stamps, Arc::new(MockClock::at_epoch(1_000)));

        let result = mgr.validate(ProgramCode::Xic, &empty.path().display().to_string());
        assert!(matches!(result, Err(SeatwardenError::NoLicenseFile(_))));
    }

    #[test]
    fn test_quick_revalidate_window() {
        let lic = license_dir(vec![Grant::host("build1", ADDR, ProgramCode::Wrspice)]);
        let search = lic.path().display().to_string();
        let stamps = TempDir::new().unwrap();
        let clock = Arc::new(MockClock::at_epoch(1_000));
        let mgr = manager(&stamps, clock.clone());

        assert_eq!(
            mgr.validate(ProgramCode::Wrspice, &search).unwrap().mode,
            SessionMode::Local
        );

        // License removed; a re-run within the window still passes.
        std::fs::remove_file(lic.path().join(LICENSE_FILE_NAME)).unwrap();
        clock.advance(chrono::Duration::seconds(3));
        assert_eq!(
            mgr.validate(ProgramCode::Wrspice, &search).unwrap().mode,
            SessionMode::QuickRevalidate
        );

        clock.advance(chrono::Duration::seconds(10));
        assert!(mgr.validate(ProgramCode::Wrspice, &search).is_err());
    }

    #[test]
    fn test_local_heartbeat_and_release() {
        let lic = license_dir(vec![Grant::host("build1", ADDR, ProgramCode::Oa)]);
        let stamps = TempDir::new().unwrap();
        let mgr = manager(&stamps, Arc::new(MockClock::at_epoch(1_000)));

        let mut session = mgr
            .validate(ProgramCode::Oa, &lic.path().display().to_string())
            .unwrap();
        assert_eq!(mgr.heartbeat(&mut session), HeartbeatStatus::Ok);
        assert!(mgr.release(session).is_ok());
    }

    #[test]
    fn test_heartbeat_grace() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let stamps = TempDir::new().unwrap();
        let clock = Arc::new(MockClock::at_epoch(1_000));
        let mgr = manager(&stamps, clock.clone());
        let mut session = mgr.session(
            ProgramCode::Xic,
            Identity::new("build1", ADDR),
            SessionMode::Remote(ServerAddr::with_port("127.0.0.1", port)),
        );

        assert!(matches!(mgr.heartbeat(&mut session), HeartbeatStatus::Warning(_)));
        clock.advance(chrono::Duration::seconds(1801));
        assert!(matches!(mgr.heartbeat(&mut session), HeartbeatStatus::Terminate(_)));
    }

    #[test]
    fn test_failure_message_names_host_and_reason() {
        let stamps = TempDir::new().unwrap();
        let mgr = manager(&stamps, Arc::new(MockClock::at_epoch(1_000)));
        let msg = mgr.failure_message(&SeatwardenError::SeatLimitReached {
            host: "build1".into(),
        });
        assert!(msg.contains("build1"));
        assert!(msg.contains("all licensed seats are in use"));
    }
}
