//! The license daemon: accept loop, request dispatch, maintenance timer.
//!
//! Each connection carries exactly one request and gets exactly one
//! acknowledgement (DUMP follows its acknowledgement with the listing).
//! Connections are served on their own tasks; the job registry is the only
//! shared mutable state and sits behind one async mutex, so the seat count
//! for an OPEN and its insertion happen under a single lock acquisition.
//! The license file is read fresh for every request.

use crate::clock::{format_epoch, Clock, SystemClock};
use crate::config::DaemonConfig;
use crate::crypto::secret::SharedSecret;
use crate::identity::local::LocalIdentity;
use crate::identity::resolver::lookup;
use crate::policy::access::{evaluate, SeatCap, SeatPolicy};
use crate::program::ProgramCode;
use crate::protocol::ack::build_ack;
use crate::protocol::io::{read_full_async, send_dump_lines, write_full_async, Deadline};
use crate::protocol::models::{JobReq, RequestType, JOB_REQ_SIZE};
use crate::record::file::LicenseFile;
use crate::record::matchkey::is_reserved_host;
use crate::registry::jobs::{JobEntry, JobRegistry};
use crate::server::logfile::RotatingLog;
use crate::SeatwardenError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};

/// Why [`LicenseServer::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An administrative KILL was received.
    Killed,
}

/// What a dispatched request asks the connection handler to do next.
enum Action {
    Reply,
    Dump(Vec<String>),
    Kill,
}

struct Shared {
    config: DaemonConfig,
    secret: SharedSecret,
    clock: Arc<dyn Clock>,
    registry: Mutex<JobRegistry>,
    shutdown: Notify,
    started_at: u32,
}

/// Check the daemon's license data before serving.
///
/// The license directory must exist and hold a verifiable `license.xt`.
/// With `require_server_license` the file must also grant the server code
/// to one of this machine's identities.
pub fn verify_startup_license(
    config: &DaemonConfig,
    secret: &SharedSecret,
    now: u32,
) -> Result<LicenseFile, SeatwardenError> {
    if !config.license_dir.is_dir() {
        return Err(SeatwardenError::NoLicenseFile(format!(
            "license directory {} does not exist",
            config.license_dir.display()
        )));
    }
    let file = LicenseFile::load(&config.license_path(), secret)?;

    if config.require_server_license {
        let local = LocalIdentity::collect();
        let granted = local.candidates().iter().any(|id| {
            lookup(&file, &id.host, id.addr, ProgramCode::Server, secret)
                .map(|hit| evaluate(hit.block, &file, now, SeatPolicy::Skip, &id.host).is_ok())
                .unwrap_or(false)
        });
        if !granted {
            return Err(SeatwardenError::NotLicensed {
                host: local.hostname,
            });
        }
    }

    Ok(file)
}

/// Bind the daemon's listening socket.
///
/// A port that cannot be bound is fatal; call this before detaching so the
/// failure reaches the terminal and the exit status.
pub fn bind_listener(config: &DaemonConfig) -> Result<std::net::TcpListener, SeatwardenError> {
    let addr = SocketAddr::new(config.bind_addr, config.listen_port());
    let listener = std::net::TcpListener::bind(addr)
        .map_err(|e| SeatwardenError::ConfigError(format!("cannot bind {}: {}", addr, e)))?;
    listener
        .set_nonblocking(true)
        .map_err(|e| SeatwardenError::ConfigError(format!("cannot bind {}: {}", addr, e)))?;
    Ok(listener)
}

/// A bound, not yet serving, license daemon.
pub struct LicenseServer {
    shared: Arc<Shared>,
    listener: TcpListener,
    log: Option<RotatingLog>,
}

/// Cloneable handle for inspecting and stopping a running daemon.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<Shared>,
}

impl LicenseServer {
    /// Verify the license data and bind the listening socket.
    ///
    /// # Errors
    /// - `ConfigError` - invalid configuration or the port cannot be bound
    /// - license data errors from [`verify_startup_license`]
    pub async fn bind(config: DaemonConfig, secret: SharedSecret) -> Result<Self, SeatwardenError> {
        Self::bind_inner(config, secret, Arc::new(SystemClock)).await
    }

    /// Bind with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub async fn bind_with_clock(
        config: DaemonConfig,
        secret: SharedSecret,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SeatwardenError> {
        Self::bind_inner(config, secret, clock).await
    }

    /// Serve on a listener bound earlier with [`bind_listener`].
    ///
    /// Lets the caller claim the port before detaching from the terminal.
    /// Must be called from within a tokio runtime.
    pub async fn from_listener(
        config: DaemonConfig,
        secret: SharedSecret,
        listener: std::net::TcpListener,
    ) -> Result<Self, SeatwardenError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        verify_startup_license(&config, &secret, clock.now_epoch())?;
        Self::assemble(config, secret, clock, listener)
    }

    async fn bind_inner(
        config: DaemonConfig,
        secret: SharedSecret,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SeatwardenError> {
        config.validate()?;
        verify_startup_license(&config, &secret, clock.now_epoch())?;
        let listener = bind_listener(&config)?;
        Self::assemble(config, secret, clock, listener)
    }

    fn assemble(
        config: DaemonConfig,
        secret: SharedSecret,
        clock: Arc<dyn Clock>,
        listener: std::net::TcpListener,
    ) -> Result<Self, SeatwardenError> {
        let listener = TcpListener::from_std(listener)
            .map_err(|e| SeatwardenError::ConfigError(format!("cannot register listener: {}", e)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| SeatwardenError::Transport(e.to_string()))?;

        tracing::info!(
            addr = %addr,
            license = %config.license_path().display(),
            "license verified, socket bound"
        );

        let now = clock.now_epoch();
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                secret,
                clock,
                registry: Mutex::new(JobRegistry::new()),
                shutdown: Notify::new(),
                started_at: now,
            }),
            listener,
            log: None,
        })
    }

    /// Rotate `log` from the maintenance timer.
    pub fn with_log(mut self, log: RotatingLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Address the daemon is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, SeatwardenError> {
        self.listener
            .local_addr()
            .map_err(|e| SeatwardenError::Transport(e.to_string()))
    }

    /// Handle usable after [`serve`](Self::serve) takes ownership.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Accept and serve connections until a KILL request arrives.
    pub async fn serve(self) -> Result<ShutdownReason, SeatwardenError> {
        let timer = tokio::spawn(maintenance_loop(Arc::clone(&self.shared), self.log.clone()));

        let reason = loop {
            tokio::select! {
                _ = self.shared.shutdown.notified() => break ShutdownReason::Killed,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let shared = Arc::clone(&self.shared);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(&shared, stream, peer).await {
                                tracing::warn!(peer = %peer, error = %e, "connection dropped");
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
            }
        };

        timer.abort();
        tracing::info!(reason = ?reason, "license server stopping");
        Ok(reason)
    }
}

impl ServerHandle {
    /// Run one stale-session sweep now. Returns the number evicted.
    pub async fn sweep_now(&self) -> usize {
        sweep(&self.shared).await
    }

    /// Number of open sessions.
    pub async fn open_sessions(&self) -> usize {
        self.shared.registry.lock().await.len()
    }

    /// Stop the accept loop as a KILL would.
    pub fn shutdown(&self) {
        self.shared.shutdown.notify_one();
    }
}

async fn maintenance_loop(shared: Arc<Shared>, log: Option<RotatingLog>) {
    let mut ticker = tokio::time::interval(shared.config.sweep_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut ticks: u32 = 0;
    loop {
        ticker.tick().await;
        ticks = ticks.wrapping_add(1);

        sweep(&shared).await;

        if ticks % shared.config.rotate_every == 0 {
            if let Some(log) = &log {
                match log.rotate_if_needed() {
                    Ok(true) => tracing::info!(path = %log.path().display(), "log rotated"),
                    Ok(false) => {}
                    Err(e) => tracing::warn!(error = %e, "log rotation failed"),
                }
            }
        }
    }
}

async fn sweep(shared: &Shared) -> usize {
    let now = shared.clock.now_epoch();
    let stale = shared.config.stale_threshold.as_secs() as u32;
    let evicted = shared.registry.lock().await.sweep(now, stale);
    for entry in &evicted {
        tracing::info!(
            host = %entry.host,
            user = %entry.user,
            pid = entry.pid,
            program = %entry.program,
            last_check = %format_epoch(entry.last_check),
            "stale session evicted"
        );
    }
    evicted.len()
}

async fn handle_connection(
    shared: &Shared,
    mut stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), SeatwardenError> {
    let timeout = shared.config.io_timeout;
    let mut raw = [0u8; JOB_REQ_SIZE];
    read_full_async(&mut stream, &mut raw, Deadline::after(timeout)).await?;

    let outcome = dispatch(shared, &raw, peer.ip()).await;
    let ack = build_ack(
        &raw,
        outcome.as_ref().map(|_| ()).map_err(|e| e.code()),
        &shared.secret,
    );
    write_full_async(&mut stream, &ack, Deadline::after(timeout)).await?;

    match outcome {
        Ok(Action::Reply) | Err(_) => {}
        Ok(Action::Dump(lines)) => send_dump_lines(&mut stream, &lines, timeout).await?,
        Ok(Action::Kill) => {
            tracing::info!(peer = %peer, "KILL received");
            shared.shutdown.notify_one();
        }
    }
    Ok(())
}

async fn dispatch(
    shared: &Shared,
    raw: &[u8; JOB_REQ_SIZE],
    peer: IpAddr,
) -> Result<Action, SeatwardenError> {
    let req = JobReq::from_bytes(raw)?;
    let req_type = req.request_type().ok_or_else(|| {
        SeatwardenError::MalformedRequest(format!("unknown request type {}", req.req_type))
    })?;

    let result = match req_type {
        RequestType::Open => open(shared, &req, peer).await.map(|()| Action::Reply),
        RequestType::Check => check(shared, &req).await.map(|()| Action::Reply),
        RequestType::Close => close(shared, &req).await.map(|()| Action::Reply),
        RequestType::Dump => Ok(Action::Dump(dump_lines(shared).await)),
        RequestType::Kill => Ok(Action::Kill),
        RequestType::None => Err(SeatwardenError::MalformedRequest(
            "request type NONE".to_string(),
        )),
    };

    match &result {
        Ok(_) => tracing::info!(
            request = req_type.name(),
            host = %req.host,
            user = %req.user,
            pid = req.pid,
            code = req.code,
            peer = %peer,
            "request granted"
        ),
        Err(e) => tracing::warn!(
            request = req_type.name(),
            host = %req.host,
            user = %req.user,
            pid = req.pid,
            code = req.code,
            peer = %peer,
            error = %e,
            "request denied"
        ),
    }
    result
}

/// Host claim and program code every session request must carry.
fn session_target(req: &JobReq) -> Result<ProgramCode, SeatwardenError> {
    if req.host.is_empty() {
        return Err(SeatwardenError::MalformedRequest("empty host".to_string()));
    }
    if is_reserved_host(req.identity().bare_host()) {
        return Err(SeatwardenError::MalformedRequest(format!(
            "reserved host name {}",
            req.host
        )));
    }
    let program = req.program().ok_or_else(|| {
        SeatwardenError::MalformedRequest(format!("unknown program code {}", req.code))
    })?;
    if program == ProgramCode::Server {
        return Err(SeatwardenError::ServerSideRequestRejected);
    }
    Ok(program)
}

async fn load_license(shared: &Shared) -> Result<LicenseFile, SeatwardenError> {
    let path = shared.config.license_path();
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            SeatwardenError::NoLicenseFile(format!("{}: {}", path.display(), e))
        }
        _ => SeatwardenError::ReadError(format!("{}: {}", path.display(), e)),
    })?;
    LicenseFile::from_bytes(&bytes, &shared.secret)
}

async fn open(shared: &Shared, req: &JobReq, peer: IpAddr) -> Result<(), SeatwardenError> {
    let program = session_target(req)?;
    let file = load_license(shared).await?;
    let hit = lookup(&file, &req.host, req.addr, program, &shared.secret).ok_or_else(|| {
        SeatwardenError::NotLicensed {
            host: req.host.clone(),
        }
    })?;
    let cap = SeatCap::for_block(hit.block, &file);

    let mut registry = shared.registry.lock().await;
    let now = shared.clock.now_epoch();
    let current = match cap {
        Some(cap) => registry.count_seats(program, cap.slot) + 1,
        None => 1,
    };
    evaluate(hit.block, &file, now, SeatPolicy::Counted { current }, &req.host)?;

    registry.insert(JobEntry {
        host: req.host.clone(),
        user: req.user.clone(),
        pid: req.pid,
        peer_addr: peer,
        addr: req.addr,
        program,
        slot: cap.map(|c| c.slot),
        req_type: RequestType::Open,
        opened_at: now,
        last_check: now,
    });
    Ok(())
}

async fn check(shared: &Shared, req: &JobReq) -> Result<(), SeatwardenError> {
    let program = session_target(req)?;
    let file = load_license(shared).await?;
    let hit = lookup(&file, &req.host, req.addr, program, &shared.secret).ok_or_else(|| {
        SeatwardenError::NotLicensed {
            host: req.host.clone(),
        }
    })?;
    let now = shared.clock.now_epoch();
    evaluate(hit.block, &file, now, SeatPolicy::Skip, &req.host)?;

    if !shared
        .registry
        .lock()
        .await
        .refresh(&req.host, req.pid, program, now)
    {
        tracing::debug!(host = %req.host, pid = req.pid, "CHECK for unknown session");
    }
    Ok(())
}

async fn close(shared: &Shared, req: &JobReq) -> Result<(), SeatwardenError> {
    shared
        .registry
        .lock()
        .await
        .remove(&req.host, req.pid)
        .map(|_| ())
        .ok_or(SeatwardenError::Unknown)
}

async fn dump_lines(shared: &Shared) -> Vec<String> {
    let registry = shared.registry.lock().await;
    let mut lines = Vec::with_capacity(registry.len() + 1);
    lines.push(format!(
        "seatwardend {} running since {}, {} open session(s)",
        env!("CARGO_PKG_VERSION"),
        format_epoch(shared.started_at),
        registry.len()
    ));
    lines.extend(registry.dump_lines());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::identity::local::Identity;
    use crate::protocol::ack::{read_ack, AckOutcome};
    use crate::record::builder::{Grant, LicenseBuilder};
    use crate::record::file::LICENSE_FILE_NAME;
    use crate::errors::ErrorCode;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const HOST: &str = "build1";
    const ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);

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

    fn config(dir: &TempDir) -> DaemonConfig {
        DaemonConfig {
            license_dir: dir.path().to_path_buf(),
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: Some(0),
            io_timeout: Duration::from_secs(2),
            ..DaemonConfig::default()
        }
    }

    async fn send(addr: SocketAddr, req: &JobReq) -> AckOutcome {
        let raw = req.to_bytes();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&raw).await.unwrap();
        let mut reply = [0u8; JOB_REQ_SIZE];
        stream.read_exact(&mut reply).await.unwrap();
        read_ack(&raw, &reply, &SharedSecret::builtin())
    }

    fn open_req(pid: u32, code: ProgramCode) -> JobReq {
        JobReq::new(
            RequestType::Open,
            &Identity::new(HOST, ADDR),
            "alice",
            pid,
            Some(code),
            0,
        )
    }

    #[tokio::test]
    async fn test_missing_license_dir_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = DaemonConfig {
            license_dir: dir.path().join("absent"),
            ..config(&dir)
        };
        let result = LicenseServer::bind(config, SharedSecret::builtin()).await;
        assert!(matches!(result, Err(SeatwardenError::NoLicenseFile(_))));
    }

    #[tokio::test]
    async fn test_corrupt_license_is_fatal() {
        let dir = license_dir(vec![Grant::host(HOST, ADDR, ProgramCode::Xic)]);
        let path = dir.path().join(LICENSE_FILE_NAME);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[100] ^= 1;
        std::fs::write(&path, bytes).unwrap();

        let result = LicenseServer::bind(config(&dir), SharedSecret::builtin()).await;
        assert!(matches!(result, Err(SeatwardenError::ChecksumMismatch)));
    }

    #[tokio::test]
    async fn test_rejects_server_code_and_reserved_hosts() {
        let dir = license_dir(vec![Grant::host(HOST, ADDR, ProgramCode::Xic)]);
        let server = LicenseServer::bind(config(&dir), SharedSecret::builtin())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        tokio::spawn(server.serve());

        let outcome = send(addr, &open_req(1, ProgramCode::Server)).await;
        assert_eq!(outcome, AckOutcome::Denied(ErrorCode::ServerSideRequestRejected));

        let reserved = JobReq {
            host: "*SITE-C*".into(),
            ..open_req(1, ProgramCode::Xic)
        };
        let outcome = send(addr, &reserved).await;
        assert_eq!(outcome, AckOutcome::Denied(ErrorCode::MalformedRequest));

        let bad_type = JobReq {
            req_type: 42,
            ..open_req(1, ProgramCode::Xic)
        };
        let outcome = send(addr, &bad_type).await;
        assert_eq!(outcome, AckOutcome::Denied(ErrorCode::MalformedRequest));

        assert_eq!(handle.open_sessions().await, 0);
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_check_refreshes_and_sweep_evicts() {
        let dir = license_dir(vec![Grant::host(HOST, ADDR, ProgramCode::Xic).seats(2)]);
        let clock = Arc::new(MockClock::at_epoch(1_700_000_000));
        let server = LicenseServer::bind_with_clock(
            config(&dir),
            SharedSecret::builtin(),
            clock.clone(),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        tokio::spawn(server.serve());

        assert_eq!(send(addr, &open_req(7, ProgramCode::Xic)).await, AckOutcome::Granted);
        assert_eq!(send(addr, &open_req(8, ProgramCode::Xic)).await, AckOutcome::Granted);

        clock.advance(chrono::Duration::seconds(600));
        let check = JobReq {
            req_type: RequestType::Check as u32,
            ..open_req(7, ProgramCode::Xic)
        };
        assert_eq!(send(addr, &check).await, AckOutcome::Granted);

        // Pid 8 was last seen 1000s ago, pid 7 only 400s ago.
        clock.advance(chrono::Duration::seconds(400));
        assert_eq!(handle.sweep_now().await, 1);
        assert_eq!(handle.open_sessions().await, 1);

        // CHECK for a session the daemon no longer knows still succeeds.
        let unknown = JobReq {
            req_type: RequestType::Check as u32,
            ..open_req(8, ProgramCode::Xic)
        };
        assert_eq!(send(addr, &unknown).await, AckOutcome::Granted);
        assert_eq!(handle.open_sessions().await, 1);
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_expired_record_denied() {
        let dir = license_dir(vec![Grant::host(HOST, ADDR, ProgramCode::Xiv).expires(1_000)]);
        let clock = Arc::new(MockClock::at_epoch(2_000));
        let server = LicenseServer::bind_with_clock(config(&dir), SharedSecret::builtin(), clock)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        tokio::spawn(server.serve());

        let outcome = send(addr, &open_req(1, ProgramCode::Xiv)).await;
        assert_eq!(outcome, AckOutcome::Denied(ErrorCode::Expired));

        let outcome = send(addr, &open_req(1, ProgramCode::Xic)).await;
        assert_eq!(outcome, AckOutcome::Denied(ErrorCode::NotLicensed));
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_close_unknown_session() {
        let dir = license_dir(vec![Grant::host(HOST, ADDR, ProgramCode::Xic)]);
        let server = LicenseServer::bind(config(&dir), SharedSecret::builtin())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        tokio::spawn(server.serve());

        let close = JobReq {
            req_type: RequestType::Close as u32,
            ..open_req(99, ProgramCode::Xic)
        };
        assert_eq!(send(addr, &close).await, AckOutcome::Denied(ErrorCode::Unknown));
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_port_in_use_is_fatal() {
        let dir = license_dir(vec![Grant::host(HOST, ADDR, ProgramCode::Xic)]);
        let taken = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let config = DaemonConfig {
            port: Some(taken.local_addr().unwrap().port()),
            ..config(&dir)
        };

        assert!(matches!(
            bind_listener(&config),
            Err(SeatwardenError::ConfigError(_))
        ));
        let result = LicenseServer::bind(config, SharedSecret::builtin()).await;
        assert!(matches!(result, Err(SeatwardenError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_serves_prebound_listener() {
        let dir = license_dir(vec![Grant::host(HOST, ADDR, ProgramCode::Xic)]);
        let listener = bind_listener(&config(&dir)).unwrap();
        let addr = listener.local_addr().unwrap();

        let server = LicenseServer::from_listener(config(&dir), SharedSecret::builtin(), listener)
            .await
            .unwrap();
        assert_eq!(server.local_addr().unwrap(), addr);
        let handle = server.handle();
        tokio::spawn(server.serve());

        assert_eq!(send(addr, &open_req(1, ProgramCode::Xic)).await, AckOutcome::Granted);
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_seat_pool_fills_and_frees() {
        let dir = license_dir(vec![Grant::host(HOST, ADDR, ProgramCode::Xic).seats(2)]);
        let server = LicenseServer::bind(config(&dir), SharedSecret::builtin())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        tokio::spawn(server.serve());

        assert_eq!(send(addr, &open_req(1, ProgramCode::Xic)).await, AckOutcome::Granted);
        assert_eq!(send(addr, &open_req(2, ProgramCode::Xic)).await, AckOutcome::Granted);
        assert_eq!(
            send(addr, &open_req(3, ProgramCode::Xic)).await,
            AckOutcome::Denied(ErrorCode::SeatLimitReached)
        );

        // A heartbeat on a full pool neither fails nor takes a seat.
        let check = JobReq {
            req_type: RequestType::Check as u32,
            ..open_req(1, ProgramCode::Xic)
        };
        assert_eq!(send(addr, &check).await, AckOutcome::Granted);
        assert_eq!(handle.open_sessions().await, 2);

        let close = JobReq {
            req_type: RequestType::Close as u32,
            ..open_req(2, ProgramCode::Xic)
        };
        assert_eq!(send(addr, &close).await, AckOutcome::Granted);
        assert_eq!(handle.open_sessions().await, 1);

        assert_eq!(send(addr, &open_req(3, ProgramCode::Xic)).await, AckOutcome::Granted);
        assert_eq!(
            send(addr, &open_req(4, ProgramCode::Xic)).await,
            AckOutcome::Denied(ErrorCode::SeatLimitReached)
        );
        assert_eq!(handle.open_sessions().await, 2);
        handle.shutdown();
    }
}
