//! Blocking TCP client for the license daemon.
//!
//! One connection per request: connect, send the request struct, read and
//! verify the acknowledgement. DUMP additionally receives the listing.

use crate::clock::{Clock, SystemClock};
use crate::config::ServerAddr;
use crate::crypto::secret::SharedSecret;
use crate::identity::local::Identity;
use crate::program::ProgramCode;
use crate::protocol::ack::{read_ack, ACK_SIZE};
use crate::protocol::io::{read_full, recv_dump_lines, write_full, Deadline};
use crate::protocol::models::{JobReq, RequestType};
use crate::SeatwardenError;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Client for one license daemon.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    server: ServerAddr,
    secret: SharedSecret,
    timeout: Duration,
}

impl DaemonClient {
    /// Create a client for `server`.
    pub fn new(server: ServerAddr, secret: SharedSecret, timeout: Duration) -> Self {
        Self {
            server,
            secret,
            timeout,
        }
    }

    /// The daemon this client talks to.
    pub fn server(&self) -> &ServerAddr {
        &self.server
    }

    fn connect(&self) -> Result<TcpStream, SeatwardenError> {
        let ports = self.server.ports();
        let mut last_err = None;

        for (i, port) in ports.iter().enumerate() {
            let addrs: Vec<SocketAddr> = (self.server.host.as_str(), *port)
                .to_socket_addrs()
                .map_err(|e| {
                    SeatwardenError::Transport(format!(
                        "cannot resolve {}: {}",
                        self.server.host, e
                    ))
                })?
                .collect();

            for addr in addrs {
                match TcpStream::connect_timeout(&addr, self.timeout) {
                    Ok(stream) => return Ok(stream),
                    Err(e) => {
                        let refused = e.kind() == ErrorKind::ConnectionRefused;
                        tracing::debug!(addr = %addr, error = %e, "connect failed");
                        last_err = Some(e);
                        if !refused {
                            break;
                        }
                    }
                }
            }

            if i + 1 < ports.len() {
                tracing::debug!(port, "trying fallback port");
            }
        }

        Err(SeatwardenError::Transport(match last_err {
            Some(e) => format!("cannot connect to {}: {}", self.server, e),
            None => format!("no addresses for {}", self.server),
        }))
    }

    /// Send `req` and return the open stream once the acknowledgement
    /// verifies as granted.
    fn transact(&self, req: &JobReq) -> Result<TcpStream, SeatwardenError> {
        let raw = req.to_bytes();
        let mut stream = self.connect()?;
        write_full(&mut stream, &raw, Deadline::after(self.timeout))?;

        let mut reply = [0u8; ACK_SIZE];
        read_full(&mut stream, &mut reply, Deadline::after(self.timeout))?;

        read_ack(&raw, &reply, &self.secret).into_result(&req.host)?;
        Ok(stream)
    }

    fn session_request(
        &self,
        req_type: RequestType,
        identity: &Identity,
        user: &str,
        pid: u32,
        code: ProgramCode,
    ) -> Result<(), SeatwardenError> {
        let req = JobReq::new(
            req_type,
            identity,
            user,
            pid,
            Some(code),
            SystemClock.now_epoch(),
        );
        self.transact(&req).map(|_| ())
    }

    /// Start a session for `identity`.
    pub fn open(
        &self,
        identity: &Identity,
        user: &str,
        pid: u32,
        code: ProgramCode,
    ) -> Result<(), SeatwardenError> {
        self.session_request(RequestType::Open, identity, user, pid, code)
    }

    /// Heartbeat an open session.
    pub fn check(
        &self,
        identity: &Identity,
        user: &str,
        pid: u32,
        code: ProgramCode,
    ) -> Result<(), SeatwardenError> {
        self.session_request(RequestType::Check, identity, user, pid, code)
    }

    /// End the session opened by `host`/`pid`.
    pub fn close(&self, host: &str, pid: u32) -> Result<(), SeatwardenError> {
        let req = JobReq {
            host: host.to_string(),
            pid,
            ..JobReq::admin(RequestType::Close, SystemClock.now_epoch())
        };
        self.transact(&req).map(|_| ())
    }

    /// Fetch the daemon's session listing.
    pub fn dump(&self) -> Result<Vec<String>, SeatwardenError> {
        let req = JobReq::admin(RequestType::Dump, SystemClock.now_epoch());
        let mut stream = self.transact(&req)?;
        recv_dump_lines(&mut stream, self.timeout)
    }

    /// Ask the daemon to exit.
    pub fn kill(&self) -> Result<(), SeatwardenError> {
        let req = JobReq::admin(RequestType::Kill, SystemClock.now_epoch());
        self.transact(&req).map(|_| ())
    }
}
