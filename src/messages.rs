//! User-visible message texts.
//!
//! Operator and end-user facing strings live here so they can be reviewed
//! and translated in one place. Log events use `tracing` fields instead.

use crate::errors::ErrorCode;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Message identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Msg {
    /// Validation failed; followed by host and reason.
    AuthFailed,
    /// Advice printed after a failed validation.
    ContactAdmin,
    /// A heartbeat could not reach the daemon.
    HeartbeatLost,
    /// The heartbeat grace period ran out.
    HeartbeatTerminate,
    /// Daemon is accepting connections.
    DaemonListening,
    /// Daemon refused to start (unusable license data or unbindable port).
    DaemonLicenseInvalid,
    /// Daemon stopped by a signal.
    DaemonSignalled,
    /// Daemon stopped by an administrative KILL.
    DaemonKilled,
    /// Admin KILL acknowledged.
    KillAcknowledged,
    /// Admin CLOSE acknowledged.
    CloseAcknowledged,
    /// DUMP returned no sessions.
    NoJobs,
}

static MESSAGES: Lazy<HashMap<Msg, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (Msg::AuthFailed, "Unable to obtain a license"),
        (
            Msg::ContactAdmin,
            "Contact your system administrator to obtain or extend a license.",
        ),
        (Msg::HeartbeatLost, "Lost contact with the license server"),
        (
            Msg::HeartbeatTerminate,
            "License server unreachable past the grace period, exiting",
        ),
        (Msg::DaemonListening, "License server ready"),
        (Msg::DaemonLicenseInvalid, "License server cannot start"),
        (Msg::DaemonSignalled, "License server stopped by signal"),
        (Msg::DaemonKilled, "License server stopped by administrative request"),
        (Msg::KillAcknowledged, "License server is shutting down"),
        (Msg::CloseAcknowledged, "Session closed"),
        (Msg::NoJobs, "No open sessions"),
    ])
});

static EXPLANATIONS: Lazy<HashMap<ErrorCode, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (ErrorCode::Ok, "no error"),
        (ErrorCode::NoLicenseFile, "the license file could not be found"),
        (ErrorCode::OutOfMemory, "the license server ran out of memory"),
        (ErrorCode::ReadError, "the license file could not be read"),
        (
            ErrorCode::ChecksumMismatch,
            "the license file is corrupt or has been edited",
        ),
        (ErrorCode::NotLicensed, "this host is not licensed"),
        (ErrorCode::Expired, "the license has expired"),
        (ErrorCode::SeatLimitReached, "all licensed seats are in use"),
        (ErrorCode::Unknown, "an unknown error occurred"),
        (
            ErrorCode::ServerSideRequestRejected,
            "the server license cannot be requested by a client",
        ),
        (
            ErrorCode::MalformedRequest,
            "the license server rejected a malformed request",
        ),
    ])
});

/// Text for `msg`.
pub fn text(msg: Msg) -> &'static str {
    MESSAGES.get(&msg).copied().unwrap_or("")
}

/// Plain-language explanation of a wire error code.
pub fn explain(code: ErrorCode) -> &'static str {
    EXPLANATIONS
        .get(&code)
        .copied()
        .unwrap_or("an unknown error occurred")
}
