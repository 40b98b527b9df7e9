//! # Seatwarden
//!
//! **Node-locked and floating seat licensing for Rust programs.**
//!
//! Seatwarden decides whether a (host, address, program) triple may run.
//! Grants live in a fixed-layout license file sealed by a keyed checksum;
//! a license daemon hands out floating seats over a small TCP protocol
//! with tamper-resistant acknowledgements.
//!
//! ## Features
//!
//! - **Sealed license file** — 63 grant records plus a whole-file checksum;
//!   any edited byte is rejected
//! - **Fallback matching** — exact host, older mixed-case records, then
//!   class-C and class-B site grants
//! - **Seat pools** — grants sharing a program and cap draw from one pool
//! - **Bound acknowledgements** — every reply is digested together with its
//!   request, so forged or replayed replies are detected
//! - **Identity fallback** — clients retry with hardware-qualified and
//!   per-interface identities before giving up
//!
//! ## Quickstart
//!
//! ```no_run
//! use seatwarden::{ClientConfig, LicenseManager, ProgramCode};
//!
//! fn main() -> Result<(), seatwarden::SeatwardenError> {
//!     let manager = LicenseManager::new(ClientConfig::default())?;
//!     let session = manager.authorize_or_exit(ProgramCode::Xic, "/usr/local/seatwarden/license");
//!
//!     println!("running as {} on {}", session.program, session.identity.host);
//!     manager.release(session)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Finding the license
//!
//! Clients talk to a daemon named by `SEATWARDEN_SERVER`, a `license.host`
//! file on the search path, or the `seatwarden` DNS alias, in that order.
//! With none of those, `license.xt` is read from the search path directly
//! and only single-seat grants can validate.
//!
//! ## Threat Model
//!
//! The checksum secret is compiled in (or supplied via
//! `SEATWARDEN_SECRET`). Seatwarden detects edited license files and
//! spoofed daemon replies; it does **not** prevent binary patching. A
//! determined attacker with the binary can always bypass client-side checks.

#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/seatwarden/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;
pub mod messages;
pub mod program;

// Crypto layer
pub mod crypto;

// License file layer
pub mod record;

// Identity layer
pub mod identity;

// Policy layer
pub mod policy;

// Protocol layer
pub mod protocol;

// Client layer
pub mod client;

// Cache layer
pub mod cache;

// Daemon
pub mod registry;
pub mod server;

// Manager (main client API)
pub mod manager;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::{ClientConfig, DaemonConfig, ServerAddr};
pub use crypto::secret::SharedSecret;
pub use errors::{ErrorCode, SeatwardenError};
pub use manager::{HeartbeatStatus, LicenseManager, Session, SessionMode};
pub use program::ProgramCode;
pub use record::builder::{Grant, LicenseBuilder};
pub use record::file::LicenseFile;
pub use server::daemon::{LicenseServer, ServerHandle, ShutdownReason};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
