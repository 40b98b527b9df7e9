//! Expiry and seat-cap enforcement for a matched license record.
//!
//! This module enforces access policies based on:
//! - Record expiry (0 never expires)
//! - Seat caps (stored in the record's slot, counted by the daemon)

use crate::program::ProgramCode;
use crate::record::block::Block;
use crate::record::file::LicenseFile;
use crate::SeatwardenError;

/// How seats are counted for a validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatPolicy {
    /// Daemon path: `current` seats would be in use if this request succeeds.
    Counted {
        /// Live seat count including the request being evaluated.
        current: u32,
    },
    /// Standalone path: no registry exists, so only single-seat caps pass.
    Local,
    /// Do not evaluate seats (heartbeats on an already open session).
    Skip,
}

/// Seat cap information for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatCap {
    /// Slot tag the cap is read from; sessions with the same program code
    /// and slot share a pool.
    pub slot: u8,
    /// The cap. Out-of-range slots read as 0.
    pub limit: u32,
}

impl SeatCap {
    /// Extract the cap for a record, or `None` when the record is uncapped.
    ///
    /// The server code is never capped.
    pub fn for_block(block: &Block, file: &LicenseFile) -> Option<Self> {
        if !block.has_user_limit() || block.program() == Some(ProgramCode::Server) {
            return None;
        }
        Some(Self {
            slot: block.user_limit_slot,
            limit: file.seat_cap(block.user_limit_slot).unwrap_or(0) as u32,
        })
    }

    /// Whether `current` concurrent seats fit within the cap.
    pub fn allows(&self, current: u32) -> bool {
        current <= self.limit
    }
}

/// Valid iff the record never expires or `now` is strictly before expiry.
pub fn check_expiry(block: &Block, now: u32) -> bool {
    block.expiry == 0 || now < block.expiry
}

/// Valid iff the record is uncapped, is a server record, or
/// `current_count <= cap`.
pub fn check_seat_limit(block: &Block, file: &LicenseFile, current_count: u32) -> bool {
    match SeatCap::for_block(block, file) {
        None => true,
        Some(cap) => cap.allows(current_count),
    }
}

/// Standalone predicate: any cap above one seat requires the daemon.
pub fn check_local_seat_limit(block: &Block, file: &LicenseFile) -> bool {
    match SeatCap::for_block(block, file) {
        None => true,
        Some(cap) => cap.limit <= 1,
    }
}

/// Apply expiry, then seat policy, to a matched record.
///
/// # Errors
/// * `Expired` - the record's expiry has passed
/// * `SeatLimitReached` - the seat policy rejects the request
pub fn evaluate(
    block: &Block,
    file: &LicenseFile,
    now: u32,
    seats: SeatPolicy,
    host: &str,
) -> Result<(), SeatwardenError> {
    if !check_expiry(block, now) {
        return Err(SeatwardenError::Expired {
            host: host.to_string(),
        });
    }

    let seats_ok = match seats {
        SeatPolicy::Counted { current } => check_seat_limit(block, file, current),
        SeatPolicy::Local => check_local_seat_limit(block, file),
        SeatPolicy::Skip => true,
    };
    if !seats_ok {
        return Err(SeatwardenError::SeatLimitReached {
            host: host.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::secret::SharedSecret;
    use crate::record::builder::{Grant, LicenseBuilder};
    use std::net::Ipv4Addr;

    fn file_with(grant: Grant) -> LicenseFile {
        let mut builder = LicenseBuilder::new();
        builder.add(grant).unwrap();
        builder.build(&SharedSecret::builtin())
    }

    #[test]
    fn test_expiry_boundary() {
        let block = Block {
            expiry: 1_000,
            ..Block::default()
        };
        assert!(check_expiry(&block, 999));
        assert!(!check_expiry(&block, 1_000));
        assert!(!check_expiry(&block, 1_001));
    }

    #[test]
    fn test_zero_expiry_never_expires() {
        let block = Block::default();
        assert!(check_expiry(&block, u32::MAX));
    }

    #[test]
    fn test_seat_limit_counted() {
        let file = file_with(Grant::host("a", Ipv4Addr::LOCALHOST, ProgramCode::Xic).seats(2));
        let block = &file.content()[0];
        assert!(check_seat_limit(block, &file, 1));
        assert!(check_seat_limit(block, &file, 2));
        assert!(!check_seat_limit(block, &file, 3));
    }

    #[test]
    fn test_uncapped_and_server_ignore_counts() {
        let file = file_with(Grant::host("a", Ipv4Addr::LOCALHOST, ProgramCode::Xic));
        assert!(check_seat_limit(&file.content()[0], &file, 500));

        let server = file_with(Grant::host("a", Ipv4Addr::LOCALHOST, ProgramCode::Server).seats(1));
        assert!(check_seat_limit(&server.content()[0], &server, 500));
    }

    #[test]
    fn test_out_of_range_slot_reads_as_zero() {
        let file = file_with(Grant::host("a", Ipv4Addr::LOCALHOST, ProgramCode::Xic));
        let block = Block {
            user_limit_flag: 1,
            user_limit_slot: 200,
            program_code: ProgramCode::Xic as u8,
            ..Block::default()
        };
        assert!(!check_seat_limit(&block, &file, 1));
    }

    #[test]
    fn test_local_seat_limit() {
        let single = file_with(Grant::host("a", Ipv4Addr::LOCALHOST, ProgramCode::Xic).seats(1));
        assert!(check_local_seat_limit(&single.content()[0], &single));

        let floating = file_with(Grant::host("a", Ipv4Addr::LOCALHOST, ProgramCode::Xic).seats(5));
        assert!(!check_local_seat_limit(&floating.content()[0], &floating));
    }

    #[test]
    fn test_evaluate_checks_expiry_first() {
        let file = file_with(
            Grant::host("a", Ipv4Addr::LOCALHOST, ProgramCode::Xic)
                .seats(1)
                .expires(50),
        );
        let block = &file.content()[0];

        let result = evaluate(block, &file, 60, SeatPolicy::Counted { current: 9 }, "a");
        assert!(matches!(result, Err(SeatwardenError::Expired { host }) if host == "a"));

        let result = evaluate(block, &file, 10, SeatPolicy::Counted { current: 2 }, "a");
        assert!(matches!(result, Err(SeatwardenError::SeatLimitReached { .. })));

        assert!(evaluate(block, &file, 10, SeatPolicy::Counted { current: 1 }, "a").is_ok());
        assert!(evaluate(block, &file, 10, SeatPolicy::Skip, "a").is_ok());
    }
}
