//! Fixed-size license record layout.
//!
//! ```text
//! offset size field
//!      0   16 checksum (keyed digest of the companion match key)
//!     16    4 expiry, big-endian epoch seconds, 0 = never
//!     20    1 program code
//!     21    1 user limit flag
//!     22    1 user limit slot
//!     23    1 user count (seat cap, read when this record is a slot)
//! ```

use crate::crypto::digest::{Digest128, DIGEST_LEN};
use crate::program::ProgramCode;

/// Size of one record on disk.
pub const BLOCK_SIZE: usize = 24;

/// One license record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Block {
    /// Keyed digest of the match key this record authorizes.
    pub checksum: Digest128,
    /// Expiration in epoch seconds; 0 never expires.
    pub expiry: u32,
    /// Raw program code byte.
    pub program_code: u8,
    /// Nonzero when the program code has a seat cap.
    pub user_limit_flag: u8,
    /// Index of the record whose `user_count` holds the seat cap.
    pub user_limit_slot: u8,
    /// Seat cap stored for other records that point here.
    pub user_count: u8,
}

impl Block {
    /// Decode a record from its 24-byte form.
    pub fn from_bytes(bytes: &[u8; BLOCK_SIZE]) -> Self {
        let mut checksum = [0u8; DIGEST_LEN];
        checksum.copy_from_slice(&bytes[..DIGEST_LEN]);
        Self {
            checksum,
            expiry: u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
            program_code: bytes[20],
            user_limit_flag: bytes[21],
            user_limit_slot: bytes[22],
            user_count: bytes[23],
        }
    }

    /// Encode the record.
    pub fn to_bytes(&self) -> [u8; BLOCK_SIZE] {
        let mut out = [0u8; BLOCK_SIZE];
        out[..DIGEST_LEN].copy_from_slice(&self.checksum);
        out[16..20].copy_from_slice(&self.expiry.to_be_bytes());
        out[20] = self.program_code;
        out[21] = self.user_limit_flag;
        out[22] = self.user_limit_slot;
        out[23] = self.user_count;
        out
    }

    /// Decoded program code, if the byte is a known value.
    pub fn program(&self) -> Option<ProgramCode> {
        ProgramCode::from_u8(self.program_code)
    }

    /// Whether this record is subject to a seat cap.
    pub fn has_user_limit(&self) -> bool {
        self.user_limit_flag != 0
    }
}
