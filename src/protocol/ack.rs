//! Tamper-resistant acknowledgements.
//!
//! A reply is a request-sized buffer of random bytes with:
//! - a big-endian error code in the last two bytes (0 on success),
//! - a 16-byte tag at `8 + sum(reply[0..8]) % (size - 26)`.
//!
//! The tag base is the keyed digest of the original request bytes followed
//! by the reply with its tag region zeroed. Success embeds the permuted
//! base (each byte +1 mod 128, 127 wraps to 0, then reversed); failure
//! embeds the base itself. The client recomputes both to classify the
//! reply. Because the whole reply feeds the digest, a single corrupted byte
//! anywhere makes the reply unrecognizable.

use crate::crypto::digest::{digests_equal, keyed_digest_parts, Digest128, DIGEST_LEN};
use crate::crypto::secret::SharedSecret;
use crate::errors::ErrorCode;
use crate::protocol::models::JOB_REQ_SIZE;
use crate::SeatwardenError;
use rand::RngCore;

/// Size of an acknowledgement.
pub const ACK_SIZE: usize = JOB_REQ_SIZE;

/// Offset of the error code.
pub const ERROR_CODE_OFFSET: usize = ACK_SIZE - 2;

/// Leading bytes whose sum selects the tag offset.
const OFFSET_SEED_LEN: usize = 8;

/// Number of possible tag offsets: leaves room for the seed bytes,
/// the tag, and the error code.
const OFFSET_MODULUS: usize = ACK_SIZE - (OFFSET_SEED_LEN + DIGEST_LEN + 2);

/// Client-side classification of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Request succeeded.
    Granted,
    /// Request failed with the given code.
    Denied(ErrorCode),
    /// Reply does not belong to the request or was altered in transit.
    Forged,
}

impl AckOutcome {
    /// Convert to a result, naming `host` in license errors.
    pub fn into_result(self, host: &str) -> Result<(), SeatwardenError> {
        match self {
            Self::Granted => Ok(()),
            Self::Denied(code) => Err(code.into_error(host)),
            Self::Forged => Err(SeatwardenError::AckForged),
        }
    }
}

/// Where the tag sits in `reply`.
pub fn tag_offset(reply: &[u8; ACK_SIZE]) -> usize {
    let seed: usize = reply[..OFFSET_SEED_LEN].iter().map(|b| *b as usize).sum();
    OFFSET_SEED_LEN + seed % OFFSET_MODULUS
}

/// Derive the success tag from a base digest.
pub fn permute(base: &Digest128) -> Digest128 {
    let mut out = [0u8; DIGEST_LEN];
    for (i, b) in base.iter().enumerate() {
        out[DIGEST_LEN - 1 - i] = if *b == 127 {
            0
        } else {
            ((*b as u16 + 1) % 128) as u8
        };
    }
    out
}

fn base_digest(
    request: &[u8; JOB_REQ_SIZE],
    reply: &[u8; ACK_SIZE],
    offset: usize,
    secret: &SharedSecret,
) -> Digest128 {
    let mut masked = *reply;
    masked[offset..offset + DIGEST_LEN].fill(0);
    keyed_digest_parts(&[&request[..], &masked[..]], secret)
}

/// Build the daemon's reply to `request`.
pub fn build_ack(
    request: &[u8; JOB_REQ_SIZE],
    outcome: Result<(), ErrorCode>,
    secret: &SharedSecret,
) -> [u8; ACK_SIZE] {
    let code = match outcome {
        Ok(()) => ErrorCode::Ok,
        Err(ErrorCode::Ok) => ErrorCode::Unknown,
        Err(code) => code,
    };

    let mut reply = [0u8; ACK_SIZE];
    rand::thread_rng().fill_bytes(&mut reply);
    reply[ERROR_CODE_OFFSET..].copy_from_slice(&(code as u16).to_be_bytes());

    let offset = tag_offset(&reply);
    let base = base_digest(request, &reply, offset, secret);
    let tag = if code == ErrorCode::Ok {
        permute(&base)
    } else {
        base
    };
    reply[offset..offset + DIGEST_LEN].copy_from_slice(&tag);
    reply
}

/// Classify a reply received for `request`.
pub fn read_ack(
    request: &[u8; JOB_REQ_SIZE],
    reply: &[u8; ACK_SIZE],
    secret: &SharedSecret,
) -> AckOutcome {
    let offset = tag_offset(reply);
    let base = base_digest(request, reply, offset, secret);

    let mut tag = [0u8; DIGEST_LEN];
    tag.copy_from_slice(&reply[offset..offset + DIGEST_LEN]);
    let code = u16::from_be_bytes([reply[ERROR_CODE_OFFSET], reply[ERROR_CODE_OFFSET + 1]]);

    if digests_equal(&tag, &permute(&base)) && code == 0 {
        AckOutcome::Granted
    } else if digests_equal(&tag, &base) && code != 0 {
        AckOutcome::Denied(ErrorCode::from_u16(code))
    } else {
        AckOutcome::Forged
    }
}
