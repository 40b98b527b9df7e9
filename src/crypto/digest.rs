//! Keyed 128-bit digest shared by license records and acknowledgements.

use crate::crypto::secret::SharedSecret;
use sha2::{Digest as _, Sha256};

/// Length of every digest stored in records or embedded in replies.
pub const DIGEST_LEN: usize = 16;

/// A 128-bit keyed digest.
pub type Digest128 = [u8; DIGEST_LEN];

/// Compute `SHA-256(data || secret)` truncated to 128 bits.
pub fn keyed_digest(data: &[u8], secret: &SharedSecret) -> Digest128 {
    keyed_digest_parts(&[data], secret)
}

/// Keyed digest over several concatenated parts without copying them.
pub fn keyed_digest_parts(parts: &[&[u8]], secret: &SharedSecret) -> Digest128 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.update(secret.as_bytes());
    let hash = hasher.finalize();

    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hash[..DIGEST_LEN]);
    out
}

/// Compare two digests without early exit.
pub fn digests_equal(a: &Digest128, b: &Digest128) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
