//! The shared secret mixed into every record and acknowledgement digest.
//!
//! Loaded once at process start and passed by reference to the record
//! codec and the wire protocol. It is never mutated after construction.

use crate::SeatwardenError;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;

/// Secret length in bytes. Match keys pad their host field from it, so it
/// must cover the 56-byte host field and index 32 of the program field.
pub const SECRET_LEN: usize = 64;

/// Environment variable holding a base64 secret override.
pub const SECRET_ENV: &str = "SEATWARDEN_SECRET";

const BUILTIN_SEED: &[u8; SECRET_LEN] =
    b"seatwarden:license-records:v1:4c9e0f6a1d7b3e52a8f1c6d09b7e4a2317";

/// Immutable secret key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; SECRET_LEN]);

impl SharedSecret {
    /// The secret compiled into this build.
    pub fn builtin() -> Self {
        Self(*BUILTIN_SEED)
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode a base64 secret of exactly [`SECRET_LEN`] bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, SeatwardenError> {
        let raw = STANDARD.decode(encoded.trim()).map_err(|e| {
            SeatwardenError::ConfigError(format!("secret is not valid base64: {}", e))
        })?;
        let bytes: [u8; SECRET_LEN] = raw.try_into().map_err(|v: Vec<u8>| {
            SeatwardenError::ConfigError(format!(
                "secret must be {} bytes, got {}",
                SECRET_LEN,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Use `SEATWARDEN_SECRET` when set, else the built-in secret.
    pub fn from_env() -> Result<Self, SeatwardenError> {
        match std::env::var(SECRET_ENV) {
            Ok(value) if !value.trim().is_empty() => Self::from_base64(&value),
            _ => Ok(Self::builtin()),
        }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// Single key byte; used for match-key padding.
    pub fn byte(&self, index: usize) -> u8 {
        self.0[index % SECRET_LEN]
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        let encoded = STANDARD.encode([9u8; SECRET_LEN]);
        let secret = SharedSecret::from_base64(&encoded).unwrap();
        assert_eq!(secret.as_bytes(), &[9u8; SECRET_LEN]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let encoded = STANDARD.encode([9u8; 10]);
        let result = SharedSecret::from_base64(&encoded);
        assert!(matches!(result, Err(SeatwardenError::ConfigError(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let secret = SharedSecret::builtin();
        assert_eq!(format!("{:?}", secret), "SharedSecret(..)");
    }
}
