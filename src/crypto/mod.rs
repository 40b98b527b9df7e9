//! Keyed digests and the shared secret.

pub mod digest;
pub mod secret;
