//! License clients: the daemon protocol client and standalone validation.

pub mod local;
pub mod remote;
