//! License policy: expiry and seat caps.

pub mod access;
