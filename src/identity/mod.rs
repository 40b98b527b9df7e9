//! Identity resolution: local identity sources and match-key fallbacks.

pub mod local;
pub mod resolver;
