//! Daemon-side table of open license sessions.

pub mod jobs;
