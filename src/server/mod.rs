//! License daemon.

pub mod daemon;
pub mod logfile;
pub mod process;
