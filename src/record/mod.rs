//! License record codec: block layout, match keys, and sealed files.

pub mod block;
pub mod builder;
pub mod file;
pub mod matchkey;
