//! Wire protocol: request struct, acknowledgements, deadline I/O.

pub mod ack;
pub mod io;
pub mod models;
