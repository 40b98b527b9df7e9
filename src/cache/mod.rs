//! Client-side persisted state.

pub mod stamp;
