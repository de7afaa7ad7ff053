//! Core infrastructure shared across the engine

pub mod shutdown;
pub mod sync;
pub mod time;
