//! Daemon entry points: CLI parsing and startup wiring

pub mod cli;
pub mod startup;

pub use cli::CliArgs;
pub use startup::{run, DaemonConfig};
