//! Command line arguments of the daemon

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "packflow",
    version,
    about = "Partitioned message-queue consumption engine"
)]
pub struct CliArgs {
    /// Queue definitions file (TOML)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: PathBuf,

    /// Increase logging verbosity (repeatable)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Decrease logging verbosity (repeatable)
    #[arg(short = 'q', long, action = ArgAction::Count)]
    pub quiet: u8,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl CliArgs {
    pub fn verbosity(&self) -> i8 {
        self.verbose as i8 - self.quiet as i8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flag_counts() {
        let args = CliArgs::parse_from(["packflow", "-c", "queues.toml", "-v", "-v", "-q"]);
        assert_eq!(args.verbosity(), 1);
        assert_eq!(args.config, PathBuf::from("queues.toml"));
    }
}
