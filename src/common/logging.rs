//! Logging initialisation for the daemon binary
//!
//! Library code only ever uses the `log` facade; the binary wires it to
//! `flexi_logger` here. Verbosity is relative to `info`: `-q` steps down,
//! `-v` steps up.

use flexi_logger::{FileSpec, Logger, LoggerHandle};
use std::path::Path;

/// Map a relative verbosity to a log level specification
pub fn level_for_verbosity(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize logging for the process
///
/// Returns the logger handle; dropping it shuts the logger down, so the
/// caller keeps it alive for the lifetime of the daemon.
pub fn init_logging(
    verbosity: i8,
    log_file: Option<&Path>,
) -> Result<LoggerHandle, Box<dyn std::error::Error>> {
    let logger = Logger::try_with_env_or_str(level_for_verbosity(verbosity))?;

    let handle = match log_file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let basename = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "packflow".to_string());
            logger
                .log_to_file(FileSpec::default().directory(directory).basename(basename))
                .start()?
        }
        None => logger.start()?,
    };

    Ok(handle)
}
