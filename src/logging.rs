use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured log level
pub const LOG_ENV_VAR: &str = "TASKMAN_LOG";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {message}")]
    FileError { path: String, message: String },
    #[error("Failed to initialize tracing subscriber: {0}")]
    InitError(String),
}

/// Where diagnostics go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Stderr,
    /// The TUI owns the terminal, so it logs to a file instead
    File(&'a Path),
}

/// Pick the level from CLI flags, falling back to the configured one
pub fn resolve_level(quiet: bool, verbose: bool, configured: &str) -> String {
    if quiet {
        "error".to_string()
    } else if verbose {
        "debug".to_string()
    } else {
        configured.to_string()
    }
}

pub fn init(level: &str, target: LogTarget<'_>) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(level));

    let result = match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| LoggingError::FileError {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };

    result.map_err(|e| LoggingError::InitError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_configured_level() {
        assert_eq!(resolve_level(true, true, "info"), "error");
        assert_eq!(resolve_level(false, true, "info"), "debug");
        assert_eq!(resolve_level(false, false, "warn"), "warn");
    }
}
