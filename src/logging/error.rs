//! Logging-specific error types.

use std::path::PathBuf;

use thiserror::Error;

use super::file::MAX_LOG_SUFFIX;

/// Errors that prevent the logging facility from starting or closing cleanly.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Could not create the directory holding the log file.
    #[error("failed to create log directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not open or write the log file.
    #[error("unable to open log file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every numbered log file name is already taken.
    #[error(
        "no free log file name for '{}' after {} attempts",
        base.display(),
        MAX_LOG_SUFFIX
    )]
    Exhausted { base: PathBuf },
}
