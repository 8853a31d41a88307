//! Logging facility.
//!
//! Built once from the runtime configuration, the facility owns a
//! [`tracing::Dispatch`] that fans records out to an optional log file
//! (csv or html, size-rotated) and an optional console sink. The dispatch
//! is handed explicitly to every execution unit instead of relying on
//! ambient per-thread state.
//!
//! # Example
//!
//! ```rust,ignore
//! let logging = Logging::init(&config)?;
//! logging.install_global();
//! logging.logger("Main").info("starting");
//! let log_path = logging.finish()?;
//! ```

mod error;
mod file;
mod format;
mod logger;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::Dispatch;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub use error::LoggingError;
pub use file::{
    LOG_BACKUP_COUNT, MAX_LOG_BYTES, MAX_LOG_SUFFIX, resolve_template, rotating_file,
    select_log_file,
};
pub use format::{RecordFormatter, RecordStyle, level_name, render};
pub use logger::Logger;

use crate::config::{LogFormat, LogLevel, RuntimeConfig};
use file::{finalize_log_file, prepare_log_file};
use format::is_critical_record;

/// Active logging sinks for one framework run.
///
/// Dropping the facility flushes buffered records; [`Logging::finish`] does
/// the same and reports footer write failures.
pub struct Logging {
    dispatch: Dispatch,
    log_path: Option<PathBuf>,
    format: LogFormat,
    guards: Vec<WorkerGuard>,
    closed: bool,
}

impl std::fmt::Debug for Logging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logging")
            .field("log_path", &self.log_path)
            .field("format", &self.format)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Logging {
    /// Open the sinks selected by `config`.
    ///
    /// # Errors
    /// Fails when the log file or its directory cannot be created, or when
    /// no numbered file name is free.
    pub fn init(config: &RuntimeConfig) -> Result<Self, LoggingError> {
        Self::init_at(config, Local::now().naive_local())
    }

    /// Same as [`Logging::init`], resolving `$(DATE)`/`$(TIME)` against `now`.
    pub fn init_at(config: &RuntimeConfig, now: NaiveDateTime) -> Result<Self, LoggingError> {
        let mut guards = Vec::new();

        let log_path = if config.log_to_file {
            let path = select_log_file(&config.log_file, config.log_format, now)?;
            prepare_log_file(&path, config.log_format)?;
            Some(path)
        } else {
            None
        };

        let file_layer = match &log_path {
            Some(path) => {
                let sink = rotating_file(path, MAX_LOG_BYTES, LOG_BACKUP_COUNT);
                let (writer, guard) = NonBlockingBuilder::default().lossy(false).finish(sink);
                guards.push(guard);
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer)
                        .event_format(RecordFormatter::new(config.log_format.into())),
                )
            }
            None => None,
        };

        let console_layer = if config.log_to_stdout {
            let (writer, guard) = NonBlockingBuilder::default()
                .lossy(false)
                .finish(std::io::stdout());
            guards.push(guard);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .event_format(RecordFormatter::new(RecordStyle::Console)),
            )
        } else {
            None
        };

        let critical_only =
            (config.log_level == LogLevel::Critical).then(|| filter_fn(is_critical_record));

        let subscriber = tracing_subscriber::registry()
            .with(config.log_level.level_filter())
            .with(critical_only)
            .with(file_layer)
            .with(console_layer);

        Ok(Self {
            dispatch: Dispatch::new(subscriber),
            log_path,
            format: config.log_format,
            guards,
            closed: false,
        })
    }

    /// Dispatcher to attach to execution units.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Named logger writing to these sinks.
    pub fn logger(&self, name: impl Into<std::sync::Arc<str>>) -> Logger {
        Logger::new(name)
    }

    /// Path of the active log file, when file logging is enabled.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Make this facility the process-wide default.
    ///
    /// Returns `false` if another global subscriber was already installed.
    pub fn install_global(&self) -> bool {
        tracing::dispatcher::set_global_default(self.dispatch.clone()).is_ok()
    }

    /// Flush all sinks and close the log file.
    ///
    /// Returns the path of the log file that was written, if any.
    pub fn finish(mut self) -> Result<Option<PathBuf>, LoggingError> {
        self.close()?;
        Ok(self.log_path.clone())
    }

    fn close(&mut self) -> Result<(), LoggingError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Guards join their worker threads, so every record is on disk
        // before the footer.
        self.guards.clear();
        match &self.log_path {
            Some(path) => finalize_log_file(path, self.format),
            None => Ok(()),
        }
    }
}

impl Drop for Logging {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config(dir: &Path, format: LogFormat, level: LogLevel) -> RuntimeConfig {
        RuntimeConfig {
            log_file: dir.join("run").to_string_lossy().into_owned(),
            log_format: format,
            log_level: level,
            log_to_file: true,
            log_to_stdout: false,
            ..RuntimeConfig::default()
        }
    }

    #[test]
    fn test_html_file_has_header_rows_and_footer() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), LogFormat::Html, LogLevel::Debug);

        let logging = Logging::init(&config).unwrap();
        let logger = logging.logger("Test1");
        tracing::dispatcher::with_default(logging.dispatch(), || {
            logger.info("Hello <world>");
            logger.debug("details");
        });
        let path = logging.finish().unwrap().unwrap();

        assert_eq!(path, dir.path().join("run_1.html"));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("<table"));
        assert!(lines[1].contains("<td>Test1</td><td>INFO</td><td>Hello &lt;world&gt;</td>"));
        assert!(lines[2].contains("<td>DEBUG</td>"));
        assert_eq!(lines[3], "</table>");
    }

    #[test]
    fn test_level_threshold_filters_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), LogFormat::Csv, LogLevel::Warning);

        let logging = Logging::init(&config).unwrap();
        let logger = logging.logger("Main");
        tracing::dispatcher::with_default(logging.dispatch(), || {
            logger.debug("dropped");
            logger.info("dropped");
            logger.warning("kept");
            logger.error("kept too");
        });
        let path = logging.finish().unwrap().unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(!content.contains("dropped"));
        assert!(content.contains(",Main,WARNING,kept\n"));
        assert!(content.contains(",Main,ERROR,kept too\n"));
    }

    #[test]
    fn test_critical_threshold_keeps_only_critical() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), LogFormat::Csv, LogLevel::Critical);

        let logging = Logging::init(&config).unwrap();
        let logger = logging.logger("Main");
        tracing::dispatcher::with_default(logging.dispatch(), || {
            logger.error("plain error");
            logger.critical("fatal");
        });
        let path = logging.finish().unwrap().unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(!content.contains("plain error"));
        assert!(content.contains(",Main,CRITICAL,fatal\n"));
    }

    #[test]
    fn test_second_run_gets_next_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), LogFormat::Csv, LogLevel::Info);

        let first = Logging::init(&config).unwrap().finish().unwrap().unwrap();
        let second = Logging::init(&config).unwrap().finish().unwrap().unwrap();

        assert_eq!(first, dir.path().join("run_1.csv"));
        assert_eq!(second, dir.path().join("run_2.csv"));
    }

    #[test]
    fn test_no_file_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig {
            log_to_file: false,
            ..file_config(dir.path(), LogFormat::Csv, LogLevel::Info)
        };

        let logging = Logging::init(&config).unwrap();
        assert!(logging.log_path().is_none());
        assert_eq!(logging.finish().unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_writes_html_footer() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), LogFormat::Html, LogLevel::Info);

        let path = {
            let logging = Logging::init(&config).unwrap();
            logging.log_path().unwrap().to_path_buf()
        };

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.ends_with("</table>\n"));
    }
}
