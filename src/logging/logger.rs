//! Named logger handles.

use std::fmt::Display;
use std::sync::Arc;

/// Handle that tags every record with a logger name.
///
/// Records go to whichever dispatcher is current, so a module running
/// inside an execution unit writes to the framework's sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: Arc<str>,
}

impl Logger {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debug(&self, message: impl Display) {
        tracing::debug!(logger = %self.name, "{message}");
    }

    pub fn info(&self, message: impl Display) {
        tracing::info!(logger = %self.name, "{message}");
    }

    pub fn warning(&self, message: impl Display) {
        tracing::warn!(logger = %self.name, "{message}");
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!(logger = %self.name, "{message}");
    }

    /// Error record that survives a `CRITICAL` threshold.
    pub fn critical(&self, message: impl Display) {
        tracing::error!(logger = %self.name, critical = true, "{message}");
    }
}
