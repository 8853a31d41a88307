//! Core module traits and types.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::config::{ModuleSpec, RuntimeConfig};
use crate::logging::Logger;
use crate::platform::PlatformDescriptor;

/// Errors that end an execution unit without a result code.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module could not be launched.
    #[error("failed to launch module '{name}': {source}")]
    Launch {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The execution context could not be handed to the module.
    #[error("failed to pass context to module '{name}': {reason}")]
    Context { name: String, reason: String },

    /// The module process was killed by a signal.
    #[error("module '{0}' was terminated without an exit code")]
    Terminated(String),

    /// The module panicked.
    #[error("module '{name}' panicked: {message}")]
    Panicked { name: String, message: String },

    /// The module exceeded the configured time limit and was cancelled.
    #[error("module '{name}' timed out after {}", humantime::format_duration(*timeout))]
    TimedOut { name: String, timeout: Duration },

    /// The execution task was cancelled before the module finished.
    #[error("execution of module '{0}' was cancelled")]
    Cancelled(String),
}

/// Everything a module receives from the framework.
///
/// Configuration and platform data are shared read-only between all units.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    /// Identifier of the execution unit running the module.
    pub unit_id: Uuid,
    /// Directory holding the framework executable.
    pub framework_root: PathBuf,
    pub config: Arc<RuntimeConfig>,
    pub platform: Arc<PlatformDescriptor>,
    /// The module's own declaration, parameters included.
    pub spec: ModuleSpec,
    /// Logger named after the module.
    pub logger: Logger,
}

/// Core trait for collection modules.
///
/// A module runs once per framework invocation inside its own execution
/// unit.
///
/// # Returns
///
/// - `Ok(code)`: the module finished; `code` is advisory and never
///   interpreted by the framework.
/// - `Err(ModuleError)`: the module could not produce a result code.
#[async_trait::async_trait]
pub trait CollectionModule: Send + Sync + 'static {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Perform the module's collection work.
    async fn run(&self, ctx: ModuleContext) -> Result<i32, ModuleError>;
}
