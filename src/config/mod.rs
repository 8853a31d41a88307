//! Configuration module for the collection framework.
//!
//! Provides JSON (or YAML) configuration loading and validation for:
//! - Logging settings (file template, format, level, sinks)
//! - Module search paths
//! - Module specifications (name and opaque parameters)

mod module;
mod runtime;
mod validation;

pub use module::{ModuleParameter, ModuleSpec};
pub use runtime::{
    DEFAULT_LOG_FILE, ExecutionPolicy, LoadedConfig, LogFormat, LogLevel, REQUIRED_FIELDS,
    RuntimeConfig,
};
pub use validation::{ConfigError, ConfigWarning, expand_env_vars, parse_duration};
