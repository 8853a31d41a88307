//! Runtime configuration: the validated view of the configuration file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::level_filters::LevelFilter;

use super::module::{ModuleSpec, parse_module_entry};
use super::validation::{ConfigError, ConfigWarning, expand_env_vars, parse_duration};

// =============================================================================
// Constants
// =============================================================================

/// Top-level entries every configuration file must contain.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "log_file",
    "logging_format",
    "logging_level",
    "log_to_file",
    "log_to_stdout",
    "additional_paths",
    "module_list",
];

/// Default log file template.
pub const DEFAULT_LOG_FILE: &str = "logs/bitcollector_$(DATE)";

// =============================================================================
// Enumerations
// =============================================================================

/// Record format of the log file.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    /// Comma-separated records.
    #[default]
    Csv,
    /// Table rows inside an HTML table.
    Html,
}

impl LogFormat {
    /// File extension used for log files in this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Html => "html",
        }
    }
}

/// Minimum severity written to the log sinks.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Closest `tracing` filter. `Critical` also maps to `ERROR`; the logging
    /// layer narrows it to records flagged critical.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warning => LevelFilter::WARN,
            Self::Error | Self::Critical => LevelFilter::ERROR,
        }
    }
}

/// How the executor dispatches execution units relative to each other.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExecutionPolicy {
    /// Each unit completes before the next one starts, in configuration order.
    #[default]
    Sequential,
    /// All units are started, then awaited.
    Parallel,
}

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Validated framework settings, shared read-only with every module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Log file template; may contain `$(DATE)` and `$(TIME)`.
    pub log_file: String,

    /// Log file record format.
    pub log_format: LogFormat,

    /// Minimum level written to the sinks.
    pub log_level: LogLevel,

    /// Write records to the log file.
    pub log_to_file: bool,

    /// Write records to standard output.
    pub log_to_stdout: bool,

    /// Extra module search paths, in order.
    pub additional_paths: Vec<PathBuf>,

    /// Modules to run, in order.
    pub modules: Vec<ModuleSpec>,

    /// Dispatch policy (default: sequential).
    pub execution_policy: ExecutionPolicy,

    /// Upper bound on a single module's run time.
    pub module_timeout: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_file: DEFAULT_LOG_FILE.to_string(),
            log_format: LogFormat::Csv,
            log_level: LogLevel::Debug,
            log_to_file: false,
            log_to_stdout: true,
            additional_paths: Vec::new(),
            modules: Vec::new(),
            execution_policy: ExecutionPolicy::Sequential,
            module_timeout: None,
        }
    }
}

/// Result of loading a configuration file: the config plus every non-fatal
/// diagnostic found along the way.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: RuntimeConfig,
    pub warnings: Vec<ConfigWarning>,
}

impl RuntimeConfig {
    /// Load configuration from a JSON file (or YAML, by extension).
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed, or if any
    /// required entry is missing or ill-typed.
    pub fn load(path: impl AsRef<Path>) -> Result<LoadedConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let document: Value = if is_yaml(path) {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Malformed(e.to_string()))?
        } else {
            serde_json::from_str(&content).map_err(|e| ConfigError::Malformed(e.to_string()))?
        };

        Self::from_document(&document)
    }

    /// Validate an already-parsed configuration document.
    ///
    /// Every top-level entry is visited exactly once. Missing required entries
    /// are collected and reported together.
    pub fn from_document(document: &Value) -> Result<LoadedConfig, ConfigError> {
        let root = document.as_object().ok_or_else(|| {
            ConfigError::Malformed("top-level value must be an object".to_string())
        })?;

        let mut walk = DocumentWalk::default();
        for (key, value) in root {
            walk.visit(key, value);
        }
        walk.finish()
    }

    /// Replace the module list.
    pub fn with_modules(mut self, modules: Vec<ModuleSpec>) -> Self {
        self.modules = modules;
        self
    }

    /// Set the execution policy.
    pub fn with_execution_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.execution_policy = policy;
        self
    }

    /// Set the per-module timeout.
    pub fn with_module_timeout(mut self, timeout: Duration) -> Self {
        self.module_timeout = Some(timeout);
        self
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}

// =============================================================================
// Document Walk
// =============================================================================

/// Accumulates fields, warnings and type errors over one pass of the document.
#[derive(Default)]
struct DocumentWalk {
    seen: HashSet<&'static str>,
    invalid: Vec<String>,
    warnings: Vec<ConfigWarning>,
    log_file: Option<String>,
    log_format: Option<LogFormat>,
    log_level: Option<LogLevel>,
    log_to_file: Option<bool>,
    log_to_stdout: Option<bool>,
    additional_paths: Option<Vec<PathBuf>>,
    modules: Option<Vec<ModuleSpec>>,
    execution_policy: ExecutionPolicy,
    module_timeout: Option<Duration>,
}

impl DocumentWalk {
    fn visit(&mut self, key: &str, value: &Value) {
        if let Some(required) = REQUIRED_FIELDS.iter().find(|f| **f == key) {
            self.seen.insert(*required);
        }

        match key {
            "log_file" => {
                self.log_file = self.expect_str(key, value).map(expand_env_vars);
            }
            "logging_format" => {
                let raw = display_value(value);
                self.log_format = Some(raw.parse().unwrap_or_else(|_| {
                    self.warnings.push(ConfigWarning::UnknownLogFormat(raw));
                    LogFormat::Csv
                }));
            }
            "logging_level" => {
                let raw = display_value(value);
                self.log_level = Some(raw.parse().unwrap_or_else(|_| {
                    self.warnings.push(ConfigWarning::UnknownLogLevel(raw));
                    LogLevel::Debug
                }));
            }
            "log_to_file" => self.log_to_file = self.expect_bool(key, value),
            "log_to_stdout" => self.log_to_stdout = self.expect_bool(key, value),
            "additional_paths" => self.additional_paths = self.search_paths(value),
            "module_list" => self.modules = self.module_list(value),
            "execution_policy" => {
                let raw = display_value(value);
                self.execution_policy = raw.parse().unwrap_or_else(|_| {
                    self.warnings
                        .push(ConfigWarning::UnknownExecutionPolicy(raw));
                    ExecutionPolicy::Sequential
                });
            }
            "module_timeout" => {
                let raw = display_value(value);
                match parse_duration(&raw) {
                    Ok(timeout) => self.module_timeout = Some(timeout),
                    Err(reason) => self
                        .warnings
                        .push(ConfigWarning::InvalidTimeout { value: raw, reason }),
                }
            }
            other => self
                .warnings
                .push(ConfigWarning::UnknownKey(other.to_string())),
        }
    }

    fn finish(self) -> Result<LoadedConfig, ConfigError> {
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !self.seen.contains(*f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingFields(missing));
        }

        let (
            Some(log_file),
            Some(log_format),
            Some(log_level),
            Some(log_to_file),
            Some(log_to_stdout),
            Some(additional_paths),
            Some(modules),
        ) = (
            self.log_file,
            self.log_format,
            self.log_level,
            self.log_to_file,
            self.log_to_stdout,
            self.additional_paths,
            self.modules,
        )
        else {
            return Err(ConfigError::InvalidFields(self.invalid));
        };

        Ok(LoadedConfig {
            config: RuntimeConfig {
                log_file,
                log_format,
                log_level,
                log_to_file,
                log_to_stdout,
                additional_paths,
                modules,
                execution_policy: self.execution_policy,
                module_timeout: self.module_timeout,
            },
            warnings: self.warnings,
        })
    }

    fn expect_str<'v>(&mut self, key: &str, value: &'v Value) -> Option<&'v str> {
        let s = value.as_str();
        if s.is_none() {
            self.invalid.push(format!("{key}: expected a string"));
        }
        s
    }

    fn expect_bool(&mut self, key: &str, value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(n.as_f64().is_some_and(|n| n != 0.0)),
            _ => {
                self.invalid.push(format!("{key}: expected a boolean"));
                None
            }
        }
    }

    fn search_paths(&mut self, value: &Value) -> Option<Vec<PathBuf>> {
        let Some(items) = value.as_array() else {
            self.invalid
                .push("additional_paths: expected an array".to_string());
            return None;
        };

        let mut paths = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::String(path) => paths.push(PathBuf::from(expand_env_vars(path))),
                Value::Object(map) => match object_strings(map) {
                    Some(values) => paths.extend(
                        values
                            .into_iter()
                            .map(|p| PathBuf::from(expand_env_vars(p))),
                    ),
                    None => self
                        .warnings
                        .push(ConfigWarning::InvalidSearchPath { index }),
                },
                _ => self
                    .warnings
                    .push(ConfigWarning::InvalidSearchPath { index }),
            }
        }
        Some(paths)
    }

    fn module_list(&mut self, value: &Value) -> Option<Vec<ModuleSpec>> {
        let Some(entries) = value.as_array() else {
            self.invalid.push("module_list: expected an array".to_string());
            return None;
        };

        Some(
            entries
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| parse_module_entry(index, entry, &mut self.warnings))
                .collect(),
        )
    }
}

/// All values of an object when every one is a string.
fn object_strings(map: &Map<String, Value>) -> Option<Vec<&str>> {
    map.values().map(Value::as_str).collect()
}

/// Strings are taken verbatim; anything else is rendered as JSON so the
/// warning shows what was actually supplied.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
