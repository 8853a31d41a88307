//! Configuration errors, warnings and value helpers.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
///
/// Every variant is fatal: the framework never starts a module when loading
/// the configuration returns one of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to open or read the configuration file.
    #[error("unable to open config file '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a well-formed configuration document.
    #[error("config file is not properly formatted: {0}")]
    Malformed(String),

    /// One or more required top-level entries are absent.
    #[error("required framework configuration entries missing: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// One or more required top-level entries have the wrong type.
    #[error("invalid framework configuration entries: {}", .0.join("; "))]
    InvalidFields(Vec<String>),
}

impl ConfigError {
    /// One diagnostic line per problem, for printing before logging exists.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            Self::MissingFields(fields) => fields
                .iter()
                .map(|f| format!("required framework configuration entry missing: {f}"))
                .collect(),
            Self::InvalidFields(fields) => fields
                .iter()
                .map(|f| format!("invalid framework configuration entry: {f}"))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Non-fatal problem found while walking the configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    #[error("unknown framework configuration attribute: {0}")]
    UnknownKey(String),

    #[error("unknown module configuration attribute in module_list[{index}]: {key}")]
    UnknownModuleKey { index: usize, key: String },

    #[error(
        "module_list[{index}] dropped, required module configuration entries missing: {}",
        .missing.join(", ")
    )]
    ModuleDropped { index: usize, missing: Vec<String> },

    #[error("module_list[{index}] dropped: {reason}")]
    ModuleInvalid { index: usize, reason: String },

    #[error("unknown logging format: {0}, defaulting to csv")]
    UnknownLogFormat(String),

    #[error("unknown logging level: {0}, defaulting to DEBUG")]
    UnknownLogLevel(String),

    #[error("unknown execution policy: {0}, defaulting to sequential")]
    UnknownExecutionPolicy(String),

    #[error("invalid module_timeout '{value}': {reason}, running without timeout")]
    InvalidTimeout { value: String, reason: String },

    #[error("ignoring additional_paths[{index}]: expected a path string")]
    InvalidSearchPath { index: usize },
}

/// Parse duration string using humantime.
///
/// Supports various formats: `30s`, `1m`, `5m30s`, `1h`, `2h30m`, `1d`, `100ms`, etc.
///
/// # Examples
///
/// ```
/// use bitcollector::config::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
/// assert_eq!(parse_duration("1h30m").unwrap().as_secs(), 5400);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}
