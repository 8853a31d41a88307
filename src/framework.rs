//! Framework driver: one complete collection run.
//!
//! A run moves through a fixed sequence of states:
//!
//! ```text
//! Start -> ConfigLoaded -> LoggingInitialized -> PlatformDetected
//!       -> ModulesResolved -> Executing -> Draining -> Terminated
//! ```
//!
//! Failures before `LoggingInitialized` are fatal and leave no module run.
//! Everything after is recoverable: unresolved or failing modules are
//! logged and the run completes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use tracing::instrument::WithSubscriber;

use crate::config::{ConfigError, ConfigWarning, LoadedConfig, RuntimeConfig};
use crate::logging::{Logging, LoggingError};
use crate::module::{ModuleCatalog, ModuleExecutor, ModuleResolver, UnitOutcome};
use crate::platform::PlatformDescriptor;

/// Logger name used for the framework's own records.
pub const FRAMEWORK_LOGGER: &str = "Framework";

/// Errors that abort a run before any module executes.
#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

impl FrameworkError {
    /// One line per problem, for the terminal.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.diagnostics(),
            Self::Logging(e) => vec![e.to_string()],
        }
    }
}

/// Lifecycle state of a [`FrameworkDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum DriverState {
    Start,
    ConfigLoaded,
    LoggingInitialized,
    PlatformDetected,
    ModulesResolved,
    Executing,
    Draining,
    Terminated,
}

/// What a completed run did.
#[derive(Debug)]
pub struct RunSummary {
    /// One outcome per executed module, in configuration order.
    pub outcomes: Vec<UnitOutcome>,
    /// Modules that could not be resolved.
    pub unresolved: Vec<String>,
    /// Non-fatal configuration problems.
    pub warnings: Vec<ConfigWarning>,
    /// Log file written during the run.
    pub log_file: Option<PathBuf>,
}

impl RunSummary {
    /// Units that ended with a result code.
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result_code().is_some())
            .count()
    }
}

/// Drives configuration, logging, platform detection, resolution and
/// execution for one run.
#[derive(Debug)]
pub struct FrameworkDriver {
    state: DriverState,
    catalog: ModuleCatalog,
    platform: Option<PlatformDescriptor>,
    global_logging: bool,
}

impl Default for FrameworkDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameworkDriver {
    /// Driver using the built-in module catalog.
    pub fn new() -> Self {
        Self {
            state: DriverState::Start,
            catalog: ModuleCatalog::with_builtins(),
            platform: None,
            global_logging: false,
        }
    }

    /// Replace the built-in module catalog.
    pub fn with_catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Use a fixed platform descriptor instead of probing the host.
    pub fn with_platform(mut self, platform: PlatformDescriptor) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Also install the run's logging as the process-wide default.
    pub fn with_global_logging(mut self, enabled: bool) -> Self {
        self.global_logging = enabled;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Load the configuration at `config_path` and run every module.
    ///
    /// # Errors
    /// Returns `FrameworkError` when the configuration is unusable or the log
    /// file cannot be opened. No module runs in that case.
    pub async fn run(
        &mut self,
        config_path: impl AsRef<Path>,
    ) -> Result<RunSummary, FrameworkError> {
        let loaded = RuntimeConfig::load(config_path.as_ref()).inspect_err(|_| {
            self.state = DriverState::Terminated;
        })?;
        self.run_with_config(loaded).await
    }

    /// Run every module of an already loaded configuration.
    pub async fn run_with_config(
        &mut self,
        loaded: LoadedConfig,
    ) -> Result<RunSummary, FrameworkError> {
        self.transition(DriverState::ConfigLoaded);
        let LoadedConfig { config, warnings } = loaded;

        // Logging does not exist yet.
        for warning in &warnings {
            eprintln!("Startup - WARNING - {warning}");
        }

        let logging = Logging::init(&config).inspect_err(|_| {
            self.state = DriverState::Terminated;
        })?;
        if self.global_logging && !logging.install_global() {
            eprintln!("Startup - WARNING - a global logger is already installed");
        }

        let dispatch = logging.dispatch().clone();
        let (outcomes, unresolved) = self
            .execute(config, &warnings, &logging)
            .with_subscriber(dispatch)
            .await;

        let log_file = logging.log_path().map(Path::to_path_buf);
        if let Err(e) = logging.finish() {
            eprintln!("Shutdown - ERROR - {e}");
        }
        self.state = DriverState::Terminated;

        Ok(RunSummary {
            outcomes,
            unresolved,
            warnings,
            log_file,
        })
    }

    async fn execute(
        &mut self,
        config: RuntimeConfig,
        warnings: &[ConfigWarning],
        logging: &Logging,
    ) -> (Vec<UnitOutcome>, Vec<String>) {
        self.transition(DriverState::LoggingInitialized);
        let log = logging.logger(FRAMEWORK_LOGGER);
        log.info(format_args!(
            "bitcollector {} started",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(path) = logging.log_path() {
            log.debug(format_args!("Logging to {}", path.display()));
        }
        for warning in warnings {
            log.warning(warning);
        }

        let platform = Arc::new(
            self.platform
                .clone()
                .unwrap_or_else(PlatformDescriptor::current),
        );
        self.transition(DriverState::PlatformDetected);

        let resolution = ModuleResolver::new(self.catalog.clone())
            .with_search_paths(config.additional_paths.iter().cloned())
            .resolve(&config.modules);
        log.info(format_args!(
            "{} of {} modules resolved",
            resolution.resolved.len(),
            config.modules.len()
        ));
        self.transition(DriverState::ModulesResolved);

        let policy = config.execution_policy;
        let executor = ModuleExecutor::new(Arc::new(config), platform, logging.dispatch().clone());

        self.transition(DriverState::Executing);
        let outcomes = executor.execute_all(resolution.resolved, policy).await;

        self.transition(DriverState::Draining);
        executor.registry().wait_idle().await;
        log.info(format_args!(
            "{} of {} execution units returned a result code",
            outcomes.iter().filter(|o| o.result_code().is_some()).count(),
            outcomes.len()
        ));

        (outcomes, resolution.failed)
    }

    fn transition(&mut self, next: DriverState) {
        tracing::debug!(from = %self.state, to = %next, "Driver state changed");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExecutionPolicy, LogFormat, ModuleSpec};
    use crate::module::{CollectionModule, ModuleContext, ModuleError};

    struct Fixed(i32);

    #[async_trait::async_trait]
    impl CollectionModule for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn run(&self, ctx: ModuleContext) -> Result<i32, ModuleError> {
            ctx.logger.info("collecting");
            Ok(self.0)
        }
    }

    fn loaded(dir: &Path, modules: Vec<ModuleSpec>) -> LoadedConfig {
        LoadedConfig {
            config: RuntimeConfig {
                log_file: dir.join("run").to_string_lossy().into_owned(),
                log_format: LogFormat::Csv,
                log_to_file: true,
                log_to_stdout: false,
                ..RuntimeConfig::default()
            }
            .with_modules(modules),
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_run_executes_in_order_and_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ModuleCatalog::new()
            .with_module("Test1", || Fixed(0))
            .with_module("Test2", || Fixed(4));
        let mut driver = FrameworkDriver::new().with_catalog(catalog);
        assert_eq!(driver.state(), DriverState::Start);

        let summary = driver
            .run_with_config(loaded(
                dir.path(),
                vec![ModuleSpec::new("Test1"), ModuleSpec::new("Test2")],
            ))
            .await
            .unwrap();

        assert_eq!(driver.state(), DriverState::Terminated);
        let codes: Vec<_> = summary.outcomes.iter().map(UnitOutcome::result_code).collect();
        assert_eq!(codes, [Some(0), Some(4)]);
        assert_eq!(summary.completed(), 2);

        let log = std::fs::read_to_string(summary.log_file.unwrap()).unwrap();
        assert!(log.contains(",Test1,INFO,collecting\n"));
        assert!(log.contains(",Test2,INFO,collecting\n"));
        assert!(log.contains(",Framework,INFO,2 of 2 modules resolved\n"));
    }

    #[tokio::test]
    async fn test_unresolved_module_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = FrameworkDriver::new();

        let summary = driver
            .run_with_config(loaded(dir.path(), vec![ModuleSpec::new("Ghost")]))
            .await
            .unwrap();

        assert!(summary.outcomes.is_empty());
        assert_eq!(summary.unresolved, ["Ghost"]);
    }

    #[tokio::test]
    async fn test_unreadable_config_terminates_without_logging() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = FrameworkDriver::new();

        let err = driver
            .run(dir.path().join("missing.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, FrameworkError::Config(ConfigError::Unreadable { .. })));
        assert_eq!(driver.state(), DriverState::Terminated);
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[tokio::test]
    async fn test_parallel_policy_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ModuleCatalog::new().with_module("Test1", || Fixed(1));
        let mut driver = FrameworkDriver::new().with_catalog(catalog);

        let mut loaded = loaded(
            dir.path(),
            vec![ModuleSpec::new("Test1"), ModuleSpec::new("Test1")],
        );
        loaded.config = loaded
            .config
            .with_execution_policy(ExecutionPolicy::Parallel);

        let summary = driver.run_with_config(loaded).await.unwrap();
        assert_eq!(summary.completed(), 2);
        assert_ne!(summary.outcomes[0].unit_id, summary.outcomes[1].unit_id);
    }
}
