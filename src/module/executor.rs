//! Execution units: one tokio task per module run.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::Dispatch;
use tracing::instrument::WithSubscriber;
use uuid::Uuid;

use super::registry::{ExecutionRegistry, UnitInfo};
use super::resolver::ResolvedModule;
use super::traits::{CollectionModule, ModuleContext, ModuleError};
use crate::config::{ExecutionPolicy, ModuleSpec, RuntimeConfig};
use crate::logging::Logger;
use crate::platform::PlatformDescriptor;

/// How a single execution unit ended.
#[derive(Debug)]
pub struct UnitOutcome {
    pub unit_id: Uuid,
    /// Module name from the configuration.
    pub module: String,
    pub result: Result<i32, ModuleError>,
}

impl UnitOutcome {
    /// Value returned by the module, if it returned at all.
    pub fn result_code(&self) -> Option<i32> {
        self.result.as_ref().ok().copied()
    }
}

/// Directory holding the running executable, or `.` if unknown.
pub fn framework_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Launches modules as isolated execution units.
///
/// Each unit is registered before its task starts and deregistered on every
/// completion path. Records emitted inside a unit go to the executor's
/// dispatcher.
#[derive(Debug, Clone)]
pub struct ModuleExecutor {
    config: Arc<RuntimeConfig>,
    platform: Arc<PlatformDescriptor>,
    registry: ExecutionRegistry,
    dispatch: Dispatch,
    framework_root: PathBuf,
    timeout: Option<Duration>,
}

impl ModuleExecutor {
    /// Create an executor sharing `config` and `platform` with every unit.
    ///
    /// The time limit defaults to the configured `module_timeout`.
    pub fn new(
        config: Arc<RuntimeConfig>,
        platform: Arc<PlatformDescriptor>,
        dispatch: Dispatch,
    ) -> Self {
        Self {
            timeout: config.module_timeout,
            config,
            platform,
            registry: ExecutionRegistry::new(),
            dispatch,
            framework_root: framework_root(),
        }
    }

    /// Use an existing registry.
    pub fn with_registry(mut self, registry: ExecutionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_framework_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.framework_root = root.into();
        self
    }

    /// Cancel units running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.registry
    }

    /// Run one module to completion.
    pub async fn execute(
        &self,
        module: Arc<dyn CollectionModule>,
        spec: ModuleSpec,
    ) -> UnitOutcome {
        self.start(module, spec).await.join().await
    }

    /// Run every module under `policy`.
    ///
    /// Outcomes are returned in input order regardless of policy.
    pub async fn execute_all(
        &self,
        modules: Vec<ResolvedModule>,
        policy: ExecutionPolicy,
    ) -> Vec<UnitOutcome> {
        match policy {
            ExecutionPolicy::Sequential => {
                let mut outcomes = Vec::with_capacity(modules.len());
                for ResolvedModule { spec, module } in modules {
                    outcomes.push(self.execute(module, spec).await);
                }
                outcomes
            }
            ExecutionPolicy::Parallel => {
                let mut units = Vec::with_capacity(modules.len());
                for ResolvedModule { spec, module } in modules {
                    units.push(self.start(module, spec).await);
                }
                join_all(units.into_iter().map(RunningUnit::join)).await
            }
        }
    }

    /// Register a unit and spawn its task.
    async fn start(&self, module: Arc<dyn CollectionModule>, spec: ModuleSpec) -> RunningUnit {
        let unit_id = Uuid::new_v4();
        let name = spec.name.clone();
        self.registry.add(UnitInfo::new(unit_id, &name)).await;

        let ctx = ModuleContext {
            unit_id,
            framework_root: self.framework_root.clone(),
            config: Arc::clone(&self.config),
            platform: Arc::clone(&self.platform),
            logger: Logger::new(name.as_str()),
            spec,
        };
        let registry = self.registry.clone();
        let task_name = name.clone();

        let handle = tokio::spawn(
            async move {
                let started = Instant::now();
                tracing::info!(module = %task_name, unit_id = %unit_id, "Execution unit started");

                let result = run_unit(module, ctx).await;
                registry.remove(&unit_id).await;

                let elapsed_ms = started.elapsed().as_millis() as u64;
                match &result {
                    Ok(code) => tracing::info!(
                        module = %task_name,
                        unit_id = %unit_id,
                        result_code = code,
                        elapsed_ms,
                        "Execution unit finished"
                    ),
                    Err(e) => tracing::warn!(
                        module = %task_name,
                        unit_id = %unit_id,
                        error = %e,
                        elapsed_ms,
                        "Execution unit finished without a result code"
                    ),
                }
                result
            }
            .with_subscriber(self.dispatch.clone()),
        );

        RunningUnit {
            unit_id,
            module: name,
            handle,
            registry: self.registry.clone(),
            timeout: self.timeout,
        }
    }
}

/// Handle to a spawned execution unit.
struct RunningUnit {
    unit_id: Uuid,
    module: String,
    handle: JoinHandle<Result<i32, ModuleError>>,
    registry: ExecutionRegistry,
    timeout: Option<Duration>,
}

impl RunningUnit {
    /// Wait for the unit, aborting it once it overruns its time limit.
    async fn join(mut self) -> UnitOutcome {
        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, &mut self.handle)
                .await
                .map_err(|_| limit),
            None => Ok((&mut self.handle).await),
        };

        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                // The task never reached its own cleanup.
                self.registry.remove(&self.unit_id).await;
                tracing::warn!(
                    module = %self.module,
                    unit_id = %self.unit_id,
                    error = %e,
                    "Execution unit aborted"
                );
                Err(if e.is_panic() {
                    ModuleError::Panicked {
                        name: self.module.clone(),
                        message: e.to_string(),
                    }
                } else {
                    ModuleError::Cancelled(self.module.clone())
                })
            }
            Err(limit) => {
                self.handle.abort();
                self.registry.remove(&self.unit_id).await;
                tracing::warn!(
                    module = %self.module,
                    unit_id = %self.unit_id,
                    timeout_ms = limit.as_millis() as u64,
                    "Execution unit timed out"
                );
                Err(ModuleError::TimedOut {
                    name: self.module.clone(),
                    timeout: limit,
                })
            }
        };
        UnitOutcome {
            unit_id: self.unit_id,
            module: self.module,
            result,
        }
    }
}

/// Invoke the module, converting a panic into an error.
async fn run_unit(
    module: Arc<dyn CollectionModule>,
    ctx: ModuleContext,
) -> Result<i32, ModuleError> {
    let name = ctx.spec.name.clone();
    AssertUnwindSafe(module.run(ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            Err(ModuleError::Panicked {
                name,
                message: panic_message(payload.as_ref()),
            })
        })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
