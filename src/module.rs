//! Module Layer
//!
//! Resolution and supervised execution of collection modules. Every module
//! runs in its own execution unit (a Tokio task) that is tracked by the
//! [`ExecutionRegistry`] while it runs.
//!
//! # Architecture
//!
//! - [`CollectionModule`]: Core trait implemented by every module
//! - [`ModuleResolver`]: Finds modules in the built-in [`ModuleCatalog`] or as
//!   executables on search paths ([`ProcessModule`])
//! - [`ModuleExecutor`]: Runs resolved modules sequentially or in parallel
//! - [`ExecutionRegistry`]: Units that have started and not yet completed
//!
//! # Example
//!
//! ```rust,ignore
//! let resolution = ModuleResolver::default()
//!     .with_search_paths(&config.additional_paths)
//!     .resolve(&config.modules);
//! let executor = ModuleExecutor::new(config, platform, logging.dispatch().clone());
//! let outcomes = executor
//!     .execute_all(resolution.resolved, ExecutionPolicy::Sequential)
//!     .await;
//! ```

mod builtin;
mod executor;
mod process;
mod registry;
mod resolver;
mod traits;

pub use builtin::{HOST_INFO, HostInfoModule};
pub use executor::{ModuleExecutor, UnitOutcome, framework_root};
pub use process::{MODULE_ENV, ProcessModule, ROOT_ENV, UNIT_ID_ENV};
pub use registry::{ExecutionRegistry, UnitInfo};
pub use resolver::{ModuleCatalog, ModuleResolver, Resolution, ResolvedModule};
pub use traits::{CollectionModule, ModuleContext, ModuleError};
