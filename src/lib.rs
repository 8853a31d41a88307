//! bitcollector - Pluggable Data-Collection Harness
//!
//! This crate provides the framework that reads a declarative configuration,
//! resolves the collection modules it names, and runs each one as an isolated
//! execution unit with shared runtime and platform context. It can be used as
//! a library or run as the standalone `bitcollector` executable.
//!
//! # Architecture
//!
//! - **Config**: Validated runtime settings and module declarations
//! - **Logging**: csv/html log files and console output behind `tracing`
//! - **Platform**: Immutable snapshot of the host operating system
//! - **Modules**: Built-in and external collection modules, their resolution
//!   and supervised execution
//! - **Framework**: The driver tying one run together
//!
//! # Example
//!
//! ```rust,no_run
//! use bitcollector::FrameworkDriver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut driver = FrameworkDriver::new();
//!     let summary = driver.run("bitcollector.json").await?;
//!     println!("{} modules returned a result code", summary.completed());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod framework;
pub mod logging;
pub mod module;
pub mod platform;

pub use config::{ConfigError, ConfigWarning, ExecutionPolicy, ModuleSpec, RuntimeConfig};
pub use framework::{DriverState, FrameworkDriver, FrameworkError, RunSummary};
pub use logging::{Logger, Logging, LoggingError};
pub use module::{
    CollectionModule, ExecutionRegistry, ModuleCatalog, ModuleContext, ModuleError,
    ModuleExecutor, ModuleResolver, UnitOutcome,
};
pub use platform::{OsDetail, OsFamily, PlatformDescriptor};
