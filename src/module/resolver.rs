//! Module lookup: built-in catalog first, then executables on search paths.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::builtin::{HOST_INFO, HostInfoModule};
use super::process::ProcessModule;
use super::traits::CollectionModule;
use crate::config::ModuleSpec;

type ModuleFactory = Arc<dyn Fn() -> Arc<dyn CollectionModule> + Send + Sync>;

/// Named factories for modules compiled into the binary.
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    factories: HashMap<String, ModuleFactory>,
}

impl std::fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("modules", &self.names())
            .finish()
    }
}

impl ModuleCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog containing the modules shipped with the framework.
    pub fn with_builtins() -> Self {
        Self::new().with_module(HOST_INFO, || HostInfoModule)
    }

    /// Register a factory, replacing any previous one with the same name.
    pub fn register<M, F>(&mut self, name: impl Into<String>, factory: F)
    where
        M: CollectionModule,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.factories.insert(
            name.into(),
            Arc::new(move || Arc::new(factory()) as Arc<dyn CollectionModule>),
        );
    }

    /// Builder form of [`ModuleCatalog::register`].
    pub fn with_module<M, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        M: CollectionModule,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Instantiate the module registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CollectionModule>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// A module ready to execute, paired with its declaration.
#[derive(Clone)]
pub struct ResolvedModule {
    pub spec: ModuleSpec,
    pub module: Arc<dyn CollectionModule>,
}

impl std::fmt::Debug for ResolvedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModule")
            .field("spec", &self.spec)
            .field("module", &self.module.name())
            .finish()
    }
}

/// Result of resolving a module list.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Loadable modules in configuration order.
    pub resolved: Vec<ResolvedModule>,
    /// Names that could not be resolved, in configuration order.
    pub failed: Vec<String>,
}

/// Makes declared modules loadable without running them.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    catalog: ModuleCatalog,
    search_paths: Vec<PathBuf>,
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new(ModuleCatalog::with_builtins())
    }
}

impl ModuleResolver {
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog,
            search_paths: Vec::new(),
        }
    }

    /// Append search paths in order. Duplicates are kept.
    pub fn with_search_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// Resolve every spec. Failures are logged and excluded, never fatal.
    pub fn resolve(&self, specs: &[ModuleSpec]) -> Resolution {
        let mut resolution = Resolution::default();
        for spec in specs {
            match self.resolve_one(&spec.name) {
                Some(module) => {
                    tracing::debug!(module = %spec.name, "Module resolved");
                    resolution.resolved.push(ResolvedModule {
                        spec: spec.clone(),
                        module,
                    });
                }
                None => {
                    tracing::warn!(
                        module = %spec.name,
                        search_paths = ?self.search_paths,
                        "Failed to resolve module. It will not be executed"
                    );
                    resolution.failed.push(spec.name.clone());
                }
            }
        }
        resolution
    }

    /// Look `name` up in the catalog, then on each search path.
    pub fn resolve_one(&self, name: &str) -> Option<Arc<dyn CollectionModule>> {
        if let Some(module) = self.catalog.get(name) {
            return Some(module);
        }
        if !is_plain_name(name) {
            return None;
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(executable_name(name)))
            .find(|candidate| is_executable(candidate))
            .map(|program| Arc::new(ProcessModule::new(name, program)) as Arc<dyn CollectionModule>)
    }
}

/// Names must not escape the search directory.
fn is_plain_name(name: &str) -> bool {
    Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ModuleContext, ModuleError};

    struct Named(&'static str);

    #[async_trait::async_trait]
    impl CollectionModule for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, _ctx: ModuleContext) -> Result<i32, ModuleError> {
            Ok(0)
        }
    }

    #[test]
    fn test_catalog_builtins() {
        let catalog = ModuleCatalog::with_builtins();
        assert!(catalog.contains(HOST_INFO));
        assert_eq!(catalog.get(HOST_INFO).unwrap().name(), HOST_INFO);
        assert!(catalog.get("Ghost").is_none());
    }

    #[test]
    fn test_resolve_keeps_order_and_reports_failures() {
        let catalog = ModuleCatalog::new()
            .with_module("Test1", || Named("Test1"))
            .with_module("Test2", || Named("Test2"));
        let resolver = ModuleResolver::new(catalog);

        let specs = [
            ModuleSpec::new("Test2"),
            ModuleSpec::new("Ghost"),
            ModuleSpec::new("Test1"),
        ];
        let resolution = resolver.resolve(&specs);

        let names: Vec<_> = resolution
            .resolved
            .iter()
            .map(|m| m.spec.name.as_str())
            .collect();
        assert_eq!(names, ["Test2", "Test1"]);
        assert_eq!(resolution.failed, ["Ghost"]);
    }

    #[test]
    fn test_search_paths_extend_in_order_with_duplicates() {
        let resolver = ModuleResolver::default()
            .with_search_paths(["a", "b"])
            .with_search_paths(["a"]);
        assert_eq!(
            resolver.search_paths(),
            [PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("a")]
        );
    }

    #[test]
    fn test_rejects_names_with_separators() {
        assert!(is_plain_name("collector"));
        assert!(!is_plain_name("../collector"));
        assert!(!is_plain_name("nested/collector"));
        assert!(!is_plain_name(""));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_executable_on_search_path() {
        use std::os::unix::fs::PermissionsExt;

        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        // Not executable: skipped.
        std::fs::write(first.path().join("disk_usage"), "#!/bin/sh\n").unwrap();
        let program = second.path().join("disk_usage");
        std::fs::write(&program, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver =
            ModuleResolver::default().with_search_paths([first.path(), second.path()]);
        let resolution = resolver.resolve(&[ModuleSpec::new("disk_usage")]);

        assert!(resolution.failed.is_empty());
        assert_eq!(resolution.resolved[0].module.name(), "disk_usage");
    }

    #[test]
    fn test_catalog_wins_over_search_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(executable_name(HOST_INFO)), "").unwrap();

        let resolver = ModuleResolver::default().with_search_paths([dir.path()]);
        let module = resolver.resolve_one(HOST_INFO).unwrap();
        assert_eq!(module.name(), HOST_INFO);
    }
}
