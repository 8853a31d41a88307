//! Modules compiled into the framework.

use super::traits::{CollectionModule, ModuleContext, ModuleError};
use crate::platform::{OsDetail, OsFamily};

/// Name of the host inventory module.
pub const HOST_INFO: &str = "host_info";

/// Reports what the framework knows about the host.
///
/// Logs the platform descriptor, the module's parameters and the home
/// directory of the current user, then returns `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostInfoModule;

#[async_trait::async_trait]
impl CollectionModule for HostInfoModule {
    fn name(&self) -> &str {
        HOST_INFO
    }

    async fn run(&self, ctx: ModuleContext) -> Result<i32, ModuleError> {
        let log = &ctx.logger;
        let platform = &ctx.platform;

        log.debug(format_args!("Unit {} started", ctx.unit_id));
        log.info(format_args!(
            "Framework root: {}",
            ctx.framework_root.display()
        ));
        log.info(format_args!(
            "Additional module paths: {:?}",
            ctx.config.additional_paths
        ));
        log.info(format_args!(
            "Host {} runs {} ({}) release {} on {}",
            platform.hostname,
            platform.system,
            platform.os_family(),
            platform.os_release,
            platform.cpu_architecture
        ));

        match &platform.detail {
            OsDetail::Mac(mac) => log.info(format_args!(
                "macOS {} ({}) on {}",
                mac.release, mac.version, mac.machine
            )),
            OsDetail::Unix(unix) => log.info(format_args!(
                "Distribution {} {} ({})",
                unix.distname, unix.version, unix.codename
            )),
            OsDetail::Windows(win) => log.info(format_args!(
                "Windows {} {} {} [{}]",
                win.release, win.version, win.csd, win.ptype
            )),
            OsDetail::Unknown => log.warning("No OS details available"),
        }

        for parameter in &ctx.spec.parameters {
            log.info(format_args!(
                "Parameter {} = {}",
                parameter.name, parameter.value
            ));
        }

        match home_directory(platform.os_family()) {
            Some(home) => log.info(format_args!("Home directory: {home}")),
            None => log.warning("Unknown OS type. Unable to determine home directory"),
        }

        Ok(0)
    }
}

/// Home directory of the current user, looked up the way the OS family
/// records it.
fn home_directory(family: OsFamily) -> Option<String> {
    match family {
        OsFamily::Mac | OsFamily::Unix => std::env::var("HOME").ok(),
        OsFamily::Windows => {
            let drive = std::env::var("HOMEDRIVE").ok()?;
            let path = std::env::var("HOMEPATH").ok()?;
            Some(format!("{drive}{path}"))
        }
        OsFamily::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{ModuleSpec, RuntimeConfig};
    use crate::logging::Logger;
    use crate::platform::PlatformDescriptor;

    #[test]
    fn test_home_directory_unknown_family() {
        assert_eq!(home_directory(OsFamily::Unknown), None);
    }

    #[tokio::test]
    async fn test_host_info_returns_zero() {
        let ctx = ModuleContext {
            unit_id: uuid::Uuid::new_v4(),
            framework_root: std::env::temp_dir(),
            config: Arc::new(RuntimeConfig::default()),
            platform: Arc::new(PlatformDescriptor::current()),
            spec: ModuleSpec::new(HOST_INFO).with_parameter("par1", "hello"),
            logger: Logger::new(HOST_INFO),
        };

        assert_eq!(HostInfoModule.run(ctx).await.unwrap(), 0);
        assert_eq!(HostInfoModule.name(), HOST_INFO);
    }
}
