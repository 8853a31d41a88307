//! Host introspection.

use serde::{Deserialize, Serialize};
use sysinfo::System;

use super::descriptor::{MacDetail, UnixDetail, WindowsDetail};

/// Location of the freedesktop os-release file.
const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Processor description as a raw triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorInfo {
    /// Instruction set, e.g. `x86_64`.
    pub architecture: String,
    /// Target family, e.g. `unix`.
    pub family: String,
    /// Pointer width in bits.
    pub pointer_width: String,
}

/// Platform-independent host identity, before classification.
///
/// Any field may be empty when the host does not report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUname {
    pub system: String,
    pub node: String,
    pub release: String,
    pub version: String,
    pub machine: String,
    pub processor: ProcessorInfo,
}

/// Source of host information.
///
/// Only the detail method matching the classified OS family is called.
pub trait HostProbe {
    fn uname(&self) -> RawUname;
    fn mac_detail(&self) -> MacDetail;
    fn unix_detail(&self) -> UnixDetail;
    fn windows_detail(&self) -> WindowsDetail;
}

/// Reads the live host through `sysinfo` and the standard library.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl HostProbe for SystemProbe {
    fn uname(&self) -> RawUname {
        RawUname {
            system: std::env::consts::OS.to_string(),
            node: System::host_name().unwrap_or_default(),
            release: System::kernel_version().unwrap_or_default(),
            version: System::long_os_version()
                .or_else(System::os_version)
                .unwrap_or_default(),
            machine: std::env::consts::ARCH.to_string(),
            processor: ProcessorInfo {
                architecture: std::env::consts::ARCH.to_string(),
                family: std::env::consts::FAMILY.to_string(),
                pointer_width: usize::BITS.to_string(),
            },
        }
    }

    fn mac_detail(&self) -> MacDetail {
        MacDetail {
            release: System::os_version().unwrap_or_default(),
            machine: std::env::consts::ARCH.to_string(),
            ..Default::default()
        }
    }

    fn unix_detail(&self) -> UnixDetail {
        let os_release = std::fs::read_to_string(OS_RELEASE_PATH).unwrap_or_default();
        UnixDetail {
            distname: System::name().unwrap_or_default(),
            version: System::os_version().unwrap_or_default(),
            codename: os_release_value(&os_release, "VERSION_CODENAME").unwrap_or_default(),
        }
    }

    fn windows_detail(&self) -> WindowsDetail {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        WindowsDetail {
            release: System::os_version().unwrap_or_default(),
            version: System::kernel_version().unwrap_or_default(),
            csd: String::new(),
            ptype: if cpus > 1 {
                "Multiprocessor Free".to_string()
            } else {
                "Uniprocessor Free".to_string()
            },
        }
    }
}

/// Look up `key` in os-release formatted text, stripping optional quotes.
fn os_release_value(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k == key).then(|| v.trim().trim_matches(['"', '\'']).to_string())
    })
}
