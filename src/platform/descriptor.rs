//! Platform descriptor and OS-specific detail records.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use super::probe::{HostProbe, ProcessorInfo, RawUname, SystemProbe};

/// Sentinel for platform-level values the host did not report.
pub const UNKNOWN: &str = "unknown";

/// Sentinel for OS detail values the host did not report.
pub const UNKNOWN_DETAIL: &str = "Unknown";

/// Substrings identifying each OS family, checked in this order.
const FAMILY_KEYWORDS: [(OsFamily, &[&str]); 3] = [
    (OsFamily::Mac, &["mac", "darwin"]),
    (OsFamily::Unix, &["nix", "nux", "bsd", "sunos", "aix"]),
    (OsFamily::Windows, &["win"]),
];

/// Operating system family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OsFamily {
    Mac,
    Unix,
    Windows,
    Unknown,
}

/// macOS details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacDetail {
    /// Product release, e.g. `14.2.1`.
    pub release: String,
    /// Version tuple: version, development stage, non-release flag.
    pub version: String,
    pub dev_stage: String,
    pub non_release: String,
    /// Machine type.
    pub machine: String,
}

/// Linux/Unix distribution details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnixDetail {
    pub distname: String,
    pub version: String,
    /// Release codename, e.g. `jammy`.
    pub codename: String,
}

/// Windows details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowsDetail {
    pub release: String,
    pub version: String,
    /// Service pack level.
    pub csd: String,
    /// Processor type, e.g. `Multiprocessor Free`.
    pub ptype: String,
}

/// OS-specific detail, one variant per family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "os_type", rename_all = "lowercase")]
pub enum OsDetail {
    Mac(MacDetail),
    Unix(UnixDetail),
    Windows(WindowsDetail),
    Unknown,
}

impl OsDetail {
    /// Family this detail record belongs to.
    pub fn family(&self) -> OsFamily {
        match self {
            Self::Mac(_) => OsFamily::Mac,
            Self::Unix(_) => OsFamily::Unix,
            Self::Windows(_) => OsFamily::Windows,
            Self::Unknown => OsFamily::Unknown,
        }
    }
}

/// Snapshot of the host machine.
///
/// Built once per process and never mutated; modules receive it behind an
/// `Arc`. The OS family is derived from [`OsDetail`], so a detail record is
/// present exactly when the family is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    /// Raw OS name as reported by the host.
    pub system: String,
    pub hostname: String,
    pub os_release: String,
    pub os_version: String,
    pub cpu_architecture: String,
    pub processor: ProcessorInfo,
    pub detail: OsDetail,
}

impl PlatformDescriptor {
    /// Describe the machine this process runs on.
    pub fn current() -> Self {
        let probe = SystemProbe;
        Self::detect(probe.uname(), &probe)
    }

    /// Classify `raw` and gather the matching OS details from `probe`.
    ///
    /// Never fails: anything the host does not report becomes a sentinel.
    pub fn detect(raw: RawUname, probe: &impl HostProbe) -> Self {
        let family = classify_os(&raw.system);

        let detail = match family {
            OsFamily::Mac => OsDetail::Mac(normalize_mac(probe.mac_detail())),
            OsFamily::Unix => OsDetail::Unix(normalize_unix(probe.unix_detail())),
            OsFamily::Windows => OsDetail::Windows(normalize_windows(probe.windows_detail())),
            OsFamily::Unknown => {
                tracing::warn!(
                    system = %raw.system,
                    "Unknown OS type. OS-dependent features are unavailable"
                );
                OsDetail::Unknown
            }
        };

        let descriptor = Self {
            system: or_unknown(raw.system, UNKNOWN),
            hostname: or_unknown(raw.node, UNKNOWN),
            os_release: or_unknown(raw.release, UNKNOWN),
            os_version: or_unknown(raw.version, UNKNOWN),
            cpu_architecture: or_unknown(raw.machine, UNKNOWN),
            processor: ProcessorInfo {
                architecture: or_unknown(raw.processor.architecture, UNKNOWN),
                family: or_unknown(raw.processor.family, UNKNOWN),
                pointer_width: or_unknown(raw.processor.pointer_width, UNKNOWN),
            },
            detail,
        };

        tracing::debug!(
            os_family = %descriptor.os_family(),
            hostname = %descriptor.hostname,
            release = %descriptor.os_release,
            arch = %descriptor.cpu_architecture,
            "Platform detected"
        );
        descriptor
    }

    /// OS family of the host.
    pub fn os_family(&self) -> OsFamily {
        self.detail.family()
    }
}

/// Map a raw OS name to its family by case-insensitive substring match.
///
/// Families are tried in order (mac, unix, windows); the first hit wins.
pub fn classify_os(system: &str) -> OsFamily {
    let system = system.to_lowercase();
    FAMILY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| system.contains(k)))
        .map(|(family, _)| *family)
        .unwrap_or(OsFamily::Unknown)
}

fn or_unknown(value: String, sentinel: &str) -> String {
    if value.trim().is_empty() {
        sentinel.to_string()
    } else {
        value
    }
}

fn normalize_mac(detail: MacDetail) -> MacDetail {
    MacDetail {
        release: or_unknown(detail.release, UNKNOWN_DETAIL),
        version: or_unknown(detail.version, UNKNOWN_DETAIL),
        dev_stage: or_unknown(detail.dev_stage, UNKNOWN_DETAIL),
        non_release: or_unknown(detail.non_release, UNKNOWN_DETAIL),
        machine: or_unknown(detail.machine, UNKNOWN_DETAIL),
    }
}

fn normalize_unix(detail: UnixDetail) -> UnixDetail {
    UnixDetail {
        distname: or_unknown(detail.distname, UNKNOWN_DETAIL),
        version: or_unknown(detail.version, UNKNOWN_DETAIL),
        codename: or_unknown(detail.codename, UNKNOWN_DETAIL),
    }
}

fn normalize_windows(detail: WindowsDetail) -> WindowsDetail {
    WindowsDetail {
        release: or_unknown(detail.release, UNKNOWN_DETAIL),
        version: or_unknown(detail.version, UNKNOWN_DETAIL),
        csd: or_unknown(detail.csd, UNKNOWN_DETAIL),
        ptype: or_unknown(detail.ptype, UNKNOWN_DETAIL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Probe returning canned values.
    struct FakeProbe;

    impl HostProbe for FakeProbe {
        fn uname(&self) -> RawUname {
            RawUname {
                system: "Linux".to_string(),
                node: "collector-01".to_string(),
                release: "6.8.0".to_string(),
                version: String::new(),
                machine: "x86_64".to_string(),
                processor: ProcessorInfo {
                    architecture: "x86_64".to_string(),
                    family: "unix".to_string(),
                    pointer_width: "64".to_string(),
                },
            }
        }

        fn mac_detail(&self) -> MacDetail {
            MacDetail {
                release: "14.2.1".to_string(),
                machine: "arm64".to_string(),
                ..Default::default()
            }
        }

        fn unix_detail(&self) -> UnixDetail {
            UnixDetail {
                distname: "Ubuntu".to_string(),
                version: "22.04".to_string(),
                codename: String::new(),
            }
        }

        fn windows_detail(&self) -> WindowsDetail {
            WindowsDetail {
                release: "10".to_string(),
                version: "10.0.19045".to_string(),
                csd: String::new(),
                ptype: "Multiprocessor Free".to_string(),
            }
        }
    }

    fn raw(system: &str) -> RawUname {
        RawUname {
            system: system.to_string(),
            ..FakeProbe.uname()
        }
    }

    #[test]
    fn test_classify_os_families() {
        assert_eq!(classify_os("Darwin"), OsFamily::Mac);
        assert_eq!(classify_os("macos"), OsFamily::Mac);
        assert_eq!(classify_os("Linux"), OsFamily::Unix);
        assert_eq!(classify_os("FreeBSD"), OsFamily::Unix);
        assert_eq!(classify_os("Windows"), OsFamily::Windows);
        assert_eq!(classify_os("Plan9"), OsFamily::Unknown);
        assert_eq!(classify_os(""), OsFamily::Unknown);
    }

    #[test]
    fn test_detect_unix_fills_sentinels() {
        let descriptor = PlatformDescriptor::detect(FakeProbe.uname(), &FakeProbe);

        assert_eq!(descriptor.os_family(), OsFamily::Unix);
        assert_eq!(descriptor.hostname, "collector-01");
        assert_eq!(descriptor.os_version, UNKNOWN);
        match &descriptor.detail {
            OsDetail::Unix(unix) => {
                assert_eq!(unix.distname, "Ubuntu");
                assert_eq!(unix.codename, UNKNOWN_DETAIL);
            }
            other => panic!("expected Unix detail, got {other:?}"),
        }
    }

    #[test]
    fn test_detect_mac_and_windows() {
        let mac = PlatformDescriptor::detect(raw("Darwin"), &FakeProbe);
        match &mac.detail {
            OsDetail::Mac(detail) => {
                assert_eq!(detail.release, "14.2.1");
                assert_eq!(detail.version, UNKNOWN_DETAIL);
            }
            other => panic!("expected Mac detail, got {other:?}"),
        }

        let windows = PlatformDescriptor::detect(raw("Windows"), &FakeProbe);
        match &windows.detail {
            OsDetail::Windows(detail) => {
                assert_eq!(detail.csd, UNKNOWN_DETAIL);
                assert_eq!(detail.ptype, "Multiprocessor Free");
            }
            other => panic!("expected Windows detail, got {other:?}"),
        }
    }

    #[test]
    fn test_detect_unknown_has_no_detail() {
        let descriptor = PlatformDescriptor::detect(raw("Haiku"), &FakeProbe);
        assert_eq!(descriptor.os_family(), OsFamily::Unknown);
        assert_eq!(descriptor.detail, OsDetail::Unknown);
    }

    #[test]
    fn test_detect_is_idempotent() {
        let first = PlatformDescriptor::detect(FakeProbe.uname(), &FakeProbe);
        let second = PlatformDescriptor::detect(FakeProbe.uname(), &FakeProbe);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_current_host_is_stable() {
        assert_eq!(PlatformDescriptor::current(), PlatformDescriptor::current());
    }

    #[test]
    fn test_detail_serializes_with_os_type_tag() {
        let descriptor = PlatformDescriptor::detect(FakeProbe.uname(), &FakeProbe);
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["detail"]["os_type"], "unix");
        assert_eq!(json["detail"]["distname"], "Ubuntu");
    }
}
