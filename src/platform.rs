//! Platform Layer
//!
//! Immutable description of the host the framework runs on, built once at
//! startup and shared read-only with every module.
//!
//! - [`PlatformDescriptor`]: OS family, hostname, release, architecture and
//!   the OS-specific detail record
//! - [`HostProbe`]: introspection seam; [`SystemProbe`] reads the live host

mod descriptor;
mod probe;

pub use descriptor::{
    MacDetail, OsDetail, OsFamily, PlatformDescriptor, UNKNOWN, UNKNOWN_DETAIL, UnixDetail,
    WindowsDetail, classify_os,
};
pub use probe::{HostProbe, ProcessorInfo, RawUname, SystemProbe};
