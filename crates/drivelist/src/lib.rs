//! Cross-platform storage drive enumeration.
//!
//! [`list_drives`] queries the host once and returns every drive in a common
//! shape. Each platform's enumerator is also exported so callers can drive
//! the parsing stages directly with captured payloads.

pub use drivelist_core::{
    now_utc_rfc3339, Drive, DriveListError, ErrorKind, Mountpoint, PlatformDriveLister, Result,
    DRIVE_REPORT_SCHEMA_VERSION,
};
pub use drivelist_host_linux::LinuxDriveLister;
pub use drivelist_host_macos::MacDriveLister;
pub use drivelist_host_windows::WindowsDriveLister;

pub mod linux {
    pub use drivelist_host_linux::{drives_from_lsblk, lsblk};
}

pub mod macos {
    pub use drivelist_host_macos::{apfs, diskutil, drives_from_diskutil, mounts};
}

pub mod windows {
    pub use drivelist_host_windows::{descriptor, drives_from_volumes, volumes};
}

/// Lister for a host with no enumerator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedLister;

impl PlatformDriveLister for UnsupportedLister {
    fn platform(&self) -> &'static str {
        std::env::consts::OS
    }

    fn list_drives(&self) -> Result<Vec<Drive>> {
        Err(DriveListError::Unsupported(std::env::consts::OS))
    }
}

/// The enumerator for the operating system this crate was built for.
pub fn platform_lister() -> &'static dyn PlatformDriveLister {
    #[cfg(target_os = "linux")]
    {
        static LISTER: LinuxDriveLister = LinuxDriveLister::new();
        &LISTER
    }
    #[cfg(target_os = "macos")]
    {
        static LISTER: MacDriveLister = MacDriveLister::new();
        &LISTER
    }
    #[cfg(windows)]
    {
        static LISTER: WindowsDriveLister = WindowsDriveLister::new();
        &LISTER
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    {
        static LISTER: UnsupportedLister = UnsupportedLister;
        &LISTER
    }
}

/// Enumerate the drives attached to this host.
pub fn list_drives() -> Result<Vec<Drive>> {
    platform_lister().list_drives()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_lister_matches_build_target() {
        assert_eq!(platform_lister().platform(), std::env::consts::OS);
    }

    #[test]
    fn unsupported_lister_fails_with_os_name() {
        match UnsupportedLister.list_drives() {
            Err(DriveListError::Unsupported(os)) => assert_eq!(os, std::env::consts::OS),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
