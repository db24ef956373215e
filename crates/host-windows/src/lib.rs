pub mod descriptor;
pub mod volumes;

#[cfg(windows)]
mod win;

use drivelist_core::{finalize_drives, Drive, PlatformDriveLister, Result};
use volumes::VolumeSnapshot;

/// Enumerates drive letters through the Win32 volume APIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsDriveLister;

impl WindowsDriveLister {
    pub const fn new() -> Self {
        Self
    }
}

impl PlatformDriveLister for WindowsDriveLister {
    fn platform(&self) -> &'static str {
        "windows"
    }

    #[cfg(windows)]
    fn list_drives(&self) -> Result<Vec<Drive>> {
        let (snapshots, system_letter) = win::enumerate_volumes()?;
        Ok(drives_from_volumes(snapshots, system_letter))
    }

    #[cfg(not(windows))]
    fn list_drives(&self) -> Result<Vec<Drive>> {
        Err(drivelist_core::DriveListError::Unsupported(
            std::env::consts::OS,
        ))
    }
}

/// Map queried volumes to drives. `system_letter` is the letter holding the
/// Windows directory.
pub fn drives_from_volumes(snapshots: Vec<VolumeSnapshot>, system_letter: Option<char>) -> Vec<Drive> {
    let drives = snapshots
        .into_iter()
        .map(|snapshot| snapshot.into_drive(system_letter))
        .collect();
    finalize_drives(drives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volumes::{DRIVE_FIXED, DRIVE_REMOVABLE};

    fn snapshot(letter: char, drive_type: u32, label: &str) -> VolumeSnapshot {
        VolumeSnapshot {
            letter,
            drive_type,
            label: label.to_string(),
            total_bytes: 64_000_000_000,
            ..VolumeSnapshot::default()
        }
    }

    #[test]
    fn only_the_windows_letter_is_system() {
        let drives = drives_from_volumes(
            vec![
                snapshot('C', DRIVE_FIXED, "Windows"),
                snapshot('D', DRIVE_FIXED, "Data"),
                snapshot('E', DRIVE_REMOVABLE, "STICK"),
            ],
            Some('C'),
        );
        let system: Vec<_> = drives
            .iter()
            .filter(|drive| drive.system)
            .map(|drive| drive.display_name.as_str())
            .collect();
        assert_eq!(system, ["C:"]);
        assert!(drives[2].removable);
        assert!(drives.iter().all(|drive| !drive.device.is_empty() && !drive.raw.is_empty()));
    }

    #[test]
    fn unknown_windows_directory_marks_nothing_system() {
        let drives = drives_from_volumes(vec![snapshot('C', DRIVE_FIXED, "")], None);
        assert!(!drives[0].system);
        assert_eq!(drives[0].mountpoints[0].path, "C:\\");
    }

    #[test]
    fn lister_reports_platform_name() {
        assert_eq!(WindowsDriveLister::new().platform(), "windows");
    }

    #[cfg(not(windows))]
    #[test]
    fn lister_is_unsupported_off_windows() {
        let err = WindowsDriveLister::new().list_drives().unwrap_err();
        assert!(matches!(err, drivelist_core::DriveListError::Unsupported(_)));
    }
}
