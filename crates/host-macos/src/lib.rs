pub mod apfs;
mod classify;
pub mod diskutil;
pub mod mounts;

use drivelist_core::{finalize_drives, Drive, PlatformDriveLister, Result};
use mounts::MountEntry;
use tracing::debug;

/// Enumerates drives through `diskutil` and the kernel mount table.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacDriveLister;

impl MacDriveLister {
    pub const fn new() -> Self {
        Self
    }
}

impl PlatformDriveLister for MacDriveLister {
    fn platform(&self) -> &'static str {
        "macos"
    }

    #[cfg(target_os = "macos")]
    fn list_drives(&self) -> Result<Vec<Drive>> {
        use drivelist_core::run_command;

        let list = run_command("diskutil", &["list", "-plist"])?;
        let mounts = mounts::read_mounts()?;
        drives_from_diskutil(&list, &mounts, |id| {
            Ok(run_command("diskutil", &["info", "-plist", id])?)
        })
    }

    #[cfg(not(target_os = "macos"))]
    fn list_drives(&self) -> Result<Vec<Drive>> {
        Err(drivelist_core::DriveListError::Unsupported(
            std::env::consts::OS,
        ))
    }
}

/// Build the drive list from a `diskutil list -plist` payload.
///
/// `disk_info` returns the `diskutil info -plist` payload for one whole-disk
/// identifier. A disk whose detail cannot be fetched or decoded is left out;
/// only an undecodable listing fails the call.
pub fn drives_from_diskutil<F>(
    list_payload: &[u8],
    mounts: &[MountEntry],
    mut disk_info: F,
) -> Result<Vec<Drive>>
where
    F: FnMut(&str) -> anyhow::Result<Vec<u8>>,
{
    let list = diskutil::parse_disk_list(list_payload)?;

    let mut infos = Vec::new();
    for id in list.whole_disk_ids() {
        let payload = match disk_info(id) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(disk = id, error = %err, "skipping disk without info");
                continue;
            }
        };
        let info = match diskutil::parse_disk_info(&payload) {
            Ok(info) => info,
            Err(err) => {
                debug!(disk = id, error = %err, "skipping disk with undecodable info");
                continue;
            }
        };
        if info.optical {
            debug!(disk = id, "skipping optical drive");
            continue;
        }
        infos.push((id.to_string(), info));
    }

    let drives = classify::build_drives(&list, infos, mounts);
    let mut drives = apfs::merge_containers(drives);
    classify::mark_root_system(&mut drives);
    Ok(finalize_drives(drives))
}
