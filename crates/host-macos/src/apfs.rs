//! Folding APFS containers into the physical disk that backs them.
//!
//! diskutil reports an APFS container (`AppleAPFSMedia`) as its own whole
//! disk, separate from the physical disk holding its store partition. The
//! container's volumes, including the root volume, belong to that physical
//! disk from a user's point of view.

use drivelist_core::Drive;
use tracing::debug;

pub const APFS_MEDIA: &str = "AppleAPFSMedia";

pub fn is_container(drive: &Drive) -> bool {
    drive.description == APFS_MEDIA
}

/// Merge every container onto the non-virtual disk with the same device
/// path.
///
/// Non-container drives come first, then containers that found no physical
/// disk, each group in discovery order. A merged container hands its
/// mountpoints to the physical disk and is not listed on its own.
pub fn merge_containers(drives: Vec<Drive>) -> Vec<Drive> {
    let (mut containers, mut others): (Vec<Drive>, Vec<Drive>) =
        drives.into_iter().partition(is_container);

    let mut merged = vec![false; containers.len()];
    for (container, merged) in containers.iter_mut().zip(merged.iter_mut()) {
        if container.device_path.is_empty() {
            continue;
        }
        let target = others
            .iter_mut()
            .find(|other| !other.is_virtual && other.device_path == container.device_path);
        let Some(target) = target else {
            debug!(container = %container.device, "no physical disk for APFS container");
            continue;
        };
        debug!(container = %container.device, disk = %target.device, "merging APFS container");
        for mountpoint in &container.mountpoints {
            if !target.has_mountpoint(&mountpoint.path) {
                target.mountpoints.push(mountpoint.clone());
            }
        }
        container.is_virtual = true;
        *merged = true;
    }

    others.extend(
        containers
            .into_iter()
            .zip(merged)
            .filter(|(_, merged)| !merged)
            .map(|(container, _)| container),
    );
    others
}
