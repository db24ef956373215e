//! Mapping diskutil records onto [`Drive`].

use crate::diskutil::{DiskInfo, DiskList};
use crate::mounts::{whole_disk_id, MountEntry};
use drivelist_core::{Drive, Mountpoint};

const DEFAULT_BLOCK_SIZE: u64 = 512;

/// A drive together with the diskutil identifier it was built from.
#[derive(Debug, Clone)]
pub(crate) struct Classified {
    pub id: String,
    pub drive: Drive,
}

pub(crate) fn build_drives(
    list: &DiskList,
    infos: Vec<(String, DiskInfo)>,
    mounts: &[MountEntry],
) -> Vec<Drive> {
    let mut classified: Vec<Classified> = infos
        .into_iter()
        .map(|(id, info)| Classified {
            drive: drive_from_info(&id, &info, list, mounts),
            id,
        })
        .collect();
    fill_device_paths(list, &mut classified);
    classified.into_iter().map(|entry| entry.drive).collect()
}

fn drive_from_info(id: &str, info: &DiskInfo, list: &DiskList, mounts: &[MountEntry]) -> Drive {
    let device = if info.device_node.is_empty() {
        format!("/dev/{id}")
    } else {
        info.device_node.clone()
    };
    let removable = [
        info.removable,
        info.removable_media,
        info.ejectable,
        info.removable_or_external,
    ]
    .into_iter()
    .any(|flag| flag == Some(true));
    let protected = info.writable_media == Some(false);
    let bus = info.bus_protocol.as_str();

    Drive {
        description: info.description().to_string(),
        size: info.size.unwrap_or(0),
        mountpoints: mountpoints_for(id, list, mounts),
        raw: format!("/dev/r{id}"),
        protected,
        system: info.internal == Some(true) && !removable,
        removable,
        read_only: info.read_only_media.unwrap_or(protected),
        block_size: info.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
        bus_type: info.bus_protocol.clone(),
        device_path: info.device_tree_path.clone(),
        enumerator: "diskutil".to_string(),
        is_card: bus == "Secure Digital",
        is_usb: bus == "USB",
        is_scsi: matches!(
            bus,
            "SATA" | "SAS" | "SCSI" | "ATA" | "Fibre Channel Interface"
        ),
        is_virtual: info.virtual_or_physical == "Virtual",
        partition_table_type: partition_table_type(&info.content),
        ..Drive::new(device)
    }
}

/// Mounts from the kernel table first, then any diskutil reports that the
/// table did not already cover.
fn mountpoints_for(id: &str, list: &DiskList, mounts: &[MountEntry]) -> Vec<Mountpoint> {
    let mut out: Vec<Mountpoint> = Vec::new();
    let mut push = |path: &str, label: Option<&str>| {
        if !path.starts_with('/') || out.iter().any(|m| m.path == path) {
            return;
        }
        out.push(Mountpoint::labeled(path, label));
    };

    for entry in mounts {
        if whole_disk_id(&entry.device).as_deref() != Some(id) {
            continue;
        }
        let label = entry.slice_id().and_then(|slice| list.volume_label(slice));
        push(&entry.mount_point, label);
    }
    if let Some(disk) = list.disk(id) {
        for volume in &disk.volumes {
            if let Some(path) = volume.mount_point.as_deref() {
                push(path, volume.name.as_deref());
            }
        }
    }
    out
}

/// Give every drive a device path to match on. Physical disks without a
/// device tree path use their node; containers without one borrow the path
/// of the whole disk holding their first physical store.
fn fill_device_paths(list: &DiskList, classified: &mut [Classified]) {
    for entry in classified.iter_mut() {
        if entry.drive.device_path.is_empty() && !crate::apfs::is_container(&entry.drive) {
            entry.drive.device_path = entry.drive.device.clone();
        }
    }

    let borrowed: Vec<(usize, String)> = classified
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.drive.device_path.is_empty())
        .filter_map(|(idx, entry)| {
            let store = list.disk(&entry.id)?.physical_stores.first()?;
            let backing = whole_disk_id(store)?;
            let path = classified
                .iter()
                .find(|other| other.id == backing)
                .map(|other| other.drive.device_path.clone())
                .filter(|path| !path.is_empty())?;
            Some((idx, path))
        })
        .collect();
    for (idx, path) in borrowed {
        classified[idx].drive.device_path = path;
    }
}

fn partition_table_type(content: &str) -> String {
    match content {
        "GUID_partition_scheme" => "gpt".to_string(),
        "FDisk_partition_scheme" => "mbr".to_string(),
        _ => String::new(),
    }
}

/// A drive holding the root filesystem is always a system drive.
pub(crate) fn mark_root_system(drives: &mut [Drive]) {
    for drive in drives.iter_mut() {
        if drive.has_mountpoint("/") {
            drive.system = true;
        }
    }
}
