pub mod lsblk;

use drivelist_core::{finalize_drives, Drive, DriveListError, Mountpoint, PlatformDriveLister, Result};
use lsblk::{coerce_bool, coerce_u64, BlockDevice, LsblkOutput};
use tracing::debug;

const DEFAULT_BLOCK_SIZE: u64 = 512;

/// Enumerates drives through `lsblk`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxDriveLister;

impl LinuxDriveLister {
    pub const fn new() -> Self {
        Self
    }
}

impl PlatformDriveLister for LinuxDriveLister {
    fn platform(&self) -> &'static str {
        "linux"
    }

    fn list_drives(&self) -> Result<Vec<Drive>> {
        let payload = read_lsblk()?;
        drives_from_lsblk(&payload)
    }
}

#[cfg(target_os = "linux")]
fn read_lsblk() -> Result<Vec<u8>> {
    drivelist_core::run_command("lsblk", &["--json", "--bytes", "--output-all"])
}

#[cfg(not(target_os = "linux"))]
fn read_lsblk() -> Result<Vec<u8>> {
    Err(DriveListError::Unsupported(std::env::consts::OS))
}

/// Turn one lsblk JSON document into the final drive list.
pub fn drives_from_lsblk(payload: &[u8]) -> Result<Vec<Drive>> {
    let output: LsblkOutput = serde_json::from_slice(payload)
        .map_err(|err| DriveListError::decode("lsblk output", err))?;

    let drives = output
        .blockdevices
        .iter()
        .filter(|device| {
            if !device.is_disk() {
                debug!(name = device.kernel_name(), kind = ?device.kind, "skipping non-disk block device");
                return false;
            }
            if is_placeholder(device.kernel_name()) {
                debug!(name = device.kernel_name(), "skipping memory-backed block device");
                return false;
            }
            true
        })
        .filter_map(drive_from_block_device)
        .collect();
    Ok(finalize_drives(drives))
}

fn drive_from_block_device(device: &BlockDevice) -> Option<Drive> {
    let node = device.device_node()?;
    let read_only = coerce_bool(device.ro.as_ref(), false);
    let tran = device.tran.as_deref().unwrap_or("").trim().to_ascii_lowercase();
    // hotplug counts on usb and mmc only: AHCI ports set it for internal disks.
    let removable = coerce_bool(device.rm.as_ref(), false)
        || (matches!(tran.as_str(), "usb" | "mmc")
            && coerce_bool(device.hotplug.as_ref(), false));
    let block_size = coerce_u64(
        device.phy_sec.as_ref().or(device.log_sec.as_ref()),
        DEFAULT_BLOCK_SIZE,
    );

    let mut mountpoints = Vec::new();
    collect_mountpoints(device, &mut mountpoints);
    let system = mountpoints.iter().any(|mountpoint| mountpoint.path == "/");

    Some(Drive {
        description: describe(device),
        size: coerce_u64(device.size.as_ref(), 0),
        mountpoints,
        protected: read_only,
        system,
        removable,
        read_only,
        block_size,
        bus_type: tran.to_ascii_uppercase(),
        enumerator: "lsblk:json".to_string(),
        is_card: tran == "mmc" || device.kernel_name().starts_with("mmcblk"),
        is_usb: tran == "usb",
        is_scsi: matches!(tran.as_str(), "sata" | "sas" | "scsi" | "ata" | "fc" | "iscsi"),
        is_virtual: is_virtual(device),
        partition_table_type: partition_table_type(device.pttype.as_deref()),
        ..Drive::new(node)
    })
}

/// Mountpoints of the disk and of every descendant, depth first, so a root
/// filesystem on a partition, LVM volume or dm-crypt mapping is attributed to
/// the disk underneath it.
fn collect_mountpoints(device: &BlockDevice, out: &mut Vec<Mountpoint>) {
    for path in device.mount_paths() {
        if !out.iter().any(|mountpoint| mountpoint.path == path) {
            out.push(Mountpoint::labeled(path, device.label.as_deref()));
        }
    }
    for child in &device.children {
        collect_mountpoints(child, out);
    }
}

fn describe(device: &BlockDevice) -> String {
    [device.vendor.as_deref(), device.model.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_placeholder(name: &str) -> bool {
    name.starts_with("zram") || name.starts_with("ram")
}

/// Disks with no bus behind them (device-mapper, nbd, pmem namespaces).
fn is_virtual(device: &BlockDevice) -> bool {
    match device.subsystems.as_deref() {
        Some(subsystems) => subsystems.trim() == "block",
        None => false,
    }
}

fn partition_table_type(pttype: Option<&str>) -> String {
    match pttype.map(str::trim) {
        Some("gpt") => "gpt".to_string(),
        Some("dos") => "mbr".to_string(),
        _ => String::new(),
    }
}
