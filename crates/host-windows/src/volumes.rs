//! Logical volumes and their mapping onto [`Drive`].

use crate::descriptor::{bus_type_name, DeviceDescriptor, DiskExtent};
use drivelist_core::{Drive, Mountpoint};

pub const DRIVE_UNKNOWN: u32 = 0;
pub const DRIVE_NO_ROOT_DIR: u32 = 1;
pub const DRIVE_REMOVABLE: u32 = 2;
pub const DRIVE_FIXED: u32 = 3;
pub const DRIVE_REMOTE: u32 = 4;
pub const DRIVE_CDROM: u32 = 5;
pub const DRIVE_RAMDISK: u32 = 6;

pub const FILE_READ_ONLY_VOLUME: u32 = 0x0008_0000;

const DEFAULT_BLOCK_SIZE: u64 = 512;

/// Letters present in a `GetLogicalDrives` bitmask, A first.
pub fn drive_letters(mask: u32) -> Vec<char> {
    ('A'..='Z')
        .enumerate()
        .filter(|(idx, _)| mask & (1u32 << idx) != 0)
        .map(|(_, letter)| letter)
        .collect()
}

/// Local block storage only: optical, network and unmounted letters are not
/// drives.
pub fn is_enumerable(drive_type: u32) -> bool {
    matches!(drive_type, DRIVE_REMOVABLE | DRIVE_FIXED | DRIVE_RAMDISK)
}

/// Everything queried for one drive letter, copied out of the native calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSnapshot {
    pub letter: char,
    pub drive_type: u32,
    pub label: String,
    pub file_system_flags: u32,
    pub total_bytes: u64,
    pub bytes_per_sector: Option<u64>,
    pub descriptor: Option<DeviceDescriptor>,
    pub extents: Vec<DiskExtent>,
}

impl VolumeSnapshot {
    pub fn root(&self) -> String {
        format!("{}:\\", self.letter)
    }

    pub fn into_drive(self, system_letter: Option<char>) -> Drive {
        let device = format!(r"\\.\{}:", self.letter);
        let root = self.root();
        let descriptor = self.descriptor.unwrap_or_default();
        let bus = bus_type_name(descriptor.bus_type);
        let protected = self.file_system_flags & FILE_READ_ONLY_VOLUME != 0;
        let description = if self.label.is_empty() {
            descriptor.model()
        } else {
            self.label.clone()
        };

        Drive {
            display_name: format!("{}:", self.letter),
            description,
            size: self.total_bytes,
            mountpoints: vec![Mountpoint::labeled(root, Some(self.label.as_str()))],
            protected,
            system: system_letter
                .is_some_and(|letter| letter.eq_ignore_ascii_case(&self.letter)),
            removable: self.drive_type == DRIVE_REMOVABLE || descriptor.removable_media,
            read_only: protected,
            block_size: self.bytes_per_sector.unwrap_or(DEFAULT_BLOCK_SIZE),
            bus_type: bus.to_string(),
            device_path: self
                .extents
                .first()
                .map(|extent| format!(r"\\.\PhysicalDrive{}", extent.disk_number))
                .unwrap_or_default(),
            enumerator: "win32".to_string(),
            is_card: matches!(bus, "SD" | "MMC"),
            is_usb: bus == "USB",
            is_scsi: matches!(bus, "SCSI" | "ATA" | "ATAPI" | "SAS" | "SATA" | "FIBRE" | "ISCSI"),
            is_virtual: self.drive_type == DRIVE_RAMDISK
                || matches!(bus, "VIRTUAL" | "FILEBACKEDVIRTUAL"),
            ..Drive::new(device)
        }
    }
}

/// Drive letter of a Windows directory path such as `C:\WINDOWS`.
pub fn letter_of_path(path: &str) -> Option<char> {
    let mut chars = path.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    (chars.next() == Some(':')).then(|| letter.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_c() -> VolumeSnapshot {
        VolumeSnapshot {
            letter: 'C',
            drive_type: DRIVE_FIXED,
            label: "Windows".to_string(),
            file_system_flags: 0x0000_02ff,
            total_bytes: 510_770_802_688,
            bytes_per_sector: Some(512),
            descriptor: Some(DeviceDescriptor {
                removable_media: false,
                vendor: String::new(),
                product: "Samsung SSD 980 PRO 1TB".to_string(),
                bus_type: 0x11,
            }),
            extents: vec![DiskExtent {
                disk_number: 0,
                starting_offset: 290_455_552,
                extent_length: 510_770_802_688,
            }],
        }
    }

    #[test]
    fn letters_from_mask() {
        assert_eq!(drive_letters(0), Vec::<char>::new());
        assert_eq!(drive_letters(0b1101), ['A', 'C', 'D']);
        assert_eq!(drive_letters(1 << 25), ['Z']);
    }

    #[test]
    fn only_local_block_storage_is_enumerable() {
        for kind in [DRIVE_REMOVABLE, DRIVE_FIXED, DRIVE_RAMDISK] {
            assert!(is_enumerable(kind));
        }
        for kind in [DRIVE_UNKNOWN, DRIVE_NO_ROOT_DIR, DRIVE_REMOTE, DRIVE_CDROM] {
            assert!(!is_enumerable(kind));
        }
    }

    #[test]
    fn system_volume_maps_to_drive() {
        let drive = fixed_c().into_drive(Some('c'));
        assert_eq!(drive.device, r"\\.\C:");
        assert_eq!(drive.raw, r"\\.\C:");
        assert_eq!(drive.display_name, "C:");
        assert_eq!(drive.description, "Windows");
        assert_eq!(drive.mountpoints, vec![Mountpoint::labeled("C:\\", Some("Windows"))]);
        assert!(drive.system);
        assert!(!drive.removable);
        assert!(!drive.protected);
        assert_eq!(drive.bus_type, "NVME");
        assert_eq!(drive.device_path, r"\\.\PhysicalDrive0");
        assert_eq!(drive.block_size, 512);
    }

    #[test]
    fn read_only_usb_stick() {
        let snapshot = VolumeSnapshot {
            letter: 'E',
            drive_type: DRIVE_REMOVABLE,
            label: String::new(),
            file_system_flags: FILE_READ_ONLY_VOLUME,
            total_bytes: 30_752_636_928,
            bytes_per_sector: None,
            descriptor: Some(DeviceDescriptor {
                removable_media: true,
                vendor: "SanDisk".to_string(),
                product: "Cruzer Blade".to_string(),
                bus_type: 0x07,
            }),
            extents: Vec::new(),
        };
        let drive = snapshot.into_drive(Some('C'));
        assert!(!drive.system);
        assert!(drive.removable);
        assert!(drive.protected);
        assert!(drive.read_only);
        assert!(drive.is_usb);
        assert_eq!(drive.description, "SanDisk Cruzer Blade");
        assert_eq!(drive.mountpoints[0].label, None);
        assert_eq!(drive.block_size, 512);
        assert_eq!(drive.device_path, "");
    }

    #[test]
    fn missing_descriptor_degrades_to_defaults() {
        let snapshot = VolumeSnapshot {
            descriptor: None,
            extents: Vec::new(),
            ..fixed_c()
        };
        let drive = snapshot.into_drive(None);
        assert!(!drive.system);
        assert_eq!(drive.bus_type, "");
        assert!(!drive.is_scsi);
    }

    #[test]
    fn ram_disk_is_virtual() {
        let snapshot = VolumeSnapshot {
            drive_type: DRIVE_RAMDISK,
            ..fixed_c()
        };
        assert!(snapshot.into_drive(None).is_virtual);
    }

    #[test]
    fn letter_of_windows_directory() {
        assert_eq!(letter_of_path(r"C:\WINDOWS"), Some('C'));
        assert_eq!(letter_of_path(r"d:\Win"), Some('D'));
        assert_eq!(letter_of_path(r"\\server\share"), None);
        assert_eq!(letter_of_path(""), None);
    }
}
