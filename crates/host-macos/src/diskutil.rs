//! Typed views over `diskutil list -plist` and `diskutil info -plist`.
//!
//! Every value is looked up by key name in the decoded dictionary, so the
//! order in which diskutil emits keys, and which optional keys it leaves out
//! for a given disk, never shifts one value onto another key. A value of an
//! unexpected type degrades to the field's default instead of failing the
//! whole document.

use drivelist_core::{DriveListError, Result};
use plist::{Dictionary, Value};
use std::io::Cursor;

/// Summary listing from `diskutil list -plist`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskList {
    pub whole_disks: Vec<String>,
    pub disks: Vec<ListedDisk>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListedDisk {
    pub identifier: String,
    pub content: String,
    pub size: u64,
    /// Partitions, APFS volumes and, for unpartitioned media, the disk itself.
    pub volumes: Vec<ListedVolume>,
    /// Partitions backing an APFS container, e.g. `disk0s2`.
    pub physical_stores: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListedVolume {
    pub identifier: String,
    pub name: Option<String>,
    pub mount_point: Option<String>,
}

/// Per-disk detail from `diskutil info -plist <disk>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskInfo {
    pub device_identifier: String,
    pub device_node: String,
    pub media_name: String,
    pub io_registry_entry_name: String,
    pub volume_name: String,
    pub size: Option<u64>,
    pub internal: Option<bool>,
    pub removable: Option<bool>,
    pub removable_media: Option<bool>,
    pub removable_or_external: Option<bool>,
    pub ejectable: Option<bool>,
    pub writable_media: Option<bool>,
    pub read_only_media: Option<bool>,
    pub block_size: Option<u64>,
    pub bus_protocol: String,
    pub virtual_or_physical: String,
    pub device_tree_path: String,
    pub content: String,
    pub optical: bool,
}

impl DiskList {
    /// Whole-disk identifiers in diskutil's order. Older diskutil versions
    /// omit `WholeDisks`, in which case the top-level entries are used.
    pub fn whole_disk_ids(&self) -> Vec<&str> {
        if self.whole_disks.is_empty() {
            self.disks.iter().map(|disk| disk.identifier.as_str()).collect()
        } else {
            self.whole_disks.iter().map(String::as_str).collect()
        }
    }

    pub fn disk(&self, identifier: &str) -> Option<&ListedDisk> {
        self.disks.iter().find(|disk| disk.identifier == identifier)
    }

    /// Volume name for a slice identifier. Mounted APFS snapshots
    /// (`disk3s1s1`) inherit the name of the volume they were taken from.
    pub fn volume_label(&self, identifier: &str) -> Option<&str> {
        let mut candidate = identifier;
        loop {
            let found = self
                .disks
                .iter()
                .flat_map(|disk| disk.volumes.iter())
                .find(|volume| volume.identifier == candidate)
                .and_then(|volume| volume.name.as_deref());
            if found.is_some() {
                return found;
            }
            candidate = parent_slice(candidate)?;
        }
    }
}

impl DiskInfo {
    pub fn description(&self) -> &str {
        [
            self.media_name.as_str(),
            self.io_registry_entry_name.as_str(),
            self.volume_name.as_str(),
        ]
        .into_iter()
        .find(|value| !value.is_empty())
        .unwrap_or("")
    }
}

/// `disk3s1s1` -> `disk3s1`, `disk3s1` -> `disk3`, `disk3` -> None.
fn parent_slice(identifier: &str) -> Option<&str> {
    let idx = identifier.rfind('s')?;
    let (head, tail) = identifier.split_at(idx);
    let is_slice = tail.len() > 1 && tail[1..].chars().all(|ch| ch.is_ascii_digit());
    if is_slice && head.len() > "disk".len() {
        Some(head)
    } else {
        None
    }
}

pub fn parse_disk_list(payload: &[u8]) -> Result<DiskList> {
    let root = parse_root(payload, "diskutil list")?;
    let fields = Fields(&root);
    let disks = fields.dicts("AllDisksAndPartitions").map(listed_disk).collect();
    Ok(DiskList {
        whole_disks: fields.strings("WholeDisks"),
        disks,
    })
}

fn listed_disk(dict: &Dictionary) -> ListedDisk {
    let fields = Fields(dict);
    let identifier = fields.text("DeviceIdentifier");
    let mut volumes = Vec::new();
    if fields.has("MountPoint") || fields.has("VolumeName") {
        volumes.push(listed_volume(dict));
    }
    volumes.extend(fields.dicts("Partitions").map(listed_volume));
    volumes.extend(fields.dicts("APFSVolumes").map(listed_volume));

    ListedDisk {
        content: fields.text("Content"),
        size: fields.number("Size").unwrap_or(0),
        volumes,
        physical_stores: fields
            .dicts("APFSPhysicalStores")
            .map(|store| Fields(store).text("DeviceIdentifier"))
            .filter(|store| !store.is_empty())
            .collect(),
        identifier,
    }
}

fn listed_volume(dict: &Dictionary) -> ListedVolume {
    let fields = Fields(dict);
    ListedVolume {
        identifier: fields.text("DeviceIdentifier"),
        name: fields.optional_text("VolumeName"),
        mount_point: fields.optional_text("MountPoint"),
    }
}

pub fn parse_disk_info(payload: &[u8]) -> Result<DiskInfo> {
    let root = parse_root(payload, "diskutil info")?;
    let fields = Fields(&root);
    Ok(DiskInfo {
        device_identifier: fields.text("DeviceIdentifier"),
        device_node: fields.text("DeviceNode"),
        media_name: fields.text("MediaName"),
        io_registry_entry_name: fields.text("IORegistryEntryName"),
        volume_name: fields.text("VolumeName"),
        size: fields.number("TotalSize").or_else(|| fields.number("Size")),
        internal: fields.flag("Internal"),
        removable: fields.flag("Removable"),
        removable_media: fields.flag("RemovableMedia"),
        removable_or_external: fields.flag("RemovableMediaOrExternalDevice"),
        ejectable: fields.flag("Ejectable"),
        writable_media: fields.flag("WritableMedia"),
        read_only_media: fields.flag("ReadOnlyMedia"),
        block_size: fields.number("DeviceBlockSize"),
        bus_protocol: fields.text("BusProtocol"),
        virtual_or_physical: fields.text("VirtualOrPhysical"),
        device_tree_path: fields.text("DeviceTreePath"),
        content: fields.text("Content"),
        optical: fields.has("OpticalDeviceType") || fields.has("OpticalMediaType"),
    })
}

fn parse_root(payload: &[u8], what: &'static str) -> Result<Dictionary> {
    let value = Value::from_reader(Cursor::new(payload))
        .map_err(|err| DriveListError::decode(what, err))?;
    value
        .into_dictionary()
        .ok_or_else(|| DriveListError::decode(what, "top-level value is not a dictionary"))
}

struct Fields<'a>(&'a Dictionary);

impl<'a> Fields<'a> {
    fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn text(&self, key: &str) -> String {
        self.optional_text(key).unwrap_or_default()
    }

    fn optional_text(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .and_then(Value::as_string)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn number(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Integer(value) => value.as_unsigned(),
            Value::Real(value) if value.is_finite() && *value >= 0.0 => Some(*value as u64),
            Value::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Boolean(value) => Some(*value),
            Value::Integer(value) => value.as_unsigned().map(|value| value != 0),
            Value::String(value) => match value.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" => Some(true),
                "no" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn dicts(&self, key: &str) -> impl Iterator<Item = &'a Dictionary> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_dictionary)
    }

    fn strings(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_string)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drivelist_core::ErrorKind;

    const LIST: &str = include_str!("../tests/fixtures/diskutil_list.plist");
    const INFO_DISK0: &str = include_str!("../tests/fixtures/diskutil_info_disk0.plist");

    fn plist(body: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
{body}
</dict>
</plist>"#
        )
        .into_bytes()
    }

    #[test]
    fn volume_name_after_integer_key_resolves_by_name() {
        // Integer, boolean and string keys interleave; the string the
        // decoder must return is the first string-typed value only by
        // accident of ordering in a positional scheme.
        let payload = plist(
            "<key>Size</key><integer>30752636928</integer>
             <key>Internal</key><false/>
             <key>BusProtocol</key><string>USB</string>
             <key>DeviceBlockSize</key><integer>512</integer>
             <key>VolumeName</key><string>USBSTICK</string>
             <key>WritableMedia</key><true/>
             <key>MediaName</key><string>Cruzer Blade</string>",
        );
        let info = parse_disk_info(&payload).unwrap();
        assert_eq!(info.volume_name, "USBSTICK");
        assert_eq!(info.media_name, "Cruzer Blade");
        assert_eq!(info.bus_protocol, "USB");
        assert_eq!(info.size, Some(30_752_636_928));
        assert_eq!(info.block_size, Some(512));
        assert_eq!(info.internal, Some(false));
        assert_eq!(info.writable_media, Some(true));
    }

    #[test]
    fn absent_optional_keys_do_not_shift_values() {
        let sparse = plist(
            "<key>DeviceIdentifier</key><string>disk9</string>
             <key>VolumeName</key><string>Scratch</string>",
        );
        let info = parse_disk_info(&sparse).unwrap();
        assert_eq!(info.device_identifier, "disk9");
        assert_eq!(info.volume_name, "Scratch");
        assert_eq!(info.media_name, "");
        assert_eq!(info.size, None);
        assert_eq!(info.internal, None);
        assert_eq!(info.description(), "Scratch");
    }

    #[test]
    fn mistyped_values_degrade_to_defaults() {
        let payload = plist(
            "<key>TotalSize</key><string>not a number</string>
             <key>Size</key><real>1000204886016.0</real>
             <key>Internal</key><string>Yes</string>
             <key>MediaName</key><integer>7</integer>
             <key>Ejectable</key><date>2024-01-01T00:00:00Z</date>",
        );
        let info = parse_disk_info(&payload).unwrap();
        assert_eq!(info.size, Some(1_000_204_886_016));
        assert_eq!(info.internal, Some(true));
        assert_eq!(info.media_name, "");
        assert_eq!(info.ejectable, None);
    }

    #[test]
    fn parses_disk_info_fixture() {
        let info = parse_disk_info(INFO_DISK0.as_bytes()).unwrap();
        assert_eq!(info.device_identifier, "disk0");
        assert_eq!(info.device_node, "/dev/disk0");
        assert_eq!(info.media_name, "APPLE SSD AP0512Q");
        assert_eq!(info.size, Some(500_277_790_720));
        assert_eq!(info.internal, Some(true));
        assert_eq!(info.block_size, Some(4096));
        assert!(info.device_tree_path.starts_with("IODeviceTree:/"));
        assert!(!info.optical);
    }

    #[test]
    fn parses_disk_list_fixture() {
        let list = parse_disk_list(LIST.as_bytes()).unwrap();
        assert_eq!(list.whole_disk_ids(), ["disk0", "disk2", "disk3", "disk4"]);

        let container = list.disk("disk3").unwrap();
        assert_eq!(container.physical_stores, ["disk0s2"]);
        assert_eq!(container.volumes.len(), 2);

        assert_eq!(list.volume_label("disk0s1"), Some("EFI"));
        assert_eq!(list.volume_label("disk3s5"), Some("Macintosh HD - Data"));
        assert_eq!(list.volume_label("disk3s1s1"), Some("Macintosh HD"));
        assert_eq!(list.volume_label("disk0s2"), None);
        assert_eq!(list.volume_label("disk7"), None);
    }

    #[test]
    fn whole_disks_fall_back_to_top_level_entries() {
        let payload = plist(
            "<key>AllDisksAndPartitions</key>
             <array>
               <dict><key>DeviceIdentifier</key><string>disk5</string>
                     <key>MountPoint</key><string>/Volumes/RAW</string>
                     <key>VolumeName</key><string>RAW</string></dict>
             </array>",
        );
        let list = parse_disk_list(&payload).unwrap();
        assert_eq!(list.whole_disk_ids(), ["disk5"]);
        assert_eq!(list.volume_label("disk5"), Some("RAW"));
    }

    #[test]
    fn parent_slice_walks_up_to_the_disk() {
        assert_eq!(parent_slice("disk3s1s1"), Some("disk3s1"));
        assert_eq!(parent_slice("disk3s1"), Some("disk3"));
        assert_eq!(parent_slice("disk3"), None);
        assert_eq!(parent_slice("disks"), None);
    }

    #[test]
    fn rejects_non_plist_payload() {
        let err = parse_disk_list(b"Could not find disk").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        let err = parse_disk_info(
            br#"<?xml version="1.0"?><plist version="1.0"><array/></plist>"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
