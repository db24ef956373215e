mod command;
mod error;

pub use command::run_command;
pub use error::{DriveListError, ErrorKind, Result};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

pub const DRIVE_REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// One enumerated storage device.
///
/// The first eight fields are always serialized; the rest are best-effort
/// platform extras and are left out of the serialized form when unset.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub device: String,
    pub display_name: String,
    pub description: String,
    pub size: u64,
    pub mountpoints: Vec<Mountpoint>,
    pub raw: String,
    pub protected: bool,
    pub system: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub removable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub block_size: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bus_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub enumerator: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_card: bool,
    #[serde(default, rename = "isUSB", skip_serializing_if = "is_false")]
    pub is_usb: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_virtual: bool,
    #[serde(default, rename = "isSCSI", skip_serializing_if = "is_false")]
    pub is_scsi: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub partition_table_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Mountpoint {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Drive {
    /// A drive whose display name and raw node both default to `device`.
    pub fn new(device: impl Into<String>) -> Self {
        let device = device.into();
        Self {
            display_name: device.clone(),
            raw: device.clone(),
            device,
            ..Self::default()
        }
    }

    pub fn has_mountpoint(&self, path: &str) -> bool {
        self.mountpoints.iter().any(|mountpoint| mountpoint.path == path)
    }
}

impl Mountpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: None,
        }
    }

    /// Blank labels are treated as absent.
    pub fn labeled(path: impl Into<String>, label: Option<&str>) -> Self {
        let label = label
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Self {
            path: path.into(),
            label,
        }
    }
}

/// A drive enumerator for one host platform.
pub trait PlatformDriveLister: Send + Sync {
    /// Short platform name ("linux", "macos", "windows").
    fn platform(&self) -> &'static str;

    /// Query the live host once and return every storage drive found.
    fn list_drives(&self) -> Result<Vec<Drive>>;
}

/// Last assembly step shared by every enumerator.
///
/// Drops records without a device identifier, keeps only the first record
/// for each device, and fills an empty raw node with the device path.
pub fn finalize_drives(drives: Vec<Drive>) -> Vec<Drive> {
    let mut seen = HashSet::new();
    let mut finalized = Vec::with_capacity(drives.len());
    for mut drive in drives {
        if drive.device.is_empty() {
            warn!(description = %drive.description, "dropping drive without a device path");
            continue;
        }
        if !seen.insert(drive.device.clone()) {
            debug!(device = %drive.device, "dropping duplicate drive");
            continue;
        }
        if drive.raw.is_empty() {
            drive.raw = drive.device.clone();
        }
        if drive.display_name.is_empty() {
            drive.display_name = drive.device.clone();
        }
        finalized.push(drive);
    }
    finalized
}

pub fn now_utc_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}
