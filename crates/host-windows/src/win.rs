use crate::descriptor::{
    parse_bytes_per_sector, parse_device_descriptor, parse_disk_extents, DeviceDescriptor,
    DiskExtent,
};
use crate::volumes::{drive_letters, is_enumerable, letter_of_path, VolumeSnapshot};
use anyhow::{anyhow, Result};
use drivelist_core::DriveListError;
use std::ffi::c_void;
use std::mem::size_of;
use tracing::debug;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, GetDiskFreeSpaceExW, GetDriveTypeW, GetLogicalDrives, GetVolumeInformationW,
    FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::Ioctl::{
    PropertyStandardQuery, StorageDeviceProperty, IOCTL_DISK_GET_DRIVE_GEOMETRY,
    IOCTL_STORAGE_QUERY_PROPERTY, IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS, STORAGE_PROPERTY_QUERY,
};
use windows::Win32::System::SystemInformation::GetWindowsDirectoryW;
use windows::Win32::System::IO::DeviceIoControl;

fn wide(s: &str) -> Vec<u16> {
    use std::os::windows::prelude::*;
    std::ffi::OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn utf16_field(buf: &[u16]) -> String {
    let end = buf.iter().position(|&ch| ch == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end]).trim().to_string()
}

/// An open volume handle, closed when dropped.
struct VolumeHandle(HANDLE);

impl VolumeHandle {
    /// Opened with no access rights: enough for the query IOCTLs without
    /// requiring elevation.
    fn open(letter: char) -> Result<Self> {
        let path = format!(r"\\.\{}:", letter);
        let w = wide(&path);
        let handle = unsafe {
            CreateFileW(
                PCWSTR(w.as_ptr()),
                0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                HANDLE::default(),
            )
        }
        .map_err(|err| anyhow!("CreateFileW failed for {path}: {err}"))?;
        Ok(Self(handle))
    }

    fn ioctl(&self, code: u32, input: Option<&[u8]>, out: &mut [u8]) -> Result<usize> {
        let mut returned = 0u32;
        unsafe {
            DeviceIoControl(
                self.0,
                code,
                input.map(|bytes| bytes.as_ptr() as *const c_void),
                input.map_or(0, |bytes| bytes.len() as u32),
                Some(out.as_mut_ptr() as *mut c_void),
                out.len() as u32,
                Some(&mut returned as *mut u32),
                None,
            )
        }
        .map_err(|err| anyhow!("DeviceIoControl {code:#x} failed: {err}"))?;
        Ok((returned as usize).min(out.len()))
    }

    fn bytes_per_sector(&self) -> Result<Option<u64>> {
        let mut out = [0u8; 64];
        let len = self.ioctl(IOCTL_DISK_GET_DRIVE_GEOMETRY, None, &mut out)?;
        Ok(parse_bytes_per_sector(&out[..len]))
    }

    fn device_descriptor(&self) -> Result<Option<DeviceDescriptor>> {
        let query = STORAGE_PROPERTY_QUERY {
            PropertyId: StorageDeviceProperty,
            QueryType: PropertyStandardQuery,
            AdditionalParameters: [0],
        };
        let input = unsafe {
            std::slice::from_raw_parts(
                &query as *const STORAGE_PROPERTY_QUERY as *const u8,
                size_of::<STORAGE_PROPERTY_QUERY>(),
            )
        };
        let mut out = [0u8; 1024];
        let len = self.ioctl(IOCTL_STORAGE_QUERY_PROPERTY, Some(input), &mut out)?;
        Ok(parse_device_descriptor(&out[..len]))
    }

    fn disk_extents(&self) -> Result<Vec<DiskExtent>> {
        let mut out = [0u8; 1024];
        let len = self.ioctl(IOCTL_VOLUME_GET_VOLUME_DISK_EXTENTS, None, &mut out)?;
        Ok(parse_disk_extents(&out[..len]))
    }
}

impl Drop for VolumeHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

fn system_drive_letter() -> Option<char> {
    let mut buf = [0u16; 260];
    let len = unsafe { GetWindowsDirectoryW(Some(&mut buf)) } as usize;
    if len == 0 || len > buf.len() {
        debug!("GetWindowsDirectoryW failed");
        return None;
    }
    letter_of_path(&String::from_utf16_lossy(&buf[..len]))
}

fn drive_type(root: &str) -> u32 {
    let w = wide(root);
    unsafe { GetDriveTypeW(PCWSTR(w.as_ptr())) }
}

fn volume_information(root: &str) -> Result<(String, u32)> {
    let w = wide(root);
    let mut name_buf = [0u16; 261];
    let mut flags = 0u32;
    unsafe {
        GetVolumeInformationW(
            PCWSTR(w.as_ptr()),
            Some(&mut name_buf),
            None,
            None,
            Some(&mut flags as *mut u32),
            None,
        )
    }
    .map_err(|err| anyhow!("GetVolumeInformationW failed for {root}: {err}"))?;
    Ok((utf16_field(&name_buf), flags))
}

fn total_bytes(root: &str) -> Result<u64> {
    let w = wide(root);
    let mut total = 0u64;
    unsafe { GetDiskFreeSpaceExW(PCWSTR(w.as_ptr()), None, Some(&mut total as *mut u64), None) }
        .map_err(|err| anyhow!("GetDiskFreeSpaceExW failed for {root}: {err}"))?;
    Ok(total)
}

fn snapshot_volume(letter: char, drive_type: u32) -> Result<VolumeSnapshot> {
    let mut snapshot = VolumeSnapshot {
        letter,
        drive_type,
        ..VolumeSnapshot::default()
    };
    let root = snapshot.root();
    let (label, flags) = volume_information(&root)?;
    snapshot.label = label;
    snapshot.file_system_flags = flags;

    snapshot.total_bytes = total_bytes(&root).unwrap_or_else(|err| {
        debug!(error = %err, "size unavailable");
        0
    });

    match VolumeHandle::open(letter) {
        Ok(handle) => {
            snapshot.bytes_per_sector = handle.bytes_per_sector().unwrap_or_else(|err| {
                debug!(%letter, error = %err, "geometry unavailable");
                None
            });
            snapshot.descriptor = handle.device_descriptor().unwrap_or_else(|err| {
                debug!(%letter, error = %err, "device descriptor unavailable");
                None
            });
            snapshot.extents = handle.disk_extents().unwrap_or_else(|err| {
                debug!(%letter, error = %err, "disk extents unavailable");
                Vec::new()
            });
        }
        Err(err) => debug!(%letter, error = %err, "volume handle unavailable"),
    }
    Ok(snapshot)
}

/// Query every present drive letter. An empty letter mask means the call
/// itself failed.
pub fn enumerate_volumes() -> drivelist_core::Result<(Vec<VolumeSnapshot>, Option<char>)> {
    let mask = unsafe { GetLogicalDrives() };
    if mask == 0 {
        return Err(DriveListError::native(
            "GetLogicalDrives",
            std::io::Error::last_os_error(),
        ));
    }

    let mut snapshots = Vec::new();
    for letter in drive_letters(mask) {
        let root = format!("{letter}:\\");
        let kind = drive_type(&root);
        if !is_enumerable(kind) {
            debug!(%letter, drive_type = kind, "skipping non-local drive letter");
            continue;
        }
        match snapshot_volume(letter, kind) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(err) => debug!(%letter, error = %err, "skipping volume"),
        }
    }
    Ok((snapshots, system_drive_letter()))
}
