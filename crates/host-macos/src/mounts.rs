//! The kernel mount table, read with `getfsstat(2)`.

use std::ffi::c_char;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

impl MountEntry {
    /// Slice identifier of the mounted node, e.g. `disk3s1s1`.
    pub fn slice_id(&self) -> Option<&str> {
        self.device
            .strip_prefix("/dev/")
            .filter(|name| name.starts_with("disk"))
    }
}

/// Whole-disk identifier for a device node: `/dev/disk3s1s1` -> `disk3`.
pub fn whole_disk_id(device: &str) -> Option<String> {
    let name = device.strip_prefix("/dev/").unwrap_or(device);
    let name = name.strip_prefix('r').unwrap_or(name);
    let digits = name.strip_prefix("disk")?;
    let end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    Some(format!("disk{}", &digits[..end]))
}

/// Copy a fixed-size C character field, stopping at the first NUL or at the
/// end of the field, whichever comes first.
pub fn fixed_c_string(field: &[c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|&&ch| ch != 0)
        .map(|&ch| ch as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(target_os = "macos")]
pub fn read_mounts() -> drivelist_core::Result<Vec<MountEntry>> {
    use drivelist_core::DriveListError;
    use libc::{getfsstat, statfs, MNT_NOWAIT};
    use std::mem::size_of;
    use std::ptr;

    let count = unsafe { getfsstat(ptr::null_mut(), 0, MNT_NOWAIT) };
    if count < 0 {
        return Err(DriveListError::native(
            "getfsstat",
            std::io::Error::last_os_error(),
        ));
    }

    // Room for a few mounts appearing between the two calls.
    let capacity = count as usize + 8;
    let mut buf = vec![unsafe { std::mem::zeroed::<statfs>() }; capacity];
    let written = unsafe {
        getfsstat(
            buf.as_mut_ptr(),
            (buf.len() * size_of::<statfs>()) as libc::c_int,
            MNT_NOWAIT,
        )
    };
    if written < 0 {
        return Err(DriveListError::native(
            "getfsstat",
            std::io::Error::last_os_error(),
        ));
    }

    let written = (written as usize).min(buf.len());
    Ok(buf[..written]
        .iter()
        .map(|entry| MountEntry {
            device: fixed_c_string(&entry.f_mntfromname),
            mount_point: fixed_c_string(&entry.f_mntonname),
            fs_type: fixed_c_string(&entry.f_fstypename),
        })
        .collect())
}
