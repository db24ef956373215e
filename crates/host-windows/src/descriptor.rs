//! Decoding of the output buffers returned by `DeviceIoControl`.
//!
//! Every read is bounded by the count and size fields the structure carries
//! and by the number of bytes the call actually returned.

/// `DISK_GEOMETRY`: Cylinders (8), MediaType (4), TracksPerCylinder (4),
/// SectorsPerTrack (4), BytesPerSector (4).
pub const DISK_GEOMETRY_LEN: usize = 24;
const GEOMETRY_BYTES_PER_SECTOR: usize = 20;

const DESCRIPTOR_SIZE: usize = 4;
const DESCRIPTOR_REMOVABLE_MEDIA: usize = 10;
const DESCRIPTOR_VENDOR_OFFSET: usize = 12;
const DESCRIPTOR_PRODUCT_OFFSET: usize = 16;
const DESCRIPTOR_BUS_TYPE: usize = 28;
const DESCRIPTOR_HEADER_LEN: usize = 32;

const EXTENTS_HEADER_LEN: usize = 8;
const DISK_EXTENT_LEN: usize = 24;

/// Fields of `STORAGE_DEVICE_DESCRIPTOR` the enumerator reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub removable_media: bool,
    pub vendor: String,
    pub product: String,
    pub bus_type: u32,
}

impl DeviceDescriptor {
    pub fn model(&self) -> String {
        [self.vendor.as_str(), self.product.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskExtent {
    pub disk_number: u32,
    pub starting_offset: u64,
    pub extent_length: u64,
}

fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

fn read_i64(buf: &[u8], offset: usize) -> Option<i64> {
    let bytes = buf.get(offset..offset.checked_add(8)?)?;
    Some(i64::from_le_bytes(bytes.try_into().ok()?))
}

/// Sector size from a `DISK_GEOMETRY` buffer; `None` when the buffer is
/// short or reports zero.
pub fn parse_bytes_per_sector(buf: &[u8]) -> Option<u64> {
    if buf.len() < DISK_GEOMETRY_LEN {
        return None;
    }
    read_u32(buf, GEOMETRY_BYTES_PER_SECTOR)
        .filter(|&bytes| bytes > 0)
        .map(u64::from)
}

pub fn parse_device_descriptor(buf: &[u8]) -> Option<DeviceDescriptor> {
    if buf.len() < DESCRIPTOR_HEADER_LEN {
        return None;
    }
    let declared = read_u32(buf, DESCRIPTOR_SIZE)? as usize;
    let end = declared.min(buf.len());
    if end < DESCRIPTOR_HEADER_LEN {
        return None;
    }
    let buf = &buf[..end];

    Some(DeviceDescriptor {
        removable_media: buf[DESCRIPTOR_REMOVABLE_MEDIA] != 0,
        vendor: read_offset_string(buf, read_u32(buf, DESCRIPTOR_VENDOR_OFFSET)?),
        product: read_offset_string(buf, read_u32(buf, DESCRIPTOR_PRODUCT_OFFSET)?),
        bus_type: read_u32(buf, DESCRIPTOR_BUS_TYPE)?,
    })
}

/// NUL-terminated ASCII string at `offset`. Zero means "not present".
fn read_offset_string(buf: &[u8], offset: u32) -> String {
    let offset = offset as usize;
    if offset == 0 || offset >= buf.len() {
        return String::new();
    }
    let tail = &buf[offset..];
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..end]).trim().to_string()
}

/// `VOLUME_DISK_EXTENTS`: a count, four bytes of padding, then the
/// extents. Extents the buffer does not fully hold are dropped.
pub fn parse_disk_extents(buf: &[u8]) -> Vec<DiskExtent> {
    let Some(count) = read_u32(buf, 0) else {
        return Vec::new();
    };
    let available = buf.len().saturating_sub(EXTENTS_HEADER_LEN) / DISK_EXTENT_LEN;
    (0..(count as usize).min(available))
        .filter_map(|idx| {
            let base = EXTENTS_HEADER_LEN + idx * DISK_EXTENT_LEN;
            Some(DiskExtent {
                disk_number: read_u32(buf, base)?,
                starting_offset: read_i64(buf, base + 8)?.max(0) as u64,
                extent_length: read_i64(buf, base + 16)?.max(0) as u64,
            })
        })
        .collect()
}

/// Name for a `STORAGE_BUS_TYPE` value.
pub fn bus_type_name(bus_type: u32) -> &'static str {
    match bus_type {
        0x01 => "SCSI",
        0x02 => "ATAPI",
        0x03 => "ATA",
        0x04 => "1394",
        0x05 => "SSA",
        0x06 => "FIBRE",
        0x07 => "USB",
        0x08 => "RAID",
        0x09 => "ISCSI",
        0x0A => "SAS",
        0x0B => "SATA",
        0x0C => "SD",
        0x0D => "MMC",
        0x0E => "VIRTUAL",
        0x0F => "FILEBACKEDVIRTUAL",
        0x10 => "SPACES",
        0x11 => "NVME",
        0x12 => "SCM",
        0x13 => "UFS",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_bytes(removable: bool, bus_type: u32, vendor: &str, product: &str) -> Vec<u8> {
        let mut buf = vec![0u8; 40];
        let vendor_offset = buf.len() as u32;
        buf.extend_from_slice(vendor.as_bytes());
        buf.push(0);
        let product_offset = buf.len() as u32;
        buf.extend_from_slice(product.as_bytes());
        buf.push(0);
        let size = buf.len() as u32;

        buf[0..4].copy_from_slice(&1u32.to_le_bytes());
        buf[4..8].copy_from_slice(&size.to_le_bytes());
        buf[10] = u8::from(removable);
        buf[12..16].copy_from_slice(&vendor_offset.to_le_bytes());
        buf[16..20].copy_from_slice(&product_offset.to_le_bytes());
        buf[28..32].copy_from_slice(&bus_type.to_le_bytes());
        buf
    }

    #[test]
    fn geometry_sector_size() {
        let mut buf = [0u8; DISK_GEOMETRY_LEN];
        buf[20..24].copy_from_slice(&4096u32.to_le_bytes());
        assert_eq!(parse_bytes_per_sector(&buf), Some(4096));
        assert_eq!(parse_bytes_per_sector(&buf[..20]), None);
        assert_eq!(parse_bytes_per_sector(&[0u8; DISK_GEOMETRY_LEN]), None);
    }

    #[test]
    fn descriptor_reads_strings_by_offset() {
        let buf = descriptor_bytes(true, 0x07, "SanDisk ", "Cruzer Blade");
        let descriptor = parse_device_descriptor(&buf).unwrap();
        assert!(descriptor.removable_media);
        assert_eq!(descriptor.vendor, "SanDisk");
        assert_eq!(descriptor.product, "Cruzer Blade");
        assert_eq!(descriptor.model(), "SanDisk Cruzer Blade");
        assert_eq!(bus_type_name(descriptor.bus_type), "USB");
    }

    #[test]
    fn descriptor_strings_past_declared_size_are_ignored() {
        let mut buf = descriptor_bytes(false, 0x11, "", "Samsung SSD 980");
        // Declared size stops before the product string.
        buf[4..8].copy_from_slice(&40u32.to_le_bytes());
        let descriptor = parse_device_descriptor(&buf).unwrap();
        assert_eq!(descriptor.product, "");
        assert_eq!(descriptor.model(), "");
        assert!(!descriptor.removable_media);
    }

    #[test]
    fn descriptor_rejects_truncated_header() {
        assert_eq!(parse_device_descriptor(&[0u8; 16]), None);
        let mut buf = descriptor_bytes(false, 0x0B, "ATA", "WDC");
        buf[4..8].copy_from_slice(&8u32.to_le_bytes());
        assert_eq!(parse_device_descriptor(&buf), None);
    }

    #[test]
    fn extents_are_bounded_by_count_and_buffer() {
        let mut buf = vec![0u8; EXTENTS_HEADER_LEN + 2 * DISK_EXTENT_LEN];
        buf[0..4].copy_from_slice(&3u32.to_le_bytes());
        buf[8..12].copy_from_slice(&2u32.to_le_bytes());
        buf[16..24].copy_from_slice(&1_048_576i64.to_le_bytes());
        buf[24..32].copy_from_slice(&500_000_000_000i64.to_le_bytes());
        buf[32..36].copy_from_slice(&5u32.to_le_bytes());

        let extents = parse_disk_extents(&buf);
        assert_eq!(extents.len(), 2);
        assert_eq!(
            extents[0],
            DiskExtent {
                disk_number: 2,
                starting_offset: 1_048_576,
                extent_length: 500_000_000_000,
            }
        );
        assert_eq!(extents[1].disk_number, 5);

        assert!(parse_disk_extents(&[]).is_empty());
        assert!(parse_disk_extents(&0u32.to_le_bytes()).is_empty());
    }
}
