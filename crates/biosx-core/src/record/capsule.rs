//! Capsule header (`EFI_CAPSULE_HEADER`) wrapping an update image.

use crate::cursor::ByteCursor;
use crate::error::ExtractError;
use crate::guid::{EFI_CAPSULE, Guid, INTEL_CAPSULE};

pub const CAPSULE_HEADER_MIN: usize = 0x1C;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsuleHeader {
    pub guid: Guid,
    pub header_size: u32,
    pub flags: u32,
    pub image_size: u32,
}

impl CapsuleHeader {
    /// Body range relative to the capsule start, clamped to `available` bytes.
    pub fn body_range(&self, available: usize) -> std::ops::Range<usize> {
        let end = (self.image_size as usize).min(available);
        (self.header_size as usize).min(end)..end
    }
}

pub fn is_capsule_guid(guid: &Guid) -> bool {
    *guid == EFI_CAPSULE || *guid == INTEL_CAPSULE
}

/// Decode a capsule header; `Ok(None)` when the GUID is not a capsule GUID.
pub fn decode_capsule_header(data: &[u8]) -> Result<Option<CapsuleHeader>, ExtractError> {
    let cur = ByteCursor::new(data);
    let guid = Guid(cur.read_array::<16>(0)?);
    if !is_capsule_guid(&guid) {
        return Ok(None);
    }
    let header = CapsuleHeader {
        guid,
        header_size: cur.read_u32_le(0x10)?,
        flags: cur.read_u32_le(0x14)?,
        image_size: cur.read_u32_le(0x18)?,
    };
    if (header.header_size as usize) < CAPSULE_HEADER_MIN || header.header_size > header.image_size
    {
        return Err(ExtractError::Malformed {
            what: "capsule header",
            offset: 0,
            reason: format!(
                "header size 0x{:X} inconsistent with image size 0x{:X}",
                header.header_size, header.image_size
            ),
        });
    }
    Ok(Some(header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capsule;

    #[test]
    fn test_decode_capsule() {
        let cap = capsule(EFI_CAPSULE, &[0xAA; 0x20]);
        let header = decode_capsule_header(&cap).unwrap().unwrap();
        assert_eq!(header.header_size, 0x1C);
        assert_eq!(header.image_size, 0x3C);
        assert_eq!(header.body_range(cap.len()), 0x1C..0x3C);
        assert_eq!(header.body_range(0x30), 0x1C..0x30);
    }

    #[test]
    fn test_other_guid_is_not_a_capsule() {
        let data = [0u8; 0x40];
        assert_eq!(decode_capsule_header(&data).unwrap(), None);
    }

    #[test]
    fn test_inconsistent_sizes() {
        let mut cap = capsule(INTEL_CAPSULE, &[0; 4]);
        cap[0x18..0x1C].copy_from_slice(&4u32.to_le_bytes());
        assert!(decode_capsule_header(&cap).is_err());
    }
}
