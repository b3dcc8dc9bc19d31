//! GUID value type and the well-known GUIDs found in firmware images.

use std::fmt;

use uuid::Uuid;

/// A GUID in its on-flash (mixed-endian) byte layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    pub const SIZE: usize = 16;

    /// Build from the textual field layout `d1-d2-d3-d4`.
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        let a = d1.to_le_bytes();
        let b = d2.to_le_bytes();
        let c = d3.to_le_bytes();
        Self([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d4[0], d4[1], d4[2], d4[3], d4[4],
            d4[5], d4[6], d4[7],
        ])
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes_le(self.0)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.to_uuid().hyphenated())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

/// Firmware volume signature at offset 0x28 of the volume header.
pub const FV_SIGNATURE: &[u8; 4] = b"_FVH";

/// EFI_FIRMWARE_FILE_SYSTEM_GUID, also accepted when `_FVH` is missing.
pub const FFS1: Guid = Guid::from_fields(
    0x7A9354D9,
    0x0468,
    0x444A,
    [0x81, 0xCE, 0x0B, 0xF6, 0x17, 0xD8, 0x90, 0xDF],
);

pub const FFS2: Guid = Guid::from_fields(
    0x8C8CE578,
    0x8A3D,
    0x4F1C,
    [0x99, 0x35, 0x89, 0x61, 0x85, 0xC3, 0x2D, 0xD3],
);

pub const FFS3: Guid = Guid::from_fields(
    0x5473C07A,
    0x3DCB,
    0x4DCA,
    [0xBD, 0x6F, 0x1E, 0x96, 0x89, 0xE7, 0x34, 0x9A],
);

/// GUID-defined section wrapping a CRC32-checked section stream.
pub const CRC32_SECTION: Guid = Guid::from_fields(
    0xFC1BCDB0,
    0x7D31,
    0x49AA,
    [0x93, 0x6A, 0xA4, 0x60, 0x0D, 0x9D, 0xD0, 0x83],
);

pub const LZMA_SECTION: Guid = Guid::from_fields(
    0xEE4E5898,
    0x3914,
    0x4259,
    [0x9D, 0x6E, 0xDC, 0x7B, 0xD7, 0x94, 0x03, 0xCF],
);

pub const TIANO_SECTION: Guid = Guid::from_fields(
    0xA31280AD,
    0x481E,
    0x41B6,
    [0x95, 0xE8, 0x12, 0x7F, 0x4C, 0x98, 0x47, 0x79],
);

pub const EFI_CAPSULE: Guid = Guid::from_fields(
    0x3B6686BD,
    0x0D76,
    0x4030,
    [0xB7, 0x0E, 0xB5, 0x51, 0x9E, 0x2F, 0xC5, 0xA0],
);

/// Capsule header used by Intel and AMI update images.
pub const INTEL_CAPSULE: Guid = Guid::from_fields(
    0x539182B9,
    0xABB5,
    0x4391,
    [0xB6, 0x9A, 0xE3, 0xA9, 0x43, 0xF7, 0x2F, 0xCC],
);

// Phoenix volume directory type GUIDs, stored as raw bytes.
pub const PHOENIX_ESCD: Guid = Guid::from_bytes([
    0xFD, 0xE8, 0x21, 0xFD, 0x25, 0x25, 0x95, 0x4A, 0xBB, 0x90, 0x47, 0xEC, 0x57, 0x63, 0xFF, 0x9E,
]);
pub const PHOENIX_SETUP: Guid = Guid::from_bytes([
    0xD0, 0x10, 0x23, 0xC0, 0x54, 0xD7, 0x39, 0x45, 0xB0, 0xCF, 0x9F, 0x9F, 0x26, 0x18, 0xD4, 0xA9,
]);
pub const PHOENIX_UEFIV: Guid = Guid::from_bytes([
    0x11, 0x2B, 0xF2, 0x72, 0xAB, 0xCE, 0xE2, 0x42, 0x95, 0x8A, 0x0D, 0xA1, 0x62, 0x2D, 0x94, 0xE3,
]);
pub const PHOENIX_DMIV: Guid = Guid::from_bytes([
    0x12, 0xED, 0x2C, 0x42, 0xE5, 0xAE, 0xB9, 0x43, 0x84, 0xE0, 0xAF, 0xB3, 0xE4, 0x16, 0x25, 0x4D,
]);
pub const PHOENIX_HOLE: Guid = Guid::from_bytes([
    0x63, 0x0F, 0xAE, 0xF6, 0x8C, 0x5F, 0x16, 0x43, 0xA2, 0xEA, 0x76, 0xB9, 0xAF, 0x76, 0x27, 0x56,
]);
