//! Header decoders for volumes, files, sections and capsules.
//!
//! Decoders are pure: they take a byte slice and an offset inside it and
//! return a classified record. They never recurse and never emit anything.

pub mod capsule;
pub mod file;
pub mod section;
pub mod volume;

use serde::{Deserialize, Serialize};

pub use capsule::{CapsuleHeader, decode_capsule_header};
pub use file::{DecodedFile, FileRecord, decode_file_header};
pub use section::{DecodedSection, SectionBody, SectionRecord, decode_section_header};
pub use volume::{FfsRevision, VolumeHeader, VolumeProbe, probe_volume};

/// Mask for the 24-bit length carried in packed size words.
pub const LENGTH_MASK: u32 = 0x00FF_FFFF;

pub const FILE_ALIGNMENT: usize = 8;
pub const SECTION_ALIGNMENT: usize = 4;

/// Round `x` up to a multiple of `align` (a power of two).
pub fn align_up(x: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (x + align - 1) & !(align - 1)
}

pub fn align8(x: usize) -> usize {
    align_up(x, FILE_ALIGNMENT)
}

pub fn align4(x: usize) -> usize {
    align_up(x, SECTION_ALIGNMENT)
}

/// Byte order of a packed `{length:24, type:8}` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackedOrder {
    /// `{len:3, type:1}`: modern UEFI FFS.
    #[default]
    LenThenType,
    /// `{type:1, len:3}`: some historical vendor layouts.
    TypeThenLen,
}

impl PackedOrder {
    /// Split a little-endian packed word into `(length, type)`.
    pub fn decode(&self, word: u32) -> (u32, u8) {
        match self {
            PackedOrder::LenThenType => (word & LENGTH_MASK, (word >> 24) as u8),
            PackedOrder::TypeThenLen => (word >> 8, (word & 0xFF) as u8),
        }
    }

    pub fn encode(&self, length: u32, kind: u8) -> u32 {
        let length = length & LENGTH_MASK;
        match self {
            PackedOrder::LenThenType => length | ((kind as u32) << 24),
            PackedOrder::TypeThenLen => (length << 8) | kind as u32,
        }
    }

    pub fn other(&self) -> PackedOrder {
        match self {
            PackedOrder::LenThenType => PackedOrder::TypeThenLen,
            PackedOrder::TypeThenLen => PackedOrder::LenThenType,
        }
    }
}

/// Layout of file headers inside a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Uefi(FfsRevision),
    Phoenix,
}

/// Layout of section headers inside a section stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionFormat {
    Uefi(PackedOrder),
    Phoenix,
}

impl SectionFormat {
    /// Alignment of the next section after one ends.
    pub fn alignment(&self) -> usize {
        match self {
            SectionFormat::Uefi(_) => SECTION_ALIGNMENT,
            SectionFormat::Phoenix => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_word_roundtrip() {
        let order = PackedOrder::LenThenType;
        let word = order.encode(0x001234, 0x07);
        assert_eq!(word.to_le_bytes(), [0x34, 0x12, 0x00, 0x07]);
        assert_eq!(order.decode(word), (0x001234, 0x07));

        let order = PackedOrder::TypeThenLen;
        let word = order.encode(0x001234, 0x07);
        assert_eq!(word.to_le_bytes(), [0x07, 0x34, 0x12, 0x00]);
        assert_eq!(order.decode(word), (0x001234, 0x07));
    }

    #[test]
    fn test_packed_word_length_extremes() {
        for order in [PackedOrder::LenThenType, PackedOrder::TypeThenLen] {
            for len in [0u32, 1, 0x18, 0xFFFF, 0x10000, LENGTH_MASK] {
                assert_eq!(order.decode(order.encode(len, 0xA5)), (len, 0xA5));
            }
        }
    }

    #[test]
    fn test_alignment_idempotent() {
        for x in 0..200usize {
            assert_eq!(align8(align8(x)), align8(x));
            assert_eq!(align4(align4(x)), align4(x));
            assert!(align8(x) >= x && align8(x) - x < 8);
            assert_eq!(align4(x) % 4, 0);
        }
        assert_eq!(align8(0x48 + 0x28), 0x70);
        assert_eq!(align_up(0x201, 0x10000), 0x10000);
    }
}
