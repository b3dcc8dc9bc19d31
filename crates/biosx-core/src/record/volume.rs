//! Firmware volume header (`EFI_FIRMWARE_VOLUME_HEADER`).

use std::fmt;

use crate::cursor::{ByteCursor, run_length};
use crate::error::ExtractError;
use crate::guid::{FFS1, FFS2, FFS3, FV_SIGNATURE, Guid};

use super::align8;

/// Fixed part of the header up to and including the revision byte.
pub const VOLUME_HEADER_MIN: usize = 0x38;

const SIGNATURE_OFFSET: usize = 0x28;
const EXT_HEADER_MIN: usize = 20;

/// File system revision, derived from the file-system GUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfsRevision {
    Ffs1,
    Ffs2,
    Ffs3,
    Unknown,
}

impl FfsRevision {
    pub fn from_guid(guid: &Guid) -> Self {
        match *guid {
            FFS1 => FfsRevision::Ffs1,
            FFS2 => FfsRevision::Ffs2,
            FFS3 => FfsRevision::Ffs3,
            _ => FfsRevision::Unknown,
        }
    }
}

impl fmt::Display for FfsRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FfsRevision::Ffs1 => write!(f, "FFS1"),
            FfsRevision::Ffs2 => write!(f, "FFS2"),
            FfsRevision::Ffs3 => write!(f, "FFS3"),
            FfsRevision::Unknown => write!(f, "FFS?"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHeader {
    pub fs_guid: Guid,
    pub ffs: FfsRevision,
    /// Declared length of the whole volume, header included.
    pub length: u64,
    pub has_signature: bool,
    pub attributes: u32,
    pub header_length: u16,
    pub checksum: u16,
    pub checksum_valid: bool,
    pub ext_header_offset: u16,
    pub revision: u8,
    /// Offset of the first file record, after any extended header.
    pub first_file_offset: usize,
}

/// Outcome of looking for a volume at the start of a slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeProbe {
    Volume(VolumeHeader),
    /// The slice starts with this many `0xFF` bytes and holds no volume.
    Padding(usize),
    Invalid(String),
}

/// Classify the start of `data` as a volume, erased padding, or garbage.
pub fn probe_volume(data: &[u8]) -> VolumeProbe {
    match decode_volume_header(data) {
        Ok(header) => VolumeProbe::Volume(header),
        Err(_) if data.first() == Some(&0xFF) => VolumeProbe::Padding(run_length(data, 0, 0xFF)),
        Err(e) => VolumeProbe::Invalid(e.to_string()),
    }
}

pub fn decode_volume_header(data: &[u8]) -> Result<VolumeHeader, ExtractError> {
    let cur = ByteCursor::new(data);
    let fs_guid = Guid(cur.read_array::<16>(0x10)?);
    let length = cur.read_u64_le(0x20)?;
    let has_signature = cur.read_fixed_bytes(SIGNATURE_OFFSET, 4)? == FV_SIGNATURE;
    let attributes = cur.read_u32_le(0x2C)?;
    let header_length = cur.read_u16_le(0x30)?;
    let checksum = cur.read_u16_le(0x32)?;
    let ext_header_offset = cur.read_u16_le(0x34)?;
    let revision = cur.read_u8(0x37)?;
    let ffs = FfsRevision::from_guid(&fs_guid);

    let malformed = |reason: String| ExtractError::Malformed {
        what: "volume header",
        offset: 0,
        reason,
    };

    if !has_signature && ffs == FfsRevision::Unknown {
        return Err(malformed("missing _FVH signature".into()));
    }
    if (header_length as usize) < VOLUME_HEADER_MIN || header_length as u64 > length {
        return Err(malformed(format!(
            "header length 0x{:X} outside volume length 0x{:X}",
            header_length, length
        )));
    }

    let mut first_file_offset = header_length as usize;
    if ext_header_offset != 0 {
        let ext = ext_header_offset as usize;
        if (ext + EXT_HEADER_MIN) as u64 > length {
            return Err(malformed(format!(
                "extended header offset 0x{:X} past volume end",
                ext
            )));
        }
        let ext_size = cur.read_u32_le(ext + 16)? as usize;
        first_file_offset = align8(ext + ext_size);
    }
    if first_file_offset as u64 > length {
        return Err(malformed(format!(
            "first file offset 0x{:X} past volume end",
            first_file_offset
        )));
    }

    let checksum_valid = header_checksum(cur.read_fixed_bytes(0, header_length as usize)?) == 0;

    Ok(VolumeHeader {
        fs_guid,
        ffs,
        length,
        has_signature,
        attributes,
        header_length,
        checksum,
        checksum_valid,
        ext_header_offset,
        revision,
        first_file_offset,
    })
}

/// 16-bit word sum over the header; a valid header sums to zero.
pub fn header_checksum(header: &[u8]) -> u16 {
    header
        .chunks(2)
        .map(|w| u16::from_le_bytes([w[0], *w.get(1).unwrap_or(&0)]))
        .fold(0u16, |acc, w| acc.wrapping_add(w))
}

/// Length of the `0xFF`/`0x00` run after a volume ends at `from`.
///
/// Stops short of the zero vector of a following volume header.
pub fn trailing_padding(data: &[u8], from: usize) -> usize {
    let Some(rest) = data.get(from..) else {
        return 0;
    };
    let mut run = rest.iter().take_while(|&&b| b == 0xFF || b == 0x00).count();
    if run >= 16 {
        let candidate = from + run - 16 + SIGNATURE_OFFSET;
        if data.get(candidate..candidate + 4) == Some(FV_SIGNATURE.as_slice()) {
            run -= 16;
        }
    }
    run
}
