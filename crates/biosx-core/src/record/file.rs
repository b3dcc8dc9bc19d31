//! FFS file headers, in the UEFI and Phoenix FFV layouts.

use crate::catalog::FileType;
use crate::cursor::ByteCursor;
use crate::error::ExtractError;
use crate::guid::Guid;

use super::{FfsRevision, FileFormat, align8};

pub const FILE_HEADER_SIZE: usize = 24;
/// `EFI_FFS_FILE_HEADER2`, used by FFS3 large files.
pub const FILE_HEADER2_SIZE: usize = 32;

/// File type byte of erased flash, marking the end of the file list.
pub const FILLER_TYPE: u8 = 0xFF;

const ATTR_TAIL_PRESENT: u8 = 0x01;
const ATTR_LARGE_FILE: u8 = 0x01;

/// Phoenix file state of a committed file.
pub const PHOENIX_VALID_STATE: u8 = 0xF8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: Guid,
    pub raw_type: u8,
    pub file_type: FileType,
    pub attributes: u8,
    pub state: u8,
    /// Offset of the header within the volume slice.
    pub offset: usize,
    pub header_len: usize,
    /// Declared length, header included.
    pub length: usize,
    pub payload_start: usize,
    pub payload_end: usize,
    /// `None` when the layout carries no header checksum.
    pub header_checksum_valid: Option<bool>,
}

impl FileRecord {
    pub fn payload<'a>(&self, volume: &'a [u8]) -> &'a [u8] {
        &volume[self.payload_start..self.payload_end]
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFile {
    File(FileRecord),
    /// Erased flash or an invalid state byte: no more files follow.
    EndOfVolume,
    /// A pad file of this declared length.
    Padding { length: usize },
    /// `resume_at` is where the walker may safely continue, if anywhere.
    Malformed {
        reason: String,
        resume_at: Option<usize>,
    },
}

/// Decode the file header at `offset`, bounded by `bound` (the volume end).
pub fn decode_file_header(
    data: &[u8],
    offset: usize,
    bound: usize,
    format: FileFormat,
) -> DecodedFile {
    let bound = bound.min(data.len());
    let result = match format {
        FileFormat::Uefi(revision) => decode_uefi(&data[..bound], offset, revision),
        FileFormat::Phoenix => decode_phoenix(&data[..bound], offset),
    };
    result.unwrap_or_else(|e| DecodedFile::Malformed {
        reason: e.to_string(),
        resume_at: None,
    })
}

fn decode_uefi(
    data: &[u8],
    offset: usize,
    revision: FfsRevision,
) -> Result<DecodedFile, ExtractError> {
    let cur = ByteCursor::new(data);
    let header = cur.read_fixed_bytes(offset, FILE_HEADER_SIZE)?;
    let raw_type = header[18];
    if raw_type == FILLER_TYPE {
        return Ok(DecodedFile::EndOfVolume);
    }
    let name = Guid(cur.read_array::<16>(offset)?);
    let attributes = header[19];
    let state = header[23];

    let large = revision == FfsRevision::Ffs3 && attributes & ATTR_LARGE_FILE != 0;
    let (header_len, length) = if large {
        let extended = cur.read_u64_le(offset + FILE_HEADER_SIZE)?;
        let Ok(length) = usize::try_from(extended) else {
            return Ok(DecodedFile::Malformed {
                reason: format!("extended length 0x{:X} does not fit in memory", extended),
                resume_at: None,
            });
        };
        (FILE_HEADER2_SIZE, length)
    } else {
        (FILE_HEADER_SIZE, cur.read_u24_le(offset + 20)? as usize)
    };

    if length < header_len {
        return Ok(DecodedFile::Malformed {
            reason: format!("declared length 0x{:X} below header size", length),
            resume_at: Some(align8(offset + FILE_HEADER_SIZE)),
        });
    }
    if offset.checked_add(length).is_none_or(|end| end > data.len()) {
        return Ok(DecodedFile::Malformed {
            reason: format!(
                "declared length 0x{:X} runs past volume end 0x{:X}",
                length,
                data.len()
            ),
            resume_at: None,
        });
    }

    let file_type = FileType::from_byte(raw_type);
    if file_type == FileType::Pad {
        return Ok(DecodedFile::Padding { length });
    }

    let tail = if !large
        && revision != FfsRevision::Ffs3
        && attributes & ATTR_TAIL_PRESENT != 0
        && length >= header_len + 2
    {
        2
    } else {
        0
    };

    let full_header = cur.read_fixed_bytes(offset, header_len)?;
    Ok(DecodedFile::File(FileRecord {
        name,
        raw_type,
        file_type,
        attributes,
        state,
        offset,
        header_len,
        length,
        payload_start: offset + header_len,
        payload_end: offset + length - tail,
        header_checksum_valid: Some(file_header_checksum(full_header) == 0),
    }))
}

/// 8-bit sum over the header with the file checksum and state bytes zeroed.
///
/// Large files include the 8-byte extended size in the sum.
pub fn file_header_checksum(header: &[u8]) -> u8 {
    header
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 0x11 && *i != 0x17)
        .fold(0u8, |acc, (_, b)| acc.wrapping_add(*b))
}

fn decode_phoenix(data: &[u8], offset: usize) -> Result<DecodedFile, ExtractError> {
    let cur = ByteCursor::new(data);
    let state = cur.read_u8(offset)?;
    if state != PHOENIX_VALID_STATE {
        return Ok(DecodedFile::EndOfVolume);
    }
    let header = cur.read_fixed_bytes(offset, FILE_HEADER_SIZE)?;
    let length = cur.read_u24_le(offset + 4)? as usize;
    if length == 0 {
        return Ok(DecodedFile::EndOfVolume);
    }
    if length < FILE_HEADER_SIZE {
        return Ok(DecodedFile::Malformed {
            reason: format!("declared length 0x{:X} below header size", length),
            resume_at: None,
        });
    }
    if offset + length > data.len() {
        return Ok(DecodedFile::Malformed {
            reason: format!("declared length 0x{:X} runs past volume end", length),
            resume_at: None,
        });
    }
    let raw_type = header[7];
    let file_type = FileType::from_byte(raw_type);
    if file_type == FileType::Pad {
        return Ok(DecodedFile::Padding { length });
    }
    Ok(DecodedFile::File(FileRecord {
        name: Guid(cur.read_array::<16>(offset + 8)?),
        raw_type,
        file_type,
        attributes: header[1],
        state,
        offset,
        header_len: FILE_HEADER_SIZE,
        length,
        payload_start: offset + FILE_HEADER_SIZE,
        payload_end: offset + length,
        header_checksum_valid: None,
    }))
}
