//! Phoenix volume directory (`volumedir.bin2`).
//!
//! The directory is an FFV file whose payload is a small header followed
//! by `{guid, start, size}` entries describing sibling volumes. Start
//! addresses are flash addresses; they are mapped to file offsets against
//! the 64 KiB-rounded image length.

use crate::cursor::{ByteCursor, Region, find_bytes};
use crate::error::ExtractError;
use crate::guid::Guid;
use crate::record::FileFormat;
use crate::record::file::{DecodedFile, FileRecord, decode_file_header};

/// Name field of the directory file as stored on flash.
pub const DIRECTORY_NAME: &[u8] = b"volumedi\xFFr.bin2";
/// Offset of the name field inside the Phoenix file header.
const NAME_OFFSET: usize = 8;

const ENTRY_SIZE: usize = 0x18;

/// First byte of the type GUID of volumes holding FFV files.
pub const FFV_GUID_MARKER: u8 = 0xBA;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryHeader {
    pub header_size: u16,
    pub directory_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeEntry {
    pub guid: Guid,
    /// Flash address of the volume.
    pub start: u32,
    pub size: u32,
}

impl VolumeEntry {
    pub fn is_ffv(&self) -> bool {
        self.guid.0[0] == FFV_GUID_MARKER
    }

    /// File region of this volume inside an image of `image_len` bytes.
    pub fn region(&self, image_len: usize) -> Region {
        Region::new(volume_file_offset(self.start, image_len), self.size as usize)
    }
}

/// Map a flash address onto a file offset.
pub fn volume_file_offset(start: u32, image_len: usize) -> usize {
    let bios_len = (image_len as u64 & 0xFFFF_0000) as u32;
    start.wrapping_add(bios_len) as usize
}

/// Offset of the directory file header, if the image carries one.
pub fn find_volume_directory(image: &[u8]) -> Option<usize> {
    find_bytes(image, DIRECTORY_NAME, NAME_OFFSET).map(|pos| pos - NAME_OFFSET)
}

/// Decode the directory file at `offset`, returning its record and entries.
pub fn read_volume_directory(
    image: &[u8],
    offset: usize,
) -> Result<(FileRecord, Vec<VolumeEntry>), ExtractError> {
    let record = match decode_file_header(image, offset, image.len(), FileFormat::Phoenix) {
        DecodedFile::File(rec) => rec,
        DecodedFile::Malformed { reason, .. } => {
            return Err(ExtractError::Malformed {
                what: "volume directory file",
                offset,
                reason,
            });
        }
        _ => {
            return Err(ExtractError::Malformed {
                what: "volume directory file",
                offset,
                reason: "file state is not valid".into(),
            });
        }
    };
    let entries = decode_entries(record.payload(image))?;
    Ok((record, entries))
}

/// Decode `{u8, u8, header_size: u16, directory_size: u32}` and the entries after it.
pub fn decode_entries(payload: &[u8]) -> Result<Vec<VolumeEntry>, ExtractError> {
    let cur = ByteCursor::new(payload);
    let header = DirectoryHeader {
        header_size: cur.read_u16_le(2)?,
        directory_size: cur.read_u32_le(4)?,
    };
    let count = header.directory_size as usize / ENTRY_SIZE;
    let mut pos = header.header_size as usize;
    let mut entries = Vec::with_capacity(count.min(payload.len() / ENTRY_SIZE));
    for _ in 0..count {
        entries.push(VolumeEntry {
            guid: Guid(cur.read_array::<16>(pos)?),
            start: cur.read_u32_le(pos + 16)?,
            size: cur.read_u32_le(pos + 20)?,
        });
        pos += ENTRY_SIZE;
    }
    Ok(entries)
}
