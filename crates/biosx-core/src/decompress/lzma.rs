//! LZMA "alone" streams (13-byte properties/size header followed by the range-coded data).

use std::io::Cursor;

use super::DecompressError;

pub const LZMA_HEADER_SIZE: usize = 13;
const UNKNOWN_UNPACKED_SIZE: u64 = u64::MAX;
/// Cap on the pre-allocation taken from the stream header.
const MAX_PREALLOC: u64 = 0x100_0000;

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, DecompressError> {
    if data.len() < LZMA_HEADER_SIZE {
        return Err(DecompressError::Truncated {
            needed: LZMA_HEADER_SIZE,
            available: data.len(),
        });
    }
    let mut size = [0u8; 8];
    size.copy_from_slice(&data[5..13]);
    let unpacked_size = u64::from_le_bytes(size);
    let mut decompressed = if unpacked_size == UNKNOWN_UNPACKED_SIZE {
        Vec::new()
    } else {
        Vec::with_capacity(unpacked_size.min(MAX_PREALLOC) as usize)
    };

    lzma_rs::lzma_decompress(&mut Cursor::new(data), &mut decompressed)
        .map_err(|e| DecompressError::Corrupt(format!("lzma: {}", e)))?;
    Ok(decompressed)
}
