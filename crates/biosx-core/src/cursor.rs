//! Bounds-checked little-endian views over firmware bytes.
//!
//! Every decoder in the crate reads through a [`ByteCursor`] so that a
//! truncated or lying header turns into a [`CursorError`] instead of a panic.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("Read out of bounds: offset 0x{offset:X} + 0x{len:X} exceeds 0x{available:X}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },
}

/// A contiguous byte range inside the image or inside a decompressed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    pub base_offset: usize,
    pub length: usize,
}

impl Region {
    pub fn new(base_offset: usize, length: usize) -> Self {
        Self {
            base_offset,
            length,
        }
    }

    /// End offset, or `None` if it would overflow.
    pub fn end(&self) -> Option<usize> {
        self.base_offset.checked_add(self.length)
    }

    /// Check that the region fits in a buffer of `available` bytes.
    pub fn validate(&self, available: usize) -> Result<(), CursorError> {
        match self.end() {
            Some(end) if end <= available => Ok(()),
            _ => Err(CursorError::OutOfBounds {
                offset: self.base_offset,
                len: self.length,
                available,
            }),
        }
    }
}

/// Non-owning reader over a byte slice.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], CursorError> {
        Region::new(offset, len).validate(self.data.len())?;
        Ok(&self.data[offset..offset + len])
    }

    /// Borrow everything from `offset` to the end.
    pub fn tail(&self, offset: usize) -> Result<&'a [u8], CursorError> {
        if offset > self.data.len() {
            return Err(CursorError::OutOfBounds {
                offset,
                len: 0,
                available: self.data.len(),
            });
        }
        Ok(&self.data[offset..])
    }

    /// Narrow the cursor to a sub-region.
    pub fn sub(&self, region: Region) -> Result<ByteCursor<'a>, CursorError> {
        self.slice(region.base_offset, region.length).map(ByteCursor::new)
    }

    pub fn read_fixed_bytes(&self, offset: usize, n: usize) -> Result<&'a [u8], CursorError> {
        self.slice(offset, n)
    }

    pub fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N], CursorError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, CursorError> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16, CursorError> {
        Ok(LittleEndian::read_u16(self.slice(offset, 2)?))
    }

    /// Three-byte little-endian length, as used by file and section headers.
    pub fn read_u24_le(&self, offset: usize) -> Result<u32, CursorError> {
        Ok(LittleEndian::read_u24(self.slice(offset, 3)?))
    }

    pub fn read_u32_le(&self, offset: usize) -> Result<u32, CursorError> {
        Ok(LittleEndian::read_u32(self.slice(offset, 4)?))
    }

    pub fn read_u64_le(&self, offset: usize) -> Result<u64, CursorError> {
        Ok(LittleEndian::read_u64(self.slice(offset, 8)?))
    }
}

/// Length of the run of `value` bytes starting at `offset`.
pub fn run_length(data: &[u8], offset: usize, value: u8) -> usize {
    data.get(offset..)
        .map(|rest| rest.iter().take_while(|&&b| b == value).count())
        .unwrap_or(0)
}

/// Index of the first occurrence of `needle` at or after `from`.
pub fn find_bytes(data: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= data.len() {
        return None;
    }
    data[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}
