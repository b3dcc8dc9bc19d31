//! UEFI/Tiano decompression through the `mu_rust_helpers` decoder.
//!
//! The compressed buffer starts with `{compressed_size: u32, original_size: u32}`.
//! The output buffer is sized from `original_size`, which is checked against
//! the section's declared length and the compressed length first.

#![allow(deprecated)]

use mu_rust_helpers::uefi_decompress::{DecompressionAlgorithm, decompress_into_with_algo};

use super::{DecompressError, LegacyCodec};

pub const HEADER_SIZE: usize = 8;
/// Upper bound on `original_size / compressed_len` for a plausible stream.
pub const EXPANSION_LIMIT: usize = 4096;
/// Refuse to inflate a header-declared size beyond this.
const MAX_ORIGINAL_SIZE: usize = 0x2000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfiVariant {
    Efi,
    Tiano,
}

impl EfiVariant {
    fn algorithm(&self) -> DecompressionAlgorithm {
        match self {
            EfiVariant::Efi => DecompressionAlgorithm::UefiDecompress,
            EfiVariant::Tiano => DecompressionAlgorithm::TianoDecompress,
        }
    }
}

/// Tag-1 codec for EFI or Tiano streams.
pub struct EfiCodec {
    variant: EfiVariant,
}

impl EfiCodec {
    pub fn new(variant: EfiVariant) -> Self {
        Self { variant }
    }
}

impl LegacyCodec for EfiCodec {
    fn name(&self) -> &'static str {
        match self.variant {
            EfiVariant::Efi => "efi",
            EfiVariant::Tiano => "tiano",
        }
    }

    fn decode(&self, compressed: &[u8], declared_len: usize) -> Result<Vec<u8>, DecompressError> {
        decompress(compressed, self.variant, declared_len)
    }
}

/// Read `(compressed_size, original_size)` and check the buffer holds the stream.
pub fn header(src: &[u8]) -> Result<(u32, u32), DecompressError> {
    let fixed = src.get(..HEADER_SIZE).ok_or(DecompressError::Truncated {
        needed: HEADER_SIZE,
        available: src.len(),
    })?;
    let comp = u32::from_le_bytes([fixed[0], fixed[1], fixed[2], fixed[3]]);
    let orig = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
    let needed = (comp as usize).saturating_add(HEADER_SIZE);
    if needed > src.len() {
        return Err(DecompressError::Truncated {
            needed,
            available: src.len(),
        });
    }
    Ok((comp, orig))
}

/// Largest output accepted for `src`: the declared length when one is known,
/// never more than [`EXPANSION_LIMIT`] times the input.
fn output_limit(src_len: usize, declared_len: usize) -> usize {
    let ratio = src_len.saturating_mul(EXPANSION_LIMIT).min(MAX_ORIGINAL_SIZE);
    if declared_len > 0 {
        ratio.min(declared_len)
    } else {
        ratio
    }
}

/// Decode an EFI or Tiano stream. `declared_len` of 0 means unknown.
pub fn decompress(
    src: &[u8],
    variant: EfiVariant,
    declared_len: usize,
) -> Result<Vec<u8>, DecompressError> {
    let (_, orig) = header(src)?;
    let orig = orig as usize;
    let limit = output_limit(src.len(), declared_len);
    if orig > limit {
        return Err(DecompressError::Corrupt(format!(
            "original size 0x{:X} exceeds limit 0x{:X}",
            orig, limit
        )));
    }
    let mut out = vec![0u8; orig];
    decompress_into_with_algo(src, &mut out, variant.algorithm())
        .map_err(|e| DecompressError::Corrupt(format!("{:?}", e)))?;
    Ok(out)
}
