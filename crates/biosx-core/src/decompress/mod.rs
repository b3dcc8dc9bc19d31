//! Decompression dispatch by compression-type tag and GUID.
//!
//! Tag 0 is stored data, tag 1 the legacy codec (selected at runtime
//! through [`LegacyCodec`]), tag 2 vendor LZMA with a 4-byte junk prefix.

pub mod efi;
#[cfg(feature = "external-codec")]
pub mod external;
pub mod lzma;
pub mod lzss;

use thiserror::Error;
use tracing::warn;

use crate::guid::{Guid, LZMA_SECTION, TIANO_SECTION};

pub use efi::{EfiCodec, EfiVariant};
#[cfg(feature = "external-codec")]
pub use external::ExternalCodec;
pub use lzss::LzssCodec;

pub const NOT_COMPRESSED: u8 = 0;
pub const STANDARD_COMPRESSION: u8 = 1;
pub const VENDOR_LZMA: u8 = 2;

/// Bytes of non-LZMA data preceding the stream in vendor tag-2 sections.
pub const LZMA_JUNK_PREFIX: usize = 4;

#[derive(Error, Debug)]
pub enum DecompressError {
    #[error("Decoder unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown compression type {0}")]
    UnknownCompression(u8),

    #[error("Corrupt stream: {0}")]
    Corrupt(String),

    #[error("Truncated stream: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
}

/// Strategy for the tag-1 legacy codec.
pub trait LegacyCodec: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, compressed: &[u8], declared_len: usize) -> Result<Vec<u8>, DecompressError>;
}

/// Codec used when tag 1 has been configured but cannot be provided.
pub struct UnavailableCodec {
    reason: String,
}

impl UnavailableCodec {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl LegacyCodec for UnavailableCodec {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn decode(&self, _compressed: &[u8], _declared_len: usize) -> Result<Vec<u8>, DecompressError> {
        Err(DecompressError::Unavailable(self.reason.clone()))
    }
}

pub struct Decompressor {
    legacy: Box<dyn LegacyCodec>,
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new(Box::new(EfiCodec::new(EfiVariant::Efi)))
    }
}

impl Decompressor {
    pub fn new(legacy: Box<dyn LegacyCodec>) -> Self {
        Self { legacy }
    }

    pub fn legacy_name(&self) -> &'static str {
        self.legacy.name()
    }

    /// Decompress `bytes` according to a compression-section tag.
    ///
    /// Output shorter than `declared_len` is returned with a warning.
    pub fn decompress(
        &self,
        tag: u8,
        bytes: &[u8],
        declared_len: usize,
    ) -> Result<Vec<u8>, DecompressError> {
        let out = match tag {
            NOT_COMPRESSED => bytes.to_vec(),
            STANDARD_COMPRESSION => self.legacy.decode(bytes, declared_len)?,
            VENDOR_LZMA => {
                let stream = bytes
                    .get(LZMA_JUNK_PREFIX..)
                    .ok_or(DecompressError::Truncated {
                        needed: LZMA_JUNK_PREFIX,
                        available: bytes.len(),
                    })?;
                lzma::decompress(stream)?
            }
            other => return Err(DecompressError::UnknownCompression(other)),
        };
        if out.len() < declared_len {
            warn!(
                tag,
                declared = declared_len,
                actual = out.len(),
                "Decompressed output shorter than declared"
            );
        }
        Ok(out)
    }

    /// Decode a GUID-defined section body whose GUID names a codec.
    ///
    /// Returns `None` for GUIDs that are not compression wrappers.
    pub fn decompress_guided(
        &self,
        guid: &Guid,
        bytes: &[u8],
    ) -> Option<Result<Vec<u8>, DecompressError>> {
        match *guid {
            LZMA_SECTION => Some(lzma::decompress(bytes)),
            TIANO_SECTION => Some(efi::decompress(bytes, EfiVariant::Tiano, 0)),
            _ => None,
        }
    }
}
