//! Error taxonomy and the recoverable diagnostics attached to report nodes.

use std::fmt;

use thiserror::Error;

use crate::cursor::CursorError;
use crate::decompress::DecompressError;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    OutOfBounds(#[from] CursorError),

    #[error("Malformed {what} at 0x{offset:X}: {reason}")]
    Malformed {
        what: &'static str,
        offset: usize,
        reason: String,
    },

    #[error("Unknown {what} type 0x{tag:02X}")]
    UnknownType { what: &'static str, tag: u8 },

    #[error("Decompressor unavailable: {0}")]
    DecompressUnavailable(String),

    #[error("Unknown compression type {0}")]
    UnknownCompression(u8),

    #[error("Decompression failed: {0}")]
    DecompressFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Maximum nesting depth {0} exceeded")]
    DepthExceeded(usize),

    #[error("No recognizable firmware container found")]
    NoContainer,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DecompressError> for ExtractError {
    fn from(e: DecompressError) -> Self {
        match e {
            DecompressError::Unavailable(msg) => ExtractError::DecompressUnavailable(msg),
            DecompressError::UnknownCompression(tag) => ExtractError::UnknownCompression(tag),
            other => ExtractError::DecompressFailed(other.to_string()),
        }
    }
}

impl ExtractError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ExtractError::OutOfBounds(_) => DiagnosticKind::OutOfBounds,
            ExtractError::Malformed { .. } => DiagnosticKind::Malformed,
            ExtractError::UnknownType { .. } => DiagnosticKind::UnknownType,
            ExtractError::DecompressUnavailable(_) => DiagnosticKind::DecompressUnavailable,
            ExtractError::UnknownCompression(_) => DiagnosticKind::UnknownCompression,
            ExtractError::DecompressFailed(_) => DiagnosticKind::DecompressFailed,
            ExtractError::Io(_) => DiagnosticKind::Io,
            ExtractError::DepthExceeded(_) => DiagnosticKind::DepthExceeded,
            ExtractError::NoContainer | ExtractError::Config(_) => DiagnosticKind::Malformed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    OutOfBounds,
    Malformed,
    UnknownType,
    DecompressUnavailable,
    UnknownCompression,
    DecompressFailed,
    Io,
    DepthExceeded,
    Checksum,
    Ambiguous,
    Truncated,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnknownType => Severity::Info,
            DiagnosticKind::OutOfBounds
            | DiagnosticKind::Malformed
            | DiagnosticKind::DepthExceeded => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::OutOfBounds => "out-of-bounds",
            DiagnosticKind::Malformed => "malformed",
            DiagnosticKind::UnknownType => "unknown-type",
            DiagnosticKind::DecompressUnavailable => "decompress-unavailable",
            DiagnosticKind::UnknownCompression => "unknown-compression",
            DiagnosticKind::DecompressFailed => "decompress-failed",
            DiagnosticKind::Io => "io",
            DiagnosticKind::DepthExceeded => "depth-exceeded",
            DiagnosticKind::Checksum => "checksum",
            DiagnosticKind::Ambiguous => "ambiguous",
            DiagnosticKind::Truncated => "truncated",
        };
        f.write_str(s)
    }
}

/// A non-fatal condition recorded against one node of the structural report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub offset: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, offset: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            message: message.into(),
        }
    }

    pub fn from_error(error: &ExtractError, offset: usize) -> Self {
        Self::new(error.kind(), offset, error.to_string())
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] @0x{:X}: {}",
            self.severity(),
            self.kind,
            self.offset,
            self.message
        )
    }
}
