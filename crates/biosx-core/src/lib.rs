//! biosx-core: recursive extraction of UEFI and Phoenix firmware images.
//!
//! This crate locates firmware volumes, capsules and Phoenix volume
//! directories inside a raw flash image and walks them down to leaf
//! payloads, decompressing and unwrapping sections along the way.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Cursor / GUID / Catalog**: Bounds-checked reads, GUIDs, type tables
//! - **Record**: Pure header decoders for volumes, files, sections and capsules
//! - **Decompress**: Codec dispatch (EFI/Tiano, LZSS, LZMA, external program)
//! - **Scan**: Locating top-level containers in an image
//! - **Walker**: Recursive descent, leaf naming and diagnostics
//! - **Sink / Events / Report**: Where leaves go, progress, and the result tree
//! - **Session**: Configuration and the high-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use biosx_core::session::{ExtractConfig, ExtractSession};
//!
//! let config = ExtractConfig {
//!     output_dir: "out".to_string(),
//!     ..Default::default()
//! };
//!
//! let session = ExtractSession::new(config);
//! let report = session.run(Path::new("bios.bin"), 0).expect("extraction failed");
//! println!("{}", report.to_text());
//! ```

pub mod catalog;
pub mod cursor;
pub mod decompress;
pub mod error;
pub mod events;
pub mod guid;
pub mod phoenix;
pub mod record;
pub mod report;
pub mod scan;
pub mod session;
pub mod sink;
pub mod walker;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use decompress::{DecompressError, Decompressor, LegacyCodec};
pub use error::{Diagnostic, DiagnosticKind, ExtractError, Severity};
pub use events::{ContainerKind, TracingObserver, WalkEvent, WalkObserver};
pub use guid::Guid;
pub use record::PackedOrder;
pub use report::{ExtractReport, Node, NodeKind, Span};
pub use scan::ScanStrategy;
pub use session::{ExtractConfig, ExtractSession, LegacyCodecKind, enumerate_sections};
pub use sink::{DirSink, MemorySink, NullSink, OutputSink};
