//! Extraction session - configuration and orchestration of one run.

use std::path::Path;
use std::sync::Arc;
#[cfg(feature = "external-codec")]
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cursor::CursorError;
use crate::decompress::{
    DecompressError, Decompressor, EfiCodec, EfiVariant, LegacyCodec, LzssCodec, UnavailableCodec,
};
use crate::error::ExtractError;
use crate::events::{ContainerKind, TracingObserver, WalkEvent, WalkObserver};
use crate::phoenix::find_volume_directory;
use crate::record::PackedOrder;
use crate::report::{ExtractReport, Node, NodeKind, Span};
use crate::scan::{Candidate, Scan, ScanStrategy, next_candidate, probe_at};
use crate::sink::{DirSink, NullSink, OutputSink};
use crate::walker::naming::{capsule_dir, volume_dir};
use crate::walker::{Loc, Scope, WalkOptions, Walker};

/// Codec used for compression type 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegacyCodecKind {
    #[default]
    Efi,
    Tiano,
    Lzss,
    /// Pipe through `external_command`.
    External,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("External codec selected but no external_command is configured")]
    MissingCommand,

    #[error("External codec unusable: {0}")]
    Codec(#[from] DecompressError),
}

/// Configuration for an extraction session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Root directory leaves are written below.
    pub output_dir: String,
    /// Packed section header layout.
    pub section_order: PackedOrder,
    pub legacy_codec: LegacyCodecKind,
    /// Program and arguments for the external codec.
    pub external_command: Option<Vec<String>>,
    pub external_timeout_ms: u64,
    pub max_depth: usize,
    pub scan: ScanStrategy,
    /// Step used by the stride scan.
    pub stride: usize,
    /// When false only the listing is produced.
    pub write_files: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            section_order: PackedOrder::LenThenType,
            legacy_codec: LegacyCodecKind::Efi,
            external_command: None,
            external_timeout_ms: 10_000,
            max_depth: 32,
            scan: ScanStrategy::Signature,
            stride: 0x10000,
            write_files: true,
        }
    }
}

impl ExtractConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ExtractConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            section_order: self.section_order,
            max_depth: self.max_depth,
        }
    }

    /// Build the decompressor with the configured type-1 codec.
    pub fn decompressor(&self) -> Result<Decompressor, ConfigError> {
        let legacy: Box<dyn LegacyCodec> = match self.legacy_codec {
            LegacyCodecKind::Efi => Box::new(EfiCodec::new(EfiVariant::Efi)),
            LegacyCodecKind::Tiano => Box::new(EfiCodec::new(EfiVariant::Tiano)),
            LegacyCodecKind::Lzss => Box::new(LzssCodec),
            LegacyCodecKind::External => self.external_codec()?,
        };
        Ok(Decompressor::new(legacy))
    }

    #[cfg(feature = "external-codec")]
    fn external_codec(&self) -> Result<Box<dyn LegacyCodec>, ConfigError> {
        let command = self
            .external_command
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(ConfigError::MissingCommand)?;
        let timeout = Duration::from_millis(self.external_timeout_ms);
        Ok(Box::new(crate::decompress::ExternalCodec::new(command, timeout)?))
    }

    #[cfg(not(feature = "external-codec"))]
    fn external_codec(&self) -> Result<Box<dyn LegacyCodec>, ConfigError> {
        warn!("Built without the external-codec feature; type 1 sections will not be decompressed");
        Ok(Box::new(UnavailableCodec::new(
            "external codec support not compiled in",
        )))
    }
}

/// Extraction session - scans an image and walks every container found.
pub struct ExtractSession<O: WalkObserver> {
    config: ExtractConfig,
    observer: Arc<O>,
}

impl ExtractSession<TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(config: ExtractConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: WalkObserver + 'static> ExtractSession<O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(config: ExtractConfig, observer: Arc<O>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Read the image at `path` and extract it, starting the scan at `start`.
    #[instrument(skip(self))]
    pub fn run(&self, path: &Path, start: usize) -> Result<ExtractReport, ExtractError> {
        info!(path = %path.display(), "Loading firmware image");
        let image = std::fs::read(path)?;
        let source = path.display().to_string();
        if self.config.write_files {
            let mut sink = DirSink::new(&self.config.output_dir);
            info!(output = %sink.root().display(), "Writing leaves");
            self.extract(&source, &image, start, &mut sink)
        } else {
            self.extract(&source, &image, start, &mut NullSink)
        }
    }

    /// Extract `image` into `sink`.
    ///
    /// Fails only when the configuration is unusable, `start` lies past the
    /// end, or no container is found at all.
    pub fn extract<S: OutputSink + ?Sized>(
        &self,
        source: &str,
        image: &[u8],
        start: usize,
        sink: &mut S,
    ) -> Result<ExtractReport, ExtractError> {
        let decompressor = self
            .config
            .decompressor()
            .map_err(|e| ExtractError::Config(e.to_string()))?;
        if start > image.len() {
            return Err(CursorError::OutOfBounds {
                offset: start,
                len: 0,
                available: image.len(),
            }
            .into());
        }
        info!(
            size = image.len(),
            start = %format!("0x{:X}", start),
            codec = decompressor.legacy_name(),
            "Scanning image"
        );

        let observer = self.observer.as_ref();
        let mut walker = Walker::new(self.config.walk_options(), &decompressor, sink, observer);
        let mut root = Node::new(NodeKind::Image, source, Span::image(0, image.len()));
        let mut containers = 0;
        let mut pos = start;

        loop {
            let (kind, offset) = match probe_at(image, pos) {
                Scan::Found(Candidate::Padding { offset, length }) => {
                    root.push(Node::new(NodeKind::Padding, "erased", Span::image(offset, length)));
                    pos = offset + length;
                    continue;
                }
                Scan::Found(Candidate::Volume { offset }) => (ContainerKind::Volume, offset),
                Scan::Found(Candidate::Capsule { offset }) => (ContainerKind::Capsule, offset),
                Scan::Continue => {
                    match next_candidate(image, pos, self.config.scan, self.config.stride) {
                        Some(next) => {
                            pos = next;
                            continue;
                        }
                        None => break,
                    }
                }
                Scan::Abandon => break,
            };

            observer.on_event(&WalkEvent::ContainerFound { kind, offset });
            let walked = match kind {
                ContainerKind::Capsule => {
                    walker.walk_capsule(&image[offset..], Loc::image(offset), &capsule_dir(offset), 0)
                }
                _ => walker.walk_volume(&image[offset..], Loc::image(offset), &volume_dir(offset), 0),
            };
            containers += 1;
            root.push(walked.node);
            if walked.consumed > 0 {
                pos = offset + walked.consumed;
            } else {
                match next_candidate(image, offset, self.config.scan, self.config.stride) {
                    Some(next) => pos = next,
                    None => break,
                }
            }
        }

        if let Some(offset) = find_volume_directory(image).filter(|&o| o >= start) {
            observer.on_event(&WalkEvent::ContainerFound {
                kind: ContainerKind::PhoenixDirectory,
                offset,
            });
            let walked = walker.walk_phoenix_directory(image, offset);
            containers += 1;
            root.push(walked.node);
        }

        if containers == 0 {
            warn!("No firmware volume, capsule or volume directory found");
            return Err(ExtractError::NoContainer);
        }

        let report = ExtractReport {
            source: source.to_string(),
            root,
        };
        observer.on_event(&WalkEvent::Complete {
            leaves: report.leaf_count(),
            warnings: report.warning_count(),
        });
        Ok(report)
    }
}

/// Decompress and enumerate the sections of `bytes` without writing anything.
///
/// Leaf nodes carry the names they would have been emitted under.
pub fn enumerate_sections(bytes: &[u8], config: &ExtractConfig) -> Node {
    let decompressor = config.decompressor().unwrap_or_else(|e| {
        warn!("{}; type 1 sections will not be decompressed", e);
        Decompressor::new(Box::new(UnavailableCodec::new(e.to_string())))
    });
    let observer = crate::events::NullObserver;
    let mut sink = NullSink;
    let scope = Scope::new("sections", "section");
    Walker::new(config.walk_options(), &decompressor, &mut sink, &observer).walk_section_stream(
        bytes,
        Loc::buffer(0),
        &scope,
    )
}
