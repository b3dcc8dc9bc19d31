//! Walk events for decoupling front-ends from the walker.
//!
//! The walker reports progress through a [`WalkObserver`]; the CLI uses
//! [`TracingObserver`], tests use [`RecordingObserver`].

use std::fmt;
use std::sync::Mutex;

use crate::error::{Diagnostic, Severity};

/// Top-level container kinds located by the image scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Volume,
    Capsule,
    PhoenixDirectory,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Volume => write!(f, "Firmware volume"),
            ContainerKind::Capsule => write!(f, "Capsule"),
            ContainerKind::PhoenixDirectory => write!(f, "Phoenix volume directory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalkEvent {
    ContainerFound {
        kind: ContainerKind,
        offset: usize,
    },
    VolumeEntered {
        path: String,
        offset: usize,
        length: u64,
    },
    FileVisited {
        path: String,
        offset: usize,
        file_type: String,
        length: usize,
    },
    SectionVisited {
        path: String,
        offset: usize,
        section_type: String,
        length: usize,
    },
    LeafEmitted {
        name: String,
        tag: String,
        length: usize,
    },
    /// A subtree abandoned without being fully decoded.
    Skipped {
        path: String,
        reason: String,
    },
    Diagnostic {
        path: String,
        diagnostic: Diagnostic,
    },
    Complete {
        leaves: usize,
        warnings: usize,
    },
}

/// Observer trait for receiving walk events.
pub trait WalkObserver: Send + Sync {
    fn on_event(&self, event: &WalkEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl WalkObserver for NullObserver {
    fn on_event(&self, _event: &WalkEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl WalkObserver for TracingObserver {
    fn on_event(&self, event: &WalkEvent) {
        match event {
            WalkEvent::ContainerFound { kind, offset } => {
                tracing::info!(kind = %kind, offset = %format!("0x{:08X}", offset), "Container found");
            }
            WalkEvent::VolumeEntered {
                path,
                offset,
                length,
            } => {
                tracing::debug!(path = %path, offset = %format!("0x{:X}", offset), length, "Volume");
            }
            WalkEvent::FileVisited {
                path,
                offset,
                file_type,
                length,
            } => {
                tracing::debug!(path = %path, offset = %format!("0x{:X}", offset), type_ = %file_type, length, "File");
            }
            WalkEvent::SectionVisited {
                path,
                offset,
                section_type,
                length,
            } => {
                tracing::trace!(path = %path, offset = %format!("0x{:X}", offset), type_ = %section_type, length, "Section");
            }
            WalkEvent::LeafEmitted { name, tag, length } => {
                tracing::debug!(name = %name, tag = %tag, length, "Leaf emitted");
            }
            WalkEvent::Skipped { path, reason } => {
                tracing::warn!(path = %path, "Skipped: {}", reason);
            }
            WalkEvent::Diagnostic { path, diagnostic } => match diagnostic.severity() {
                Severity::Info => tracing::info!(path = %path, "{}", diagnostic),
                Severity::Warning => tracing::warn!(path = %path, "{}", diagnostic),
                Severity::Error => tracing::error!(path = %path, "{}", diagnostic),
            },
            WalkEvent::Complete { leaves, warnings } => {
                tracing::info!(leaves, warnings, "Extraction complete");
            }
        }
    }
}

/// Observer that keeps every event for later inspection.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<WalkEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WalkEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl WalkObserver for RecordingObserver {
    fn on_event(&self, event: &WalkEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
