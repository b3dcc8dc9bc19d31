//! Container walker: recursive descent over volumes, files and sections.
//!
//! The walker owns all offset bookkeeping. Every recursive call gets the
//! bytes of its container, a [`Loc`] mapping local offsets back onto the
//! buffer they came from, and a nesting depth. Each call returns a report
//! [`Node`]; failures below a node are recorded on it as diagnostics and
//! never abort siblings or ancestors.

pub mod naming;
mod phoenix;
mod section;
mod volume;

use crate::decompress::Decompressor;
use crate::error::{Diagnostic, ExtractError};
use crate::events::{WalkEvent, WalkObserver};
use crate::record::PackedOrder;
use crate::report::{Node, NodeKind, Origin, Span};
use crate::sink::OutputSink;

pub use naming::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Packed word layout of UEFI section headers.
    pub section_order: PackedOrder,
    /// Containers nested deeper than this are skipped.
    pub max_depth: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            section_order: PackedOrder::LenThenType,
            max_depth: 32,
        }
    }
}

/// A walked container and the number of bytes it took up.
#[derive(Debug, Clone)]
pub struct Walked {
    pub node: Node,
    /// Zero when nothing could be decoded, so the caller can resynchronise.
    pub consumed: usize,
}

/// Where a slice handed to the walker sits in its owning buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    pub origin: Origin,
    pub base: usize,
}

impl Loc {
    pub fn image(base: usize) -> Self {
        Self {
            origin: Origin::Image,
            base,
        }
    }

    pub fn buffer(id: usize) -> Self {
        Self {
            origin: Origin::Buffer(id),
            base: 0,
        }
    }

    pub fn at(&self, offset: usize) -> usize {
        self.base + offset
    }

    pub fn span(&self, offset: usize, length: usize) -> Span {
        Span::new(self.origin, self.at(offset), length)
    }

    /// Location of a sub-slice starting at `offset`.
    pub fn shift(&self, offset: usize) -> Self {
        Self {
            origin: self.origin,
            base: self.at(offset),
        }
    }
}

pub struct Walker<'w, S: OutputSink + ?Sized, O: WalkObserver + ?Sized> {
    options: WalkOptions,
    decompressor: &'w Decompressor,
    sink: &'w mut S,
    observer: &'w O,
    next_buffer: usize,
    leaves: usize,
}

impl<'w, S, O> Walker<'w, S, O>
where
    S: OutputSink + ?Sized,
    O: WalkObserver + ?Sized,
{
    pub fn new(
        options: WalkOptions,
        decompressor: &'w Decompressor,
        sink: &'w mut S,
        observer: &'w O,
    ) -> Self {
        Self {
            options,
            decompressor,
            sink,
            observer,
            next_buffer: 0,
            leaves: 0,
        }
    }

    pub fn options(&self) -> &WalkOptions {
        &self.options
    }

    /// Number of leaves successfully handed to the sink.
    pub fn leaves(&self) -> usize {
        self.leaves
    }

    /// Allocate an id for a buffer produced by decompression or unwrapping.
    fn new_buffer(&mut self) -> Loc {
        self.next_buffer += 1;
        Loc::buffer(self.next_buffer)
    }

    fn too_deep(&self, depth: usize) -> bool {
        depth > self.options.max_depth
    }

    /// Hand a leaf to the sink; a failed write is recorded on `node` and the walk goes on.
    fn emit_leaf(&mut self, node: &mut Node, name: String, tag: &str, bytes: &[u8]) {
        match self.sink.emit(&name, tag, bytes) {
            Ok(()) => {
                self.leaves += 1;
                self.observer.on_event(&WalkEvent::LeafEmitted {
                    name: name.clone(),
                    tag: tag.to_string(),
                    length: bytes.len(),
                });
                node.output = Some(name);
            }
            Err(e) => {
                let offset = node.span.offset;
                let error = ExtractError::Io(e);
                let diagnostic = Diagnostic::new(
                    error.kind(),
                    offset,
                    format!("{}: {}", name, error),
                );
                self.diagnose(node, &name, diagnostic);
            }
        }
    }

    fn diagnose(&self, node: &mut Node, path: &str, diagnostic: Diagnostic) {
        self.observer.on_event(&WalkEvent::Diagnostic {
            path: path.to_string(),
            diagnostic: diagnostic.clone(),
        });
        node.diagnose(diagnostic);
    }

    /// Node standing in for a subtree that could not be decoded.
    fn skipped(&self, path: &str, span: Span, error: &ExtractError) -> Node {
        self.observer.on_event(&WalkEvent::Skipped {
            path: path.to_string(),
            reason: error.to_string(),
        });
        let mut node = Node::new(NodeKind::Skipped, path, span);
        node.diagnose(Diagnostic::from_error(error, span.offset));
        node
    }
}
