//! Structural report: the tree of containers, records and leaves found in an image.

use std::fmt;

use crate::error::{Diagnostic, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Image,
    Capsule,
    Volume,
    File,
    Section,
    Padding,
    PhoenixVolume,
    /// A region that was abandoned without being decoded.
    Skipped,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Image => write!(f, "Image"),
            NodeKind::Capsule => write!(f, "Capsule"),
            NodeKind::Volume => write!(f, "Volume"),
            NodeKind::File => write!(f, "File"),
            NodeKind::Section => write!(f, "Section"),
            NodeKind::Padding => write!(f, "Padding"),
            NodeKind::PhoenixVolume => write!(f, "PhoenixVolume"),
            NodeKind::Skipped => write!(f, "Skipped"),
        }
    }
}

/// Which buffer a span's offset refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The input image.
    Image,
    /// The n-th buffer produced by decompression or unwrapping.
    Buffer(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub origin: Origin,
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub fn new(origin: Origin, offset: usize, length: usize) -> Self {
        Self {
            origin,
            offset,
            length,
        }
    }

    pub fn image(offset: usize, length: usize) -> Self {
        Self::new(Origin::Image, offset, length)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Origin::Image => write!(f, "@0x{:X}+0x{:X}", self.offset, self.length),
            Origin::Buffer(id) => write!(f, "@buf{}:0x{:X}+0x{:X}", id, self.offset, self.length),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub label: String,
    pub span: Span,
    /// Alignment or erased bytes consumed after the record.
    pub padding: usize,
    /// Name of the leaf emitted for this node, if any.
    pub output: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, label: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            label: label.into(),
            span,
            padding: 0,
            output: None,
            diagnostics: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn push(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Depth-first, pre-order traversal.
    pub fn walk(&self) -> Vec<&Node> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    pub fn outputs(&self) -> Vec<&str> {
        self.walk()
            .into_iter()
            .filter_map(|n| n.output.as_deref())
            .collect()
    }

    pub fn all_diagnostics(&self) -> Vec<&Diagnostic> {
        self.walk()
            .into_iter()
            .flat_map(|n| n.diagnostics.iter())
            .collect()
    }

    pub fn children_of(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    fn render(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        out.push_str(&format!("{}{} {} {}", indent, self.kind, self.label, self.span));
        if self.padding > 0 {
            out.push_str(&format!(" pad 0x{:X}", self.padding));
        }
        if let Some(output) = &self.output {
            out.push_str(&format!(" -> {}", output));
        }
        out.push('\n');
        for d in &self.diagnostics {
            out.push_str(&format!("{}  ! {}\n", indent, d));
        }
        for child in &self.children {
            child.render(depth + 1, out);
        }
    }
}

/// Result of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub source: String,
    pub root: Node,
}

impl ExtractReport {
    pub fn leaf_count(&self) -> usize {
        self.root.outputs().len()
    }

    pub fn warning_count(&self) -> usize {
        self.root
            .all_diagnostics()
            .iter()
            .filter(|d| d.severity() >= Severity::Warning)
            .count()
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Firmware image: {}\n", self.source));
        out.push_str(&format!("{}\n", "=".repeat(50)));
        self.root.render(0, &mut out);
        out.push_str(&format!(
            "\n{} leaves emitted, {} warnings\n",
            self.leaf_count(),
            self.warning_count()
        ));
        out
    }
}
