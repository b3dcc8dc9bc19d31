//! Section streams: leaves, wrappers and nested volumes.

use crate::catalog::{SectionType, guid_name, sniff_raw_extension};
use crate::error::{Diagnostic, DiagnosticKind, ExtractError};
use crate::events::{WalkEvent, WalkObserver};
use crate::guid::{CRC32_SECTION, Guid};
use crate::record::{
    DecodedSection, SectionBody, SectionFormat, SectionRecord, align_up, decode_section_header,
};
use crate::report::{Node, NodeKind};
use crate::sink::OutputSink;

use super::naming::{Scope, decode_ui_name};
use super::{Loc, Walker};

impl<S, O> Walker<'_, S, O>
where
    S: OutputSink + ?Sized,
    O: WalkObserver + ?Sized,
{
    /// Enumerate a standalone section stream under a node of its own.
    pub fn walk_section_stream(&mut self, stream: &[u8], loc: Loc, scope: &Scope) -> Node {
        let mut node = Node::new(NodeKind::Section, "stream", loc.span(0, stream.len()));
        let mut index = 0;
        self.walk_sections(stream, loc, scope, 0, &mut index, &mut node);
        node
    }

    /// Walk the sections of `stream`, pushing one child per section onto `parent`.
    ///
    /// `index` is the sibling counter; wrappers that unwrap successfully
    /// share it with the stream they contain.
    pub(super) fn walk_sections(
        &mut self,
        stream: &[u8],
        loc: Loc,
        scope: &Scope,
        depth: usize,
        index: &mut usize,
        parent: &mut Node,
    ) {
        if self.too_deep(depth) {
            let error = ExtractError::DepthExceeded(self.options.max_depth);
            parent.push(self.skipped(&scope.dir, loc.span(0, stream.len()), &error));
            return;
        }

        let format = SectionFormat::Uefi(self.options.section_order);
        let (records, failure) = decode_stream(stream, format);
        let ui_names: Vec<Option<String>> = records
            .iter()
            .map(|rec| match rec.kind {
                SectionType::UserInterface => decode_ui_name(rec.data(stream)),
                _ => None,
            })
            .collect();

        for (i, rec) in records.iter().enumerate() {
            let scope = scope.with_override(override_for(&ui_names, i));
            let mut child = self.walk_section(stream, rec, loc, &scope, depth, index);
            let next = align_up(rec.end(), format.alignment());
            child.padding = next.min(stream.len()) - rec.end();
            parent.push(child);
        }

        if let Some((offset, reason)) = failure {
            let path = format!("{}/section@{:x}", scope.dir, loc.at(offset));
            let error = ExtractError::Malformed {
                what: "section stream",
                offset: loc.at(offset),
                reason,
            };
            parent.push(self.skipped(&path, loc.span(offset, stream.len() - offset), &error));
        }
    }

    fn walk_section(
        &mut self,
        stream: &[u8],
        rec: &SectionRecord,
        loc: Loc,
        scope: &Scope,
        depth: usize,
        index: &mut usize,
    ) -> Node {
        let path = format!("{}/{}-{}", scope.dir, scope.effective_stem(), index);
        let mut node = Node::new(
            NodeKind::Section,
            rec.kind.to_string(),
            loc.span(rec.offset, rec.length),
        );
        self.observer.on_event(&WalkEvent::SectionVisited {
            path: path.clone(),
            offset: loc.at(rec.offset),
            section_type: rec.kind.name().into_owned(),
            length: rec.length,
        });
        if rec.ambiguous {
            let d = Diagnostic::new(
                DiagnosticKind::Ambiguous,
                loc.at(rec.offset),
                format!(
                    "header word also decodes as a valid {:?} section",
                    self.options.section_order.other()
                ),
            );
            self.diagnose(&mut node, &path, d);
        }

        let data = rec.data(stream);
        let data_loc = loc.shift(rec.offset + (rec.length - data.len()));

        match (&rec.body, rec.kind) {
            (
                SectionBody::Compression {
                    uncompressed_len,
                    compression_type,
                },
                _,
            ) => {
                let declared = *uncompressed_len as usize;
                match self.decompressor.decompress(*compression_type, data, declared) {
                    Ok(out) => {
                        if out.len() < declared {
                            let d = Diagnostic::new(
                                DiagnosticKind::Truncated,
                                loc.at(rec.offset),
                                format!(
                                    "decompressed 0x{:X} bytes, 0x{:X} declared",
                                    out.len(),
                                    declared
                                ),
                            );
                            self.diagnose(&mut node, &path, d);
                        }
                        node.label = format!("{} type {}", node.label, compression_type);
                        let inner = self.new_buffer();
                        self.walk_sections(&out, inner, scope, depth + 1, index, &mut node);
                    }
                    Err(e) => {
                        let error = ExtractError::from(e);
                        self.diagnose(&mut node, &path, Diagnostic::from_error(&error, loc.at(rec.offset)));
                        self.emit_indexed(&mut node, scope, index, "comp", rec, data);
                    }
                }
            }
            (SectionBody::GuidDefined { guid, .. }, _) => {
                node.label = format!("{} {}", node.label, guid_label(guid));
                if *guid == CRC32_SECTION {
                    self.check_crc32(&mut node, &path, rec.guid_specific_header(stream), data, loc.at(rec.offset));
                    self.walk_sections(data, data_loc, scope, depth + 1, index, &mut node);
                } else {
                    match self.decompressor.decompress_guided(guid, data) {
                        Some(Ok(out)) => {
                            let inner = self.new_buffer();
                            self.walk_sections(&out, inner, scope, depth + 1, index, &mut node);
                        }
                        Some(Err(e)) => {
                            let error = ExtractError::from(e);
                            self.diagnose(&mut node, &path, Diagnostic::from_error(&error, loc.at(rec.offset)));
                            self.emit_indexed(&mut node, scope, index, "guided", rec, data);
                        }
                        None => {
                            let d = Diagnostic::new(
                                DiagnosticKind::UnknownType,
                                loc.at(rec.offset),
                                format!("unrecognized GUID-defined section {}", guid),
                            );
                            self.diagnose(&mut node, &path, d);
                            self.emit_indexed(&mut node, scope, index, "guided", rec, data);
                        }
                    }
                }
            }
            (_, SectionType::UserInterface) => {
                if let Some(name) = decode_ui_name(data) {
                    node.label = format!("{} \"{}\"", node.label, name);
                }
                *index += 1;
            }
            (_, SectionType::FirmwareVolumeImage) => {
                let dir = scope.nested_volume_dir(*index);
                let walked = self.walk_volume(data, data_loc, &dir, depth + 1);
                if walked.node.kind == NodeKind::Volume {
                    node.push(walked.node);
                    *index += 1;
                } else {
                    node.diagnostics.extend(walked.node.diagnostics);
                    self.emit_indexed(&mut node, scope, index, "fd", rec, data);
                }
            }
            (_, kind) => {
                let ext = match kind {
                    SectionType::Raw => sniff_raw_extension(data).into(),
                    other => other.extension(),
                };
                if let SectionType::Unknown(tag) = kind {
                    let error = ExtractError::UnknownType { what: "section", tag };
                    self.diagnose(&mut node, &path, Diagnostic::from_error(&error, loc.at(rec.offset)));
                }
                self.emit_indexed(&mut node, scope, index, &ext, rec, data);
            }
        }
        node
    }

    /// Emit `data` as the next indexed leaf of `scope`.
    fn emit_indexed(
        &mut self,
        node: &mut Node,
        scope: &Scope,
        index: &mut usize,
        ext: &str,
        rec: &SectionRecord,
        data: &[u8],
    ) {
        let name = scope.leaf(*index, ext);
        *index += 1;
        self.emit_leaf(node, name, &rec.kind.name(), data);
    }

    fn check_crc32(&self, node: &mut Node, path: &str, header: &[u8], data: &[u8], offset: usize) {
        let Some(stored) = header.get(..4) else {
            let d = Diagnostic::new(DiagnosticKind::Checksum, offset, "CRC32 section carries no checksum");
            self.diagnose(node, path, d);
            return;
        };
        let stored = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        let actual = crc32fast::hash(data);
        if stored != actual {
            let d = Diagnostic::new(
                DiagnosticKind::Checksum,
                offset,
                format!("CRC32 0x{:08X} stored, 0x{:08X} computed", stored, actual),
            );
            self.diagnose(node, path, d);
        }
    }
}

/// Decode every section header of `stream`; a malformed header ends the list.
fn decode_stream(
    stream: &[u8],
    format: SectionFormat,
) -> (Vec<SectionRecord>, Option<(usize, String)>) {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset < stream.len() {
        match decode_section_header(stream, offset, format) {
            DecodedSection::Section(rec) => {
                offset = align_up(rec.end(), format.alignment());
                records.push(rec);
            }
            DecodedSection::EndOfStream => break,
            DecodedSection::Malformed(reason) => return (records, Some((offset, reason))),
        }
    }
    (records, None)
}

/// UI name for section `i`: the nearest one before it, else the first one after it.
fn override_for(names: &[Option<String>], i: usize) -> Option<String> {
    names[..i]
        .iter()
        .rev()
        .flatten()
        .next()
        .or_else(|| names[i + 1..].iter().flatten().next())
        .cloned()
}

fn guid_label(guid: &Guid) -> String {
    match guid_name(guid) {
        Some(name) => name.to_string(),
        None => guid.to_string(),
    }
}
