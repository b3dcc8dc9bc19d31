//! Volumes, capsules and the files inside them.

use crate::catalog::{FileType, guid_name, sniff_raw_extension};
use crate::error::{Diagnostic, DiagnosticKind, ExtractError};
use crate::events::{WalkEvent, WalkObserver};
use crate::record::capsule::CAPSULE_HEADER_MIN;
use crate::record::file::FILE_HEADER_SIZE;
use crate::record::volume::trailing_padding;
use crate::record::{
    DecodedFile, FfsRevision, FileFormat, FileRecord, VolumeProbe, align8, decode_capsule_header,
    decode_file_header, probe_volume,
};
use crate::report::{Node, NodeKind};
use crate::scan::{ScanStrategy, next_candidate};
use crate::sink::OutputSink;

use super::naming::{self, Scope};
use super::{Loc, Walked, Walker};

impl<S, O> Walker<'_, S, O>
where
    S: OutputSink + ?Sized,
    O: WalkObserver + ?Sized,
{
    /// Walk the volume at the start of `data`, emitting its leaves below `dir`.
    ///
    /// `consumed` covers the volume and any erased bytes after it; it is the
    /// run length for a padding region and zero when no volume was found.
    pub fn walk_volume(&mut self, data: &[u8], loc: Loc, dir: &str, depth: usize) -> Walked {
        if self.too_deep(depth) {
            let error = ExtractError::DepthExceeded(self.options.max_depth);
            return Walked {
                node: self.skipped(dir, loc.span(0, data.len()), &error),
                consumed: 0,
            };
        }

        let header = match probe_volume(data) {
            VolumeProbe::Volume(header) => header,
            VolumeProbe::Padding(length) => {
                return Walked {
                    node: Node::new(NodeKind::Padding, "erased", loc.span(0, length)),
                    consumed: length,
                };
            }
            VolumeProbe::Invalid(reason) => {
                let error = ExtractError::Malformed {
                    what: "volume header",
                    offset: loc.at(0),
                    reason,
                };
                return Walked {
                    node: self.skipped(dir, loc.span(0, data.len()), &error),
                    consumed: 0,
                };
            }
        };

        let declared = usize::try_from(header.length).unwrap_or(usize::MAX);
        let fvlen = declared.min(data.len());
        let mut node = Node::new(
            NodeKind::Volume,
            format!("{} {}", dir, header.ffs),
            loc.span(0, fvlen),
        );
        self.observer.on_event(&WalkEvent::VolumeEntered {
            path: dir.to_string(),
            offset: loc.at(0),
            length: header.length,
        });

        if declared > data.len() {
            let d = Diagnostic::new(
                DiagnosticKind::Truncated,
                loc.at(0),
                format!(
                    "declared length 0x{:X} exceeds the 0x{:X} bytes available",
                    header.length,
                    data.len()
                ),
            );
            self.diagnose(&mut node, dir, d);
        }
        if !header.checksum_valid {
            let d = Diagnostic::new(
                DiagnosticKind::Checksum,
                loc.at(0),
                format!("volume header checksum 0x{:04X} does not sum to zero", header.checksum),
            );
            self.diagnose(&mut node, dir, d);
        }
        if header.ffs == FfsRevision::Unknown {
            let d = Diagnostic::new(
                DiagnosticKind::UnknownType,
                loc.at(0x10),
                format!("unknown file system {}, decoding files as FFS2", header.fs_guid),
            );
            self.diagnose(&mut node, dir, d);
        }

        self.walk_files(
            &data[..fvlen],
            header.first_file_offset,
            FileFormat::Uefi(header.ffs),
            loc,
            dir,
            depth,
            &mut node,
        );

        let trailing = trailing_padding(data, fvlen);
        node.padding = trailing;
        Walked {
            node,
            consumed: fvlen + trailing,
        }
    }

    /// Walk the file list of `volume` from `start` to its end.
    #[allow(clippy::too_many_arguments)]
    fn walk_files(
        &mut self,
        volume: &[u8],
        start: usize,
        format: FileFormat,
        loc: Loc,
        dir: &str,
        depth: usize,
        parent: &mut Node,
    ) {
        let fvlen = volume.len();
        let mut offset = start;

        while offset < fvlen {
            let remaining = &volume[offset..];
            if remaining.len() < FILE_HEADER_SIZE {
                if remaining.iter().any(|&b| b != 0xFF) {
                    let d = Diagnostic::new(
                        DiagnosticKind::Truncated,
                        loc.at(offset),
                        format!("0x{:X} bytes left, too short for a file header", remaining.len()),
                    );
                    self.diagnose(parent, dir, d);
                }
                break;
            }

            let (mut child, end) = match decode_file_header(volume, offset, fvlen, format) {
                DecodedFile::EndOfVolume => break,
                DecodedFile::Padding { length } => (
                    Node::new(NodeKind::Padding, "PAD", loc.span(offset, length)),
                    offset + length,
                ),
                DecodedFile::File(rec) => (self.walk_file(volume, &rec, loc, dir, depth), rec.end()),
                DecodedFile::Malformed { reason, resume_at } => {
                    let path = format!("{}/file@{:08x}", dir, loc.at(offset));
                    let error = ExtractError::Malformed {
                        what: "file",
                        offset: loc.at(offset),
                        reason,
                    };
                    match resume_at {
                        Some(_) => (
                            self.skipped(&path, loc.span(offset, FILE_HEADER_SIZE), &error),
                            offset + FILE_HEADER_SIZE,
                        ),
                        None => {
                            parent.push(self.skipped(&path, loc.span(offset, fvlen - offset), &error));
                            offset = fvlen;
                            break;
                        }
                    }
                }
            };

            let next = align8(end);
            child.padding = next.min(fvlen).saturating_sub(end);
            parent.push(child);
            offset = next;
        }

        let free = fvlen.saturating_sub(offset);
        if free > 0 {
            match parent.children.last_mut() {
                Some(last) => last.padding += free,
                None => parent.push(Node::new(NodeKind::Padding, "free", loc.span(offset, free))),
            }
        }
    }

    fn walk_file(
        &mut self,
        volume: &[u8],
        rec: &FileRecord,
        loc: Loc,
        dir: &str,
        depth: usize,
    ) -> Node {
        let stem = naming::file_stem(&rec.name);
        let path = format!("{}/{}", dir, stem);
        let mut node = Node::new(
            NodeKind::File,
            format!("{} {}", rec.name, rec.file_type),
            loc.span(rec.offset, rec.length),
        );
        self.observer.on_event(&WalkEvent::FileVisited {
            path: path.clone(),
            offset: loc.at(rec.offset),
            file_type: rec.file_type.name().into_owned(),
            length: rec.length,
        });
        if rec.header_checksum_valid == Some(false) {
            let d = Diagnostic::new(
                DiagnosticKind::Checksum,
                loc.at(rec.offset),
                "file header checksum does not sum to zero",
            );
            self.diagnose(&mut node, &path, d);
        }

        let payload = rec.payload(volume);
        if rec.file_type.is_sectioned() {
            let scope = Scope::new(dir, stem);
            let mut index = 0;
            self.walk_sections(
                payload,
                loc.shift(rec.payload_start),
                &scope,
                depth,
                &mut index,
                &mut node,
            );
            return node;
        }

        let ext = match rec.file_type {
            FileType::Raw => sniff_raw_extension(payload).into(),
            other => other.extension(),
        };
        if let FileType::Unknown(tag) = rec.file_type {
            let error = ExtractError::UnknownType { what: "file", tag };
            self.diagnose(&mut node, &path, Diagnostic::from_error(&error, loc.at(rec.offset)));
        }
        let name = naming::flat_file(dir, &rec.name, &ext);
        self.emit_leaf(&mut node, name, &rec.file_type.name(), payload);
        node
    }

    /// Walk a capsule and the volumes in its body; anything else is tried as a volume.
    pub fn walk_capsule(&mut self, data: &[u8], loc: Loc, dir: &str, depth: usize) -> Walked {
        let header = match decode_capsule_header(data) {
            Ok(Some(header)) => header,
            Ok(None) => return self.walk_volume(data, loc, dir, depth),
            Err(error) => {
                let span = loc.span(0, data.len().min(CAPSULE_HEADER_MIN));
                return Walked {
                    node: self.skipped(dir, span, &error),
                    consumed: 0,
                };
            }
        };

        let body = header.body_range(data.len());
        let mut node = Node::new(
            NodeKind::Capsule,
            format!("{} {}", dir, guid_name(&header.guid).unwrap_or("CAPSULE")),
            loc.span(0, body.end),
        );
        if header.image_size as usize > data.len() {
            let d = Diagnostic::new(
                DiagnosticKind::Truncated,
                loc.at(0),
                format!(
                    "capsule image size 0x{:X} exceeds the 0x{:X} bytes available",
                    header.image_size,
                    data.len()
                ),
            );
            self.diagnose(&mut node, dir, d);
        }

        let image = &data[..body.end];
        let mut pos = body.start;
        while pos < body.end {
            let sub_dir = format!("{}/{}", dir, naming::volume_dir(pos));
            let walked = self.walk_volume(&image[pos..], loc.shift(pos), &sub_dir, depth + 1);
            node.push(walked.node);
            pos = if walked.consumed > 0 {
                pos + walked.consumed
            } else {
                match next_candidate(image, pos, ScanStrategy::Signature, 0) {
                    Some(next) => next,
                    None => break,
                }
            };
        }

        Walked {
            node,
            consumed: body.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::decompress::Decompressor;
    use crate::error::Severity;
    use crate::events::{NullObserver, RecordingObserver, WalkEvent};
    use crate::guid::{EFI_CAPSULE, FFS3};
    use crate::report::NodeKind;
    use crate::sink::{MemorySink, OutputSink};
    use crate::test_support::*;
    use crate::walker::{Loc, WalkOptions, Walked, Walker};

    fn walk(data: &[u8]) -> (Walked, MemorySink) {
        let decompressor = Decompressor::default();
        let mut sink = MemorySink::new();
        let walked = Walker::new(WalkOptions::default(), &decompressor, &mut sink, &NullObserver)
            .walk_volume(data, Loc::image(0), "vol-00000000", 0);
        (walked, sink)
    }

    fn two_file_volume() -> Vec<u8> {
        let file_a = ffs_file(TEST_GUID_A, 0x01, &b"AAAA".repeat(10));
        let stream = section_stream(&[ui_section("Hello"), section(0x19, &b"BBBB".repeat(4))]);
        let file_b = ffs_file(TEST_GUID_B, 0x02, &stream);
        volume(&[file_a, file_b], 0x100)
    }

    #[test]
    fn test_two_file_scenario() {
        let (walked, sink) = walk(&two_file_volume());
        assert_eq!(walked.consumed, 0x100);
        assert_eq!(
            sink.names(),
            vec![
                "vol-00000000/file-11111111-2222-3333-4444-555555555555.raw",
                "vol-00000000/Hello-1.raw",
            ]
        );
        assert_eq!(sink.leaves[0].bytes, vec![b'A'; 40]);
        assert_eq!(sink.leaves[1].bytes, b"BBBB".repeat(4));
        assert_eq!(sink.leaves[1].tag, "RAW");
        assert!(walked.node.all_diagnostics().is_empty());
    }

    #[test]
    fn test_files_and_padding_cover_the_volume() {
        let payloads: [&[u8]; 4] = [&[1], &[2; 7], &[3; 16], &[4; 33]];
        let files: Vec<Vec<u8>> = payloads.iter().map(|p| ffs_file(TEST_GUID_A, 0x01, p)).collect();
        let fv = volume(&files, 0x200);

        let decompressor = Decompressor::default();
        let mut sink = MemorySink::new();
        let observer = RecordingObserver::new();
        let walked = Walker::new(WalkOptions::default(), &decompressor, &mut sink, &observer)
            .walk_volume(&fv, Loc::image(0), "vol-00000000", 0);

        let visited: Vec<usize> = observer
            .events()
            .iter()
            .filter_map(|e| match e {
                WalkEvent::FileVisited { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect();
        assert_eq!(visited, vec![0x48, 0x68, 0x88, 0xB0]);

        let covered: usize = walked
            .node
            .children
            .iter()
            .map(|c| c.span.length + c.padding)
            .sum();
        assert_eq!(covered, 0x200 - VOLUME_HEADER_LEN);
    }

    #[test]
    fn test_filler_ends_volume_cleanly() {
        let file = ffs_file(TEST_GUID_A, 0x01, &[0x5A; 8]);
        // Volume ends exactly after one erased filler header.
        let fv = volume(&[file], VOLUME_HEADER_LEN + 32 + 24);
        let (walked, sink) = walk(&fv);
        assert_eq!(sink.leaves.len(), 1);
        assert_eq!(walked.node.children.len(), 1);
        assert_eq!(walked.node.children[0].padding, 24);
        assert!(walked.node.all_diagnostics().is_empty());
    }

    #[test]
    fn test_zero_length_file_is_skipped_and_walk_continues() {
        let mut broken = ffs_file(TEST_GUID_A, 0x07, &[]);
        broken[20..23].copy_from_slice(&[0, 0, 0]);
        let good = ffs_file(TEST_GUID_B, 0x01, b"data");
        let fv = volume(&[broken, good], 0x100);

        let (walked, sink) = walk(&fv);
        let kinds: Vec<NodeKind> = walked.node.children.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![NodeKind::Skipped, NodeKind::File]);
        assert_eq!(walked.node.children[1].span.offset, 0x60);
        assert_eq!(
            sink.names(),
            vec!["vol-00000000/file-AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE.raw"]
        );
        assert_eq!(walked.node.all_diagnostics()[0].severity(), Severity::Error);
    }

    #[test]
    fn test_checksum_and_truncation_are_reported() {
        let mut fv = volume(&[ffs_file(TEST_GUID_A, 0x01, b"x")], 0x100);
        fv[0x2C] ^= 0x01;
        fv.truncate(0x80);
        let (walked, sink) = walk(&fv);
        assert_eq!(sink.leaves.len(), 1);
        assert_eq!(walked.consumed, 0x80);
        let kinds: Vec<_> = walked.node.diagnostics.iter().map(|d| d.kind.to_string()).collect();
        assert_eq!(kinds, vec!["truncated", "checksum"]);
    }

    #[test]
    fn test_ffs3_large_file_checksum_is_valid() {
        let file = ffs3_large_file(TEST_GUID_A, 0x01, &[0x5A; 0x20]);
        let (walked, sink) = walk(&volume_with(FFS3, &[file], 0x100));
        assert_eq!(
            sink.names(),
            vec!["vol-00000000/file-11111111-2222-3333-4444-555555555555.raw"]
        );
        assert_eq!(sink.leaves[0].bytes, vec![0x5A; 0x20]);
        assert!(walked.node.all_diagnostics().is_empty());
    }

    #[test]
    fn test_erased_bytes_after_volume_are_consumed() {
        let mut image = volume(&[], 0x100);
        image.extend(vec![0xFF; 0x30]);
        image.extend(volume(&[], 0x100));
        let (walked, _) = walk(&image);
        assert_eq!(walked.consumed, 0x130);
        assert_eq!(walked.node.padding, 0x30);
    }

    #[test]
    fn test_padding_and_garbage() {
        let (walked, _) = walk(&[0xFF; 0x200]);
        assert_eq!(walked.node.kind, NodeKind::Padding);
        assert_eq!(walked.consumed, 0x200);

        let (walked, _) = walk(&[0x12; 0x80]);
        assert_eq!(walked.node.kind, NodeKind::Skipped);
        assert_eq!(walked.consumed, 0);
    }

    #[test]
    fn test_capsule_body_is_walked() {
        let fv = volume(&[ffs_file(TEST_GUID_A, 0x01, b"cap")], 0x100);
        let image = capsule(EFI_CAPSULE, &fv);
        let decompressor = Decompressor::default();
        let mut sink = MemorySink::new();
        let walked = Walker::new(WalkOptions::default(), &decompressor, &mut sink, &NullObserver)
            .walk_capsule(&image, Loc::image(0), "capsule-00000000", 0);
        assert_eq!(walked.node.kind, NodeKind::Capsule);
        assert_eq!(walked.consumed, 0x1C + 0x100);
        assert_eq!(
            sink.names(),
            vec!["capsule-00000000/vol-0000001c/file-11111111-2222-3333-4444-555555555555.raw"]
        );
    }

    struct FailingSink {
        attempts: usize,
    }

    impl OutputSink for FailingSink {
        fn emit(&mut self, _name: &str, _tag: &str, _bytes: &[u8]) -> io::Result<()> {
            self.attempts += 1;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn test_emit_failure_does_not_stop_the_walk() {
        let decompressor = Decompressor::default();
        let mut sink = FailingSink { attempts: 0 };
        let mut walker = Walker::new(WalkOptions::default(), &decompressor, &mut sink, &NullObserver);
        let walked = walker.walk_volume(&two_file_volume(), Loc::image(0), "vol-00000000", 0);
        assert_eq!(walker.leaves(), 0);
        let io_errors = walked
            .node
            .all_diagnostics()
            .iter()
            .filter(|d| d.kind.to_string() == "io")
            .count();
        assert_eq!(io_errors, 2);
        assert_eq!(sink.attempts, 2);
    }
}
