//! Phoenix FFV images: the volume directory and the volumes it lists.

use std::borrow::Cow;

use crate::catalog::{
    SectionType, phoenix_file_is_sectioned, phoenix_file_type_name, phoenix_section_name,
    phoenix_volume_kind,
};
use crate::decompress::STANDARD_COMPRESSION;
use crate::error::{Diagnostic, ExtractError};
use crate::events::{WalkEvent, WalkObserver};
use crate::phoenix::{VolumeEntry, read_volume_directory};
use crate::record::{DecodedFile, DecodedSection, FileFormat, FileRecord, SectionFormat};
use crate::record::{decode_file_header, decode_section_header};
use crate::report::{Node, NodeKind};
use crate::sink::OutputSink;

use super::naming::{phoenix_name, sanitize};
use super::{Loc, Walked, Walker};

impl<S, O> Walker<'_, S, O>
where
    S: OutputSink + ?Sized,
    O: WalkObserver + ?Sized,
{
    /// Walk the directory file at `offset` and every volume it lists.
    pub fn walk_phoenix_directory(&mut self, image: &[u8], offset: usize) -> Walked {
        let loc = Loc::image(0);
        let (record, entries) = match read_volume_directory(image, offset) {
            Ok(found) => found,
            Err(error) => {
                let span = loc.span(offset, image.len().saturating_sub(offset));
                return Walked {
                    node: self.skipped("volumedir", span, &error),
                    consumed: 0,
                };
            }
        };

        let mut node = Node::new(
            NodeKind::PhoenixVolume,
            format!("volume directory, {} volumes", entries.len()),
            loc.span(offset, record.length),
        );
        let directory = self.walk_phoenix_file(image, &record, loc, "");
        node.push(directory);
        for (i, entry) in entries.iter().enumerate() {
            let volume = self.walk_phoenix_volume(image, i, entry);
            node.push(volume);
        }
        Walked {
            node,
            consumed: record.length,
        }
    }

    fn walk_phoenix_volume(&mut self, image: &[u8], ordinal: usize, entry: &VolumeEntry) -> Node {
        let dir = format!("V{}", ordinal);
        let region = entry.region(image.len());
        let span = Loc::image(region.base_offset).span(0, region.length);
        if let Err(e) = region.validate(image.len()) {
            return self.skipped(&dir, span, &ExtractError::OutOfBounds(e));
        }

        let kind = phoenix_volume_kind(&entry.guid).unwrap_or("VOL");
        let data = &image[region.base_offset..region.base_offset + region.length];
        let mut node = Node::new(
            NodeKind::PhoenixVolume,
            format!("{} {} {}", dir, kind, entry.guid),
            span,
        );
        self.observer.on_event(&WalkEvent::VolumeEntered {
            path: dir.clone(),
            offset: region.base_offset,
            length: region.length as u64,
        });

        if entry.is_ffv() {
            self.walk_phoenix_files(data, Loc::image(region.base_offset), &dir, &mut node);
        } else {
            self.emit_leaf(&mut node, format!("{}-{}.bin", dir, kind), kind, data);
        }
        node
    }

    fn walk_phoenix_files(&mut self, volume: &[u8], loc: Loc, dir: &str, parent: &mut Node) {
        let mut pos = 0;
        let mut files = 0;
        loop {
            pos += volume[pos..]
                .iter()
                .take_while(|&&b| b == 0x00 || b == 0xFF)
                .count();
            if pos >= volume.len() {
                break;
            }
            match decode_file_header(volume, pos, volume.len(), FileFormat::Phoenix) {
                DecodedFile::File(rec) => {
                    let child = self.walk_phoenix_file(volume, &rec, loc, dir);
                    parent.push(child);
                    files += 1;
                    pos = rec.end();
                }
                DecodedFile::Padding { length } => {
                    parent.push(Node::new(NodeKind::Padding, "GAP", loc.span(pos, length)));
                    pos += length;
                }
                DecodedFile::EndOfVolume => break,
                DecodedFile::Malformed { reason, .. } => {
                    let error = ExtractError::Malformed {
                        what: "FFV file",
                        offset: loc.at(pos),
                        reason,
                    };
                    let path = format!("{}/{:08X}", dir, loc.at(pos));
                    parent.push(self.skipped(&path, loc.span(pos, volume.len() - pos), &error));
                    break;
                }
            }
        }

        // Nothing recognisable: keep the raw bytes from the first non-gap byte.
        if files == 0 && pos < volume.len() {
            let name = format!("{}/{:08X}.bin", dir, loc.at(pos));
            let mut node = Node::new(NodeKind::Skipped, "unparsed", loc.span(pos, volume.len() - pos));
            self.emit_leaf(&mut node, name, "VOL", &volume[pos..]);
            parent.push(node);
        }
    }

    fn walk_phoenix_file(&mut self, volume: &[u8], rec: &FileRecord, loc: Loc, dir: &str) -> Node {
        let name = sanitize(&phoenix_name(&rec.name.0));
        let type_name: Cow<'static, str> = match phoenix_file_type_name(rec.raw_type) {
            Some(known) => known.into(),
            None => format!("{:02X}", rec.raw_type).into(),
        };
        let base = join(dir, &format!("{:08X}_{}", loc.at(rec.offset), name));
        let mut node = Node::new(
            NodeKind::File,
            format!("{} {}", name, type_name),
            loc.span(rec.offset, rec.length),
        );
        self.observer.on_event(&WalkEvent::FileVisited {
            path: base.clone(),
            offset: loc.at(rec.offset),
            file_type: type_name.to_string(),
            length: rec.length,
        });

        let payload = rec.payload(volume);
        if phoenix_file_is_sectioned(rec.raw_type) {
            self.walk_phoenix_sections(payload, loc.shift(rec.payload_start), &base, &mut node);
        } else {
            self.emit_leaf(&mut node, format!("{}.bin", base), &type_name, payload);
        }
        node
    }

    /// Phoenix sections are packed back to back and never nest.
    fn walk_phoenix_sections(&mut self, stream: &[u8], loc: Loc, base: &str, parent: &mut Node) {
        let mut offset = 0;
        let mut index = 0;
        while offset < stream.len() {
            let rec = match decode_section_header(stream, offset, SectionFormat::Phoenix) {
                DecodedSection::Section(rec) => rec,
                DecodedSection::EndOfStream => break,
                DecodedSection::Malformed(reason) => {
                    let error = ExtractError::Malformed {
                        what: "FFV section",
                        offset: loc.at(offset),
                        reason,
                    };
                    let path = format!("{}_S{}", base, index);
                    parent.push(self.skipped(&path, loc.span(offset, stream.len() - offset), &error));
                    break;
                }
            };

            let section_name = phoenix_section_name(rec.raw_type);
            let stem = format!("{}_S{}_{}", base, index, section_name);
            let mut node = Node::new(
                NodeKind::Section,
                section_name.to_string(),
                loc.span(rec.offset, rec.length),
            );
            self.observer.on_event(&WalkEvent::SectionVisited {
                path: stem.clone(),
                offset: loc.at(rec.offset),
                section_type: section_name.to_string(),
                length: rec.length,
            });

            let data = rec.data(stream);
            if rec.kind == SectionType::Compression {
                let declared = data
                    .get(4..8)
                    .map_or(0, |b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize);
                match self.decompressor.decompress(STANDARD_COMPRESSION, data, declared) {
                    Ok(out) => self.emit_leaf(&mut node, format!("{}.bin", stem), &section_name, &out),
                    Err(e) => {
                        let error = ExtractError::from(e);
                        self.diagnose(&mut node, &stem, Diagnostic::from_error(&error, loc.at(rec.offset)));
                        self.emit_leaf(&mut node, format!("{}.comp", stem), &section_name, data);
                    }
                }
            } else {
                self.emit_leaf(&mut node, format!("{}.bin", stem), &section_name, data);
            }

            parent.push(node);
            offset = rec.end();
            index += 1;
        }
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::Decompressor;
    use crate::error::DiagnosticKind;
    use crate::events::NullObserver;
    use crate::guid::{Guid, PHOENIX_SETUP};
    use crate::phoenix::{DIRECTORY_NAME, find_volume_directory};
    use crate::sink::MemorySink;
    use crate::test_support::{FOUR_A, phoenix_directory, phoenix_file, section};
    use crate::walker::WalkOptions;

    fn phoenix_image(ffv_guid: Guid) -> Vec<u8> {
        let entries = [(ffv_guid, 0x80u32, 0x60u32), (PHOENIX_SETUP, 0xE0, 0x10)];
        let mut image = phoenix_file(DIRECTORY_NAME, 0x01, &phoenix_directory(&entries));
        image.resize(0x80, 0xFF);

        let mut sections = section(0x10, b"MZ");
        sections.extend(section(0x01, &FOUR_A));
        image.extend(phoenix_file(b"SETUP", 0x01, b"flat"));
        image.extend([0xFF; 4]);
        image.extend(phoenix_file(b"DXECORE", 0x07, &sections));
        image.resize(0xE0, 0xFF);
        image.extend([0x5A; 0x10]);
        image
    }

    fn walk(image: &[u8]) -> (Walked, MemorySink) {
        let decompressor = Decompressor::default();
        let mut sink = MemorySink::new();
        let offset = find_volume_directory(image).unwrap();
        let walked = Walker::new(WalkOptions::default(), &decompressor, &mut sink, &NullObserver)
            .walk_phoenix_directory(image, offset);
        (walked, sink)
    }

    #[test]
    fn test_ffv_image_is_extracted() {
        let (walked, sink) = walk(&phoenix_image(Guid([0xBA; 16])));
        assert_eq!(
            sink.names(),
            vec![
                "00000000_volumedir.bin2.bin",
                "V0/00000080_SETUP.bin",
                "V0/000000A0_DXECORE_S0_PE32.bin",
                "V0/000000A0_DXECORE_S1_COMPRESSION.bin",
                "V1-SETUP.bin",
            ]
        );
        assert_eq!(sink.get("V0/00000080_SETUP.bin").unwrap().bytes, b"flat");
        assert_eq!(
            sink.get("V0/000000A0_DXECORE_S1_COMPRESSION.bin").unwrap().bytes,
            b"AAAA"
        );
        assert_eq!(sink.get("V1-SETUP.bin").unwrap().bytes, vec![0x5A; 0x10]);
        assert!(walked.node.all_diagnostics().is_empty());
    }

    #[test]
    fn test_non_ffv_volume_is_emitted_whole() {
        let image = phoenix_image(Guid([0x11; 16]));
        let (_, sink) = walk(&image);
        assert_eq!(sink.get("V0-VOL.bin").unwrap().bytes, &image[0x80..0xE0]);
    }

    #[test]
    fn test_failed_compression_keeps_compressed_bytes() {
        let mut image = phoenix_image(Guid([0xBA; 16]));
        // Corrupt the compressed size so it exceeds the section.
        let pos = 0xA0 + 24 + 6 + 4;
        image[pos] = 0x70;
        let (walked, sink) = walk(&image);
        let leaf = sink.get("V0/000000A0_DXECORE_S1_COMPRESSION.comp").unwrap();
        assert_eq!(leaf.bytes.len(), FOUR_A.len());
        assert!(!walked.node.all_diagnostics().is_empty());
    }

    #[test]
    fn test_volume_outside_image_is_skipped() {
        let entries = [(PHOENIX_SETUP, 0x1000u32, 0x10u32)];
        let image = phoenix_file(DIRECTORY_NAME, 0x01, &phoenix_directory(&entries));
        let (walked, _) = walk(&image);
        let skipped = &walked.node.children[1];
        assert_eq!(skipped.kind, NodeKind::Skipped);
        assert_eq!(skipped.diagnostics[0].kind, DiagnosticKind::OutOfBounds);
    }
}
