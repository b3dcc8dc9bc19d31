//! Section headers (`EFI_COMMON_SECTION_HEADER` and its typed extensions).

use crate::catalog::SectionType;
use crate::cursor::ByteCursor;
use crate::error::ExtractError;
use crate::guid::Guid;

use super::{LENGTH_MASK, PackedOrder, SectionFormat};

pub const SECTION_HEADER_SIZE: usize = 4;
/// Header size when the 24-bit length is saturated and a 32-bit size follows.
pub const EXTENDED_SECTION_HEADER_SIZE: usize = 8;

/// `SectionDefinitionGuid`, `DataOffset` and `Attributes`.
pub const GUID_DEFINED_FIELDS: usize = 20;
/// `UncompressedLength` and `CompressionType`.
pub const COMPRESSION_FIELDS: usize = 5;

pub const GUIDED_PROCESSING_REQUIRED: u16 = 0x01;
pub const GUIDED_AUTH_STATUS_VALID: u16 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Plain,
    GuidDefined {
        guid: Guid,
        /// Offset of the wrapped data from the start of the section.
        data_offset: usize,
        attributes: u16,
    },
    Compression {
        uncompressed_len: u32,
        compression_type: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRecord {
    pub raw_type: u8,
    pub kind: SectionType,
    pub offset: usize,
    pub header_len: usize,
    /// Declared length, header included.
    pub length: usize,
    pub body: SectionBody,
    /// The other packed-word byte order would also have produced a plausible header.
    pub ambiguous: bool,
}

impl SectionRecord {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Payload bytes, after the common header and any typed fields.
    pub fn data<'a>(&self, stream: &'a [u8]) -> &'a [u8] {
        let start = match &self.body {
            SectionBody::Plain => self.header_len,
            SectionBody::GuidDefined { data_offset, .. } => *data_offset,
            SectionBody::Compression { .. } => self.header_len + COMPRESSION_FIELDS,
        };
        &stream[self.offset + start..self.end()]
    }

    /// Bytes between the GUID-defined fields and `data_offset`.
    pub fn guid_specific_header<'a>(&self, stream: &'a [u8]) -> &'a [u8] {
        match &self.body {
            SectionBody::GuidDefined { data_offset, .. } => {
                &stream[self.offset + self.header_len + GUID_DEFINED_FIELDS
                    ..self.offset + *data_offset]
            }
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedSection {
    Section(SectionRecord),
    /// No further sections: the stream is exhausted or only padding remains.
    EndOfStream,
    Malformed(String),
}

pub fn decode_section_header(data: &[u8], offset: usize, format: SectionFormat) -> DecodedSection {
    if data.len().saturating_sub(offset) < SECTION_HEADER_SIZE {
        return DecodedSection::EndOfStream;
    }
    match decode(data, offset, format) {
        Ok(decoded) => decoded,
        Err(e) => DecodedSection::Malformed(e.to_string()),
    }
}

fn decode(data: &[u8], offset: usize, format: SectionFormat) -> Result<DecodedSection, ExtractError> {
    let cur = ByteCursor::new(data);
    let word = cur.read_u32_le(offset)?;
    if word == 0 || word == u32::MAX {
        let rest = &data[offset..];
        if rest.iter().all(|&b| b == 0xFF) || rest.iter().all(|&b| b == 0x00) {
            return Ok(DecodedSection::EndOfStream);
        }
    }

    let (order, uefi) = match format {
        SectionFormat::Uefi(order) => (order, true),
        SectionFormat::Phoenix => (PackedOrder::LenThenType, false),
    };
    let (len24, raw_type) = order.decode(word);
    let (header_len, length) = if uefi && len24 == LENGTH_MASK {
        (
            EXTENDED_SECTION_HEADER_SIZE,
            cur.read_u32_le(offset + SECTION_HEADER_SIZE)? as usize,
        )
    } else {
        (SECTION_HEADER_SIZE, len24 as usize)
    };

    let malformed = |reason: String| ExtractError::Malformed {
        what: "section",
        offset,
        reason,
    };
    if length < header_len {
        return Err(malformed(format!(
            "declared length 0x{:X} below header size",
            length
        )));
    }
    if offset + length > data.len() {
        return Err(malformed(format!(
            "declared length 0x{:X} runs past stream end 0x{:X}",
            length,
            data.len()
        )));
    }

    let kind = SectionType::from_byte(raw_type);
    let fields = offset + header_len;
    let body = match kind {
        SectionType::GuidDefined if uefi => {
            if length < header_len + GUID_DEFINED_FIELDS {
                return Err(malformed("GUID-defined section too short".into()));
            }
            let guid = Guid(cur.read_array::<16>(fields)?);
            let data_offset = cur.read_u16_le(fields + 16)? as usize;
            let attributes = cur.read_u16_le(fields + 18)?;
            if data_offset < header_len + GUID_DEFINED_FIELDS || data_offset > length {
                return Err(malformed(format!(
                    "GUID-defined data offset 0x{:X} outside section",
                    data_offset
                )));
            }
            SectionBody::GuidDefined {
                guid,
                data_offset,
                attributes,
            }
        }
        SectionType::Compression if uefi => {
            if length < header_len + COMPRESSION_FIELDS {
                return Err(malformed("compression section too short".into()));
            }
            SectionBody::Compression {
                uncompressed_len: cur.read_u32_le(fields)?,
                compression_type: cur.read_u8(fields + 4)?,
            }
        }
        _ => SectionBody::Plain,
    };

    let ambiguous = uefi && plausible(order.other(), word, (len24, raw_type), data.len() - offset);

    Ok(DecodedSection::Section(SectionRecord {
        raw_type,
        kind,
        offset,
        header_len,
        length,
        body,
        ambiguous,
    }))
}

/// Whether `order` yields a different, well-formed header for `word`.
fn plausible(order: PackedOrder, word: u32, chosen: (u32, u8), remaining: usize) -> bool {
    let (len, kind) = order.decode(word);
    (len, kind) != chosen
        && len as usize >= SECTION_HEADER_SIZE
        && len as usize <= remaining
        && SectionType::from_byte(kind).is_known()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::CRC32_SECTION;
    use crate::test_support::{compression_section, guid_section, section};

    const UEFI: SectionFormat = SectionFormat::Uefi(PackedOrder::LenThenType);

    #[test]
    fn test_plain_section() {
        let s = section(0x19, b"BBBBBBBB");
        let DecodedSection::Section(rec) = decode_section_header(&s, 0, UEFI) else {
            panic!("expected a section");
        };
        assert_eq!(rec.kind, SectionType::Raw);
        assert_eq!(rec.length, 12);
        assert_eq!(rec.data(&s), b"BBBBBBBB");
        assert!(!rec.ambiguous);
    }

    #[test]
    fn test_extended_size() {
        let mut s = vec![0xFF, 0xFF, 0xFF, 0x19];
        s.extend(12u32.to_le_bytes());
        s.extend(b"RAW!");
        let DecodedSection::Section(rec) = decode_section_header(&s, 0, UEFI) else {
            panic!("expected a section");
        };
        assert_eq!(rec.header_len, EXTENDED_SECTION_HEADER_SIZE);
        assert_eq!(rec.data(&s), b"RAW!");
    }

    #[test]
    fn test_guid_defined_fields() {
        let s = guid_section(CRC32_SECTION, &0x1234u32.to_le_bytes(), b"inner");
        let DecodedSection::Section(rec) = decode_section_header(&s, 0, UEFI) else {
            panic!("expected a section");
        };
        match rec.body {
            SectionBody::GuidDefined {
                guid, data_offset, ..
            } => {
                assert_eq!(guid, CRC32_SECTION);
                assert_eq!(data_offset, 28);
            }
            ref other => panic!("unexpected body {:?}", other),
        }
        assert_eq!(rec.guid_specific_header(&s), &0x1234u32.to_le_bytes());
        assert_eq!(rec.data(&s), b"inner");
    }

    #[test]
    fn test_compression_fields() {
        let s = compression_section(0, 3, b"abc");
        let DecodedSection::Section(rec) = decode_section_header(&s, 0, UEFI) else {
            panic!("expected a section");
        };
        assert_eq!(
            rec.body,
            SectionBody::Compression {
                uncompressed_len: 3,
                compression_type: 0
            }
        );
        assert_eq!(rec.data(&s), b"abc");
    }

    #[test]
    fn test_padding_ends_stream() {
        assert_eq!(
            decode_section_header(&[0xFF; 12], 0, UEFI),
            DecodedSection::EndOfStream
        );
        assert_eq!(
            decode_section_header(&[0x00; 8], 0, UEFI),
            DecodedSection::EndOfStream
        );
        assert_eq!(
            decode_section_header(&[0x19, 0x00], 0, UEFI),
            DecodedSection::EndOfStream
        );
    }

    #[test]
    fn test_bad_lengths_are_malformed() {
        assert!(matches!(
            decode_section_header(&[0x02, 0x00, 0x00, 0x19], 0, UEFI),
            DecodedSection::Malformed(_)
        ));
        assert!(matches!(
            decode_section_header(&[0x40, 0x00, 0x00, 0x19, 0, 0, 0, 0], 0, UEFI),
            DecodedSection::Malformed(_)
        ));
    }

    #[test]
    fn test_type_then_len_order() {
        let order = PackedOrder::TypeThenLen;
        let mut s = order.encode(8, 0x19).to_le_bytes().to_vec();
        s.extend(b"DATA");
        let DecodedSection::Section(rec) = decode_section_header(&s, 0, SectionFormat::Uefi(order))
        else {
            panic!("expected a section");
        };
        assert_eq!(rec.kind, SectionType::Raw);
        assert_eq!(rec.data(&s), b"DATA");
    }

    #[test]
    fn test_ambiguous_word_is_flagged() {
        let mut s = vec![0x10, 0x00, 0x00, 0x10];
        s.resize(0x10, 0xAA);
        let DecodedSection::Section(rec) = decode_section_header(&s, 0, UEFI) else {
            panic!("expected a section");
        };
        assert_eq!(rec.kind, SectionType::Pe32);
        assert!(!rec.ambiguous);

        // 0x1010-byte type-0 section, or a 0x10-byte PE32 section the other way round.
        let mut s = vec![0x10, 0x10, 0x00, 0x00];
        s.resize(0x1100, 0xAA);
        let DecodedSection::Section(rec) = decode_section_header(&s, 0, UEFI) else {
            panic!("expected a section");
        };
        assert_eq!(rec.kind, SectionType::Unknown(0));
        assert_eq!(rec.length, 0x1010);
        assert!(rec.ambiguous);
    }
}
