//! Builders for synthetic firmware images used by the unit tests.

use crate::guid::{CRC32_SECTION, FFS2, FV_SIGNATURE, Guid};
use crate::record::file::file_header_checksum;
use crate::record::section::GUIDED_PROCESSING_REQUIRED;
use crate::record::volume::header_checksum;
use crate::record::{PackedOrder, align4, align8};

pub const TEST_GUID_A: Guid = Guid::from_fields(
    0x11111111,
    0x2222,
    0x3333,
    [0x44, 0x44, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55],
);

pub const TEST_GUID_B: Guid = Guid::from_fields(
    0xAAAAAAAA,
    0xBBBB,
    0xCCCC,
    [0xDD, 0xDD, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE],
);

pub const VOLUME_HEADER_LEN: usize = 0x48;

/// FFS file with a 24-byte header and a valid header checksum.
pub fn ffs_file(name: Guid, file_type: u8, payload: &[u8]) -> Vec<u8> {
    let length = 24 + payload.len();
    let mut out = Vec::with_capacity(length);
    out.extend_from_slice(&name.0);
    out.extend_from_slice(&[0x00, 0xAA, file_type, 0x00]);
    out.extend_from_slice(&(length as u32).to_le_bytes()[..3]);
    out.push(0xF8);
    out[0x10] = 0u8.wrapping_sub(file_header_checksum(&out));
    out.extend_from_slice(payload);
    out
}

/// FFS3 large file: `EFI_FFS_FILE_HEADER2` with the size in the 64-bit field.
pub fn ffs3_large_file(name: Guid, file_type: u8, payload: &[u8]) -> Vec<u8> {
    let length = 32 + payload.len();
    let mut out = Vec::with_capacity(length);
    out.extend_from_slice(&name.0);
    out.extend_from_slice(&[0x00, 0xAA, file_type, 0x01]);
    out.extend_from_slice(&[0x00, 0x00, 0x00, 0xF8]);
    out.extend_from_slice(&(length as u64).to_le_bytes());
    out[0x10] = 0u8.wrapping_sub(file_header_checksum(&out));
    out.extend_from_slice(payload);
    out
}

/// Phoenix FFV file: `{state, attributes, reserved[2], size[3], type, name[16]}`.
pub fn phoenix_file(name: &[u8], file_type: u8, payload: &[u8]) -> Vec<u8> {
    let length = 24 + payload.len();
    let mut out = vec![0xF8, 0x00, 0x00, 0x00];
    out.extend_from_slice(&(length as u32).to_le_bytes()[..3]);
    out.push(file_type);
    let mut padded = [0u8; 16];
    padded[..name.len()].copy_from_slice(name);
    out.extend_from_slice(&padded);
    out.extend_from_slice(payload);
    out
}

/// FFS2 volume of `length` bytes holding `files` at 8-byte aligned offsets,
/// the rest erased to `0xFF`.
pub fn volume(files: &[Vec<u8>], length: usize) -> Vec<u8> {
    volume_with(FFS2, files, length)
}

/// Like [`volume`], with `file_system` as the volume's file-system GUID.
pub fn volume_with(file_system: Guid, files: &[Vec<u8>], length: usize) -> Vec<u8> {
    let mut out = vec![0u8; VOLUME_HEADER_LEN];
    out[0x10..0x20].copy_from_slice(&file_system.0);
    out[0x20..0x28].copy_from_slice(&(length as u64).to_le_bytes());
    out[0x28..0x2C].copy_from_slice(FV_SIGNATURE);
    out[0x2C..0x30].copy_from_slice(&0x0004_FEFFu32.to_le_bytes());
    out[0x30..0x32].copy_from_slice(&(VOLUME_HEADER_LEN as u16).to_le_bytes());
    out[0x37] = 2;
    out[0x38..0x3C].copy_from_slice(&1u32.to_le_bytes());
    out[0x3C..0x40].copy_from_slice(&(length as u32).to_le_bytes());
    let sum = header_checksum(&out);
    out[0x32..0x34].copy_from_slice(&0u16.wrapping_sub(sum).to_le_bytes());

    for file in files {
        out.resize(align8(out.len()), 0xFF);
        out.extend_from_slice(file);
    }
    assert!(out.len() <= length, "files overflow the volume");
    out.resize(length, 0xFF);
    out
}

pub fn section(section_type: u8, body: &[u8]) -> Vec<u8> {
    let word = PackedOrder::LenThenType.encode((4 + body.len()) as u32, section_type);
    let mut out = word.to_le_bytes().to_vec();
    out.extend_from_slice(body);
    out
}

pub fn ui_section(name: &str) -> Vec<u8> {
    let mut body: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    body.extend_from_slice(&[0, 0]);
    section(0x15, &body)
}

/// Concatenate sections, zero-padding each to 4-byte alignment.
pub fn section_stream(sections: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for s in sections {
        out.resize(align4(out.len()), 0x00);
        out.extend_from_slice(s);
    }
    out
}

/// GUID-defined section; `guid_header` sits between the fixed fields and the data.
pub fn guid_section(guid: Guid, guid_header: &[u8], data: &[u8]) -> Vec<u8> {
    let data_offset = (4 + 20 + guid_header.len()) as u16;
    let mut body = guid.0.to_vec();
    body.extend_from_slice(&data_offset.to_le_bytes());
    body.extend_from_slice(&GUIDED_PROCESSING_REQUIRED.to_le_bytes());
    body.extend_from_slice(guid_header);
    body.extend_from_slice(data);
    section(0x02, &body)
}

pub fn crc32_section(inner: &[u8]) -> Vec<u8> {
    guid_section(CRC32_SECTION, &crc32fast::hash(inner).to_le_bytes(), inner)
}

pub fn compression_section(compression_type: u8, uncompressed_len: u32, data: &[u8]) -> Vec<u8> {
    let mut body = uncompressed_len.to_le_bytes().to_vec();
    body.push(compression_type);
    body.extend_from_slice(data);
    section(0x01, &body)
}

pub fn capsule(guid: Guid, body: &[u8]) -> Vec<u8> {
    let mut out = guid.0.to_vec();
    out.extend_from_slice(&0x1Cu32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&((0x1C + body.len()) as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// "Hello, World!" as a raw LZMA stream (13-byte header, unknown size).
pub const LZMA_HELLO: [u8; 37] = [
    0x5D, 0x00, 0x00, 0x80, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x24,
    0x19, 0x49, 0x98, 0x6F, 0x16, 0x02, 0x89, 0x0A, 0x98, 0xE7, 0x3F, 0xA8, 0xC3, 0x95, 0x48,
    0x4D, 0xFF, 0xFF, 0x75, 0xF0, 0x00, 0x00,
];

/// Phoenix volume directory payload for `(guid, start, size)` entries.
pub fn phoenix_directory(entries: &[(Guid, u32, u32)]) -> Vec<u8> {
    let mut out = vec![0x00, 0x00];
    out.extend_from_slice(&8u16.to_le_bytes());
    out.extend_from_slice(&((entries.len() * 0x18) as u32).to_le_bytes());
    for (guid, start, size) in entries {
        out.extend_from_slice(&guid.0);
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
    }
    out
}

/// A RAW section holding "Hi", LZMA compressed (13-byte header, unknown size).
pub const LZMA_RAW_SECTION: [u8; 29] = [
    0x5D, 0x00, 0x00, 0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x03,
    0x00, 0x32, 0x73, 0x57, 0xA6, 0x03, 0x24, 0x6B, 0xFF, 0xFF, 0xDC, 0x05, 0x00, 0x00,
];

/// Lines held by the RAW section inside [`EFI_SECTIONS`].
pub fn setup_text() -> String {
    (0..12)
        .map(|i| format!("Setup variable {:02} = {:04X}\n", i, i * 0x111))
        .collect()
}

/// Lines held by the RAW section inside [`TIANO_SECTIONS`].
pub fn shell_text() -> String {
    (0..8)
        .map(|i| format!("Shell command {}: echo {}\n", i, "ab".repeat(i)))
        .collect()
}

/// EFI-compressed section stream: RAW `setup_text()` then UI "Setup", four blocks.
pub const EFI_SECTIONS: [u8; 158] = [
    0x96, 0x00, 0x00, 0x00, 0x40, 0x01, 0x00, 0x00, 0x00, 0x20, 0x43, 0x56, 0xB0, 0xC3, 0x89,
    0x55, 0xA3, 0xEB, 0x3F, 0xFA, 0x1E, 0x00, 0xAA, 0xE6, 0xDD, 0x03, 0x64, 0x0C, 0xC3, 0xC7,
    0x52, 0x8E, 0x60, 0x01, 0x04, 0x46, 0x13, 0xAB, 0x6F, 0x99, 0x4E, 0xAE, 0xAE, 0xB6, 0xC3,
    0x20, 0x09, 0x4F, 0x00, 0x24, 0xF8, 0x3F, 0xC1, 0x20, 0x04, 0x07, 0x0D, 0xAC, 0xB8, 0x7D,
    0x0E, 0xFE, 0x15, 0x6C, 0x93, 0xA4, 0x00, 0x03, 0x65, 0x71, 0xA3, 0xF7, 0x8F, 0xFF, 0x9E,
    0x2B, 0x0A, 0x49, 0x02, 0x9E, 0x46, 0xDB, 0x11, 0xCC, 0xF2, 0x48, 0x3C, 0xBA, 0x2B, 0x6D,
    0x22, 0xA0, 0x04, 0x08, 0x09, 0xC9, 0xA8, 0x7F, 0x1A, 0x0A, 0xC0, 0xC8, 0x25, 0x44, 0xFF,
    0x2A, 0x9E, 0x3C, 0xC8, 0x00, 0x02, 0x01, 0x0E, 0xB8, 0x01, 0x2B, 0x8B, 0xC7, 0x24, 0xCC,
    0x74, 0xF8, 0x12, 0x5F, 0xE0, 0xF6, 0xFC, 0xDD, 0xDC, 0x46, 0xFC, 0xE6, 0x67, 0x3B, 0x54,
    0x00, 0x1A, 0x70, 0x98, 0xC2, 0x47, 0x6F, 0x80, 0x16, 0x14, 0xC7, 0x43, 0xC0, 0x28, 0x06,
    0x6B, 0x91, 0x5E, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Tiano-compressed section stream: RAW `shell_text()` then UI "Shell", three blocks.
pub const TIANO_SECTIONS: [u8; 115] = [
    0x6B, 0x00, 0x00, 0x00, 0x04, 0x01, 0x00, 0x00, 0x00, 0x20, 0x44, 0x4E, 0x89, 0x43, 0x11,
    0xA2, 0xE0, 0xFC, 0xCA, 0x16, 0xC0, 0x48, 0xA6, 0x67, 0xB9, 0x01, 0x67, 0x1C, 0x23, 0x20,
    0xE0, 0x17, 0xA4, 0x55, 0xCB, 0x2B, 0xB8, 0x49, 0x88, 0x3E, 0x6C, 0x5B, 0x01, 0x51, 0xA4,
    0x53, 0xED, 0x7F, 0x31, 0xE8, 0x00, 0x81, 0x0D, 0xB6, 0xD8, 0x62, 0x3F, 0xB8, 0xA2, 0xC0,
    0x80, 0x30, 0x1D, 0x79, 0x22, 0x83, 0x1F, 0xFA, 0x92, 0x22, 0x74, 0xF4, 0x24, 0x30, 0x01,
    0x6D, 0xBA, 0x25, 0xC4, 0x0A, 0x9F, 0x54, 0x5B, 0xD3, 0xCC, 0x32, 0xD5, 0x77, 0x1B, 0x7B,
    0x14, 0x07, 0x35, 0x7F, 0xD1, 0x37, 0x7F, 0x04, 0xA3, 0x85, 0xA5, 0x95, 0xB6, 0x88, 0x00,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// EFI-compressed "AAAA".
pub const FOUR_A: [u8; 22] = [
    0x0E, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x02, 0x20, 0x04, 0x30, 0x10, 0xB6,
    0x55, 0x40, 0x10, 0x00, 0x00, 0x00, 0x00,
];

/// Two-block Tiano stream produced by the EDK2 compressor (41028 bytes out).
pub fn edk2_tiano() -> &'static [u8] {
    include_bytes!("../testdata/edk2_tiano.bin")
}
