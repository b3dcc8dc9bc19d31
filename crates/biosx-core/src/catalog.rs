//! Type-byte catalogs for FFS files and sections.
//!
//! Lookups never fail: an unrecognized tag maps to an `Unknown(byte)` variant
//! so the walker can still emit the payload as an opaque blob.

use std::borrow::Cow;
use std::fmt;

use crate::guid::{
    self, Guid, PHOENIX_DMIV, PHOENIX_ESCD, PHOENIX_HOLE, PHOENIX_SETUP, PHOENIX_UEFIV,
};

/// FFS file type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    All,
    Raw,
    Freeform,
    SecurityCore,
    PeiCore,
    DxeCore,
    Peim,
    Driver,
    CombinedPeimDriver,
    Application,
    Smm,
    FirmwareVolumeImage,
    CombinedSmmDxe,
    SmmCore,
    SmmStandalone,
    SmmCoreStandalone,
    Oem(u8),
    Debug(u8),
    Pad,
    Unknown(u8),
}

impl FileType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::All,
            0x01 => Self::Raw,
            0x02 => Self::Freeform,
            0x03 => Self::SecurityCore,
            0x04 => Self::PeiCore,
            0x05 => Self::DxeCore,
            0x06 => Self::Peim,
            0x07 => Self::Driver,
            0x08 => Self::CombinedPeimDriver,
            0x09 => Self::Application,
            0x0A => Self::Smm,
            0x0B => Self::FirmwareVolumeImage,
            0x0C => Self::CombinedSmmDxe,
            0x0D => Self::SmmCore,
            0x0E => Self::SmmStandalone,
            0x0F => Self::SmmCoreStandalone,
            0xC0..=0xDF => Self::Oem(b),
            0xE0..=0xEF => Self::Debug(b),
            0xF0 => Self::Pad,
            _ => Self::Unknown(b),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::All => 0x00,
            Self::Raw => 0x01,
            Self::Freeform => 0x02,
            Self::SecurityCore => 0x03,
            Self::PeiCore => 0x04,
            Self::DxeCore => 0x05,
            Self::Peim => 0x06,
            Self::Driver => 0x07,
            Self::CombinedPeimDriver => 0x08,
            Self::Application => 0x09,
            Self::Smm => 0x0A,
            Self::FirmwareVolumeImage => 0x0B,
            Self::CombinedSmmDxe => 0x0C,
            Self::SmmCore => 0x0D,
            Self::SmmStandalone => 0x0E,
            Self::SmmCoreStandalone => 0x0F,
            Self::Pad => 0xF0,
            Self::Oem(b) | Self::Debug(b) | Self::Unknown(b) => *b,
        }
    }

    /// Short name used in the structural listing.
    pub fn name(&self) -> Cow<'static, str> {
        let s = match self {
            Self::All => "ALL",
            Self::Raw => "RAW",
            Self::Freeform => "FREE",
            Self::SecurityCore => "SECc",
            Self::PeiCore => "PEIc",
            Self::DxeCore => "DXEc",
            Self::Peim => "PEIM",
            Self::Driver => "DRVR",
            Self::CombinedPeimDriver => "CPDR",
            Self::Application => "APPL",
            Self::Smm => "SMM",
            Self::FirmwareVolumeImage => "FVIM",
            Self::CombinedSmmDxe => "CSMD",
            Self::SmmCore => "SMMc",
            Self::SmmStandalone => "SMMs",
            Self::SmmCoreStandalone => "SMcs",
            Self::Pad => "PAD",
            Self::Oem(b) => return Cow::Owned(format!("OEM{:02X}", b)),
            Self::Debug(b) => return Cow::Owned(format!("DBG{:02X}", b)),
            Self::Unknown(b) => return Cow::Owned(format!("??{:02X}", b)),
        };
        Cow::Borrowed(s)
    }

    /// Extension for files emitted as one flat blob.
    pub fn extension(&self) -> Cow<'static, str> {
        let s = match self {
            Self::All => "all",
            Self::Raw => "raw",
            Self::Freeform => "free",
            Self::SecurityCore => "seccore",
            Self::PeiCore => "peicore",
            Self::DxeCore => "dxecore",
            Self::Peim => "peim",
            Self::Driver => "drv",
            Self::CombinedPeimDriver => "comb_peim_drv",
            Self::Application => "app",
            Self::Smm => "smm",
            Self::FirmwareVolumeImage => "fd",
            Self::CombinedSmmDxe => "comb_smm_dxe",
            Self::SmmCore => "smmcore",
            Self::SmmStandalone => "smm_standalone",
            Self::SmmCoreStandalone => "smmcore_standalone",
            Self::Pad => "pad",
            Self::Oem(b) | Self::Debug(b) | Self::Unknown(b) => {
                return Cow::Owned(format!("unkn{:02x}", b));
            }
        };
        Cow::Borrowed(s)
    }

    /// Whether the payload is a section stream rather than one opaque blob.
    pub fn is_sectioned(&self) -> bool {
        !matches!(
            self,
            Self::All | Self::Raw | Self::Pad | Self::Oem(_) | Self::Debug(_) | Self::Unknown(_)
        )
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Section type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    Compression,
    GuidDefined,
    Disposable,
    Pe32,
    Pic,
    Te,
    DxeDepex,
    Version,
    UserInterface,
    Compatibility16,
    FirmwareVolumeImage,
    FreeformSubtypeGuid,
    Raw,
    PeiDepex,
    SmmDepex,
    Unknown(u8),
}

impl SectionType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => Self::Compression,
            0x02 => Self::GuidDefined,
            0x03 => Self::Disposable,
            0x10 => Self::Pe32,
            0x11 => Self::Pic,
            0x12 => Self::Te,
            0x13 => Self::DxeDepex,
            0x14 => Self::Version,
            0x15 => Self::UserInterface,
            0x16 => Self::Compatibility16,
            0x17 => Self::FirmwareVolumeImage,
            0x18 => Self::FreeformSubtypeGuid,
            0x19 => Self::Raw,
            0x1B => Self::PeiDepex,
            0x1C => Self::SmmDepex,
            _ => Self::Unknown(b),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Compression => 0x01,
            Self::GuidDefined => 0x02,
            Self::Disposable => 0x03,
            Self::Pe32 => 0x10,
            Self::Pic => 0x11,
            Self::Te => 0x12,
            Self::DxeDepex => 0x13,
            Self::Version => 0x14,
            Self::UserInterface => 0x15,
            Self::Compatibility16 => 0x16,
            Self::FirmwareVolumeImage => 0x17,
            Self::FreeformSubtypeGuid => 0x18,
            Self::Raw => 0x19,
            Self::PeiDepex => 0x1B,
            Self::SmmDepex => 0x1C,
            Self::Unknown(b) => *b,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    pub fn name(&self) -> Cow<'static, str> {
        let s = match self {
            Self::Compression => "COMPRESSION",
            Self::GuidDefined => "GUID_DEFINED",
            Self::Disposable => "DISPOSABLE",
            Self::Pe32 => "PE32",
            Self::Pic => "PIC",
            Self::Te => "TE",
            Self::DxeDepex => "DXE_DEPEX",
            Self::Version => "VERSION",
            Self::UserInterface => "USER_INTERFACE",
            Self::Compatibility16 => "COMPATIBILITY16",
            Self::FirmwareVolumeImage => "FIRMWARE_VOLUME_IMAGE",
            Self::FreeformSubtypeGuid => "FREEFORM_SUBTYPE_GUID",
            Self::Raw => "RAW",
            Self::PeiDepex => "PEI_DEPEX",
            Self::SmmDepex => "SMM_DEPEX",
            Self::Unknown(b) => return Cow::Owned(format!("UNKNOWN({:02X})", b)),
        };
        Cow::Borrowed(s)
    }

    pub fn extension(&self) -> Cow<'static, str> {
        let s = match self {
            Self::Compression => "comp",
            Self::GuidDefined => "guided",
            Self::Disposable => "disp",
            Self::Pe32 => "efi",
            Self::Pic => "pic.efi",
            Self::Te => "te",
            Self::DxeDepex => "dxe.depex",
            Self::Version => "ver",
            Self::UserInterface => "name",
            Self::Compatibility16 => "bios",
            Self::FirmwareVolumeImage => "fd",
            Self::FreeformSubtypeGuid => "guid",
            Self::Raw => "raw",
            Self::PeiDepex => "pei.depex",
            Self::SmmDepex => "smm.depex",
            Self::Unknown(b) => return Cow::Owned(format!("unknown.0x{:02x}.bin", b)),
        };
        Cow::Borrowed(s)
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Refine a RAW payload's extension by sniffing well-known image magics.
pub fn sniff_raw_extension(payload: &[u8]) -> &'static str {
    if payload.starts_with(b"\x89PNG\r\n\x1a\n") {
        "png"
    } else if payload.starts_with(b"icns") {
        "icns"
    } else {
        "raw"
    }
}

/// Symbolic name for a volume or section GUID, if it is a well-known one.
pub fn guid_name(value: &Guid) -> Option<&'static str> {
    let name = match *value {
        guid::FFS1 => "FFS1",
        guid::FFS2 => "FFS2",
        guid::FFS3 => "FFS3",
        guid::CRC32_SECTION => "CRC32",
        guid::LZMA_SECTION => "LZMA",
        guid::TIANO_SECTION => "TIANO",
        guid::EFI_CAPSULE => "EFI_CAPSULE",
        guid::INTEL_CAPSULE => "INTEL_CAPSULE",
        _ => return phoenix_volume_kind(value),
    };
    Some(name)
}

/// Phoenix volume directory entry kind.
pub fn phoenix_volume_kind(guid: &Guid) -> Option<&'static str> {
    match *guid {
        PHOENIX_ESCD => Some("ESCD"),
        PHOENIX_SETUP => Some("SETUP"),
        PHOENIX_UEFIV => Some("UEFIV"),
        PHOENIX_DMIV => Some("DMIV"),
        PHOENIX_HOLE => Some("HOLE"),
        _ if guid.0[0] == 0xBA => Some("FFV"),
        _ => None,
    }
}

/// Phoenix FFV file type names.
pub fn phoenix_file_type_name(b: u8) -> Option<&'static str> {
    Some(match b {
        0x00 => "ALL",
        0x01 => "BIN",
        0x02 => "SECTION",
        0x03 => "CEIMAIN",
        0x04 => "PEIMAIN",
        0x05 => "DXEMAIN",
        0x06 => "PEI",
        0x07 => "DXE",
        0x08 => "COMBINED_PEIM_DRIVER",
        0x09 => "APP",
        0x0B => "FFV",
        0xC2 => "CEI",
        0xC3 => "XIP",
        0xC4 => "BB",
        0xD0 => "SDXE",
        0xD1 => "DXESDXE",
        0xF0 => "GAP",
        _ => return None,
    })
}

/// Phoenix FFV file types whose payload is a section stream.
pub fn phoenix_file_is_sectioned(b: u8) -> bool {
    matches!(
        b,
        0x02 | 0x03 | 0x04 | 0x05 | 0x06 | 0x07 | 0xC2 | 0xC4 | 0xD0 | 0xD1
    )
}

/// Phoenix section names, a superset of the standard section table.
pub fn phoenix_section_name(b: u8) -> Cow<'static, str> {
    let s = match b {
        0x19 => "BIN",
        0x1A => "PE64",
        0xC0 => "SOURCECODE",
        0xC1 => "FFV",
        0xC2 => "RE32",
        0xC3 => "XIP16",
        0xC4 => "XIP32",
        0xC5 => "XIP64",
        0xC6 => "PLACE16",
        0xC7 => "PLACE32",
        0xC8 => "PLACE64",
        0xCF => "PCI_DEVICE",
        0xD0 => "PDB",
        _ => return SectionType::from_byte(b).name(),
    };
    Cow::Borrowed(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_byte_mapping() {
        for b in 0..=0xFFu8 {
            assert_eq!(FileType::from_byte(b).as_byte(), b);
        }
        assert_eq!(FileType::from_byte(0x01), FileType::Raw);
        assert!(!FileType::Raw.is_sectioned());
        assert!(FileType::Driver.is_sectioned());
        assert_eq!(FileType::from_byte(0x42), FileType::Unknown(0x42));
        assert_eq!(FileType::from_byte(0x42).extension(), "unkn42");
    }

    #[test]
    fn test_section_type_byte_mapping() {
        for b in 0..=0xFFu8 {
            assert_eq!(SectionType::from_byte(b).as_byte(), b);
        }
        assert_eq!(SectionType::from_byte(0x10).extension(), "efi");
        assert_eq!(SectionType::from_byte(0x1F), SectionType::Unknown(0x1F));
        assert_eq!(
            SectionType::Unknown(0x1F).extension(),
            "unknown.0x1f.bin"
        );
    }

    #[test]
    fn test_sniff_raw() {
        assert_eq!(sniff_raw_extension(b"\x89PNG\r\n\x1a\n...."), "png");
        assert_eq!(sniff_raw_extension(b"icns\x00\x00"), "icns");
        assert_eq!(sniff_raw_extension(b"BBBB"), "raw");
    }

    #[test]
    fn test_phoenix_tables() {
        assert_eq!(phoenix_volume_kind(&PHOENIX_SETUP), Some("SETUP"));
        let mut ffv = [0u8; 16];
        ffv[0] = 0xBA;
        assert_eq!(phoenix_volume_kind(&Guid(ffv)), Some("FFV"));
        assert_eq!(phoenix_volume_kind(&Guid([0x11; 16])), None);
        assert_eq!(phoenix_section_name(0xC3), "XIP16");
        assert_eq!(phoenix_section_name(0x10), "PE32");
        assert!(phoenix_file_is_sectioned(0xC4));
        assert!(!phoenix_file_is_sectioned(0x01));
    }
}
