//! Output name synthesis.
//!
//! Names are `/`-separated paths: one directory per top-level container,
//! `<stem>-<index>.<ext>` for section leaves and `file-<GUID>.<ext>` for
//! flat files.

use crate::guid::Guid;

/// Naming state handed down to a section stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub dir: String,
    /// Stem used when no UI name applies, normally `file-<GUID>`.
    pub stem: String,
    /// UI name inherited from an enclosing stream.
    pub override_name: Option<String>,
}

impl Scope {
    pub fn new(dir: impl Into<String>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            override_name: None,
        }
    }

    pub fn with_override(&self, name: Option<String>) -> Self {
        Self {
            override_name: name.or_else(|| self.override_name.clone()),
            ..self.clone()
        }
    }

    pub fn effective_stem(&self) -> &str {
        self.override_name.as_deref().unwrap_or(&self.stem)
    }

    pub fn leaf(&self, index: usize, ext: &str) -> String {
        format!("{}/{}-{}.{}", self.dir, self.effective_stem(), index, ext)
    }

    /// Directory for a volume nested at `index` in this stream.
    pub fn nested_volume_dir(&self, index: usize) -> String {
        format!("{}/{}-{}.fv", self.dir, self.effective_stem(), index)
    }
}

pub fn volume_dir(offset: usize) -> String {
    format!("vol-{:08x}", offset)
}

pub fn capsule_dir(offset: usize) -> String {
    format!("capsule-{:08x}", offset)
}

pub fn file_stem(name: &Guid) -> String {
    format!("file-{}", name)
}

pub fn flat_file(dir: &str, name: &Guid, ext: &str) -> String {
    format!("{}/{}.{}", dir, file_stem(name), ext)
}

/// Replace path separators, shell metacharacters and control characters with `_`.
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        s => s.to_string(),
    }
}

/// Decode a USER_INTERFACE payload: UTF-16LE up to the first NUL.
pub fn decode_ui_name(payload: &[u8]) -> Option<String> {
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    let name = String::from_utf16_lossy(&units);
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(sanitize(name))
    }
}

/// Render a 16-byte Phoenix file name field.
///
/// An `0xFF` at byte 8 marks a printable name split around it; a plain
/// alphanumeric name is used as is; anything else is shown as a GUID.
pub fn phoenix_name(raw: &[u8; 16]) -> String {
    let trimmed = trim_nuls(raw);
    if raw[8] == 0xFF {
        let mut joined = trimmed[..trimmed.len().min(8)].to_vec();
        if trimmed.len() > 9 {
            joined.extend_from_slice(&trimmed[9..]);
        }
        return String::from_utf8_lossy(trim_nuls(&joined)).into_owned();
    }
    if !trimmed.is_empty() && trimmed.iter().all(|b| b.is_ascii_alphanumeric()) {
        return String::from_utf8_lossy(trimmed).into_owned();
    }
    Guid(*raw).to_string()
}

fn trim_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}
