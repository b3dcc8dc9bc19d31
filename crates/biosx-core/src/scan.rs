//! Locating top-level containers inside a raw image.

use serde::{Deserialize, Serialize};

use crate::cursor::find_bytes;
use crate::guid::{EFI_CAPSULE, FV_SIGNATURE, INTEL_CAPSULE};
use crate::record::{VolumeProbe, decode_capsule_header, probe_volume};

/// Offset of `_FVH` inside a volume header.
const SIGNATURE_OFFSET: usize = 0x28;

/// How to find the next candidate after a position that holds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStrategy {
    /// Jump to the next `_FVH` signature or capsule GUID.
    #[default]
    Signature,
    /// Step to the next multiple of a fixed stride.
    Stride,
}

/// Outcome of a scan step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan<T> {
    /// Nothing here; keep looking.
    Continue,
    Found(T),
    /// Nothing more to find.
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate {
    /// A run of erased `0xFF` bytes, skipped whole.
    Padding { offset: usize, length: usize },
    Volume { offset: usize },
    Capsule { offset: usize },
}

/// Classify the bytes at `pos`.
pub fn probe_at(image: &[u8], pos: usize) -> Scan<Candidate> {
    let Some(rest) = image.get(pos..).filter(|r| !r.is_empty()) else {
        return Scan::Abandon;
    };
    if let Ok(Some(_)) = decode_capsule_header(rest) {
        return Scan::Found(Candidate::Capsule { offset: pos });
    }
    match probe_volume(rest) {
        VolumeProbe::Volume(_) => Scan::Found(Candidate::Volume { offset: pos }),
        VolumeProbe::Padding(length) => Scan::Found(Candidate::Padding {
            offset: pos,
            length,
        }),
        VolumeProbe::Invalid(_) => Scan::Continue,
    }
}

/// Next position worth probing after a miss at `pos`.
pub fn next_candidate(
    image: &[u8],
    pos: usize,
    strategy: ScanStrategy,
    stride: usize,
) -> Option<usize> {
    match strategy {
        ScanStrategy::Signature => {
            let volume = find_bytes(image, FV_SIGNATURE, pos + SIGNATURE_OFFSET + 1)
                .map(|hit| hit - SIGNATURE_OFFSET);
            let capsule = [EFI_CAPSULE, INTEL_CAPSULE]
                .iter()
                .filter_map(|g| find_bytes(image, &g.0, pos + 1))
                .min();
            match (volume, capsule) {
                (Some(v), Some(c)) => Some(v.min(c)),
                (v, c) => v.or(c),
            }
        }
        ScanStrategy::Stride => {
            let stride = stride.max(1);
            let next = (pos / stride + 1) * stride;
            (next < image.len()).then_some(next)
        }
    }
}

/// First container at or after `from`, skipping padding.
pub fn first_container(
    image: &[u8],
    from: usize,
    strategy: ScanStrategy,
    stride: usize,
) -> Option<Candidate> {
    let mut pos = from;
    loop {
        match probe_at(image, pos) {
            Scan::Found(Candidate::Padding { length, .. }) => pos += length,
            Scan::Found(found) => return Some(found),
            Scan::Continue => pos = next_candidate(image, pos, strategy, stride)?,
            Scan::Abandon => return None,
        }
    }
}
