//! Byte-oriented LZSS with a 4 KiB ring buffer.
//!
//! Each control byte covers eight items, least significant bit first:
//! a set bit is a literal byte, a clear bit a two-byte back-reference
//! carrying a 12-bit ring position and a 4-bit length. The ring is indexed
//! by output position and starts zeroed.

use super::{DecompressError, LegacyCodec};

const RING_SIZE: usize = 4096;
const RING_BIAS: usize = 0xFEE;
const MIN_MATCH: usize = 3;

pub struct LzssCodec;

impl LegacyCodec for LzssCodec {
    fn name(&self) -> &'static str {
        "lzss"
    }

    fn decode(&self, compressed: &[u8], declared_len: usize) -> Result<Vec<u8>, DecompressError> {
        Ok(decompress(compressed, declared_len))
    }
}

/// Decode until the input runs out or `limit` bytes are produced (0 means no limit).
pub fn decompress(src: &[u8], limit: usize) -> Vec<u8> {
    let mut ring = [0u8; RING_SIZE];
    let mut out = Vec::with_capacity(if limit > 0 { limit } else { src.len() * 2 });
    let full = |out: &Vec<u8>| limit > 0 && out.len() >= limit;
    let mut input = src.iter().copied();

    'outer: while let Some(control) = input.next() {
        for bit in 0..8 {
            if full(&out) {
                break 'outer;
            }
            if control & (1 << bit) != 0 {
                let Some(b) = input.next() else {
                    break 'outer;
                };
                ring[out.len() % RING_SIZE] = b;
                out.push(b);
            } else {
                let (Some(b0), Some(b1)) = (input.next(), input.next()) else {
                    break 'outer;
                };
                let raw = b0 as usize | ((b1 as usize & 0xF0) << 4);
                let mut pos = raw.wrapping_sub(RING_BIAS) & (RING_SIZE - 1);
                let len = (b1 & 0x0F) as usize + MIN_MATCH;
                for _ in 0..len {
                    if full(&out) {
                        break 'outer;
                    }
                    let b = ring[pos % RING_SIZE];
                    ring[out.len() % RING_SIZE] = b;
                    out.push(b);
                    pos += 1;
                }
            }
        }
    }
    out
}
