//! Escape-coded packet framing.
//!
//! ```text
//! ┌──────────┬──────────┬─────┬────────────┬──────┬──────┐
//! │ s0 lo hi │ s1 lo hi │ ... │ sN-1 lo hi │ 0xFF │ 0xFF │
//! └──────────┴──────────┴─────┴────────────┴──────┴──────┘
//! ```
//!
//! The terminator is the only place two `0xFF` bytes may follow each other:
//! 12-bit samples never have `0xFF` as their high byte, and the one value that
//! would collide (`0xFFFF`) is replaced by [`SENTINEL_WORD`] before sending.
//! That substitution loses the sample's exact value.
//!
//! Encoding and decoding are plain functions over slices so they can be
//! tested without any serial I/O.

use crate::constants::{SENTINEL_WORD, TERMINATOR, TERMINATOR_BYTE, TERMINATOR_WORD};
use crate::error::EncodeError;

/// Encoded size of a packet carrying `samples` samples.
pub const fn packet_len(samples: usize) -> usize {
    samples * 2 + TERMINATOR.len()
}

/// Whether `sample` has to be substituted before it can go on the wire.
#[inline]
pub const fn collides(sample: u16) -> bool {
    sample == TERMINATOR_WORD
}

/// Little-endian bytes for one sample, with terminator substitution applied.
#[inline]
pub fn encode_sample(sample: u16) -> [u8; 2] {
    let word = if collides(sample) { SENTINEL_WORD } else { sample };
    word.to_le_bytes()
}

/// Encode `samples` followed by the terminator into `out`.
///
/// Returns the number of bytes written (`packet_len(samples.len())`).
pub fn encode_packet(samples: &[u16], out: &mut [u8]) -> Result<usize, EncodeError> {
    let needed = packet_len(samples.len());
    if out.len() < needed {
        return Err(EncodeError::BufferTooSmall {
            needed,
            available: out.len(),
        });
    }

    for (dst, &sample) in out.chunks_exact_mut(2).zip(samples) {
        dst.copy_from_slice(&encode_sample(sample));
    }
    out[needed - TERMINATOR.len()..needed].copy_from_slice(&TERMINATOR);
    Ok(needed)
}

/// One two-byte unit read back from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    /// Inter-packet terminator.
    Boundary,
    /// A raw sample.
    Sample(u16),
}

/// Classify one word-aligned byte pair.
#[inline]
pub fn decode_word(bytes: [u8; 2]) -> Word {
    if bytes == TERMINATOR {
        Word::Boundary
    } else {
        Word::Sample(u16::from_le_bytes(bytes))
    }
}

/// Iterate the words of a word-aligned byte slice. A trailing odd byte is ignored.
pub fn decode_packet(bytes: &[u8]) -> impl Iterator<Item = Word> + '_ {
    bytes
        .chunks_exact(2)
        .map(|pair| decode_word([pair[0], pair[1]]))
}

/// Offset just past the first `0xFF 0xFF` pair in `bytes`, if any.
///
/// An isolated `0xFF` is ordinary data: the byte after it starts a fresh scan.
pub fn find_boundary(bytes: &[u8]) -> Option<usize> {
    let mut prev_ff = false;
    for (i, &b) in bytes.iter().enumerate() {
        let is_ff = b == TERMINATOR_BYTE;
        if prev_ff && is_ff {
            return Some(i + 1);
        }
        prev_ff = is_ff;
    }
    None
}
