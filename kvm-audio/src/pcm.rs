//! Raw ADC samples to signed PCM, and left/right pairing.
//!
//! The ADC produces unsigned 12-bit readings centred on
//! [`ADC_MIDSCALE`](crate::constants::ADC_MIDSCALE). The host removes that DC
//! bias and shifts the result up to the full `i16` range:
//!
//! ```text
//! pcm = (sample - 2048) << 4
//! ```

use crate::constants::{ADC_MAX, ADC_MIDSCALE, PCM_SHIFT};

/// One stereo PCM frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioFrame {
    pub left: i16,
    pub right: i16,
}

impl AudioFrame {
    pub const fn new(left: i16, right: i16) -> Self {
        AudioFrame { left, right }
    }

    /// Interleaved little-endian bytes: left then right.
    pub fn to_le_bytes(self) -> [u8; 4] {
        let l = self.left.to_le_bytes();
        let r = self.right.to_le_bytes();
        [l[0], l[1], r[0], r[1]]
    }
}

/// Convert a raw ADC reading into signed 16-bit PCM.
///
/// Readings above [`ADC_MAX`] cannot come from the converter; they are
/// clamped to full scale rather than wrapped.
#[inline]
pub fn sample_to_pcm(sample: u16) -> i16 {
    let centred = sample.min(ADC_MAX) as i16 - ADC_MIDSCALE as i16;
    centred << PCM_SHIFT
}

/// Inverse of [`sample_to_pcm`] for every 12-bit reading.
#[inline]
pub fn pcm_to_sample(pcm: i16) -> u16 {
    ((pcm >> PCM_SHIFT) + ADC_MIDSCALE as i16) as u16
}

/// Left/right phase tracker.
///
/// Samples arrive as L, R, L, R, … ; every second sample completes a frame.
/// Packet boundaries are not seen here, so the phase carries across them.
#[derive(Debug, Default)]
pub struct StereoPairer {
    pending_left: Option<i16>,
}

impl StereoPairer {
    /// New tracker expecting a left sample.
    pub const fn new() -> Self {
        StereoPairer { pending_left: None }
    }

    /// Feed one decoded sample. Returns a frame when this was the right one.
    pub fn push(&mut self, sample: i16) -> Option<AudioFrame> {
        match self.pending_left.take() {
            None => {
                self.pending_left = Some(sample);
                None
            }
            Some(left) => Some(AudioFrame::new(left, sample)),
        }
    }

    /// Go back to "expect left", dropping a dangling left sample.
    ///
    /// Returns `true` if a sample was dropped.
    pub fn reset(&mut self) -> bool {
        self.pending_left.take().is_some()
    }

    /// Whether a left sample is waiting for its right partner.
    pub fn is_mid_frame(&self) -> bool {
        self.pending_left.is_some()
    }
}
