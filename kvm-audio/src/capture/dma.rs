//! RP2040 DMA channel pair for the ping-pong capture.
//!
//! Two channels read the ADC FIFO into buffers A and B. Each channel's
//! `CHAIN_TO` names the other one, so when A finishes, B starts in hardware
//! and vice versa. Writes use a ring of `log2(BUFFER_BYTES)` bits; because
//! each buffer is aligned to its own size, the write address wraps back to
//! the buffer start at the end of every transfer. The transfer count reloads
//! on every trigger. Once started, the pair runs forever without the CPU.
//!
//! The completion interrupt only has to work out which channel finished,
//! acknowledge it, and flag the matching buffer; see [`DmaChain::dispatch`].
//!
//! ## `CH_CTRL` layout (RP2040 datasheet §2.5.7)
//!
//! | Field | Bits | Value |
//! |-------|------|-------|
//! | `EN` | 0 | 1 |
//! | `DATA_SIZE` | 3:2 | 1 (halfword) |
//! | `INCR_READ` | 4 | 0 (FIFO) |
//! | `INCR_WRITE` | 5 | 1 |
//! | `RING_SIZE` | 9:6 | `log2(BUFFER_BYTES)` |
//! | `RING_SEL` | 10 | 1 (wrap writes) |
//! | `CHAIN_TO` | 14:11 | other channel |
//! | `TREQ_SEL` | 20:15 | `DREQ_ADC` |

use crate::constants::{BUFFER_BYTES, BUFFER_SAMPLES};
use crate::error::ConfigError;

use super::pingpong::{BufferId, PingPong};

/// Number of DMA channels on the RP2040.
pub const DMA_CHANNELS: u8 = 12;

/// Transfer request line of the ADC FIFO.
pub const DREQ_ADC: u32 = 36;

/// Bus address of the ADC `FIFO` register.
pub const ADC_FIFO_ADDR: u32 = 0x4004_C00C;

/// Address-wrap size for the write ring, in bits.
pub const RING_BITS: u32 = BUFFER_BYTES.trailing_zeros();

const _: () = assert!(RING_BITS <= 15, "RING_SIZE is a 4-bit field");

const CTRL_EN: u32 = 1 << 0;
const CTRL_DATA_SIZE_HALFWORD: u32 = 1 << 2;
const CTRL_INCR_WRITE: u32 = 1 << 5;
const CTRL_RING_SIZE_SHIFT: u32 = 6;
const CTRL_RING_SEL: u32 = 1 << 10;
const CTRL_CHAIN_TO_SHIFT: u32 = 11;
const CTRL_TREQ_SEL_SHIFT: u32 = 15;

/// DMA channel assignment for buffers A and B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChain {
    channels: [u8; 2],
}

impl DmaChain {
    /// Channels 0 and 1.
    pub const DEFAULT: DmaChain = DmaChain { channels: [0, 1] };

    pub fn new(channel_a: u8, channel_b: u8) -> Result<Self, ConfigError> {
        for ch in [channel_a, channel_b] {
            if ch >= DMA_CHANNELS {
                return Err(ConfigError::InvalidDmaChannel(ch));
            }
        }
        if channel_a == channel_b {
            return Err(ConfigError::DuplicateDmaChannel(channel_a));
        }
        Ok(DmaChain {
            channels: [channel_a, channel_b],
        })
    }

    /// DMA channel feeding buffer `id`.
    pub fn channel(&self, id: BufferId) -> u8 {
        self.channels[id.index()]
    }

    /// Raw `CH_CTRL` value for the channel that fills `id`.
    pub fn ctrl_word(&self, id: BufferId) -> u32 {
        CTRL_EN
            | CTRL_DATA_SIZE_HALFWORD
            | CTRL_INCR_WRITE
            | (RING_BITS << CTRL_RING_SIZE_SHIFT)
            | CTRL_RING_SEL
            | ((self.channel(id.other()) as u32) << CTRL_CHAIN_TO_SHIFT)
            | (DREQ_ADC << CTRL_TREQ_SEL_SHIFT)
    }

    /// Value for `TRANS_COUNT`: one transfer per sample.
    pub fn transfer_count(&self) -> u32 {
        BUFFER_SAMPLES as u32
    }

    /// Bits to enable in `INTE0`.
    pub fn irq_mask(&self) -> u32 {
        (1u32 << self.channels[0]) | (1u32 << self.channels[1])
    }

    /// Buffers whose channel bit is set in an `INTS0` snapshot.
    pub fn completed(&self, ints: u32) -> impl Iterator<Item = BufferId> + '_ {
        BufferId::ALL
            .into_iter()
            .filter(move |&id| ints & (1u32 << self.channel(id)) != 0)
    }

    /// Interrupt body: flag every buffer whose channel finished.
    ///
    /// Returns the bits to write back to `INTS0` to acknowledge. Bits that
    /// belong to other channels are left alone.
    pub fn dispatch(&self, ints: u32, buffers: &PingPong) -> u32 {
        for id in self.completed(ints) {
            buffers.on_transfer_complete(id);
        }
        ints & self.irq_mask()
    }
}

impl Default for DmaChain {
    fn default() -> Self {
        Self::DEFAULT
    }
}
