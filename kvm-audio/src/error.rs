//! Error types shared by the capture and wire layers.
//!
//! Host-side I/O errors live in [`crate::host`] because they wrap
//! `std::io::Error`.

use thiserror::Error;

/// Invalid capture configuration. Fatal at startup; nothing retries these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The requested rate needs a zero clock divider (rate at or above the ADC clock).
    #[error("ADC clock divider would be zero for {aggregate_hz} Hz aggregate rate")]
    ZeroDivider { aggregate_hz: u32 },

    /// The requested rate is faster than one conversion per 96 ADC cycles.
    #[error("aggregate rate {aggregate_hz} Hz exceeds the ADC conversion limit of {max_hz} Hz")]
    RateTooHigh { aggregate_hz: u32, max_hz: u32 },

    /// The requested rate needs a divider wider than the 16-bit integer field.
    #[error("aggregate rate {aggregate_hz} Hz is below the ADC divider limit of {min_hz} Hz")]
    RateTooLow { aggregate_hz: u32, min_hz: u32 },

    /// A sample rate of zero was requested.
    #[error("sample rate must be non-zero")]
    ZeroRate,

    /// Channel number outside the external analog inputs (0..=3).
    #[error("ADC channel {0} is not an external input")]
    InvalidChannel(u8),

    /// Both slots name the same ADC channel.
    #[error("ADC channels must be distinct, got {0} twice")]
    DuplicateChannel(u8),

    /// DMA channel number outside 0..=11.
    #[error("DMA channel {0} does not exist")]
    InvalidDmaChannel(u8),

    /// Both buffers were assigned the same DMA channel.
    #[error("ping-pong buffers need two DMA channels, got {0} twice")]
    DuplicateDmaChannel(u8),
}

/// Packet encoding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Output slice cannot hold the encoded samples plus terminator.
    #[error("output buffer holds {available} bytes, packet needs {needed}")]
    BufferTooSmall { needed: usize, available: usize },
}
