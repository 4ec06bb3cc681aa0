/// Number of 16-bit samples per capture buffer (one packet on the wire).
pub const BUFFER_SAMPLES: usize = 256;

/// Size of one capture buffer in bytes. Also its required alignment.
pub const BUFFER_BYTES: usize = BUFFER_SAMPLES * core::mem::size_of::<u16>();

/// Number of interleaved analog channels.
pub const CHANNELS: usize = 2;

/// Native ADC resolution in bits.
pub const ADC_BITS: u32 = 12;

/// Largest raw ADC reading.
pub const ADC_MAX: u16 = (1 << ADC_BITS) - 1;

/// Raw reading that corresponds to 0 V AC (half of full scale).
pub const ADC_MIDSCALE: u16 = 1 << (ADC_BITS - 1);

/// Left shift from ADC resolution up to 16-bit PCM.
pub const PCM_SHIFT: u32 = 16 - ADC_BITS;

/// ADC clock on the RP2040 (`clk_adc`, fed from the USB PLL).
pub const ADC_CLOCK_HZ: u32 = 48_000_000;

/// Per-channel sample rate.
pub const SAMPLE_RATE_HZ: u32 = 48_000;

/// UART baud rate of the link.
pub const BAUD_RATE: u32 = 3_000_000;

/// A byte of the packet terminator.
pub const TERMINATOR_BYTE: u8 = 0xFF;

/// Packet terminator as it appears on the wire.
pub const TERMINATOR: [u8; 2] = [TERMINATOR_BYTE; 2];

/// Packet terminator read as a little-endian word.
pub const TERMINATOR_WORD: u16 = u16::from_le_bytes(TERMINATOR);

/// Sent in place of a sample that would read back as [`TERMINATOR_WORD`].
///
/// High byte is `0x0F`, so it can never pair with a neighbouring byte into
/// `0xFF 0xFF`.
pub const SENTINEL_WORD: u16 = ADC_MAX;

/// Bytes of one encoded packet including the terminator.
pub const PACKET_BYTES: usize = BUFFER_BYTES + TERMINATOR.len();
