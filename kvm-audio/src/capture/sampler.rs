//! ADC sample source: free-running round-robin conversion into the FIFO.
//!
//! The RP2040 ADC converts continuously once `START_MANY` is set, pacing
//! itself with the `DIV` register and advancing `AINSEL` through the
//! `RROBIN` mask after every conversion. Each result lands in the FIFO, and
//! the FIFO raises DREQ for the DMA engine. No software runs per sample.
//!
//! [`SamplerConfig`] computes the raw register values; the firmware writes them.
//!
//! ## Register layout (RP2040 datasheet §4.9.6)
//!
//! | Register | Bits used |
//! |----------|-----------|
//! | `CS` | `EN`[0], `START_MANY`[3], `AINSEL`[14:12], `RROBIN`[20:16] |
//! | `FCS` | `EN`[0], `SHIFT`[1], `ERR`[2], `DREQ_EN`[3], `THRESH`[27:24] |
//! | `DIV` | `FRAC`[7:0], `INT`[23:8] |

use crate::constants::{ADC_CLOCK_HZ, CHANNELS, SAMPLE_RATE_HZ};
use crate::error::ConfigError;

/// ADC cycles needed for one conversion.
pub const CONVERSION_CYCLES: u32 = 96;

/// First GPIO wired to an ADC input (GPIO26 = ADC0).
pub const ADC_GPIO_BASE: u8 = 26;

/// Highest external ADC input.
pub const MAX_CHANNEL: u8 = 3;

const CS_EN: u32 = 1 << 0;
const CS_START_MANY: u32 = 1 << 3;
const CS_AINSEL_SHIFT: u32 = 12;
const CS_RROBIN_SHIFT: u32 = 16;

const FCS_EN: u32 = 1 << 0;
const FCS_DREQ_EN: u32 = 1 << 3;
const FCS_THRESH_SHIFT: u32 = 24;

/// Fractional ADC clock divider. One conversion starts every
/// `1 + int + frac / 256` ADC clock cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDivider {
    pub int: u16,
    pub frac: u8,
}

impl ClockDivider {
    /// Divider that paces conversions at `aggregate_hz` from `adc_clock_hz`.
    pub fn for_rate(adc_clock_hz: u32, aggregate_hz: u32) -> Result<Self, ConfigError> {
        if aggregate_hz == 0 {
            return Err(ConfigError::ZeroRate);
        }

        // Conversion period in 1/256 ADC cycles, rounded to nearest.
        let period_256 =
            (adc_clock_hz as u64 * 256 + aggregate_hz as u64 / 2) / aggregate_hz as u64;
        let divider_256 = period_256.saturating_sub(256);

        if divider_256 == 0 {
            return Err(ConfigError::ZeroDivider { aggregate_hz });
        }
        if period_256 < (CONVERSION_CYCLES as u64) * 256 {
            return Err(ConfigError::RateTooHigh {
                aggregate_hz,
                max_hz: adc_clock_hz / CONVERSION_CYCLES,
            });
        }
        if divider_256 > 0x00FF_FFFF {
            return Err(ConfigError::RateTooLow {
                aggregate_hz,
                min_hz: adc_clock_hz / 65_536 + 1,
            });
        }

        Ok(ClockDivider {
            int: (divider_256 >> 8) as u16,
            frac: divider_256 as u8,
        })
    }

    /// Conversion period in 1/256 ADC cycles.
    pub fn period_256(&self) -> u32 {
        256 + ((self.int as u32) << 8) + self.frac as u32
    }

    /// Raw `DIV` register value.
    pub fn register(&self) -> u32 {
        ((self.int as u32) << 8) | self.frac as u32
    }
}

/// Validated configuration of the dual-channel sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    channels: [u8; CHANNELS],
    sample_rate_hz: u32,
    adc_clock_hz: u32,
    divider: ClockDivider,
}

impl SamplerConfig {
    /// Sample `channels[0]` and `channels[1]` alternately at `sample_rate_hz` each.
    ///
    /// Conversion starts on `channels[0]`, so the stream always reads
    /// `channels[0], channels[1], channels[0], …`.
    pub fn new(sample_rate_hz: u32, channels: [u8; CHANNELS]) -> Result<Self, ConfigError> {
        Self::with_adc_clock(ADC_CLOCK_HZ, sample_rate_hz, channels)
    }

    /// Same as [`new()`](Self::new) with an explicit ADC clock frequency.
    pub fn with_adc_clock(
        adc_clock_hz: u32,
        sample_rate_hz: u32,
        channels: [u8; CHANNELS],
    ) -> Result<Self, ConfigError> {
        for &ch in &channels {
            if ch > MAX_CHANNEL {
                return Err(ConfigError::InvalidChannel(ch));
            }
        }
        if channels[0] == channels[1] {
            return Err(ConfigError::DuplicateChannel(channels[0]));
        }

        let aggregate_hz = sample_rate_hz
            .checked_mul(CHANNELS as u32)
            .ok_or(ConfigError::RateTooHigh {
                aggregate_hz: u32::MAX,
                max_hz: adc_clock_hz / CONVERSION_CYCLES,
            })?;
        let divider = ClockDivider::for_rate(adc_clock_hz, aggregate_hz)?;

        Ok(SamplerConfig {
            channels,
            sample_rate_hz,
            adc_clock_hz,
            divider,
        })
    }

    /// Default deployment: ADC0 (left) and ADC1 (right) at [`SAMPLE_RATE_HZ`].
    pub fn stereo_default() -> Result<Self, ConfigError> {
        Self::new(SAMPLE_RATE_HZ, [0, 1])
    }

    pub fn channels(&self) -> [u8; CHANNELS] {
        self.channels
    }

    pub fn divider(&self) -> ClockDivider {
        self.divider
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Per-channel rate the divider actually produces.
    pub fn effective_rate_hz(&self) -> u32 {
        let aggregate = (self.adc_clock_hz as u64 * 256) / self.divider.period_256() as u64;
        (aggregate / CHANNELS as u64) as u32
    }

    /// GPIO pins that must be switched to analog input.
    pub fn gpios(&self) -> [u8; CHANNELS] {
        self.channels.map(|ch| ADC_GPIO_BASE + ch)
    }

    /// `RROBIN` mask selecting both channels.
    pub fn round_robin_mask(&self) -> u32 {
        self.channels.iter().fold(0, |mask, &ch| mask | (1u32 << ch))
    }

    /// `CS` value that powers the ADC and starts free-running conversion.
    pub fn cs_word(&self) -> u32 {
        CS_EN
            | CS_START_MANY
            | ((self.channels[0] as u32) << CS_AINSEL_SHIFT)
            | (self.round_robin_mask() << CS_RROBIN_SHIFT)
    }

    /// `CS` value that parks the ADC powered but idle (written before reconfiguring).
    pub fn cs_idle_word(&self) -> u32 {
        CS_EN | ((self.channels[0] as u32) << CS_AINSEL_SHIFT)
    }

    /// `FCS` value: FIFO on, DREQ on every sample, 12-bit results, no error bit.
    pub fn fcs_word(&self) -> u32 {
        FCS_EN | FCS_DREQ_EN | (1 << FCS_THRESH_SHIFT)
    }

    /// `DIV` value.
    pub fn div_word(&self) -> u32 {
        self.divider.register()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_divider_gives_exact_rate() {
        let cfg = SamplerConfig::stereo_default().unwrap();
        assert_eq!(cfg.divider(), ClockDivider { int: 499, frac: 0 });
        assert_eq!(cfg.div_word(), 499 << 8);
        assert_eq!(cfg.effective_rate_hz(), 48_000);
    }

    #[test]
    fn fractional_divider() {
        // 48 MHz / 44.1 kHz*2 = 544.2177 cycles -> 543 + 56/256
        let div = ClockDivider::for_rate(48_000_000, 88_200).unwrap();
        assert_eq!(div.int, 543);
        assert_eq!(div.frac, 56);
        let cfg = SamplerConfig::new(44_100, [0, 1]).unwrap();
        let err = cfg.effective_rate_hz() as i32 - 44_100;
        assert!(err.abs() <= 2, "rate error {err}");
    }

    #[test]
    fn zero_divider_is_rejected() {
        assert_eq!(
            SamplerConfig::new(24_000_000, [0, 1]),
            Err(ConfigError::ZeroDivider { aggregate_hz: 48_000_000 })
        );
        assert!(matches!(
            ClockDivider::for_rate(48_000_000, 96_000_000),
            Err(ConfigError::ZeroDivider { .. })
        ));
    }

    #[test]
    fn rate_above_conversion_limit_is_rejected() {
        assert_eq!(
            SamplerConfig::new(300_000, [0, 1]),
            Err(ConfigError::RateTooHigh { aggregate_hz: 600_000, max_hz: 500_000 })
        );
        // Exactly 96 cycles per conversion is the fastest legal setting.
        assert!(SamplerConfig::new(250_000, [0, 1]).is_ok());
    }

    #[test]
    fn rate_below_divider_range_is_rejected() {
        assert!(matches!(
            SamplerConfig::new(100, [0, 1]),
            Err(ConfigError::RateTooLow { .. })
        ));
        assert_eq!(SamplerConfig::new(0, [0, 1]), Err(ConfigError::ZeroRate));
    }

    #[test]
    fn channels_are_validated() {
        assert_eq!(SamplerConfig::new(48_000, [0, 4]), Err(ConfigError::InvalidChannel(4)));
        assert_eq!(SamplerConfig::new(48_000, [2, 2]), Err(ConfigError::DuplicateChannel(2)));
    }

    #[test]
    fn control_words_start_round_robin_on_first_channel() {
        let cfg = SamplerConfig::new(48_000, [0, 1]).unwrap();
        assert_eq!(cfg.round_robin_mask(), 0b11);
        assert_eq!(cfg.cs_word(), 0x0003_0009);
        assert_eq!(cfg.cs_idle_word(), 0x0000_0001);
        assert_eq!(cfg.fcs_word(), 0x0100_0009);

        let swapped = SamplerConfig::new(48_000, [2, 1]).unwrap();
        assert_eq!(swapped.cs_word() >> CS_AINSEL_SHIFT & 0b111, 2);
        assert_eq!(swapped.round_robin_mask(), 0b110);
        assert_eq!(swapped.gpios(), [28, 27]);
    }
}
