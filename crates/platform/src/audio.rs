//! Audio output abstraction
//!
//! The T-Deck drives a MAX98357A class-D amplifier over I2S. The amplifier
//! has no control port, so the output is a plain PCM sink: configure the
//! frame format, then stream interleaved 16-bit little-endian stereo frames.

use crate::audio_types::{OutOfRangeError, SampleRateHz};

/// I2S output stream
pub trait I2sOutput {
    /// Error type
    type Error: core::fmt::Debug;

    /// (Re)configure the I2S clocks for `config`.
    ///
    /// Called before the first transfer and whenever the sample rate changes.
    /// The stream is idle while this runs.
    fn configure(
        &mut self,
        config: AudioConfig,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Write one transfer of PCM bytes, completing once the DMA has taken it.
    fn write(&mut self, frame: &[u8]) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}

/// Audio configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u8,
    /// Bit depth
    pub bit_depth: u8,
}

impl AudioConfig {
    /// Stereo 16-bit configuration at `sample_rate`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if the rate is outside [`SampleRateHz`].
    pub fn stereo_16(sample_rate: u32) -> Result<Self, OutOfRangeError> {
        let rate = SampleRateHz::new(sample_rate)?;
        Ok(Self {
            sample_rate: rate.get(),
            ..Self::default()
        })
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            bit_depth: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_48k_stereo_16bit() {
        let c = AudioConfig::default();
        assert_eq!((c.sample_rate, c.channels, c.bit_depth), (48_000, 2, 16));
    }

    #[test]
    fn stereo_16_rejects_unsupported_rates() {
        assert!(AudioConfig::stereo_16(44_100).is_ok());
        assert!(AudioConfig::stereo_16(4_000).is_err());
        assert!(AudioConfig::stereo_16(96_000).is_err());
    }
}
