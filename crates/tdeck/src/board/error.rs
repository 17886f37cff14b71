//! Board-level errors.

use playback::AudioError;

use crate::bus::BusError;
use crate::interrupts::InterruptError;
use crate::lcd::LcdError;

/// Board subsystem named in an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Subsystem {
    /// Shared SPI bus
    Spi,
    /// uSD card
    SdCard,
    /// Keyboard
    Keyboard,
    /// Audio output
    Sound,
    /// LCD panel
    Lcd,
    /// Display configuration
    Display,
    /// Touch controller
    Touch,
    /// Trackball
    Trackball,
    /// LCD backlight
    Backlight,
    /// Peripheral power rail
    PeripheralPower,
}

impl Subsystem {
    /// Short name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Spi => "spi",
            Self::SdCard => "sdcard",
            Self::Keyboard => "keyboard",
            Self::Sound => "sound",
            Self::Lcd => "lcd",
            Self::Display => "display",
            Self::Touch => "touch",
            Self::Trackball => "trackball",
            Self::Backlight => "backlight",
            Self::PeripheralPower => "peripheral power",
        }
    }
}

impl core::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors returned by [`crate::TDeck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardError {
    /// A configuration record was rejected
    InvalidConfig(&'static str),
    /// A subsystem failed to come up; it stays uninitialized
    InitializationFailure(Subsystem),
    /// The subsystem has not been initialized
    NotInitialized(Subsystem),
    /// A collaborator device failed at runtime
    Device(Subsystem),
    /// Interrupt registration failed
    Interrupt(InterruptError),
    /// Shared bus failure
    Bus(BusError),
    /// Audio pipeline failure
    Audio(AudioError),
}

#[cfg(feature = "std")]
impl std::error::Error for BoardError {}

impl core::fmt::Display for BoardError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            Self::InitializationFailure(s) => write!(f, "{s} failed to initialize"),
            Self::NotInitialized(s) => write!(f, "{s} is not initialized"),
            Self::Device(s) => write!(f, "{s} device error"),
            Self::Interrupt(e) => write!(f, "{e}"),
            Self::Bus(e) => write!(f, "{e}"),
            Self::Audio(e) => write!(f, "{e}"),
        }
    }
}

impl From<InterruptError> for BoardError {
    fn from(e: InterruptError) -> Self {
        Self::Interrupt(e)
    }
}

impl From<BusError> for BoardError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<AudioError> for BoardError {
    fn from(e: AudioError) -> Self {
        Self::Audio(e)
    }
}

impl From<LcdError> for BoardError {
    fn from(e: LcdError) -> Self {
        match e {
            LcdError::InvalidWindow => Self::InvalidConfig("lcd window outside the panel"),
            LcdError::LengthMismatch { .. } => {
                Self::InvalidConfig("pixel data does not cover the window")
            }
            LcdError::Bus(e) => Self::Bus(e),
        }
    }
}
