//! Initializer configuration records and their defaults.

use embassy_time::Duration;
use platform::config::{LCD_CLOCK_HZ, LCD_PIXELS, LCD_WIDTH};
use platform::{Rotation, SpiMode};

use crate::pins;

/// Volume applied when the board is constructed, in percent.
pub const DEFAULT_VOLUME: u8 = 50;

/// Backlight brightness applied when the board is constructed, in percent.
pub const DEFAULT_BRIGHTNESS: u8 = 100;

/// Keyboard poll interval in polling mode.
pub const DEFAULT_KEYBOARD_POLL: Duration = Duration::from_millis(10);

/// Highest LCD clock the panel accepts.
pub const MAX_LCD_CLOCK_HZ: u32 = 80_000_000;

/// Placement hints for a long-running task.
///
/// The board core does not spawn tasks; the firmware reads these when it
/// spawns the task body the core provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskConfig {
    /// Task name
    pub name: &'static str,
    /// Stack size in bytes
    pub stack_size_bytes: usize,
    /// Priority
    pub priority: u8,
    /// Core to pin the task to, `None` to let the scheduler choose
    pub core_id: Option<u8>,
}

impl TaskConfig {
    /// Audio output task ([`crate::TDeck::run_audio`]).
    pub const AUDIO: Self = Self {
        name: pins::AUDIO_TASK_NAME,
        stack_size_bytes: pins::AUDIO_TASK_STACK_BYTES,
        priority: pins::AUDIO_TASK_PRIORITY,
        core_id: Some(pins::AUDIO_TASK_CORE),
    };

    /// Interrupt dispatcher task ([`crate::TDeck::run_interrupts`]).
    pub const INTERRUPTS: Self = Self {
        name: pins::INTERRUPT_TASK_NAME,
        stack_size_bytes: pins::INTERRUPT_TASK_STACK_BYTES,
        priority: pins::INTERRUPT_TASK_PRIORITY,
        core_id: None,
    };
}

/// How key presses are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyboardMode {
    /// Poll the keyboard from [`crate::TDeck::run_keyboard`]
    Polling {
        /// Delay between polls
        interval: Duration,
    },
    /// Read a key on every falling edge of the keyboard interrupt line
    Interrupt,
}

/// Keyboard initializer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardConfig {
    /// Collection mode
    pub mode: KeyboardMode,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            mode: KeyboardMode::Polling {
                interval: DEFAULT_KEYBOARD_POLL,
            },
        }
    }
}

/// Sound initializer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoundConfig {
    /// Initial sample rate in Hz
    pub sample_rate: u32,
    /// Placement of the audio output task
    pub task: TaskConfig,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            sample_rate: playback::pipeline::DEFAULT_SAMPLE_RATE,
            task: TaskConfig::AUDIO,
        }
    }
}

/// LCD initializer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LcdConfig {
    /// SPI clock in Hz
    pub clock_hz: u32,
    /// SPI mode
    pub mode: SpiMode,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            clock_hz: LCD_CLOCK_HZ,
            mode: SpiMode::Mode0,
        }
    }
}

impl LcdConfig {
    /// Check the clock range.
    ///
    /// # Errors
    ///
    /// A short description of the first invalid field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.clock_hz == 0 || self.clock_hz > MAX_LCD_CLOCK_HZ {
            return Err("lcd clock must be within 1 Hz ..= 80 MHz");
        }
        Ok(())
    }
}

/// Display initializer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayConfig {
    /// Pixels the renderer flushes per transfer (50 lines by default)
    pub pixel_buffer_size: usize,
    /// Panel orientation
    pub rotation: Rotation,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            pixel_buffer_size: usize::from(LCD_WIDTH).saturating_mul(50),
            rotation: Rotation::Landscape,
        }
    }
}

impl DisplayConfig {
    /// Check that the pixel buffer holds at least one pixel and at most a
    /// full frame.
    ///
    /// # Errors
    ///
    /// A short description of the first invalid field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.pixel_buffer_size == 0 || self.pixel_buffer_size > LCD_PIXELS {
            return Err("pixel buffer must hold 1 ..= 320*240 pixels");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_board() {
        assert_eq!(SoundConfig::default().sample_rate, 48_000);
        assert_eq!(SoundConfig::default().task.priority, 19);
        assert_eq!(LcdConfig::default().clock_hz, 40_000_000);
        assert_eq!(DisplayConfig::default().pixel_buffer_size, 320 * 50);
        assert_eq!(
            KeyboardConfig::default().mode,
            KeyboardMode::Polling {
                interval: Duration::from_millis(10)
            }
        );
    }

    #[test]
    fn test_display_buffer_bounds() {
        let mut config = DisplayConfig::default();
        assert!(config.validate().is_ok());
        config.pixel_buffer_size = 0;
        assert!(config.validate().is_err());
        config.pixel_buffer_size = LCD_PIXELS;
        assert!(config.validate().is_ok());
        config.pixel_buffer_size = LCD_PIXELS.saturating_add(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lcd_clock_bounds() {
        assert!(LcdConfig { clock_hz: 0, ..LcdConfig::default() }.validate().is_err());
        assert!(LcdConfig { clock_hz: 90_000_000, ..LcdConfig::default() }.validate().is_err());
    }
}
