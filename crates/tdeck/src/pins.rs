//! T-Deck pin assignments.
//!
//! GPIO numbers as wired on the LilyGo T-Deck main board. The hardware layer
//! uses these to pick esp-hal pins; the board core uses them as interrupt
//! keys.

use platform::GpioNum;

// ---------------------------------------------------------------------------
// Power and internal I2C
// ---------------------------------------------------------------------------

/// Peripheral power rail enable (keyboard, LoRa, touch, LCD)
pub const PERIPHERAL_POWER: GpioNum = 10;
/// Internal I2C SDA (touch, keyboard)
pub const I2C_SDA: GpioNum = 18;
/// Internal I2C SCL
pub const I2C_SCL: GpioNum = 8;
/// Internal I2C clock
pub const I2C_CLOCK_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// Shared SPI bus (LCD + uSD)
// ---------------------------------------------------------------------------

/// SPI MOSI
pub const SPI_MOSI: GpioNum = 41;
/// SPI MISO
pub const SPI_MISO: GpioNum = 38;
/// SPI SCLK
pub const SPI_SCLK: GpioNum = 40;
/// LCD chip select
pub const LCD_CS: GpioNum = 12;
/// LCD data/command select
pub const LCD_DC: GpioNum = 11;
/// LCD backlight (PWM)
pub const LCD_BACKLIGHT: GpioNum = 42;
/// uSD chip select
pub const SDCARD_CS: GpioNum = 39;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// GT911 touch interrupt (rising edge, active high)
pub const TOUCH_INTERRUPT: GpioNum = 16;
/// Keyboard interrupt; unused unless the keyboard runs in interrupt mode
pub const KEYBOARD_INTERRUPT: GpioNum = 46;
/// Trackball up
pub const TRACKBALL_UP: GpioNum = 15;
/// Trackball down
pub const TRACKBALL_DOWN: GpioNum = 3;
/// Trackball left
pub const TRACKBALL_LEFT: GpioNum = 1;
/// Trackball right
pub const TRACKBALL_RIGHT: GpioNum = 2;
/// Trackball button (shared with the BOOT strapping button)
pub const TRACKBALL_BUTTON: GpioNum = 0;

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// I2S bit clock
pub const I2S_BCK: GpioNum = 7;
/// I2S word select
pub const I2S_WS: GpioNum = 5;
/// I2S data out
pub const I2S_DO: GpioNum = 6;
/// Amplifier mute; shares GPIO 1 with the trackball, so it is never driven
pub const AUDIO_MUTE: GpioNum = 1;

// ---------------------------------------------------------------------------
// Task defaults
// ---------------------------------------------------------------------------

/// Audio output task name
pub const AUDIO_TASK_NAME: &str = "audio";
/// Audio output task stack size in bytes
pub const AUDIO_TASK_STACK_BYTES: usize = 4096;
/// Audio output task priority
pub const AUDIO_TASK_PRIORITY: u8 = 19;
/// Core the audio output task is pinned to
pub const AUDIO_TASK_CORE: u8 = 1;
/// Interrupt dispatcher task name
pub const INTERRUPT_TASK_NAME: &str = "t-deck interrupts";
/// Interrupt dispatcher task stack size in bytes
pub const INTERRUPT_TASK_STACK_BYTES: usize = 4096;
/// Interrupt dispatcher task priority, one above audio
pub const INTERRUPT_TASK_PRIORITY: u8 = 20;
