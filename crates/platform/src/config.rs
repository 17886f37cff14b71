//! Board configuration and constants
//!
//! Central values shared by the board core and its tests. Pin numbers live
//! in `tdeck::pins`; this module only carries geometry and sizing.

/// Board name
pub const BOARD_NAME: &str = "LilyGo T-Deck";

/// Crate version (synchronized with Cargo.toml)
pub const BSP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// LCD width in pixels (landscape, as mounted)
pub const LCD_WIDTH: u16 = 320;

/// LCD height in pixels (landscape, as mounted)
pub const LCD_HEIGHT: u16 = 240;

/// Pixels in one full frame
pub const LCD_PIXELS: usize = LCD_WIDTH as usize * LCD_HEIGHT as usize;

/// LCD SPI clock (ST7789 write cycle limit on this board)
pub const LCD_CLOCK_HZ: u32 = 40_000_000;

/// uSD card SPI clock once the card has left identification mode
pub const SD_CLOCK_HZ: u32 = 20_000_000;

/// Capacity of the interrupt event queue
pub const INTERRUPT_QUEUE_DEPTH: usize = 50;

/// Number of interrupt-capable pins the dispatcher can track
pub const MAX_INTERRUPT_PINS: usize = 8;

/// Full board title (name + version)
pub const fn board_title() -> &'static str {
    BOARD_NAME
}
