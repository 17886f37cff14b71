//! Touch coordinate conversion.
//!
//! The GT911 reports coordinates in its own portrait frame. On the T-Deck
//! the panel is mounted so that the raw axes are swapped and the Y axis runs
//! backwards relative to the landscape LCD.

use platform::config::{LCD_HEIGHT, LCD_WIDTH};
use platform::{Rotation, TouchpadData};

/// Axis transform from controller space to display space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchTransform {
    /// Swap X and Y before inverting
    pub swap_xy: bool,
    /// Mirror X across the display width
    pub invert_x: bool,
    /// Mirror Y across the display height
    pub invert_y: bool,
}

impl TouchTransform {
    /// Mounting of the T-Deck touch panel.
    pub const T_DECK: Self = Self {
        swap_xy: true,
        invert_x: false,
        invert_y: true,
    };
}

impl Default for TouchTransform {
    fn default() -> Self {
        Self::T_DECK
    }
}

/// Map a raw sample into display coordinates for `rotation`.
///
/// Samples already marked `converted`, or without touch points, come back
/// unchanged. Results are clamped to the display.
pub fn convert(data: TouchpadData, transform: TouchTransform, rotation: Rotation) -> TouchpadData {
    if data.converted || data.num_touch_points == 0 {
        return data;
    }
    let (width, height) = if rotation.is_portrait() {
        (LCD_HEIGHT, LCD_WIDTH)
    } else {
        (LCD_WIDTH, LCD_HEIGHT)
    };
    let max_x = width.saturating_sub(1);
    let max_y = height.saturating_sub(1);

    let (mut x, mut y) = if transform.swap_xy {
        (data.y, data.x)
    } else {
        (data.x, data.y)
    };
    x = x.min(max_x);
    y = y.min(max_y);
    if transform.invert_x {
        x = max_x.saturating_sub(x);
    }
    if transform.invert_y {
        y = max_y.saturating_sub(y);
    }

    TouchpadData {
        x,
        y,
        converted: true,
        ..data
    }
}
