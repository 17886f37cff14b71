//! Trackball pointer integration.
//!
//! Each roller edge moves the pointer by `sensitivity` pixels in one
//! direction; a negative sensitivity inverts the direction. The pointer is clamped to the display; the push button maps to
//! the left button.

use platform::config::{LCD_HEIGHT, LCD_WIDTH};
use platform::PointerData;

use crate::interrupts::{InterruptEvent, InterruptSource};

/// Default pixels moved per roller edge.
pub const DEFAULT_SENSITIVITY: i16 = 10;

/// Apply one trackball event to `pointer`.
///
/// Events from other sources leave the pointer unchanged.
pub fn apply(pointer: PointerData, event: &InterruptEvent, sensitivity: i16) -> PointerData {
    let step = i32::from(sensitivity);
    let mut next = pointer;
    match event.source {
        InterruptSource::TrackballUp => next.y = next.y.saturating_sub(step),
        InterruptSource::TrackballDown => next.y = next.y.saturating_add(step),
        InterruptSource::TrackballLeft => next.x = next.x.saturating_sub(step),
        InterruptSource::TrackballRight => next.x = next.x.saturating_add(step),
        InterruptSource::TrackballButton => next.left_pressed = event.active,
        _ => return pointer,
    }
    next.x = next.x.clamp(0, i32::from(LCD_WIDTH).saturating_sub(1));
    next.y = next.y.clamp(0, i32::from(LCD_HEIGHT).saturating_sub(1));
    next
}
