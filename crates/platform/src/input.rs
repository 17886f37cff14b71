//! Input device abstraction
//!
//! The GT911 touchpad and the keyboard co-processor both sit on the shared
//! I2C bus and are read from task context after their interrupt (or poll
//! tick) fires. Only the latest sample of each device is retained.

/// Capacitive touch controller
pub trait TouchController {
    /// Error type
    type Error: core::fmt::Debug;

    /// Probe and configure the controller.
    fn init(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Read the current touch state.
    ///
    /// Returns `Ok(None)` when the controller reports no new data since the
    /// last read.
    fn read(
        &mut self,
    ) -> impl core::future::Future<Output = Result<Option<TouchpadData>, Self::Error>>;
}

/// Keyboard co-processor
pub trait KeyboardDevice {
    /// Error type
    type Error: core::fmt::Debug;

    /// Probe the keyboard.
    fn init(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Read the next pending key, `Ok(None)` when nothing was pressed.
    fn read_key(&mut self) -> impl core::future::Future<Output = Result<Option<u8>, Self::Error>>;
}

/// One touchpad sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchpadData {
    /// Number of active touch points (0 when released)
    pub num_touch_points: u8,
    /// X coordinate of the first touch point
    pub x: u16,
    /// Y coordinate of the first touch point
    pub y: u16,
    /// Home-button state reported by the controller
    pub btn_state: u8,
    /// Whether the coordinates are already in display space
    pub converted: bool,
}

/// Pointer state accumulated from the trackball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PointerData {
    /// Cursor X, clamped to the display
    pub x: i32,
    /// Cursor Y, clamped to the display
    pub y: i32,
    /// Trackball button
    pub left_pressed: bool,
    /// Unused on the T-Deck, kept for pointer-device parity
    pub right_pressed: bool,
}
