//! GPIO and pin abstraction layer
//!
//! Output pins (chip selects, the LCD data/command line, the peripheral power
//! rail) use [`embedded_hal::digital::OutputPin`] directly. Input pins are
//! never read by the board core: they are armed through an
//! [`InterruptController`] and reported back as edges from trap context.

/// ESP32-S3 GPIO number (0..=48).
pub type GpioNum = u8;

/// Pin state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinState {
    /// High (logic 1)
    High,
    /// Low (logic 0)
    Low,
}

impl From<bool> for PinState {
    fn from(value: bool) -> Self {
        if value {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl From<PinState> for bool {
    fn from(value: PinState) -> Self {
        matches!(value, PinState::High)
    }
}

/// Logic level at which a pin counts as "active".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveLevel {
    /// Active when the line reads high
    High,
    /// Active when the line reads low (open-drain buttons, trackball)
    Low,
}

impl ActiveLevel {
    /// Whether `level` is the active level.
    pub fn is_active(self, level: PinState) -> bool {
        matches!(
            (self, level),
            (Self::High, PinState::High) | (Self::Low, PinState::Low)
        )
    }
}

/// Edge that produced an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Low → high transition
    Rising,
    /// High → low transition
    Falling,
}

impl Edge {
    /// Edge that leaves the line at `level`.
    pub fn from_level(level: PinState) -> Self {
        match level {
            PinState::High => Self::Rising,
            PinState::Low => Self::Falling,
        }
    }
}

/// External interrupt trigger configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptTrigger {
    /// Trigger on rising edge
    Rising,
    /// Trigger on falling edge
    Falling,
    /// Trigger on both edges
    Any,
}

impl InterruptTrigger {
    /// Whether `edge` qualifies under this trigger.
    pub fn accepts(self, edge: Edge) -> bool {
        match self {
            Self::Rising => edge == Edge::Rising,
            Self::Falling => edge == Edge::Falling,
            Self::Any => true,
        }
    }
}

/// Internal pull resistor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// Floating input
    #[default]
    None,
    /// Internal pull-up
    Up,
    /// Internal pull-down
    Down,
}

/// Glitch filter applied to a pin's edges.
///
/// The ESP32-S3 offers a fixed per-pin filter that removes pulses a few APB
/// cycles long; it is programmed through [`InterruptController::enable`] and
/// never hides a genuine level change. The "flex" filter is applied by the
/// dispatcher in software as a minimum spacing between accepted edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GlitchFilter {
    /// Every qualifying edge is accepted
    #[default]
    None,
    /// Hardware per-pin filter, handled by the controller
    Pin,
    /// Caller supplied window in microseconds
    Flex {
        /// Minimum spacing between accepted edges
        window_us: u32,
    },
}

impl GlitchFilter {
    /// Software window in microseconds.
    ///
    /// `None` unless the flex filter is selected: the pin filter lives in
    /// the GPIO matrix and needs nothing from the dispatcher.
    pub fn window_us(self) -> Option<u32> {
        match self {
            Self::None | Self::Pin => None,
            Self::Flex { window_us } => Some(window_us),
        }
    }
}

/// Electrical configuration for an interrupt-capable input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinConfig {
    /// Edge(s) that raise the interrupt
    pub trigger: InterruptTrigger,
    /// Pull resistor
    pub pull: Pull,
    /// Glitch filter
    pub filter: GlitchFilter,
}

/// Claims GPIO lines and arms/disarms their interrupts.
///
/// The trap handler installed by the hardware layer reads the level of the
/// pin that fired and forwards it to the board core; this trait only covers
/// the resource side.
pub trait InterruptController {
    /// Error type
    type Error: core::fmt::Debug;

    /// Claim `pin` as an input and arm its interrupt.
    fn enable(&mut self, pin: GpioNum, config: &PinConfig) -> Result<(), Self::Error>;

    /// Disarm the interrupt on `pin` and release the line.
    fn disable(&mut self, pin: GpioNum) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_qualifies_edges() {
        assert!(InterruptTrigger::Rising.accepts(Edge::Rising));
        assert!(!InterruptTrigger::Rising.accepts(Edge::Falling));
        assert!(InterruptTrigger::Falling.accepts(Edge::Falling));
        assert!(InterruptTrigger::Any.accepts(Edge::Rising));
        assert!(InterruptTrigger::Any.accepts(Edge::Falling));
    }

    #[test]
    fn active_low_pins_are_active_when_low() {
        assert!(ActiveLevel::Low.is_active(PinState::Low));
        assert!(!ActiveLevel::Low.is_active(PinState::High));
        assert!(ActiveLevel::High.is_active(PinState::High));
    }

    #[test]
    fn filter_windows() {
        assert_eq!(GlitchFilter::None.window_us(), None);
        assert_eq!(GlitchFilter::Pin.window_us(), None);
        assert_eq!(GlitchFilter::Flex { window_us: 150 }.window_us(), Some(150));
    }
}
