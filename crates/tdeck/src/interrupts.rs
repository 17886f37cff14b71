//! GPIO interrupt dispatcher.
//!
//! Turns raw pin edges into typed [`InterruptEvent`]s and delivers them to an
//! [`InterruptHandler`] from task context.
//!
//! ```text
//!   GPIO trap ──on_edge()──▶ [pin table] ──try_send──▶ Channel<Q> ──▶ run()
//!   (never blocks)           qualify edge              (drop newest     │
//!                            glitch filter              when full)      ▼
//!                                                          handler.on_interrupt()
//! ```
//!
//! The trap side only takes a short blocking critical section over the pin
//! table and uses `try_send`, so it never waits on a task. A single
//! dispatcher task ([`InterruptDispatcher::run`]) drains the queue in FIFO
//! order; callbacks therefore never run concurrently and may do I/O.
//!
//! The handler is not stored in the table. Each registration carries an
//! [`InterruptSource`] tag and the handler is lent to `run`, so a removed
//! registration can never call into freed state.

use core::cell::RefCell;
use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_time::{Duration, Instant};
use platform::config::{INTERRUPT_QUEUE_DEPTH, MAX_INTERRUPT_PINS};
use platform::{
    ActiveLevel, Edge, GlitchFilter, GpioNum, InterruptController, InterruptTrigger, PinConfig,
    PinState, Pull,
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What a registered pin is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptSource {
    /// Touch controller data-ready line
    Touch,
    /// Keyboard controller key-ready line
    Keyboard,
    /// Trackball roller, up
    TrackballUp,
    /// Trackball roller, down
    TrackballDown,
    /// Trackball roller, left
    TrackballLeft,
    /// Trackball roller, right
    TrackballRight,
    /// Trackball push button
    TrackballButton,
    /// Application button with a caller-chosen id
    Button(u8),
}

impl InterruptSource {
    /// Short name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Touch => "touch",
            Self::Keyboard => "keyboard",
            Self::TrackballUp => "trackball-up",
            Self::TrackballDown => "trackball-down",
            Self::TrackballLeft => "trackball-left",
            Self::TrackballRight => "trackball-right",
            Self::TrackballButton => "trackball-button",
            Self::Button(_) => "button",
        }
    }
}

/// Registration record for one interrupt pin.
///
/// Defaults from [`PinInterruptConfig::new`]: active high, rising edge, no
/// pull, no glitch filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinInterruptConfig {
    /// GPIO number
    pub pin: GpioNum,
    /// Event source tag delivered with every event
    pub source: InterruptSource,
    /// Level at which the input counts as active
    pub active_level: ActiveLevel,
    /// Edges that raise an event
    pub trigger: InterruptTrigger,
    /// Internal pull resistor
    pub pull: Pull,
    /// Glitch filter
    pub filter: GlitchFilter,
}

impl PinInterruptConfig {
    /// Active-high, rising-edge registration for `pin`.
    pub const fn new(pin: GpioNum, source: InterruptSource) -> Self {
        Self {
            pin,
            source,
            active_level: ActiveLevel::High,
            trigger: InterruptTrigger::Rising,
            pull: Pull::None,
            filter: GlitchFilter::None,
        }
    }

    /// Set the active level.
    #[must_use]
    pub const fn active_level(mut self, level: ActiveLevel) -> Self {
        self.active_level = level;
        self
    }

    /// Set the triggering edges.
    #[must_use]
    pub const fn trigger(mut self, trigger: InterruptTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Set the pull resistor.
    #[must_use]
    pub const fn pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }

    /// Set the glitch filter.
    #[must_use]
    pub const fn filter(mut self, filter: GlitchFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Electrical configuration handed to the interrupt controller.
    pub const fn pin_config(&self) -> PinConfig {
        PinConfig {
            trigger: self.trigger,
            pull: self.pull,
            filter: self.filter,
        }
    }
}

/// One qualified edge, produced in trap context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptEvent {
    /// GPIO number
    pub pin: GpioNum,
    /// Source tag from the registration
    pub source: InterruptSource,
    /// Edge that fired
    pub edge: Edge,
    /// Whether the pin is at its active level after the edge
    pub active: bool,
    /// When the edge was seen
    pub timestamp: Instant,
}

/// Result of feeding one edge to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeOutcome {
    /// Event queued for the dispatcher task
    Queued,
    /// Pin not registered, or edge does not match its trigger
    Ignored,
    /// Suppressed by the pin's glitch filter
    Filtered,
    /// Queue full; the event was discarded and counted
    Dropped,
}

/// Interrupt dispatcher errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptError {
    /// The pin already has a registration
    AlreadyRegistered(GpioNum),
    /// Every slot of the pin table is in use
    TableFull,
    /// The interrupt controller refused the pin
    ClaimFailed(GpioNum),
    /// The pin has no registration
    NotRegistered(GpioNum),
    /// Another dispatcher task is draining the queue
    AlreadyRunning,
}

#[cfg(feature = "std")]
impl std::error::Error for InterruptError {}

impl core::fmt::Display for InterruptError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyRegistered(pin) => write!(f, "gpio {pin} is already registered"),
            Self::TableFull => write!(f, "interrupt pin table is full"),
            Self::ClaimFailed(pin) => write!(f, "gpio {pin} could not be claimed"),
            Self::NotRegistered(pin) => write!(f, "gpio {pin} is not registered"),
            Self::AlreadyRunning => write!(f, "interrupt dispatcher is already running"),
        }
    }
}

/// Receiver of dispatched interrupt events.
#[allow(async_fn_in_trait)]
pub trait InterruptHandler {
    /// Error reported back to the dispatcher; logged and counted.
    type Error;

    /// Handle one event. Runs in task context, never concurrently.
    async fn on_interrupt(&self, event: &InterruptEvent) -> Result<(), Self::Error>;
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct PinSlot {
    config: PinInterruptConfig,
    last_accepted: Option<Instant>,
}

struct PinTable<C, const PINS: usize> {
    controller: C,
    slots: heapless::Vec<PinSlot, PINS>,
}

/// Bounded, trap-safe interrupt dispatcher.
///
/// `Q` is the event queue depth, `PINS` the number of pin slots.
pub struct InterruptDispatcher<
    M: RawMutex,
    C: InterruptController,
    const Q: usize = INTERRUPT_QUEUE_DEPTH,
    const PINS: usize = MAX_INTERRUPT_PINS,
> {
    table: BlockingMutex<M, RefCell<PinTable<C, PINS>>>,
    queue: Channel<M, InterruptEvent, Q>,
    running: AtomicBool,
    dropped: AtomicU32,
    filtered: AtomicU32,
    handler_errors: AtomicU32,
}

impl<M: RawMutex, C: InterruptController, const Q: usize, const PINS: usize>
    InterruptDispatcher<M, C, Q, PINS>
{
    /// Create a dispatcher owning `controller`, with no pins registered.
    pub const fn new(controller: C) -> Self {
        Self {
            table: BlockingMutex::new(RefCell::new(PinTable {
                controller,
                slots: heapless::Vec::new(),
            })),
            queue: Channel::new(),
            running: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
            filtered: AtomicU32::new(0),
            handler_errors: AtomicU32::new(0),
        }
    }

    /// Register `config.pin` and arm it in the interrupt controller.
    ///
    /// Nothing is recorded when this fails.
    ///
    /// # Errors
    ///
    /// [`InterruptError::AlreadyRegistered`], [`InterruptError::TableFull`] or
    /// [`InterruptError::ClaimFailed`].
    pub fn register(&self, config: PinInterruptConfig) -> Result<(), InterruptError> {
        self.table.lock(|table| {
            let mut table = table.borrow_mut();
            if table.slots.iter().any(|s| s.config.pin == config.pin) {
                return Err(InterruptError::AlreadyRegistered(config.pin));
            }
            if table.slots.is_full() {
                return Err(InterruptError::TableFull);
            }
            table
                .controller
                .enable(config.pin, &config.pin_config())
                .map_err(|_| InterruptError::ClaimFailed(config.pin))?;
            table
                .slots
                .push(PinSlot {
                    config,
                    last_accepted: None,
                })
                .map_err(|_| InterruptError::TableFull)
        })?;
        debug!("gpio {} registered for {}", config.pin, config.source.name());
        Ok(())
    }

    /// Remove the registration of `pin` and release it.
    ///
    /// Events of `pin` still in the queue are discarded at dispatch time.
    ///
    /// # Errors
    ///
    /// [`InterruptError::NotRegistered`] if `pin` has no registration.
    pub fn deregister(&self, pin: GpioNum) -> Result<(), InterruptError> {
        self.table.lock(|table| {
            let mut table = table.borrow_mut();
            let index = table
                .slots
                .iter()
                .position(|s| s.config.pin == pin)
                .ok_or(InterruptError::NotRegistered(pin))?;
            table.slots.swap_remove(index);
            if table.controller.disable(pin).is_err() {
                warn!("gpio {} release failed", pin);
            }
            Ok(())
        })
    }

    /// Whether `pin` is registered.
    pub fn is_registered(&self, pin: GpioNum) -> bool {
        self.registration(pin).is_some()
    }

    /// Registration of `pin`, if any.
    pub fn registration(&self, pin: GpioNum) -> Option<PinInterruptConfig> {
        self.table.lock(|table| {
            table
                .borrow()
                .slots
                .iter()
                .find(|s| s.config.pin == pin)
                .map(|s| s.config)
        })
    }

    /// Registered pins, in table order.
    pub fn registered_pins(&self) -> heapless::Vec<GpioNum, PINS> {
        self.table
            .lock(|table| table.borrow().slots.iter().map(|s| s.config.pin).collect())
    }

    /// Trap-context entry: `pin` changed to `level` just now.
    pub fn on_edge(&self, pin: GpioNum, level: PinState) -> EdgeOutcome {
        self.on_edge_at(pin, level, Instant::now())
    }

    /// Trap-context entry with an explicit timestamp.
    ///
    /// Never blocks: the pin table lock is a short critical section and the
    /// event is queued with `try_send`.
    pub fn on_edge_at(&self, pin: GpioNum, level: PinState, at: Instant) -> EdgeOutcome {
        let edge = Edge::from_level(level);
        let event = self.table.lock(|table| {
            let mut table = table.borrow_mut();
            let slot = table.slots.iter_mut().find(|s| s.config.pin == pin)?;
            if !slot.config.trigger.accepts(edge) {
                return None;
            }
            if let (Some(window), Some(last)) = (slot.config.filter.window_us(), slot.last_accepted)
            {
                let elapsed = at.checked_duration_since(last).unwrap_or(Duration::from_ticks(0));
                if elapsed < Duration::from_micros(u64::from(window)) {
                    return Some(Err(()));
                }
            }
            slot.last_accepted = Some(at);
            Some(Ok(InterruptEvent {
                pin,
                source: slot.config.source,
                edge,
                active: slot.config.active_level.is_active(level),
                timestamp: at,
            }))
        });

        match event {
            None => EdgeOutcome::Ignored,
            Some(Err(())) => {
                self.filtered.fetch_add(1, Ordering::Relaxed);
                EdgeOutcome::Filtered
            }
            Some(Ok(event)) => match self.queue.try_send(event) {
                Ok(()) => EdgeOutcome::Queued,
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    EdgeOutcome::Dropped
                }
            },
        }
    }

    /// Dispatcher task body. Exactly one may run at a time.
    ///
    /// Never returns `Ok`. Handler errors are logged and counted and the loop
    /// carries on with the next event.
    ///
    /// # Errors
    ///
    /// [`InterruptError::AlreadyRunning`] if another task is draining the
    /// queue.
    pub async fn run<H: InterruptHandler>(&self, handler: &H) -> Result<Infallible, InterruptError> {
        let _running = RunGuard::acquire(&self.running).ok_or(InterruptError::AlreadyRunning)?;
        info!("interrupt dispatcher started, queue depth {}", Q);
        loop {
            let event = self.queue.receive().await;
            self.dispatch(handler, &event).await;
        }
    }

    /// Deliver the events queued right now, then return how many reached
    /// the handler.
    ///
    /// # Errors
    ///
    /// [`InterruptError::AlreadyRunning`] while [`Self::run`] is active.
    pub async fn process_pending<H: InterruptHandler>(
        &self,
        handler: &H,
    ) -> Result<usize, InterruptError> {
        let _running = RunGuard::acquire(&self.running).ok_or(InterruptError::AlreadyRunning)?;
        let mut delivered = 0usize;
        for _ in 0..self.queue.len() {
            let Ok(event) = self.queue.try_receive() else {
                break;
            };
            if self.dispatch(handler, &event).await {
                delivered = delivered.saturating_add(1);
            }
        }
        Ok(delivered)
    }

    async fn dispatch<H: InterruptHandler>(&self, handler: &H, event: &InterruptEvent) -> bool {
        if self.registration(event.pin).map(|c| c.source) != Some(event.source) {
            debug!("stale event for gpio {} discarded", event.pin);
            return false;
        }
        if handler.on_interrupt(event).await.is_err() {
            self.handler_errors.fetch_add(1, Ordering::Relaxed);
            warn!("{} handler failed (gpio {})", event.source.name(), event.pin);
        }
        true
    }

    /// Events discarded because the queue was full.
    pub fn dropped_events(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Edges suppressed by glitch filters.
    pub fn filtered_events(&self) -> u32 {
        self.filtered.load(Ordering::Relaxed)
    }

    /// Handler invocations that returned an error.
    pub fn handler_errors(&self) -> u32 {
        self.handler_errors.load(Ordering::Relaxed)
    }

    /// Events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Clears a "task running" flag when the task future is dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::MockInterruptController;

    type Dispatcher = InterruptDispatcher<NoopRawMutex, MockInterruptController, 4, 3>;

    fn trackball_up() -> PinInterruptConfig {
        PinInterruptConfig::new(15, InterruptSource::TrackballUp)
            .active_level(ActiveLevel::Low)
            .trigger(InterruptTrigger::Falling)
            .pull(Pull::Up)
            .filter(GlitchFilter::Pin)
    }

    fn at_ms(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    #[test]
    fn test_register_arms_controller_with_pin_config() {
        let gpio = MockInterruptController::new();
        let dispatcher = Dispatcher::new(gpio.clone());

        dispatcher.register(trackball_up()).unwrap();

        assert!(dispatcher.is_registered(15));
        assert_eq!(gpio.config_of(15), Some(trackball_up().pin_config()));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let dispatcher = Dispatcher::new(MockInterruptController::new());
        dispatcher.register(trackball_up()).unwrap();
        assert_eq!(
            dispatcher.register(trackball_up()),
            Err(InterruptError::AlreadyRegistered(15))
        );
        assert_eq!(dispatcher.registered_pins().as_slice(), &[15]);
    }

    #[test]
    fn test_claim_failure_records_nothing() {
        let gpio = MockInterruptController::new();
        gpio.fail_on(15);
        let dispatcher = Dispatcher::new(gpio.clone());

        assert_eq!(
            dispatcher.register(trackball_up()),
            Err(InterruptError::ClaimFailed(15))
        );
        assert!(!dispatcher.is_registered(15));
        assert!(gpio.enabled_pins().is_empty());
    }

    #[test]
    fn test_table_full() {
        let dispatcher = Dispatcher::new(MockInterruptController::new());
        for pin in [1, 2, 3] {
            dispatcher
                .register(PinInterruptConfig::new(pin, InterruptSource::Button(pin)))
                .unwrap();
        }
        assert_eq!(
            dispatcher.register(PinInterruptConfig::new(4, InterruptSource::Button(4))),
            Err(InterruptError::TableFull)
        );
    }

    #[test]
    fn test_edges_are_qualified_by_trigger() {
        let dispatcher = Dispatcher::new(MockInterruptController::new());
        dispatcher.register(trackball_up()).unwrap();

        assert_eq!(dispatcher.on_edge_at(15, PinState::High, at_ms(0)), EdgeOutcome::Ignored);
        assert_eq!(dispatcher.on_edge_at(99, PinState::Low, at_ms(0)), EdgeOutcome::Ignored);
        assert_eq!(dispatcher.on_edge_at(15, PinState::Low, at_ms(0)), EdgeOutcome::Queued);
        assert_eq!(dispatcher.pending(), 1);
    }

    #[test]
    fn test_flex_filter_is_per_pin() {
        let flex = GlitchFilter::Flex { window_us: 2_000 };
        let dispatcher = Dispatcher::new(MockInterruptController::new());
        dispatcher.register(trackball_up().filter(flex)).unwrap();
        dispatcher
            .register(
                PinInterruptConfig::new(3, InterruptSource::TrackballDown)
                    .trigger(InterruptTrigger::Falling)
                    .filter(flex),
            )
            .unwrap();

        assert_eq!(dispatcher.on_edge_at(15, PinState::Low, at_ms(10)), EdgeOutcome::Queued);
        // Another pin is unaffected by pin 15's window.
        assert_eq!(dispatcher.on_edge_at(3, PinState::Low, at_ms(11)), EdgeOutcome::Queued);
        assert_eq!(dispatcher.on_edge_at(15, PinState::Low, at_ms(11)), EdgeOutcome::Filtered);
        assert_eq!(dispatcher.on_edge_at(15, PinState::Low, at_ms(12)), EdgeOutcome::Queued);
        assert_eq!(dispatcher.filtered_events(), 1);
    }

    #[test]
    fn test_pin_filter_is_left_to_the_controller() {
        let gpio = MockInterruptController::new();
        let dispatcher = Dispatcher::new(gpio.clone());
        dispatcher.register(trackball_up()).unwrap();

        assert_eq!(gpio.config_of(15).map(|c| c.filter), Some(GlitchFilter::Pin));
        for us in [0, 200, 400] {
            assert_eq!(
                dispatcher.on_edge_at(15, PinState::Low, Instant::from_micros(us)),
                EdgeOutcome::Queued
            );
        }
        assert_eq!(dispatcher.filtered_events(), 0);
    }

    #[test]
    fn test_overflow_drops_newest() {
        let dispatcher = Dispatcher::new(MockInterruptController::new());
        dispatcher
            .register(PinInterruptConfig::new(16, InterruptSource::Touch))
            .unwrap();

        for ms in 0..6 {
            dispatcher.on_edge_at(16, PinState::High, at_ms(ms));
        }

        assert_eq!(dispatcher.pending(), 4);
        assert_eq!(dispatcher.dropped_events(), 2);
    }

    #[test]
    fn test_deregister_releases_pin() {
        let gpio = MockInterruptController::new();
        let dispatcher = Dispatcher::new(gpio.clone());
        dispatcher.register(trackball_up()).unwrap();

        dispatcher.deregister(15).unwrap();

        assert!(!dispatcher.is_registered(15));
        assert!(gpio.enabled_pins().is_empty());
        assert_eq!(dispatcher.deregister(15), Err(InterruptError::NotRegistered(15)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            InterruptError::AlreadyRegistered(16).to_string(),
            "gpio 16 is already registered"
        );
    }
}
