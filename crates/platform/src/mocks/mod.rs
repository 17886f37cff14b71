//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests.
//!
//! Mocks that get moved into the board core (controllers, pins, drivers)
//! are cheap `Clone` handles over shared state, so a test keeps one clone
//! and inspects what the board did with the other.

#![cfg(any(test, feature = "std"))]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::*;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Error injected by a mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    /// The test asked this operation to fail
    Injected,
}

impl embedded_hal::digital::Error for MockError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::pwm::Error for MockError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

// ---------------------------------------------------------------------------
// Shared bus event log
// ---------------------------------------------------------------------------

/// One observable action on the SPI bus or its control pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A named output pin changed level
    Pin {
        /// Pin name given to [`MockPin::new`]
        name: &'static str,
        /// New level
        high: bool,
    },
    /// Bus reconfigured
    Configure(SpiConfig),
    /// Bytes written
    Write(Vec<u8>),
    /// Bytes read
    Read(usize),
    /// Full-duplex transfer, bytes written
    Transfer(Vec<u8>),
    /// Bus flushed
    Flush,
}

/// Ordered log shared by a [`MockSpiBus`] and its [`MockPin`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<BusEvent>>>);

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn push(&self, event: BusEvent) {
        lock(&self.0).push(event);
    }

    /// Snapshot of every event so far
    pub fn events(&self) -> Vec<BusEvent> {
        lock(&self.0).clone()
    }

    /// Bytes written while `cs` was low, grouped per selection window.
    pub fn writes_while_selected(&self, cs: &'static str) -> Vec<Vec<u8>> {
        let mut selected = false;
        let mut windows = Vec::new();
        let mut current = Vec::new();
        for event in lock(&self.0).iter() {
            match event {
                BusEvent::Pin { name, high } if *name == cs => {
                    if *high && selected {
                        windows.push(core::mem::take(&mut current));
                    }
                    selected = !*high;
                }
                BusEvent::Write(bytes) if selected => current.extend_from_slice(bytes),
                _ => {}
            }
        }
        windows
    }

    /// Clear the log
    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

// ---------------------------------------------------------------------------
// SPI bus and pins
// ---------------------------------------------------------------------------

/// Mock SPI bus recording every operation into an [`EventLog`].
///
/// Every data operation yields once before completing, which lets a test
/// executor interleave competing submitters exactly where a DMA transfer
/// would suspend on hardware.
pub struct MockSpiBus {
    log: EventLog,
    fail_configure: bool,
    read_fill: u8,
}

impl MockSpiBus {
    /// Create a bus logging into `log`
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            fail_configure: false,
            read_fill: 0xFF,
        }
    }

    /// Make [`SpiPeripheral::configure`] fail
    pub fn failing_configure(mut self) -> Self {
        self.fail_configure = true;
        self
    }

    /// Byte returned by reads
    pub fn with_read_fill(mut self, fill: u8) -> Self {
        self.read_fill = fill;
        self
    }
}

impl SpiPeripheral for MockSpiBus {
    type Error = MockError;

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        embassy_futures::yield_now().await;
        read.fill(self.read_fill);
        self.log.push(BusEvent::Transfer(write.to_vec()));
        Ok(())
    }

    async fn transfer_in_place(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        embassy_futures::yield_now().await;
        self.log.push(BusEvent::Transfer(buffer.to_vec()));
        buffer.fill(self.read_fill);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        embassy_futures::yield_now().await;
        self.log.push(BusEvent::Write(data.to_vec()));
        Ok(())
    }

    async fn read(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        embassy_futures::yield_now().await;
        buffer.fill(self.read_fill);
        self.log.push(BusEvent::Read(buffer.len()));
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.log.push(BusEvent::Flush);
        Ok(())
    }

    fn configure(&mut self, config: SpiConfig) -> Result<(), Self::Error> {
        if self.fail_configure {
            return Err(MockError::Injected);
        }
        self.log.push(BusEvent::Configure(config));
        Ok(())
    }
}

/// Mock output pin; logs level changes when attached to an [`EventLog`].
#[derive(Debug, Clone)]
pub struct MockPin {
    name: &'static str,
    high: Arc<Mutex<bool>>,
    log: Option<EventLog>,
    fail: bool,
}

impl MockPin {
    /// Stand-alone pin, initially low
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            high: Arc::new(Mutex::new(false)),
            log: None,
            fail: false,
        }
    }

    /// Pin that logs into `log`
    pub fn logged(name: &'static str, log: &EventLog) -> Self {
        Self {
            log: Some(log.clone()),
            ..Self::new(name)
        }
    }

    /// Pin whose writes always fail
    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    /// Current level
    pub fn is_high(&self) -> bool {
        *lock(&self.high)
    }

    fn set(&mut self, high: bool) -> Result<(), MockError> {
        if self.fail {
            return Err(MockError::Injected);
        }
        *lock(&self.high) = high;
        if let Some(log) = &self.log {
            log.push(BusEvent::Pin {
                name: self.name,
                high,
            });
        }
        Ok(())
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = MockError;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true)
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false)
    }
}

// ---------------------------------------------------------------------------
// GPIO interrupt controller
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ControllerState {
    enabled: Vec<(GpioNum, PinConfig)>,
    failing: Vec<GpioNum>,
}

/// Mock GPIO interrupt controller
#[derive(Debug, Clone, Default)]
pub struct MockInterruptController {
    state: Arc<Mutex<ControllerState>>,
}

impl MockInterruptController {
    /// Create a controller where every pin can be claimed
    pub fn new() -> Self {
        Self::default()
    }

    /// Make claims of `pin` fail
    pub fn fail_on(&self, pin: GpioNum) {
        lock(&self.state).failing.push(pin);
    }

    /// Pins currently armed
    pub fn enabled_pins(&self) -> Vec<GpioNum> {
        lock(&self.state).enabled.iter().map(|(p, _)| *p).collect()
    }

    /// Configuration `pin` was armed with
    pub fn config_of(&self, pin: GpioNum) -> Option<PinConfig> {
        lock(&self.state)
            .enabled
            .iter()
            .find(|(p, _)| *p == pin)
            .map(|(_, c)| *c)
    }
}

impl InterruptController for MockInterruptController {
    type Error = MockError;

    fn enable(&mut self, pin: GpioNum, config: &PinConfig) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        if state.failing.contains(&pin) {
            return Err(MockError::Injected);
        }
        state.enabled.push((pin, *config));
        Ok(())
    }

    fn disable(&mut self, pin: GpioNum) -> Result<(), Self::Error> {
        lock(&self.state).enabled.retain(|(p, _)| *p != pin);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// I2S output
// ---------------------------------------------------------------------------

/// Mock I2S sink recording every transfer
#[derive(Debug, Default)]
pub struct MockI2s {
    configs: Vec<AudioConfig>,
    /// Writes completed when each configuration was applied
    config_marks: Vec<usize>,
    writes: Vec<Vec<u8>>,
    fail_writes: bool,
}

impl MockI2s {
    /// Create a new sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Configurations applied, in order
    pub fn configs(&self) -> &[AudioConfig] {
        &self.configs
    }

    /// `(sample_rate, writes completed before it)` for every configuration
    pub fn config_history(&self) -> Vec<(u32, usize)> {
        self.configs
            .iter()
            .zip(&self.config_marks)
            .map(|(c, n)| (c.sample_rate, *n))
            .collect()
    }

    /// Transfers written, in order
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// All written bytes concatenated
    pub fn bytes(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

impl I2sOutput for MockI2s {
    type Error = MockError;

    async fn configure(&mut self, config: AudioConfig) -> Result<(), Self::Error> {
        self.configs.push(config);
        self.config_marks.push(self.writes.len());
        Ok(())
    }

    async fn write(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        embassy_futures::yield_now().await;
        if self.fail_writes {
            return Err(MockError::Injected);
        }
        self.writes.push(frame.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Touch controller and keyboard
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TouchState {
    fail_init: bool,
    initialized: bool,
    samples: VecDeque<TouchpadData>,
    reads: usize,
}

/// Mock touch controller replaying scripted samples
#[derive(Debug, Clone, Default)]
pub struct MockTouch {
    state: Arc<Mutex<TouchState>>,
}

impl MockTouch {
    /// Create a controller with no samples queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `init` fail until cleared
    pub fn set_fail_init(&self, fail: bool) {
        lock(&self.state).fail_init = fail;
    }

    /// Queue a sample for the next read
    pub fn push_sample(&self, sample: TouchpadData) {
        lock(&self.state).samples.push_back(sample);
    }

    /// Number of reads performed
    pub fn reads(&self) -> usize {
        lock(&self.state).reads
    }

    /// Whether `init` succeeded
    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }
}

impl TouchController for MockTouch {
    type Error = MockError;

    async fn init(&mut self) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        if state.fail_init {
            return Err(MockError::Injected);
        }
        state.initialized = true;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<TouchpadData>, Self::Error> {
        let mut state = lock(&self.state);
        state.reads = state.reads.saturating_add(1);
        Ok(state.samples.pop_front())
    }
}

#[derive(Debug, Default)]
struct KeyboardState {
    fail_init: bool,
    keys: VecDeque<u8>,
}

/// Mock keyboard replaying scripted key presses
#[derive(Debug, Clone, Default)]
pub struct MockKeyboard {
    state: Arc<Mutex<KeyboardState>>,
}

impl MockKeyboard {
    /// Create a keyboard with no keys queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `init` fail until cleared
    pub fn set_fail_init(&self, fail: bool) {
        lock(&self.state).fail_init = fail;
    }

    /// Queue key presses
    pub fn press(&self, keys: &[u8]) {
        lock(&self.state).keys.extend(keys.iter().copied());
    }
}

impl KeyboardDevice for MockKeyboard {
    type Error = MockError;

    async fn init(&mut self) -> Result<(), Self::Error> {
        if lock(&self.state).fail_init {
            return Err(MockError::Injected);
        }
        Ok(())
    }

    async fn read_key(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(lock(&self.state).keys.pop_front())
    }
}

// ---------------------------------------------------------------------------
// uSD card
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CardState {
    fail_mount: bool,
    mounts: Vec<SdCardConfig>,
    mounted: bool,
}

/// Mock card mount. A mount clocks 10 idle bytes over the bus, as the SD
/// SPI-mode wake-up sequence does.
#[derive(Debug, Clone, Default)]
pub struct MockCardMount {
    state: Arc<Mutex<CardState>>,
}

impl MockCardMount {
    /// Card info reported by a successful mount
    pub const INFO: CardInfo = CardInfo {
        capacity_bytes: 32 * 1024 * 1024 * 1024,
        high_capacity: true,
    };

    /// Create a card that mounts successfully
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `mount` fail until cleared
    pub fn set_fail_mount(&self, fail: bool) {
        lock(&self.state).fail_mount = fail;
    }

    /// Configurations passed to `mount`
    pub fn mount_attempts(&self) -> Vec<SdCardConfig> {
        lock(&self.state).mounts.clone()
    }

    /// Whether the card is currently mounted
    pub fn is_mounted(&self) -> bool {
        lock(&self.state).mounted
    }
}

impl CardMount for MockCardMount {
    type Error = MockError;

    async fn mount<D>(&mut self, spi: &mut D, config: &SdCardConfig) -> Result<CardInfo, MockError>
    where
        D: embedded_hal_async::spi::SpiDevice,
    {
        lock(&self.state).mounts.push(*config);
        spi.write(&[0xFF; 10])
            .await
            .map_err(|_| MockError::Injected)?;
        let mut state = lock(&self.state);
        if state.fail_mount {
            return Err(MockError::Injected);
        }
        state.mounted = true;
        Ok(Self::INFO)
    }
}

// ---------------------------------------------------------------------------
// Backlight
// ---------------------------------------------------------------------------

/// Mock PWM backlight channel with an 8-bit duty range
#[derive(Debug, Clone, Default)]
pub struct MockBacklight {
    duty: Arc<Mutex<u16>>,
}

impl MockBacklight {
    /// Create a dark backlight
    pub fn new() -> Self {
        Self::default()
    }

    /// Current duty cycle, 0..=255
    pub fn duty(&self) -> u16 {
        *lock(&self.duty)
    }
}

impl embedded_hal::pwm::ErrorType for MockBacklight {
    type Error = MockError;
}

impl embedded_hal::pwm::SetDutyCycle for MockBacklight {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        *lock(&self.duty) = duty;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::OutputPin;

    #[tokio::test]
    async fn test_mock_spi_bus_logs_in_order() {
        let log = EventLog::new();
        let mut bus = MockSpiBus::new(log.clone());
        let mut cs = MockPin::logged("cs", &log);

        cs.set_low().unwrap();
        bus.write(&[0x2A]).await.unwrap();
        cs.set_high().unwrap();

        assert_eq!(
            log.events(),
            vec![
                BusEvent::Pin { name: "cs", high: false },
                BusEvent::Write(vec![0x2A]),
                BusEvent::Pin { name: "cs", high: true },
            ]
        );
        assert_eq!(log.writes_while_selected("cs"), vec![vec![0x2A]]);
    }

    #[tokio::test]
    async fn test_mock_touch_replays_samples() {
        let mut touch = MockTouch::new();
        touch.push_sample(TouchpadData {
            num_touch_points: 1,
            x: 10,
            y: 20,
            ..TouchpadData::default()
        });

        touch.init().await.unwrap();
        assert_eq!(touch.read().await.unwrap().map(|s| s.x), Some(10));
        assert_eq!(touch.read().await.unwrap(), None);
        assert_eq!(touch.reads(), 2);
    }

    #[tokio::test]
    async fn test_mock_i2s() {
        let mut out = MockI2s::new();

        out.configure(AudioConfig::default()).await.unwrap();
        out.write(&[1, 2, 3, 4]).await.unwrap();

        assert_eq!(out.configs().len(), 1);
        assert_eq!(out.writes(), &[vec![1, 2, 3, 4]]);
    }

    #[test]
    fn test_mock_controller_injected_failure() {
        let mut gpio = MockInterruptController::new();
        let config = PinConfig {
            trigger: InterruptTrigger::Falling,
            pull: Pull::Up,
            filter: GlitchFilter::Pin,
        };
        gpio.fail_on(3);

        assert!(gpio.enable(3, &config).is_err());
        assert!(gpio.enable(15, &config).is_ok());
        assert_eq!(gpio.enabled_pins(), vec![15]);
    }
}
