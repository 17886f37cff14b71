//! Shared SPI bus arbiter.
//!
//! The LCD and the uSD card sit on one SPI bus. The arbiter owns the bus and
//! every device's chip-select (and optional data/command) pin; drivers only
//! hold a [`DeviceHandle`] and submit whole transactions.
//!
//! ```text
//!   LCD driver ──submit(lcd, tx)──┐
//!                                 ├──▶ Mutex<BusState> ──▶ SpiPeripheral
//!   SD driver ──BusDevice (eh1)───┘    one transaction at a time
//! ```
//!
//! A transaction holds the bus lock from chip-select assert to release, so
//! transactions never overlap. Per-device order follows submission order for
//! a sequential submitter; devices have no ordering relative to each other.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{ErrorKind, ErrorType, Operation};
use platform::config::LCD_CLOCK_HZ;
use platform::{GpioNum, SpiConfig, SpiMode, SpiPeripheral};

use crate::pins;

/// Bus-level configuration applied once by [`SharedSpiBus::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiBusConfig {
    /// MOSI GPIO
    pub mosi: GpioNum,
    /// MISO GPIO
    pub miso: GpioNum,
    /// SCLK GPIO
    pub sclk: GpioNum,
    /// Clock used until the first device transaction
    pub clock: SpiConfig,
}

impl Default for SpiBusConfig {
    fn default() -> Self {
        Self {
            mosi: pins::SPI_MOSI,
            miso: pins::SPI_MISO,
            sclk: pins::SPI_SCLK,
            clock: SpiConfig::mode0(LCD_CLOCK_HZ),
        }
    }
}

/// A device to attach: its select pins and clock.
#[derive(Debug)]
pub struct SpiDeviceConfig<P> {
    /// Chip select, active low
    pub cs: P,
    /// Data/command select; `None` for devices without one
    pub dc: Option<P>,
    /// Clock frequency in Hz
    pub frequency: u32,
    /// SPI mode
    pub mode: SpiMode,
}

impl<P> SpiDeviceConfig<P> {
    fn clock(&self) -> SpiConfig {
        SpiConfig {
            mode: self.mode,
            ..SpiConfig::mode0(self.frequency)
        }
    }
}

/// Index of an attached device in the arbiter's slot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceHandle(u8);

impl DeviceHandle {
    /// Slot index
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Data phase of a [`BusTransaction`].
#[derive(Debug)]
pub enum BusData<'a> {
    /// Command only
    None,
    /// Write bytes
    Write(&'a [u8]),
    /// Read bytes
    Read(&'a mut [u8]),
    /// Full-duplex transfer
    Transfer {
        /// Receive buffer
        read: &'a mut [u8],
        /// Bytes to send
        write: &'a [u8],
    },
}

/// One chip-select window: command bytes with DC low, then the data phase
/// with DC high.
#[derive(Debug)]
pub struct BusTransaction<'a> {
    /// Command bytes; may be empty
    pub command: &'a [u8],
    /// Data phase
    pub data: BusData<'a>,
}

impl<'a> BusTransaction<'a> {
    /// Command without data
    pub fn command(command: &'a [u8]) -> Self {
        Self {
            command,
            data: BusData::None,
        }
    }

    /// Command followed by a data write
    pub fn write(command: &'a [u8], data: &'a [u8]) -> Self {
        Self {
            command,
            data: BusData::Write(data),
        }
    }

    /// Command followed by a read into `buffer`
    pub fn read(command: &'a [u8], buffer: &'a mut [u8]) -> Self {
        Self {
            command,
            data: BusData::Read(buffer),
        }
    }
}

/// Bus arbiter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// [`SharedSpiBus::initialize`] has not succeeded
    NotInitialized,
    /// The bus could not be claimed or configured
    ClaimFailed,
    /// Every device slot is in use
    NoFreeSlot,
    /// The handle does not name an attached device
    InvalidHandle,
    /// A transfer on the bus failed
    Transfer,
    /// A select pin could not be driven
    Pin,
}

#[cfg(feature = "std")]
impl std::error::Error for BusError {}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "spi bus is not initialized"),
            Self::ClaimFailed => write!(f, "spi bus could not be claimed"),
            Self::NoFreeSlot => write!(f, "no free spi device slot"),
            Self::InvalidHandle => write!(f, "spi device handle is not attached"),
            Self::Transfer => write!(f, "spi transfer failed"),
            Self::Pin => write!(f, "spi select pin could not be driven"),
        }
    }
}

impl embedded_hal::spi::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Pin => ErrorKind::ChipSelectFault,
            _ => ErrorKind::Other,
        }
    }
}

/// A rejected [`SharedSpiBus::attach`]; hands the pins back to the caller.
#[derive(Debug)]
pub struct AttachError<P> {
    /// Why the device was not attached
    pub error: BusError,
    /// The configuration passed to `attach`
    pub config: SpiDeviceConfig<P>,
}

struct BusState<B, P, const N: usize> {
    bus: B,
    config: Option<SpiBusConfig>,
    applied: Option<SpiConfig>,
    devices: [Option<SpiDeviceConfig<P>>; N],
}

/// Arbiter for one SPI bus shared by up to `N` devices.
pub struct SharedSpiBus<M: RawMutex, B, P, const N: usize = 2> {
    state: Mutex<M, BusState<B, P, N>>,
    initialized: AtomicBool,
    transactions: AtomicU32,
}

impl<M, B, P, const N: usize> SharedSpiBus<M, B, P, N>
where
    M: RawMutex,
    B: SpiPeripheral,
    P: OutputPin,
{
    /// Wrap an unclaimed bus.
    pub fn new(bus: B) -> Self {
        Self {
            state: Mutex::new(BusState {
                bus,
                config: None,
                applied: None,
                devices: core::array::from_fn(|_| None),
            }),
            initialized: AtomicBool::new(false),
            transactions: AtomicU32::new(0),
        }
    }

    /// Claim and configure the bus. Succeeds immediately once initialized.
    ///
    /// # Errors
    ///
    /// [`BusError::ClaimFailed`]; the bus stays unclaimed and no device can
    /// attach.
    pub async fn initialize(&self, config: SpiBusConfig) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        if state.config.is_some() {
            return Ok(());
        }
        state.bus.configure(config.clock).map_err(|_| {
            warn!("spi bus claim failed");
            BusError::ClaimFailed
        })?;
        state.applied = Some(config.clock);
        state.config = Some(config);
        self.initialized.store(true, Ordering::Release);
        info!(
            "spi bus ready: mosi {} miso {} sclk {}",
            config.mosi,
            config.miso,
            config.sclk
        );
        Ok(())
    }

    /// Whether [`Self::initialize`] has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Bus configuration, once initialized.
    pub async fn config(&self) -> Option<SpiBusConfig> {
        self.state.lock().await.config
    }

    /// Attach a device. Its chip select is driven high (deselected).
    ///
    /// # Errors
    ///
    /// [`BusError::NotInitialized`], [`BusError::NoFreeSlot`] or
    /// [`BusError::Pin`]; the configuration is returned untouched.
    pub async fn attach(
        &self,
        mut config: SpiDeviceConfig<P>,
    ) -> Result<DeviceHandle, AttachError<P>> {
        let mut state = self.state.lock().await;
        if state.config.is_none() {
            return Err(AttachError {
                error: BusError::NotInitialized,
                config,
            });
        }
        let Some((index, slot)) = state
            .devices
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
        else {
            return Err(AttachError {
                error: BusError::NoFreeSlot,
                config,
            });
        };
        let Ok(id) = u8::try_from(index) else {
            return Err(AttachError {
                error: BusError::NoFreeSlot,
                config,
            });
        };
        if config.cs.set_high().is_err() {
            return Err(AttachError {
                error: BusError::Pin,
                config,
            });
        }
        debug!("spi device {} attached at {} Hz", id, config.frequency);
        *slot = Some(config);
        Ok(DeviceHandle(id))
    }

    /// Detach a device and return its pins.
    ///
    /// # Errors
    ///
    /// [`BusError::InvalidHandle`] if nothing is attached at `handle`.
    pub async fn detach(&self, handle: DeviceHandle) -> Result<SpiDeviceConfig<P>, BusError> {
        let mut state = self.state.lock().await;
        let config = state
            .devices
            .get_mut(handle.index())
            .and_then(Option::take)
            .ok_or(BusError::InvalidHandle)?;
        debug!("spi device {} detached", handle.index());
        Ok(config)
    }

    /// Run one transaction for `handle`.
    ///
    /// Suspends only while another transaction holds the bus.
    ///
    /// # Errors
    ///
    /// [`BusError::InvalidHandle`], [`BusError::Transfer`] or [`BusError::Pin`].
    /// Chip select is released even when the transfer fails.
    pub async fn submit(
        &self,
        handle: DeviceHandle,
        transaction: BusTransaction<'_>,
    ) -> Result<(), BusError> {
        let mut guard = self.select(handle).await?;
        let BusState { bus, devices, .. } = &mut *guard;
        let device = devices
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(BusError::InvalidHandle)?;

        device.cs.set_low().map_err(|_| BusError::Pin)?;
        let result = write_transaction(bus, device.dc.as_mut(), transaction).await;
        let released = device.cs.set_high().map_err(|_| BusError::Pin);
        result.and(released)?;

        self.transactions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Run a sequence of embedded-hal operations inside one chip-select
    /// window. The DC pin is left alone.
    ///
    /// # Errors
    ///
    /// As [`Self::submit`].
    pub async fn transaction(
        &self,
        handle: DeviceHandle,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), BusError> {
        let mut guard = self.select(handle).await?;
        let BusState { bus, devices, .. } = &mut *guard;
        let device = devices
            .get_mut(handle.index())
            .and_then(Option::as_mut)
            .ok_or(BusError::InvalidHandle)?;

        device.cs.set_low().map_err(|_| BusError::Pin)?;
        let result = run_operations(bus, operations).await;
        let released = device.cs.set_high().map_err(|_| BusError::Pin);
        result.and(released)?;

        self.transactions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// An [`embedded_hal_async::spi::SpiDevice`] for `handle`.
    pub fn device(&self, handle: DeviceHandle) -> BusDevice<'_, M, B, P, N> {
        BusDevice { bus: self, handle }
    }

    /// Completed transactions since creation.
    pub fn transactions(&self) -> u32 {
        self.transactions.load(Ordering::Relaxed)
    }

    /// Lock the bus for `handle` and apply its clock if another device
    /// changed it.
    async fn select(
        &self,
        handle: DeviceHandle,
    ) -> Result<MutexGuard<'_, M, BusState<B, P, N>>, BusError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.config.is_none() {
            return Err(BusError::NotInitialized);
        }
        let clock = state
            .devices
            .get(handle.index())
            .and_then(Option::as_ref)
            .map(SpiDeviceConfig::clock)
            .ok_or(BusError::InvalidHandle)?;
        if state.applied != Some(clock) {
            state.bus.configure(clock).map_err(|_| BusError::Transfer)?;
            state.applied = Some(clock);
        }
        Ok(guard)
    }
}

async fn write_transaction<B: SpiPeripheral, P: OutputPin>(
    bus: &mut B,
    mut dc: Option<&mut P>,
    transaction: BusTransaction<'_>,
) -> Result<(), BusError> {
    if !transaction.command.is_empty() {
        if let Some(dc) = dc.as_deref_mut() {
            dc.set_low().map_err(|_| BusError::Pin)?;
        }
        bus.write(transaction.command)
            .await
            .map_err(|_| BusError::Transfer)?;
    }

    if !matches!(transaction.data, BusData::None) {
        if let Some(dc) = dc.as_deref_mut() {
            dc.set_high().map_err(|_| BusError::Pin)?;
        }
    }
    let data = match transaction.data {
        BusData::None => Ok(()),
        BusData::Write(data) => bus.write(data).await,
        BusData::Read(buffer) => bus.read(buffer).await,
        BusData::Transfer { read, write } => bus.transfer(read, write).await,
    };
    data.map_err(|_| BusError::Transfer)?;

    bus.flush().await.map_err(|_| BusError::Transfer)
}

async fn run_operations<B: SpiPeripheral>(
    bus: &mut B,
    operations: &mut [Operation<'_, u8>],
) -> Result<(), BusError> {
    for operation in operations.iter_mut() {
        let result = match operation {
            Operation::Read(buffer) => bus.read(buffer).await,
            Operation::Write(data) => bus.write(data).await,
            Operation::Transfer(read, write) => bus.transfer(read, write).await,
            Operation::TransferInPlace(buffer) => bus.transfer_in_place(buffer).await,
            Operation::DelayNs(ns) => {
                bus.flush().await.map_err(|_| BusError::Transfer)?;
                Timer::after(Duration::from_micros(u64::from(ns.div_ceil(1_000)))).await;
                Ok(())
            }
        };
        result.map_err(|_| BusError::Transfer)?;
    }
    bus.flush().await.map_err(|_| BusError::Transfer)
}

/// One attached device as an `embedded-hal-async` [`SpiDevice`].
///
/// [`SpiDevice`]: embedded_hal_async::spi::SpiDevice
pub struct BusDevice<'a, M: RawMutex, B, P, const N: usize> {
    bus: &'a SharedSpiBus<M, B, P, N>,
    handle: DeviceHandle,
}

impl<M: RawMutex, B, P, const N: usize> BusDevice<'_, M, B, P, N> {
    /// Handle this view addresses
    pub fn handle(&self) -> DeviceHandle {
        self.handle
    }
}

impl<M: RawMutex, B, P, const N: usize> ErrorType for BusDevice<'_, M, B, P, N> {
    type Error = BusError;
}

impl<M, B, P, const N: usize> embedded_hal_async::spi::SpiDevice for BusDevice<'_, M, B, P, N>
where
    M: RawMutex,
    B: SpiPeripheral,
    P: OutputPin,
{
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BusError> {
        self.bus.transaction(self.handle, operations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use platform::mocks::{BusEvent, EventLog, MockPin, MockSpiBus};

    type Bus = SharedSpiBus<NoopRawMutex, MockSpiBus, MockPin, 2>;

    fn device(log: &EventLog, cs: &'static str, frequency: u32) -> SpiDeviceConfig<MockPin> {
        SpiDeviceConfig {
            cs: MockPin::logged(cs, log),
            dc: None,
            frequency,
            mode: SpiMode::Mode0,
        }
    }

    #[test]
    fn test_attach_before_initialize_returns_pins() {
        let log = EventLog::new();
        let bus = Bus::new(MockSpiBus::new(log.clone()));

        let err = block_on(bus.attach(device(&log, "cs", 1_000_000))).unwrap_err();

        assert_eq!(err.error, BusError::NotInitialized);
        assert_eq!(err.config.frequency, 1_000_000);
        assert!(log.events().is_empty(), "pins untouched");
    }

    #[test]
    fn test_failed_claim_leaves_bus_unclaimed() {
        let log = EventLog::new();
        let bus = Bus::new(MockSpiBus::new(log.clone()).failing_configure());

        assert_eq!(
            block_on(bus.initialize(SpiBusConfig::default())),
            Err(BusError::ClaimFailed)
        );
        assert!(!bus.is_initialized());
        let err = block_on(bus.attach(device(&log, "cs", 1_000_000))).unwrap_err();
        assert_eq!(err.error, BusError::NotInitialized);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let log = EventLog::new();
        let bus = Bus::new(MockSpiBus::new(log.clone()));
        block_on(bus.initialize(SpiBusConfig::default())).unwrap();
        block_on(bus.initialize(SpiBusConfig::default())).unwrap();
        let configures = log
            .events()
            .iter()
            .filter(|e| matches!(e, BusEvent::Configure(_)))
            .count();
        assert_eq!(configures, 1);
    }

    #[test]
    fn test_arena_full_and_detach_frees_slot() {
        let log = EventLog::new();
        let bus = Bus::new(MockSpiBus::new(log.clone()));
        block_on(bus.initialize(SpiBusConfig::default())).unwrap();

        let a = block_on(bus.attach(device(&log, "a", 1))).unwrap();
        let _b = block_on(bus.attach(device(&log, "b", 1))).unwrap();
        let err = block_on(bus.attach(device(&log, "c", 1))).unwrap_err();
        assert_eq!(err.error, BusError::NoFreeSlot);

        block_on(bus.detach(a)).unwrap();
        assert_eq!(block_on(bus.detach(a)).unwrap_err(), BusError::InvalidHandle);
        let c = block_on(bus.attach(err.config)).unwrap();
        assert_eq!(c, a, "freed slot is reused");
    }

    #[test]
    fn test_clock_reapplied_only_on_change() {
        let log = EventLog::new();
        let bus = Bus::new(MockSpiBus::new(log.clone()));
        block_on(bus.initialize(SpiBusConfig::default())).unwrap();
        let lcd = block_on(bus.attach(device(&log, "lcd", LCD_CLOCK_HZ))).unwrap();
        let sd = block_on(bus.attach(device(&log, "sd", 20_000_000))).unwrap();
        log.clear();

        block_on(bus.submit(lcd, BusTransaction::command(&[0x29]))).unwrap();
        block_on(bus.submit(sd, BusTransaction::command(&[0x40]))).unwrap();
        block_on(bus.submit(sd, BusTransaction::command(&[0x41]))).unwrap();

        let clocks: Vec<u32> = log
            .events()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Configure(c) => Some(c.frequency),
                _ => None,
            })
            .collect();
        assert_eq!(clocks, vec![20_000_000]);
        assert_eq!(bus.transactions(), 3);
    }

    #[test]
    fn test_error_kind() {
        use embedded_hal::spi::Error;
        assert_eq!(BusError::Pin.kind(), ErrorKind::ChipSelectFault);
        assert_eq!(BusError::Transfer.kind(), ErrorKind::Other);
    }
}
