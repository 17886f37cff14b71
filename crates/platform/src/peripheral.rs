//! Peripheral abstraction layer
//!
//! Provides the trait-based SPI abstraction shared by the LCD and the uSD
//! card. Chip select is not part of the bus: the board core drives it per
//! transaction.

/// SPI peripheral abstraction
pub trait SpiPeripheral {
    /// Error type
    type Error: core::fmt::Debug;

    /// Transfer data (full duplex)
    fn transfer(
        &mut self,
        read: &mut [u8],
        write: &[u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Transfer data in place (full duplex, `buffer` is sent and overwritten)
    fn transfer_in_place(
        &mut self,
        buffer: &mut [u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Write data (half duplex)
    fn write(&mut self, data: &[u8])
        -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Read data (half duplex)
    fn read(
        &mut self,
        buffer: &mut [u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Wait until every queued word has left the shift register
    fn flush(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Configure SPI mode and frequency
    fn configure(&mut self, config: SpiConfig) -> Result<(), Self::Error>;
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// SPI mode (CPOL, CPHA)
    pub mode: SpiMode,
    /// Bit order
    pub bit_order: BitOrder,
}

impl SpiConfig {
    /// Mode 0, MSB first at `frequency`.
    pub const fn mode0(frequency: u32) -> Self {
        Self {
            frequency,
            mode: SpiMode::Mode0,
            bit_order: BitOrder::MsbFirst,
        }
    }
}

/// SPI modes (CPOL, CPHA)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

/// Bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}
