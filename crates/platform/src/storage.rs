//! Storage abstraction for the uSD card
//!
//! Mounting is a collaborator: the board core only arbitrates the SPI bus
//! the card shares with the LCD and decides when the mount happens.

/// Mount a FAT filesystem from a card reached over `spi`.
pub trait CardMount {
    /// Error type
    type Error: core::fmt::Debug;

    /// Bring up the card and mount its filesystem.
    fn mount<D>(
        &mut self,
        spi: &mut D,
        config: &SdCardConfig,
    ) -> impl core::future::Future<Output = Result<CardInfo, Self::Error>>
    where
        D: embedded_hal_async::spi::SpiDevice;
}

/// Mount configuration for the uSD card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SdCardConfig {
    /// Format the card if mounting fails
    pub format_if_mount_failed: bool,
    /// Maximum number of simultaneously open files
    pub max_files: u8,
    /// Allocation unit (cluster) size in bytes when formatting
    pub allocation_unit_size: u32,
}

impl SdCardConfig {
    /// Card sector size; allocation units are a power-of-two multiple of it.
    pub const SECTOR_SIZE: u32 = 512;

    /// Check the configuration before touching hardware.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_files == 0 {
            return Err("max_files must be at least 1");
        }
        if self.allocation_unit_size < Self::SECTOR_SIZE
            || !self.allocation_unit_size.is_power_of_two()
        {
            return Err("allocation_unit_size must be a power of two >= 512");
        }
        Ok(())
    }
}

impl Default for SdCardConfig {
    fn default() -> Self {
        Self {
            format_if_mount_failed: false,
            max_files: 5,
            allocation_unit_size: 2048,
        }
    }
}

/// Information about a mounted card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CardInfo {
    /// Card capacity in bytes
    pub capacity_bytes: u64,
    /// Whether the card is high capacity (SDHC/SDXC)
    pub high_capacity: bool,
}
