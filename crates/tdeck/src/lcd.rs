//! ST7789 command path over the shared bus.
//!
//! Only the MIPI-DCS subset the board needs: bring-up, orientation and
//! windowed RAM writes. Pixels are RGB565, two bytes each, big-endian on the
//! wire.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use platform::config::{LCD_HEIGHT, LCD_WIDTH};
use platform::{Rotation, SpiPeripheral};

use crate::bus::{BusError, BusTransaction, DeviceHandle, SharedSpiBus};

/// MIPI-DCS command bytes.
pub mod dcs {
    /// No operation
    pub const NOP: u8 = 0x00;
    /// Software reset
    pub const SWRESET: u8 = 0x01;
    /// Leave sleep mode
    pub const SLPOUT: u8 = 0x11;
    /// Normal display mode
    pub const NORON: u8 = 0x13;
    /// Inversion on (the T-Deck panel is normally-black)
    pub const INVON: u8 = 0x21;
    /// Display on
    pub const DISPON: u8 = 0x29;
    /// Column address set
    pub const CASET: u8 = 0x2A;
    /// Row address set
    pub const RASET: u8 = 0x2B;
    /// Memory write
    pub const RAMWR: u8 = 0x2C;
    /// Memory access control (orientation)
    pub const MADCTL: u8 = 0x36;
    /// Interface pixel format
    pub const COLMOD: u8 = 0x3A;
}

/// COLMOD parameter for 16-bit RGB565.
pub const COLMOD_RGB565: u8 = 0x55;

/// Bytes per RGB565 pixel.
pub const BYTES_PER_PIXEL: usize = 2;

/// LCD write errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LcdError {
    /// Window empty, inverted or outside the panel
    InvalidWindow,
    /// Pixel data does not cover the window exactly
    LengthMismatch {
        /// Bytes the window needs
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },
    /// Bus transaction failed
    Bus(BusError),
}

impl From<BusError> for LcdError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl core::fmt::Display for LcdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidWindow => write!(f, "lcd window outside the panel"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "lcd window needs {expected} bytes, got {actual}")
            }
            Self::Bus(e) => write!(f, "lcd bus error: {e}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LcdError {}

/// Inclusive pixel rectangle in panel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Window {
    xs: u16,
    ys: u16,
    xe: u16,
    ye: u16,
}

impl Window {
    /// Rectangle from inclusive corners, checked against the panel in
    /// `rotation`.
    pub fn new(xs: u16, ys: u16, xe: u16, ye: u16, rotation: Rotation) -> Option<Self> {
        let (width, height) = panel_size(rotation);
        (xs <= xe && ys <= ye && xe < width && ye < height).then_some(Self { xs, ys, xe, ye })
    }

    /// Rectangle from an origin and a size.
    pub fn from_frame(x: u16, y: u16, width: u16, height: u16, rotation: Rotation) -> Option<Self> {
        let xe = x.checked_add(width.checked_sub(1)?)?;
        let ye = y.checked_add(height.checked_sub(1)?)?;
        Self::new(x, y, xe, ye, rotation)
    }

    /// Full panel.
    pub fn full(rotation: Rotation) -> Self {
        let (width, height) = panel_size(rotation);
        Self {
            xs: 0,
            ys: 0,
            xe: width.saturating_sub(1),
            ye: height.saturating_sub(1),
        }
    }

    /// Pixels covered.
    pub fn pixels(&self) -> usize {
        let w = usize::from(self.xe.saturating_sub(self.xs)).saturating_add(1);
        let h = usize::from(self.ye.saturating_sub(self.ys)).saturating_add(1);
        w.saturating_mul(h)
    }

    /// Bytes of RGB565 data covering the window.
    pub fn byte_len(&self) -> usize {
        self.pixels().saturating_mul(BYTES_PER_PIXEL)
    }

    fn caset(&self) -> [u8; 4] {
        range_params(self.xs, self.xe)
    }

    fn raset(&self) -> [u8; 4] {
        range_params(self.ys, self.ye)
    }
}

fn panel_size(rotation: Rotation) -> (u16, u16) {
    if rotation.is_portrait() {
        (LCD_HEIGHT, LCD_WIDTH)
    } else {
        (LCD_WIDTH, LCD_HEIGHT)
    }
}

fn range_params(start: u16, end: u16) -> [u8; 4] {
    let [s0, s1] = start.to_be_bytes();
    let [e0, e1] = end.to_be_bytes();
    [s0, s1, e0, e1]
}

/// Write `command` with `params` in one chip-select window.
///
/// # Errors
///
/// Any [`BusError`] from the arbiter.
pub async fn write_command<M, B, P, const N: usize>(
    bus: &SharedSpiBus<M, B, P, N>,
    lcd: DeviceHandle,
    command: u8,
    params: &[u8],
) -> Result<(), BusError>
where
    M: RawMutex,
    B: SpiPeripheral,
    P: OutputPin,
{
    let command = [command];
    let transaction = if params.is_empty() {
        BusTransaction::command(&command)
    } else {
        BusTransaction::write(&command, params)
    };
    bus.submit(lcd, transaction).await
}

/// Bring the panel out of reset into RGB565 with `rotation` and turn it on.
///
/// # Errors
///
/// Any [`BusError`] from the arbiter; the panel state is then unknown and the
/// sequence can be rerun.
pub async fn bring_up<M, B, P, const N: usize>(
    bus: &SharedSpiBus<M, B, P, N>,
    lcd: DeviceHandle,
    rotation: Rotation,
) -> Result<(), BusError>
where
    M: RawMutex,
    B: SpiPeripheral,
    P: OutputPin,
{
    write_command(bus, lcd, dcs::SWRESET, &[]).await?;
    Timer::after(Duration::from_millis(120)).await;
    write_command(bus, lcd, dcs::SLPOUT, &[]).await?;
    Timer::after(Duration::from_millis(10)).await;
    write_command(bus, lcd, dcs::COLMOD, &[COLMOD_RGB565]).await?;
    write_command(bus, lcd, dcs::MADCTL, &[rotation.madctl()]).await?;
    write_command(bus, lcd, dcs::INVON, &[]).await?;
    write_command(bus, lcd, dcs::NORON, &[]).await?;
    write_command(bus, lcd, dcs::DISPON, &[]).await?;
    debug!("lcd up, madctl {}", rotation.madctl());
    Ok(())
}

/// Write RGB565 `data` into `window`.
///
/// # Errors
///
/// [`LcdError::LengthMismatch`] if `data` does not cover the window exactly,
/// or a bus error.
pub async fn write_window<M, B, P, const N: usize>(
    bus: &SharedSpiBus<M, B, P, N>,
    lcd: DeviceHandle,
    window: Window,
    data: &[u8],
) -> Result<(), LcdError>
where
    M: RawMutex,
    B: SpiPeripheral,
    P: OutputPin,
{
    if data.len() != window.byte_len() {
        return Err(LcdError::LengthMismatch {
            expected: window.byte_len(),
            actual: data.len(),
        });
    }
    write_command(bus, lcd, dcs::CASET, &window.caset()).await?;
    write_command(bus, lcd, dcs::RASET, &window.raset()).await?;
    write_command(bus, lcd, dcs::RAMWR, data).await?;
    Ok(())
}
