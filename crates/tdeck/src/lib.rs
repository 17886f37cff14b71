//! LilyGo T-Deck board support core
//!
//! Resource arbitration and event dispatch for the T-Deck (ESP32-S3):
//!
//! - [`interrupts`]: GPIO edges to typed events, delivered from one task
//! - [`bus`]: the SPI bus shared by the LCD and the uSD card
//! - [`TDeck`]: the device registry that owns both, plus the
//!   [`playback::AudioPipeline`] feeding I2S
//!
//! Everything hardware-specific enters through the `platform` traits, so the
//! same core runs against esp-hal drivers on the device and against
//! `platform::mocks` on the host.
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::await_holding_lock)]
#![allow(async_fn_in_trait)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::doc_markdown)]

// Must come first so the other modules see its macros.
#[macro_use]
mod fmt;

pub mod board;
pub mod bus;
pub mod interrupts;
pub mod lcd;
pub mod pins;
pub mod sample;
pub mod touch;
pub mod trackball;

pub use board::{
    BoardError, BoardResources, BoardTypes, ButtonCallback, DisplayConfig, KeyCallback,
    KeyboardConfig, KeyboardMode, LcdConfig, SoundConfig, Subsystem, TDeck, TaskConfig,
    TouchCallback, TrackballCallback,
};
pub use bus::{
    BusData, BusDevice, BusError, BusTransaction, DeviceHandle, SharedSpiBus, SpiBusConfig,
    SpiDeviceConfig,
};
pub use interrupts::{
    EdgeOutcome, InterruptDispatcher, InterruptError, InterruptEvent, InterruptHandler,
    InterruptSource, PinInterruptConfig,
};
pub use sample::LatestSample;
