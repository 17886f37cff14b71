//! Hardware Abstraction Layer (HAL) for the LilyGo T-Deck
//!
//! This crate provides trait-based abstractions for every collaborator the
//! board support core talks to, enabling development and testing without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (user firmware)
//!         ↓
//! Board Support (tdeck crate: interrupts, shared SPI bus, registry)
//!         ↓
//! Feature Layers (playback)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (esp-hal + PAC)
//! ```
//!
//! # Abstraction Levels
//!
//! ## High-Level Peripherals
//! - [`I2sOutput`] - Audio output stream
//! - [`TouchController`] - Capacitive touchpad
//! - [`KeyboardDevice`] - I2C keyboard co-processor
//! - [`CardMount`] - uSD card filesystem mount
//!
//! ## Mid-Level Peripherals
//! - [`gpio`] - Edge types and the GPIO interrupt controller
//! - [`peripheral`] - SPI bus abstraction
//!
//! # Features
//!
//! - `std`: Enable standard library support (mocks, host tests)
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```no_run
//! use platform::{I2sOutput, AudioConfig};
//!
//! async fn example<O: I2sOutput>(out: &mut O) {
//!     out.configure(AudioConfig::default()).await.unwrap();
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod audio;
pub mod audio_types;
pub mod config;
pub mod display;
pub mod gpio;
pub mod input;
pub mod peripheral;
pub mod storage;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export main high-level traits
pub use audio::{AudioConfig, I2sOutput};
pub use display::Rotation;
pub use input::{KeyboardDevice, PointerData, TouchController, TouchpadData};
pub use storage::{CardInfo, CardMount, SdCardConfig};

// Re-export GPIO types
pub use gpio::{
    ActiveLevel, Edge, GlitchFilter, GpioNum, InterruptController, InterruptTrigger, PinConfig,
    PinState, Pull,
};

// Re-export peripheral types
pub use peripheral::{BitOrder, SpiConfig, SpiMode, SpiPeripheral};
