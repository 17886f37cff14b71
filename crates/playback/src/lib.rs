//! Audio streaming pipeline: chunked, backpressured PCM output to I2S
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(clippy::unwrap_used)]

// Must come first so the other modules see its macros.
#[macro_use]
mod fmt;

pub mod engine;
pub mod pipeline;
pub mod volume;

pub use engine::StreamState;
pub use pipeline::{audio_buffer_size, AudioError, AudioPipeline, Chunk, MAX_CHUNK_BYTES};
