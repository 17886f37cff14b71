//! Audio streaming pipeline.
//!
//! Decouples "play this buffer" from the fixed cadence of the I2S output.
//! `play` slices the caller's bytes into transfer-sized chunks and pushes
//! them through a bounded channel; a single output task ([`AudioPipeline::run`])
//! drains the channel, applies mute/volume and writes each chunk to the
//! [`I2sOutput`].
//!
//! # Sizing
//!
//! One transfer carries 1/60 s of stereo 16-bit audio:
//!
//! ```text
//! audio_buffer_size = sample_rate * 2 channels * 2 bytes / 60
//!                   = 3200 bytes at 48 kHz
//! ```
//!
//! Chunks are `heapless::Vec<u8, MAX_CHUNK_BYTES>`, so the whole pipeline is
//! statically sized: `DEPTH` chunks of at most [`MAX_CHUNK_BYTES`] each.
//!
//! # Backpressure
//!
//! When `DEPTH` chunks are waiting, `play` suspends until the output task
//! takes one. A caller handing over N × `audio_buffer_size` bytes therefore
//! produces exactly N transfers, in order.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use platform::audio_types::{OutOfRangeError, SampleRateHz, VolumePercent};
use platform::{AudioConfig, I2sOutput};

use crate::engine::{StreamState, StreamTracker};
use crate::volume;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Interleaved output channels.
pub const NUM_CHANNELS: u32 = 2;

/// Bytes per sample (16-bit PCM).
pub const BYTES_PER_SAMPLE: u32 = 2;

/// Transfers per second.
pub const UPDATE_FREQUENCY_HZ: u32 = 60;

/// Default sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Capacity of one chunk: a transfer at the highest supported rate.
pub const MAX_CHUNK_BYTES: usize = audio_buffer_size(SampleRateHz::MAX_HZ);

/// Default number of chunks the queue holds.
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Bytes in one transfer at `sample_rate`.
pub const fn audio_buffer_size(sample_rate: u32) -> usize {
    let bytes_per_second = sample_rate
        .saturating_mul(NUM_CHANNELS)
        .saturating_mul(BYTES_PER_SAMPLE);
    (bytes_per_second / UPDATE_FREQUENCY_HZ) as usize
}

/// One transfer's worth of PCM bytes.
pub type Chunk = heapless::Vec<u8, MAX_CHUNK_BYTES>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by [`AudioPipeline`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioError {
    /// `initialize` has not succeeded yet.
    NotInitialized,
    /// Sample rate outside 8 kHz – 48 kHz.
    UnsupportedSampleRate(u32),
    /// Another output task is already running.
    AlreadyRunning,
}

#[cfg(feature = "std")]
impl std::error::Error for AudioError {}

impl core::fmt::Display for AudioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "audio output is not initialized"),
            Self::UnsupportedSampleRate(hz) => write!(f, "unsupported sample rate {hz} Hz"),
            Self::AlreadyRunning => write!(f, "audio output task is already running"),
        }
    }
}

impl From<OutOfRangeError> for AudioError {
    fn from(e: OutOfRangeError) -> Self {
        Self::UnsupportedSampleRate(e.value)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Bounded PCM pipeline feeding one I2S output.
///
/// All methods take `&self`; place the pipeline in a `static` (or the board
/// registry) and share it between producers and the output task.
pub struct AudioPipeline<M: RawMutex, const DEPTH: usize = DEFAULT_QUEUE_DEPTH> {
    stream: StreamTracker,
    sample_rate: AtomicU32,
    volume: AtomicU8,
    muted: AtomicBool,
    running: AtomicBool,
    transfers: AtomicU32,
    write_errors: AtomicU32,
    queue: Channel<M, Chunk, DEPTH>,
    /// Serializes `play`, `set_sample_rate` and `flush`.
    transition: Mutex<M, ()>,
    reconfigure: Signal<M, AudioConfig>,
    drained: Signal<M, ()>,
}

impl<M: RawMutex, const DEPTH: usize> AudioPipeline<M, DEPTH> {
    /// Create an uninitialized pipeline at full volume, unmuted.
    pub const fn new() -> Self {
        Self {
            stream: StreamTracker::new(),
            sample_rate: AtomicU32::new(DEFAULT_SAMPLE_RATE),
            volume: AtomicU8::new(100),
            muted: AtomicBool::new(false),
            running: AtomicBool::new(false),
            transfers: AtomicU32::new(0),
            write_errors: AtomicU32::new(0),
            queue: Channel::new(),
            transition: Mutex::new(()),
            reconfigure: Signal::new(),
            drained: Signal::new(),
        }
    }

    /// Initialize the pipeline at `sample_rate`.
    ///
    /// The I2S configuration is handed to the output task and applied before
    /// its first transfer. Calling this again after success is a no-op that
    /// keeps the current rate.
    ///
    /// # Errors
    ///
    /// [`AudioError::UnsupportedSampleRate`] if the rate is out of range; the
    /// pipeline stays uninitialized.
    pub async fn initialize(&self, sample_rate: u32) -> Result<(), AudioError> {
        let config = AudioConfig::stereo_16(sample_rate)?;
        let _guard = self.transition.lock().await;
        if self.stream.is_initialized() {
            warn!("audio already initialized at {} Hz", self.sample_rate());
            return Ok(());
        }
        self.sample_rate.store(sample_rate, Ordering::Release);
        self.reconfigure.signal(config);
        self.stream.mark_initialized();
        info!(
            "audio initialized: {} Hz, {} byte transfers",
            sample_rate,
            self.audio_buffer_size()
        );
        Ok(())
    }

    /// Queue `data` for playback.
    ///
    /// `data` is copied into transfer-sized chunks; the caller's buffer is not
    /// retained. Suspends while the queue is full. Zero-length input is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`AudioError::NotInitialized`] before a successful `initialize`.
    pub async fn play(&self, data: &[u8]) -> Result<(), AudioError> {
        if !self.stream.is_initialized() {
            return Err(AudioError::NotInitialized);
        }
        if data.is_empty() {
            return Ok(());
        }
        let _guard = self.transition.lock().await;
        let size = self.audio_buffer_size().clamp(1, MAX_CHUNK_BYTES);
        for piece in data.chunks(size) {
            let mut chunk = Chunk::new();
            // `size` never exceeds the chunk capacity.
            let _ = chunk.extend_from_slice(piece);
            self.stream.enqueue();
            let pending = Pending(self);
            self.queue.send(chunk).await;
            core::mem::forget(pending);
        }
        Ok(())
    }

    /// Change the output sample rate.
    ///
    /// Waits until every queued chunk has been written at the old rate, then
    /// hands the new configuration to the output task, which applies it
    /// before the next transfer.
    ///
    /// Needs a running [`run`](Self::run) task while chunks are queued:
    /// without one this never returns, and it keeps the transition lock, so
    /// every later `play` and `flush` waits behind it.
    ///
    /// # Errors
    ///
    /// [`AudioError::UnsupportedSampleRate`] or [`AudioError::NotInitialized`].
    pub async fn set_sample_rate(&self, sample_rate: u32) -> Result<(), AudioError> {
        let config = AudioConfig::stereo_16(sample_rate)?;
        let _guard = self.transition.lock().await;
        if !self.stream.is_initialized() {
            return Err(AudioError::NotInitialized);
        }
        self.wait_drained().await;
        self.sample_rate.store(sample_rate, Ordering::Release);
        self.reconfigure.signal(config);
        debug!("audio sample rate -> {} Hz", sample_rate);
        Ok(())
    }

    /// Wait until every chunk queued so far has been written.
    ///
    /// Like [`set_sample_rate`](Self::set_sample_rate), this only completes
    /// while a [`run`](Self::run) task drains the queue; until then it holds
    /// the transition lock and later `play` calls wait too.
    pub async fn flush(&self) {
        let _guard = self.transition.lock().await;
        self.wait_drained().await;
    }

    async fn wait_drained(&self) {
        while self.stream.in_flight() != 0 {
            self.drained.wait().await;
        }
    }

    /// Output task body. Exactly one may run at a time.
    ///
    /// Never returns `Ok`; a write failure is logged and counted, and the
    /// task moves on to the next chunk.
    ///
    /// # Errors
    ///
    /// [`AudioError::AlreadyRunning`] if another output task is active.
    pub async fn run<O: I2sOutput>(&self, output: &mut O) -> Result<Infallible, AudioError> {
        let _running = RunGuard::acquire(&self.running).ok_or(AudioError::AlreadyRunning)?;
        loop {
            let mut chunk = self.queue.receive().await;

            if let Some(config) = self.reconfigure.try_take() {
                if output.configure(config).await.is_err() {
                    warn!("i2s reconfigure to {} Hz failed", config.sample_rate);
                }
            }

            volume::apply(&mut chunk, self.volume(), self.is_muted());

            if output.write(&chunk).await.is_ok() {
                self.transfers.fetch_add(1, Ordering::Relaxed);
            } else {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                warn!("i2s write of {} bytes failed", chunk.len());
            }

            if self.stream.complete() {
                self.drained.signal(());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lock-free accessors
    // -----------------------------------------------------------------------

    /// Set the output volume.
    pub fn set_volume(&self, volume: VolumePercent) {
        self.volume.store(volume.get(), Ordering::Relaxed);
    }

    /// Current output volume.
    pub fn volume(&self) -> VolumePercent {
        VolumePercent::new(self.volume.load(Ordering::Relaxed))
    }

    /// Mute or unmute. Muted transfers keep their length and carry silence.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Whether output is muted.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Current sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    /// Bytes per transfer at the current sample rate.
    pub fn audio_buffer_size(&self) -> usize {
        audio_buffer_size(self.sample_rate())
    }

    /// Current stream state.
    pub fn state(&self) -> StreamState {
        self.stream.state()
    }

    /// Transfers written successfully since creation.
    pub fn transfers(&self) -> u32 {
        self.transfers.load(Ordering::Relaxed)
    }

    /// Transfers the output rejected since creation.
    pub fn write_errors(&self) -> u32 {
        self.write_errors.load(Ordering::Relaxed)
    }
}

impl<M: RawMutex, const DEPTH: usize> Default for AudioPipeline<M, DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolls back an `enqueue` whose `send` was cancelled before completing.
struct Pending<'a, M: RawMutex, const DEPTH: usize>(&'a AudioPipeline<M, DEPTH>);

impl<M: RawMutex, const DEPTH: usize> Drop for Pending<'_, M, DEPTH> {
    fn drop(&mut self) {
        if self.0.stream.complete() {
            self.0.drained.signal(());
        }
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
