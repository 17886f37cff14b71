//! Stream state machine.
//!
//! `StreamTracker` is the lock-free bookkeeping behind
//! [`AudioPipeline`](crate::pipeline::AudioPipeline): whether the output has
//! been initialized, and how many chunks have been accepted by `play` but not
//! yet written to I2S. The visible [`StreamState`] is derived from those two
//! facts, so a producer on one core and the output task on the other can
//! never disagree about whether audio is still in flight.
//!
//! ```text
//!   Uninitialized ──initialize──▶ Idle ──enqueue──▶ Streaming
//!                                  ▲                    │
//!                                  └──last complete─────┘
//! ```

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Current stream state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamState {
    /// `initialize` has not succeeded yet; `play` is refused.
    Uninitialized,
    /// Initialized, nothing queued or in flight.
    Idle,
    /// At least one chunk is queued or being written.
    Streaming,
}

impl core::fmt::Display for StreamState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Idle => write!(f, "idle"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// Lock-free stream bookkeeping shared between producer and output task.
#[derive(Debug, Default)]
pub struct StreamTracker {
    initialized: AtomicBool,
    in_flight: AtomicUsize,
}

impl StreamTracker {
    /// Create a tracker in the `Uninitialized` state.
    pub const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Mark the stream initialized.
    ///
    /// Returns `true` if this call performed the
    /// `Uninitialized → Idle` transition, `false` if it was already done.
    pub fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    /// Whether `initialize` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Record a chunk accepted for output. Call before handing it over.
    pub fn enqueue(&self) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Record a chunk fully written.
    ///
    /// Returns `true` when this was the last chunk in flight
    /// (`Streaming → Idle`).
    pub fn complete(&self) -> bool {
        let previous = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        previous <= 1
    }

    /// Chunks accepted but not yet written.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Derived state.
    pub fn state(&self) -> StreamState {
        if !self.is_initialized() {
            StreamState::Uninitialized
        } else if self.in_flight() == 0 {
            StreamState::Idle
        } else {
            StreamState::Streaming
        }
    }
}
