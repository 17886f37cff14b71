//! Latest-value cells for input samples.
//!
//! Touch and trackball state is written by the dispatcher task and read by
//! any task. Only the most recent sample matters, so each cell is a `Cell<T>`
//! behind one non-reentrant blocking mutex: every store and load is a single
//! short critical section and a reader never sees half of a write.
//!
//! The lock is not reentrant. Code running inside [`LatestSample::update`]
//! must not touch the same cell; input callbacks receive the sample by value
//! instead of reading it back.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Most recent value of `T`.
pub struct LatestSample<M: RawMutex, T: Copy> {
    value: Mutex<M, Cell<T>>,
}

impl<M: RawMutex, T: Copy> LatestSample<M, T> {
    /// Create a cell holding `initial`.
    pub const fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(Cell::new(initial)),
        }
    }

    /// Replace the stored sample.
    pub fn store(&self, value: T) {
        self.value.lock(|cell| cell.set(value));
    }

    /// Copy of the stored sample.
    pub fn load(&self) -> T {
        self.value.lock(Cell::get)
    }

    /// Read-modify-write in one critical section; returns the new sample.
    pub fn update(&self, f: impl FnOnce(T) -> T) -> T {
        self.value.lock(|cell| {
            let next = f(cell.get());
            cell.set(next);
            next
        })
    }
}

impl<M: RawMutex, T: Copy + Default> Default for LatestSample<M, T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
