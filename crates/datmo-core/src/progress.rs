//! Progress reporting and cooperative cancellation.
//!
//! A [`Progress`] is shared between the worker running a stage and the
//! controller watching it. The worker writes the completed fraction and
//! polls [`Progress::canceled`] at safe points; the controller reads the
//! fraction and calls [`Progress::cancel`]. Both sides only touch atomics,
//! so no lock is needed.
//!
//! A multi-stage run can map each stage onto a sub-window of the overall
//! fraction with [`Progress::set_stage`]; stages keep reporting `0..=1`.
//!
//! ```rust
//! use std::sync::Arc;
//! use datmo_core::Progress;
//!
//! let progress = Arc::new(Progress::new());
//! let worker = Arc::clone(&progress);
//!
//! let handle = std::thread::spawn(move || {
//!     for step in 0..100 {
//!         if worker.checkpoint().is_err() {
//!             return false;
//!         }
//!         worker.set_value(step as f32 / 100.0);
//!     }
//!     true
//! });
//!
//! progress.cancel();
//! let _finished = handle.join().unwrap();
//! assert!(progress.canceled());
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::{Error, Result};

/// Thread-visible progress fraction and termination flag.
#[derive(Debug)]
pub struct Progress {
    /// `f32` bits of the completed fraction.
    value: AtomicU32,
    /// `f32` bits of the active stage window.
    stage_start: AtomicU32,
    stage_end: AtomicU32,
    canceled: AtomicBool,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            value: AtomicU32::new(0f32.to_bits()),
            stage_start: AtomicU32::new(0f32.to_bits()),
            stage_end: AtomicU32::new(1f32.to_bits()),
            canceled: AtomicBool::new(false),
        }
    }
}

impl Progress {
    /// Fresh handle: 0% done, not canceled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the completed fraction of the current stage, clamped to `[0, 1]`.
    ///
    /// Non-finite values are ignored.
    pub fn set_value(&self, fraction: f32) {
        if fraction.is_finite() {
            let start = f32::from_bits(self.stage_start.load(Ordering::Relaxed));
            let end = f32::from_bits(self.stage_end.load(Ordering::Relaxed));
            let v = start + (end - start) * fraction.clamp(0.0, 1.0);
            self.value.store(v.to_bits(), Ordering::Relaxed);
        }
    }

    /// Maps subsequent [`set_value`](Self::set_value) calls onto `[start, end]`
    /// of the overall fraction and moves the fraction to `start`.
    ///
    /// ```rust
    /// use datmo_core::Progress;
    ///
    /// let p = Progress::new();
    /// p.set_stage(0.5, 1.0);
    /// p.set_value(0.5);
    /// assert_eq!(p.value(), 0.75);
    /// ```
    pub fn set_stage(&self, start: f32, end: f32) {
        if !(start.is_finite() && end.is_finite()) {
            return;
        }
        let start = start.clamp(0.0, 1.0);
        let end = end.clamp(start, 1.0);
        self.stage_start.store(start.to_bits(), Ordering::Relaxed);
        self.stage_end.store(end.to_bits(), Ordering::Relaxed);
        self.value.store(start.to_bits(), Ordering::Relaxed);
    }

    /// Last recorded fraction in `[0, 1]`.
    pub fn value(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Relaxed))
    }

    /// Last recorded fraction as a whole percentage.
    pub fn percent(&self) -> u32 {
        (self.value() * 100.0).round() as u32
    }

    /// Requests termination. Takes effect at the worker's next checkpoint.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Whether termination was requested.
    pub fn canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// `Err(Error::Aborted)` once termination was requested.
    #[inline]
    pub fn checkpoint(&self) -> Result<()> {
        if self.canceled() {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }

    /// Clears the flag, the fraction and the stage window so the handle can
    /// drive another run.
    pub fn reset(&self) {
        self.value.store(0f32.to_bits(), Ordering::Relaxed);
        self.stage_start.store(0f32.to_bits(), Ordering::Relaxed);
        self.stage_end.store(1f32.to_bits(), Ordering::Relaxed);
        self.canceled.store(false, Ordering::Release);
    }
}
