//! # Time Primitives
//!
//! The measurement cycle needs exactly two notions of time: a blocking delay
//! for electrical settle intervals, and a monotonic microsecond counter for
//! bounding init retries. Both sit behind one trait so tests and simulation
//! mode can run a cycle in virtual time (see [`crate::sim::SimClock`]).

use std::thread;
use std::time::{Duration, Instant};

/// Blocking delay + monotonic microsecond clock.
///
/// The timeout windows measured against `micros()` are a few seconds at
/// most, far below the counter range, so wraparound is not handled
/// specially.
pub trait Clock {
    /// Monotonic microseconds since an arbitrary origin.
    fn micros(&mut self) -> u64;

    /// Block for `ms` milliseconds. There is no cancellation; settle delays
    /// and retry backoffs are short and fixed.
    fn delay_ms(&mut self, ms: u64);
}

/// Wall-clock implementation over [`std::time::Instant`].
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn micros(&mut self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn delay_ms(&mut self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }
}
