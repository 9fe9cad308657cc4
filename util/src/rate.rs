//! # Rate
//!
//! Fixed-frequency pacing for cyclic loops.
//!
//! A [`Rate`] tracks the start of the current period. [`Rate::sleep`] waits out whatever is left
//! of the period and starts the next one, while [`Rate::ready`] can be used to run a slower task
//! inside a faster loop without blocking.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Paces a loop at a fixed frequency.
#[derive(Debug, Clone)]
pub struct Rate {
    rate_hz: f64,

    period: Duration,

    start: Instant,

    cycles: u64,

    missed: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Rate {
    /// Create a new rate with the given frequency. The first period starts now.
    ///
    /// # Panics
    /// - If `rate_hz` is not strictly positive and finite.
    pub fn new(rate_hz: f64) -> Self {
        assert!(
            rate_hz.is_finite() && rate_hz > 0.0,
            "Rate frequency must be positive, got {}",
            rate_hz
        );

        Self {
            rate_hz,
            period: Duration::from_secs_f64(1.0 / rate_hz),
            start: Instant::now(),
            cycles: 0,
            missed: 0,
        }
    }

    /// Restart the current period at the current time, returning that time.
    pub fn set_start(&mut self) -> Instant {
        self.start = Instant::now();
        self.start
    }

    /// The instant the current period started.
    pub fn start(&self) -> Instant {
        self.start
    }

    /// The target frequency.
    ///
    /// Units: Hz
    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    /// The target period, the inverse of the frequency.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// How long remains of the current period as measured at `now`, zero if the period has
    /// already elapsed.
    pub fn remaining(&self, now: Instant) -> Duration {
        (self.start + self.period).saturating_duration_since(now)
    }

    /// Returns true if a full period has elapsed at `now`, without modifying the rate.
    pub fn is_elapsed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.period
    }

    /// Sleep for the remainder of the current period and begin the next one.
    ///
    /// If the period has already been overrun no sleep occurs and the cycle is counted as missed.
    /// The next period then starts from the current time so that an overrun does not cause a
    /// burst of catch-up cycles.
    pub fn sleep(&mut self) {
        let now = Instant::now();
        let remaining = self.remaining(now);

        if remaining > Duration::from_secs(0) {
            thread::sleep(remaining);
            self.start += self.period;
        } else {
            self.missed += 1;
            self.start = now;
        }

        self.cycles += 1;
    }

    /// Returns true if a period has elapsed since the start, in which case the next period is
    /// started.
    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }

    /// As [`Rate::ready`] but evaluated at the given instant.
    pub fn ready_at(&mut self, now: Instant) -> bool {
        if self.is_elapsed(now) {
            self.start = now;
            true
        } else {
            false
        }
    }

    /// Frequency achieved since the start of the current period.
    ///
    /// Units: Hz
    pub fn fps(&self) -> f64 {
        1.0 / self.start.elapsed().as_secs_f64()
    }

    /// Number of cycles slept through and the number of those which overran their period.
    pub fn cycles(&self) -> (u64, u64) {
        (self.cycles, self.missed)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
