//! Simulated-time tick timer.
//!
//! Ported from `api/neteq/tick_timer.h`.
//!
//! NetEq-style components never read a wall clock. They observe time as a
//! monotonically increasing tick counter that the owner advances from its
//! real-time loop, one tick per audio callback (10 ms by default). This keeps
//! the components deterministic: tests and simulations drive the timer
//! explicitly instead of sleeping.
//!
//! A single [`TickTimer`] is shared (via [`Arc`]) between the driver and any
//! number of [`Stopwatch`]es and [`Countdown`]s created from it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default tick duration in milliseconds.
pub const DEFAULT_MS_PER_TICK: i32 = 10;

/// Monotonic tick counter.
///
/// The driver advances the counter with [`increment`](Self::increment) or
/// [`increment_by`](Self::increment_by); the timer itself never reads a
/// clock. Elapsed time is measured by [`Stopwatch`]es created from the timer.
#[derive(Debug)]
pub struct TickTimer {
    ticks: AtomicU64,
    ms_per_tick: i32,
}

impl Default for TickTimer {
    fn default() -> Self {
        Self::new(DEFAULT_MS_PER_TICK)
    }
}

impl TickTimer {
    /// Creates a timer with the given tick duration in milliseconds.
    pub fn new(ms_per_tick: i32) -> Self {
        debug_assert!(ms_per_tick > 0);
        Self {
            ticks: AtomicU64::new(0),
            ms_per_tick,
        }
    }

    /// Advances the timer by one tick.
    pub fn increment(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Advances the timer by `num_ticks` ticks.
    pub fn increment_by(&self, num_ticks: u64) {
        self.ticks.fetch_add(num_ticks, Ordering::Relaxed);
    }

    /// The current tick count.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// The tick duration in milliseconds.
    pub fn ms_per_tick(&self) -> i32 {
        self.ms_per_tick
    }

    /// Starts a stopwatch measuring elapsed time from now.
    pub fn new_stopwatch(self: &Arc<Self>) -> Stopwatch {
        Stopwatch {
            timer: Arc::clone(self),
            starttick: self.ticks(),
        }
    }

    /// Starts a countdown that finishes once `ticks_to_count` ticks have
    /// elapsed.
    pub fn new_countdown(self: &Arc<Self>, ticks_to_count: u64) -> Countdown {
        Countdown {
            stopwatch: self.new_stopwatch(),
            ticks_to_count,
        }
    }
}

/// Measures elapsed ticks from its creation.
#[derive(Debug)]
pub struct Stopwatch {
    timer: Arc<TickTimer>,
    starttick: u64,
}

impl Stopwatch {
    /// Ticks elapsed since the stopwatch was started.
    pub fn elapsed_ticks(&self) -> u64 {
        self.timer.ticks() - self.starttick
    }

    /// Milliseconds elapsed since the stopwatch was started.
    ///
    /// Saturates at `u64::MAX` rather than wrapping.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ticks()
            .saturating_mul(self.timer.ms_per_tick as u64)
    }
}

/// Counts down a fixed number of ticks.
#[derive(Debug)]
pub struct Countdown {
    stopwatch: Stopwatch,
    ticks_to_count: u64,
}

impl Countdown {
    /// Whether the configured number of ticks has elapsed.
    pub fn finished(&self) -> bool {
        self.stopwatch.elapsed_ticks() >= self.ticks_to_count
    }
}
