//! Adaptive target delay computation for the jitter buffer.
//!
//! Ported from `modules/audio_coding/neteq/delay_manager.h/cc`.

use std::sync::Arc;

use derive_more::Debug;
use fermata_tick::TickTimer;
use tracing::info;

use crate::delay_constraints::DelayConstraints;
use crate::histogram::{DelayHistogram, Histogram};
use crate::relative_arrival_delay_tracker::RelativeArrivalDelayTracker;

/// Number of buckets in the delay histogram. Together with
/// [`BUCKET_SIZE_MS`] this caps the registrable relative delay at 2000 ms.
const DELAY_BUCKETS: usize = 100;
/// Width of one histogram bucket in milliseconds.
const BUCKET_SIZE_MS: i32 = 20;
/// Target delay before any packet has been observed.
const START_DELAY_MS: i32 = 80;

/// Converts a percentile in `[0, 100]` to Q30 fixed point.
pub fn percentile_to_quantile(percentile: f64) -> i32 {
    (f64::from(1 << 30) * percentile / 100.0 + 0.5) as i32
}

/// Configuration for [`DelayManager`].
///
/// The histogram parameters are deployment tuning knobs, resolved externally
/// and passed in as plain numbers.
#[derive(Debug, Clone)]
pub struct DelayManagerConfig {
    /// Quantile of the delay distribution the target delay should cover, in
    /// Q30 fixed point.
    pub quantile: i32,
    /// Base forget factor of the delay histogram, in Q15 fixed point.
    pub forget_factor: i32,
    /// Optional weight schedule that makes the histogram forget faster right
    /// after a reset, so early estimates converge quickly.
    pub start_forget_weight: Option<f64>,
    /// Capacity of the packet buffer this delay manager feeds, in packets.
    pub max_packets_in_buffer: i32,
    /// Externally configured floor on the buffering depth, independent of
    /// observed jitter.
    pub base_minimum_delay_ms: i32,
}

impl Default for DelayManagerConfig {
    fn default() -> Self {
        Self {
            quantile: 1_041_529_569,  // 0.97 in Q30.
            forget_factor: 32_745,    // 0.9993 in Q15.
            start_forget_weight: Some(2.0),
            max_packets_in_buffer: 50,
            base_minimum_delay_ms: 0,
        }
    }
}

/// Computes the target delay the jitter buffer should hold, given the
/// arrival jitter observed on the incoming packet stream.
///
/// One [`update`](Self::update) call per received packet drives the
/// estimation; the resulting target delay is cached and can be queried at
/// any time with [`target_delay_ms`](Self::target_delay_ms). Assumes
/// exclusive access; callers updating from several threads must serialize.
#[derive(Debug)]
pub struct DelayManager {
    tracker: RelativeArrivalDelayTracker,
    #[debug(skip)]
    histogram: Box<dyn DelayHistogram>,
    histogram_quantile: i32,
    constraints: DelayConstraints,
    target_level_ms: i32,
}

impl DelayManager {
    /// Creates a delay manager with its own decaying [`Histogram`].
    pub fn new(config: DelayManagerConfig, tick_timer: Arc<TickTimer>) -> Self {
        let histogram = Box::new(Histogram::new(
            DELAY_BUCKETS,
            config.forget_factor,
            config.start_forget_weight,
        ));
        Self::with_histogram(config, tick_timer, histogram)
    }

    /// Creates a delay manager reading its statistics from the supplied
    /// histogram.
    pub fn with_histogram(
        config: DelayManagerConfig,
        tick_timer: Arc<TickTimer>,
        histogram: Box<dyn DelayHistogram>,
    ) -> Self {
        debug_assert!(config.base_minimum_delay_ms >= 0);
        info!(
            quantile = config.quantile,
            forget_factor = config.forget_factor,
            start_forget_weight = config.start_forget_weight.unwrap_or(0.0),
            "delay histogram config"
        );
        let mut delay_manager = Self {
            tracker: RelativeArrivalDelayTracker::new(tick_timer),
            histogram,
            histogram_quantile: config.quantile,
            constraints: DelayConstraints::new(
                config.max_packets_in_buffer,
                config.base_minimum_delay_ms,
            ),
            target_level_ms: START_DELAY_MS,
        };
        delay_manager.reset();
        delay_manager
    }

    /// Updates the delay estimate from a packet arrival and returns the
    /// packet's relative arrival delay in milliseconds.
    ///
    /// `timestamp` is the media timestamp the packet carried and
    /// `sample_rate_hz` the stream's current sample rate; `reset` re-anchors
    /// the estimation to this packet. Returns `None` when the sample rate is
    /// unknown or when there is no previous packet to measure against; the
    /// cached target delay is left unchanged in that case.
    pub fn update(&mut self, timestamp: u32, sample_rate_hz: i32, reset: bool) -> Option<i32> {
        let relative_delay = self.tracker.update(timestamp, sample_rate_hz, reset)?;
        debug_assert!(relative_delay >= 0);

        let index = (relative_delay / BUCKET_SIZE_MS) as usize;
        if index < self.histogram.num_buckets() {
            // Maximum delay to register is 2000 ms.
            self.histogram.add(index);
        }

        // Recompute the target from the updated statistics.
        let bucket_index = self.histogram.quantile(self.histogram_quantile);
        self.target_level_ms = self
            .constraints
            .clamp_target((1 + bucket_index) * BUCKET_SIZE_MS);

        Some(relative_delay)
    }

    /// The current target delay in milliseconds.
    pub fn target_delay_ms(&self) -> i32 {
        self.target_level_ms
    }

    /// Sets a lower bound for the target delay. Returns false and leaves the
    /// bounds unchanged if `delay_ms` exceeds what the packet buffer or a
    /// configured maximum delay can accommodate.
    pub fn set_minimum_delay(&mut self, delay_ms: i32) -> bool {
        self.constraints.set_minimum_delay(delay_ms)
    }

    /// Sets an upper bound for the target delay. Zero unsets the bound;
    /// otherwise `delay_ms` must cover the minimum delay and one packet.
    pub fn set_maximum_delay(&mut self, delay_ms: i32) -> bool {
        self.constraints.set_maximum_delay(delay_ms)
    }

    /// Sets the externally configured floor on the buffering depth.
    pub fn set_base_minimum_delay(&mut self, delay_ms: i32) -> bool {
        self.constraints.set_base_minimum_delay(delay_ms)
    }

    /// The configured base minimum delay.
    pub fn base_minimum_delay_ms(&self) -> i32 {
        self.constraints.base_minimum_delay_ms()
    }

    /// Announces the audio length of upcoming packets. Returns false for a
    /// non-positive length.
    pub fn set_packet_audio_length(&mut self, length_ms: i32) -> bool {
        self.constraints.set_packet_audio_length(length_ms)
    }

    /// Resets all per-stream estimation state and restores the start target
    /// delay. Configured delay bounds persist; they are session policy, not
    /// stream state.
    pub fn reset(&mut self) {
        self.constraints.reset();
        self.histogram.reset();
        self.tracker.reset();
        self.target_level_ms = START_DELAY_MS;
    }
}
