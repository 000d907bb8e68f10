//! Relative packet arrival delay tracking.
//!
//! Ported from the arrival-delay estimation in
//! `modules/audio_coding/neteq/delay_manager.h/cc`.

use std::collections::VecDeque;
use std::sync::Arc;

use fermata_tick::{Stopwatch, TickTimer};
use tracing::debug;

use crate::timestamp::is_newer_timestamp;

/// Oldest packet to include in the delay history, in media time.
const MAX_HISTORY_MS: i32 = 2000;
/// Reordered packets tolerated before the estimation is re-anchored.
const MAX_NUM_REORDERED_PACKETS: i32 = 5;

#[derive(Debug, Clone, Copy)]
struct PacketDelay {
    iat_delay_ms: i32,
    timestamp: u32,
}

/// Sliding-window estimator of how late packets arrive relative to the
/// packet preceding the history window.
///
/// Each in-order arrival contributes the deviation between its observed and
/// expected inter-arrival time; the window is folded into a single
/// non-negative relative delay per packet.
#[derive(Debug)]
pub(crate) struct RelativeArrivalDelayTracker {
    tick_timer: Arc<TickTimer>,
    packet_iat_stopwatch: Stopwatch,
    first_packet_received: bool,
    last_timestamp: u32,
    num_reordered_packets: i32,
    delay_history: VecDeque<PacketDelay>,
}

impl RelativeArrivalDelayTracker {
    pub(crate) fn new(tick_timer: Arc<TickTimer>) -> Self {
        let packet_iat_stopwatch = tick_timer.new_stopwatch();
        Self {
            tick_timer,
            packet_iat_stopwatch,
            first_packet_received: false,
            last_timestamp: 0,
            num_reordered_packets: 0,
            delay_history: VecDeque::new(),
        }
    }

    /// Observes a packet arrival and returns its relative arrival delay in
    /// milliseconds.
    ///
    /// Returns `None` when the sample rate is unknown or when there is no
    /// previous packet to measure against (first packet, or `reset`).
    pub(crate) fn update(
        &mut self,
        timestamp: u32,
        sample_rate_hz: i32,
        reset: bool,
    ) -> Option<i32> {
        if sample_rate_hz <= 0 {
            return None;
        }

        if !self.first_packet_received || reset {
            // Restart relative delay estimation from this packet.
            self.delay_history.clear();
            self.packet_iat_stopwatch = self.tick_timer.new_stopwatch();
            self.last_timestamp = timestamp;
            self.first_packet_received = true;
            self.num_reordered_packets = 0;
            return None;
        }

        let expected_iat_ms = (1000i64
            * i64::from(timestamp.wrapping_sub(self.last_timestamp) as i32)
            / i64::from(sample_rate_hz)) as i32;
        let iat_ms = self.packet_iat_stopwatch.elapsed_ms() as i32;
        let iat_delay_ms = iat_ms - expected_iat_ms;

        let reordered = !is_newer_timestamp(timestamp, self.last_timestamp);
        let relative_delay = if reordered {
            iat_delay_ms.max(0)
        } else {
            self.update_delay_history(iat_delay_ms, timestamp, sample_rate_hz);
            self.calculate_relative_packet_arrival_delay()
        };

        // Prepare for the next packet arrival.
        if reordered {
            // Absorb a small run of reordered packets without disturbing the
            // estimation.
            if self.num_reordered_packets < MAX_NUM_REORDERED_PACKETS {
                self.num_reordered_packets += 1;
                return Some(relative_delay);
            }
            debug!(timestamp, "too many reordered packets; restarting delay history");
            self.delay_history.clear();
        }
        self.num_reordered_packets = 0;
        self.packet_iat_stopwatch = self.tick_timer.new_stopwatch();
        self.last_timestamp = timestamp;
        Some(relative_delay)
    }

    /// Forgets all history; the next packet re-anchors the estimation.
    pub(crate) fn reset(&mut self) {
        self.delay_history.clear();
        self.packet_iat_stopwatch = self.tick_timer.new_stopwatch();
        self.first_packet_received = false;
        self.num_reordered_packets = 0;
    }

    fn update_delay_history(&mut self, iat_delay_ms: i32, timestamp: u32, sample_rate_hz: i32) {
        self.delay_history.push_back(PacketDelay {
            iat_delay_ms,
            timestamp,
        });
        let max_history =
            (i64::from(MAX_HISTORY_MS) * i64::from(sample_rate_hz) / 1000) as u32;
        while let Some(front) = self.delay_history.front() {
            if timestamp.wrapping_sub(front.timestamp) > max_history {
                self.delay_history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Folds the delay history into the arrival delay relative to the packet
    /// preceding the window.
    ///
    /// Whenever the running sum goes negative the reference packet is
    /// invalid, so the reference moves forward; stale negative history must
    /// not cancel later legitimate jitter.
    fn calculate_relative_packet_arrival_delay(&self) -> i32 {
        let mut relative_delay = 0i32;
        for delay in &self.delay_history {
            relative_delay = relative_delay.saturating_add(delay.iat_delay_ms).max(0);
        }
        relative_delay
    }
}
