//! Delay bound bookkeeping for the delay manager.
//!
//! Ported from the constraint handling in
//! `modules/audio_coding/neteq/delay_manager.h/cc`.

use tracing::error;

/// Smallest allowed base minimum delay.
const MIN_BASE_MINIMUM_DELAY_MS: i32 = 0;
/// Largest allowed base minimum delay. Doubles as the sentinel upper bound
/// when neither a maximum delay nor a packet length is known.
const MAX_BASE_MINIMUM_DELAY_MS: i32 = 10_000;

/// Minimum, maximum, and base-minimum delay bounds plus the packet-buffer
/// capacity constraint, kept mutually consistent as they change
/// independently.
///
/// `effective_minimum_delay_ms` is recomputed by every successful setter and
/// by [`reset`](Self::reset); it is never stale.
#[derive(Debug)]
pub(crate) struct DelayConstraints {
    max_packets_in_buffer: i32,
    base_minimum_delay_ms: i32,
    effective_minimum_delay_ms: i32,
    minimum_delay_ms: i32,
    maximum_delay_ms: i32,
    packet_len_ms: i32,
}

impl DelayConstraints {
    pub(crate) fn new(max_packets_in_buffer: i32, base_minimum_delay_ms: i32) -> Self {
        debug_assert!(base_minimum_delay_ms >= 0);
        Self {
            max_packets_in_buffer,
            base_minimum_delay_ms,
            effective_minimum_delay_ms: base_minimum_delay_ms,
            minimum_delay_ms: 0,
            maximum_delay_ms: 0,
            packet_len_ms: 0,
        }
    }

    pub(crate) fn base_minimum_delay_ms(&self) -> i32 {
        self.base_minimum_delay_ms
    }

    pub(crate) fn effective_minimum_delay_ms(&self) -> i32 {
        self.effective_minimum_delay_ms
    }

    /// Sets a lower bound for the target delay. Fails if `delay_ms` exceeds
    /// what the packet buffer or a configured maximum delay can accommodate.
    pub(crate) fn set_minimum_delay(&mut self, delay_ms: i32) -> bool {
        if !self.is_valid_minimum_delay(delay_ms) {
            return false;
        }
        self.minimum_delay_ms = delay_ms;
        self.update_effective_minimum_delay();
        true
    }

    /// Sets an upper bound for the target delay. Zero unsets the bound and
    /// leaves the target unconstrained by a maximum delay.
    pub(crate) fn set_maximum_delay(&mut self, delay_ms: i32) -> bool {
        if delay_ms != 0
            && (delay_ms < self.minimum_delay_ms || delay_ms < self.packet_len_ms)
        {
            // The maximum delay must not be smaller than the minimum delay
            // or hold less than one packet.
            return false;
        }
        self.maximum_delay_ms = delay_ms;
        self.update_effective_minimum_delay();
        true
    }

    pub(crate) fn set_base_minimum_delay(&mut self, delay_ms: i32) -> bool {
        if !self.is_valid_base_minimum_delay(delay_ms) {
            return false;
        }
        self.base_minimum_delay_ms = delay_ms;
        self.update_effective_minimum_delay();
        true
    }

    /// Announces the audio length of upcoming packets, which bounds how much
    /// delay the packet buffer can hold.
    pub(crate) fn set_packet_audio_length(&mut self, length_ms: i32) -> bool {
        if length_ms <= 0 {
            error!(length_ms, "invalid packet audio length");
            return false;
        }
        self.packet_len_ms = length_ms;
        self.update_effective_minimum_delay();
        true
    }

    /// Applies the configured bounds to a freshly computed target delay.
    pub(crate) fn clamp_target(&self, target_ms: i32) -> i32 {
        let mut target_ms = target_ms.max(self.effective_minimum_delay_ms);
        if self.maximum_delay_ms > 0 {
            target_ms = target_ms.min(self.maximum_delay_ms);
        }
        if self.packet_len_ms > 0 {
            // The target must hold at least one packet but no more than 75%
            // of the packet buffer.
            target_ms = target_ms.max(self.packet_len_ms);
            target_ms =
                target_ms.min(3 * self.max_packets_in_buffer * self.packet_len_ms / 4);
        }
        target_ms
    }

    /// Clears the packet length. The delay bounds persist; they are session
    /// policy, not per-stream estimation state.
    pub(crate) fn reset(&mut self) {
        self.packet_len_ms = 0;
        self.update_effective_minimum_delay();
    }

    fn is_valid_minimum_delay(&self, delay_ms: i32) -> bool {
        (0..=self.minimum_delay_upper_bound()).contains(&delay_ms)
    }

    fn is_valid_base_minimum_delay(&self, delay_ms: i32) -> bool {
        (MIN_BASE_MINIMUM_DELAY_MS..=MAX_BASE_MINIMUM_DELAY_MS).contains(&delay_ms)
    }

    fn update_effective_minimum_delay(&mut self) {
        // Clamp the base minimum delay into the range that can actually be
        // buffered.
        let base_minimum_delay_ms = self
            .base_minimum_delay_ms
            .clamp(0, self.minimum_delay_upper_bound());
        self.effective_minimum_delay_ms = self.minimum_delay_ms.max(base_minimum_delay_ms);
    }

    fn minimum_delay_upper_bound(&self) -> i32 {
        // Choose the lowest possible bound, discarding unset (zero) values.
        let q75 = self.max_packets_in_buffer * self.packet_len_ms * 3 / 4;
        let q75 = if q75 > 0 { q75 } else { MAX_BASE_MINIMUM_DELAY_MS };
        let maximum_delay_ms = if self.maximum_delay_ms > 0 {
            self.maximum_delay_ms
        } else {
            MAX_BASE_MINIMUM_DELAY_MS
        };
        maximum_delay_ms.min(q75)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_delay_raises_effective_minimum() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_minimum_delay(100));
        assert_eq!(constraints.effective_minimum_delay_ms(), 100);
    }

    #[test]
    fn minimum_delay_rejected_beyond_upper_bound() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_minimum_delay(10_000));
        assert!(!constraints.set_minimum_delay(10_001));
        assert_eq!(constraints.minimum_delay_ms, 10_000);

        // A configured maximum delay tightens the bound.
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_maximum_delay(90));
        assert!(!constraints.set_minimum_delay(91));
        assert!(constraints.set_minimum_delay(90));
    }

    #[test]
    fn buffer_capacity_bounds_the_minimum_delay() {
        let mut constraints = DelayConstraints::new(4, 0);
        assert!(constraints.set_packet_audio_length(20));
        // Capacity is 3/4 of 4 packets of 20 ms.
        assert!(!constraints.set_minimum_delay(61));
        assert!(constraints.set_minimum_delay(60));
    }

    #[test]
    fn base_minimum_delay_is_clamped_to_buffer_capacity() {
        let mut constraints = DelayConstraints::new(4, 0);
        assert!(constraints.set_base_minimum_delay(100));
        assert_eq!(constraints.effective_minimum_delay_ms(), 100);

        // Learning the packet length shrinks the feasible range, and the
        // effective minimum follows without any further setter call.
        assert!(constraints.set_packet_audio_length(20));
        assert_eq!(constraints.effective_minimum_delay_ms(), 60);
        assert_eq!(constraints.base_minimum_delay_ms(), 100);
    }

    #[test]
    fn base_minimum_delay_validation() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(!constraints.set_base_minimum_delay(-1));
        assert!(constraints.set_base_minimum_delay(0));
        assert!(constraints.set_base_minimum_delay(10_000));
        assert!(!constraints.set_base_minimum_delay(10_001));
        assert_eq!(constraints.base_minimum_delay_ms(), 10_000);
    }

    #[test]
    fn maximum_delay_rejected_below_minimum_delay() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_minimum_delay(100));
        assert!(!constraints.set_maximum_delay(50));
        assert_eq!(constraints.maximum_delay_ms, 0);
        assert!(constraints.set_maximum_delay(100));
    }

    #[test]
    fn maximum_delay_rejected_below_packet_length() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_packet_audio_length(60));
        assert!(!constraints.set_maximum_delay(50));
        assert!(constraints.set_maximum_delay(60));
    }

    #[test]
    fn zero_maximum_delay_clears_the_bound() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_maximum_delay(100));
        assert!(!constraints.set_minimum_delay(200));
        assert!(constraints.set_maximum_delay(0));
        assert!(constraints.set_minimum_delay(200));
    }

    #[test]
    fn packet_length_must_be_positive() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(!constraints.set_packet_audio_length(0));
        assert!(!constraints.set_packet_audio_length(-20));
        assert_eq!(constraints.packet_len_ms, 0);
        assert!(constraints.set_packet_audio_length(20));
        assert_eq!(constraints.packet_len_ms, 20);
    }

    #[test]
    fn clamp_floors_at_effective_minimum() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_minimum_delay(80));
        assert_eq!(constraints.clamp_target(20), 80);
        assert_eq!(constraints.clamp_target(200), 200);
    }

    #[test]
    fn clamp_caps_at_maximum_delay() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_maximum_delay(100));
        assert_eq!(constraints.clamp_target(180), 100);
    }

    #[test]
    fn clamp_holds_at_least_one_packet() {
        let mut constraints = DelayConstraints::new(50, 0);
        assert!(constraints.set_packet_audio_length(120));
        assert_eq!(constraints.clamp_target(20), 120);
    }

    #[test]
    fn clamp_caps_at_three_quarters_of_the_packet_buffer() {
        let mut constraints = DelayConstraints::new(4, 0);
        assert!(constraints.set_packet_audio_length(20));
        assert_eq!(constraints.clamp_target(180), 60);
        assert_eq!(constraints.clamp_target(40), 40);
    }

    #[test]
    fn effective_minimum_never_falls_below_minimum_delay() {
        let mut constraints = DelayConstraints::new(4, 0);
        let _ = constraints.set_minimum_delay(40);
        let _ = constraints.set_base_minimum_delay(5_000);
        let _ = constraints.set_packet_audio_length(20);
        let _ = constraints.set_maximum_delay(50);
        assert!(constraints.effective_minimum_delay_ms() >= constraints.minimum_delay_ms);

        constraints.reset();
        assert!(constraints.effective_minimum_delay_ms() >= constraints.minimum_delay_ms);
    }

    #[test]
    fn reset_clears_packet_length_but_keeps_bounds() {
        let mut constraints = DelayConstraints::new(4, 0);
        assert!(constraints.set_base_minimum_delay(100));
        assert!(constraints.set_minimum_delay(30));
        assert!(constraints.set_packet_audio_length(20));
        assert_eq!(constraints.effective_minimum_delay_ms(), 60);

        constraints.reset();
        assert_eq!(constraints.packet_len_ms, 0);
        assert_eq!(constraints.base_minimum_delay_ms(), 100);
        assert_eq!(constraints.minimum_delay_ms, 30);
        // With the capacity constraint gone, the base minimum applies again.
        assert_eq!(constraints.effective_minimum_delay_ms(), 100);
    }
}
