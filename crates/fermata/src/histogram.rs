//! Decaying delay histogram.
//!
//! Ported from `modules/audio_coding/neteq/histogram.h/cc`.
//!
//! Bucket weights are Q30 fixed point and sum to exactly `1 << 30` at all
//! times. Each new observation decays every bucket by the forget factor
//! (Q15) and gives the observed bucket the complementary weight, so the
//! histogram tracks an exponentially-forgetting frequency distribution over
//! the observed values.

/// Statistical oracle consumed by the delay controller.
///
/// Implemented by [`Histogram`]; kept abstract so tests can observe or
/// script the controller's histogram traffic.
pub trait DelayHistogram {
    /// Records one observation in bucket `index`, decaying all buckets.
    fn add(&mut self, index: usize);
    /// Returns the smallest bucket index whose cumulative weight share
    /// reaches `probability` (Q30 fixed point).
    fn quantile(&self, probability: i32) -> i32;
    /// Restores the initial distribution.
    fn reset(&mut self);
    /// The number of buckets.
    fn num_buckets(&self) -> usize;
}

/// Exponentially-forgetting bucketed frequency table.
#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: Vec<i32>,
    forget_factor: i32,      // Q15
    base_forget_factor: i32, // Q15
    add_count: u64,
    start_forget_weight: Option<f64>,
}

impl Histogram {
    /// Creates a histogram with `num_buckets` buckets and the given base
    /// forget factor in Q15 (must be below `1 << 15`).
    ///
    /// With a `start_forget_weight`, the forget factor ramps up from zero
    /// after every reset so that the first observations are weighted more
    /// heavily and early estimates converge faster.
    pub fn new(num_buckets: usize, forget_factor: i32, start_forget_weight: Option<f64>) -> Self {
        assert!(num_buckets > 0);
        debug_assert!((0..1 << 15).contains(&forget_factor));
        let mut histogram = Self {
            buckets: vec![0; num_buckets],
            forget_factor: 0,
            base_forget_factor: forget_factor,
            add_count: 0,
            start_forget_weight,
        };
        histogram.reset();
        histogram
    }

    /// The current bucket weights in Q30.
    pub fn buckets(&self) -> &[i32] {
        &self.buckets
    }

    /// Restores the initial distribution and restarts the forget-factor
    /// ramp.
    pub fn reset(&mut self) {
        // Geometric initial distribution, each bucket holding half the
        // weight of its predecessor. The rounding residual is folded back
        // into bucket 0 so the weights sum to exactly 1 << 30.
        let mut temp_prob = 0.5f64;
        let mut temp_sum: i64 = 0;
        for bucket in self.buckets.iter_mut() {
            temp_prob /= 2.0;
            *bucket = (temp_prob * f64::from(1 << 30)) as i32;
            temp_sum += i64::from(*bucket);
        }
        self.buckets[0] += ((1i64 << 30) - temp_sum) as i32;
        // Adapt the histogram faster for the first few observations.
        self.forget_factor = 0;
        self.add_count = 0;
    }

    /// Records one observation in bucket `index`.
    pub fn add(&mut self, index: usize) {
        debug_assert!(index < self.buckets.len());
        let mut vector_sum: i64 = 0;
        // Decay all buckets, then give the new observation the
        // complementary weight.
        for bucket in self.buckets.iter_mut() {
            *bucket = ((i64::from(*bucket) * i64::from(self.forget_factor)) >> 15) as i32;
            vector_sum += i64::from(*bucket);
        }
        let added_weight = (32768 - self.forget_factor) << 15;
        self.buckets[index] += added_weight;
        vector_sum += i64::from(added_weight);

        // The weights are normalized to Q30; spread any fixed-point rounding
        // residue over the first buckets to keep the sum exact.
        vector_sum -= 1 << 30;
        if vector_sum != 0 {
            let flip_sign = if vector_sum > 0 { -1 } else { 1 };
            for bucket in self.buckets.iter_mut() {
                let correction = flip_sign * vector_sum.abs().min(i64::from(*bucket >> 4)) as i32;
                *bucket += correction;
                vector_sum += i64::from(correction);
                if vector_sum == 0 {
                    break;
                }
            }
        }
        debug_assert_eq!(vector_sum, 0);

        self.add_count += 1;
        self.update_forget_factor();
    }

    /// Returns the smallest bucket index whose cumulative weight share
    /// reaches `probability` (Q30).
    pub fn quantile(&self, probability: i32) -> i32 {
        // Descend from the top while the mass strictly below the bucket
        // still exceeds the probability.
        let mut index = self.buckets.len() - 1;
        let mut sum: i64 = 1 << 30;
        sum -= i64::from(self.buckets[index]);
        while sum > i64::from(probability) && index > 0 {
            index -= 1;
            sum -= i64::from(self.buckets[index]);
        }
        index as i32
    }

    /// The number of buckets.
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    // The forget factor ramps from 0 toward the base factor after a reset,
    // weighting early observations more heavily.
    fn update_forget_factor(&mut self) {
        if let Some(start_forget_weight) = self.start_forget_weight {
            if self.forget_factor != self.base_forget_factor {
                let old_forget_factor = self.forget_factor;
                let forget_factor = (f64::from(1 << 15)
                    * (1.0 - start_forget_weight / (self.add_count as f64 + 1.0)))
                    as i32;
                self.forget_factor = forget_factor.clamp(0, self.base_forget_factor);
                // The effective weight on a new observation must never drop
                // below the weight the previous observations received.
                debug_assert!(
                    (1 << 15) - self.forget_factor
                        >= (((1 << 15) - old_forget_factor) * self.forget_factor) >> 15
                );
            }
        } else {
            self.forget_factor += (self.base_forget_factor - self.forget_factor + 3) >> 2;
        }
    }
}

impl DelayHistogram for Histogram {
    fn add(&mut self, index: usize) {
        Self::add(self, index);
    }

    fn quantile(&self, probability: i32) -> i32 {
        Self::quantile(self, probability)
    }

    fn reset(&mut self) {
        Self::reset(self);
    }

    fn num_buckets(&self) -> usize {
        Self::num_buckets(self)
    }
}
