//! Summary-statistic aggregate over a set of measurements
//!
//! [`Aggregate`] is mathematically a monoid: [`Aggregate::identity`] summarizes
//! the empty set of measurements and [`Aggregate::combine`] merges the
//! summaries of two disjoint sets. Statistics are combined with the parallel
//! algorithms from "Numerically Stable Parallel Computation of (Co-)Variance"
//! (Schubert and Gertz), a generalization of Welford's algorithm.
//!
//! Some statistics are stored directly (count, duration, min, max, mean,
//! argmin, argmax) and read with accessors. Variance, covariance, and trend
//! are derived on demand from the stored Welford accumulators `m2`,
//! `timestamp_m2`, and `c2`.
//!
//! Timestamp means are stored relative to `timestamp_reference`, a wrapping
//! monotonic millisecond counter. References are re-normalized to the more
//! recent side on every combine, which keeps `timestamp_mean` small no matter
//! how long the process has been running and survives counter rollover.

use crate::config::{GroupType, WeightType};

/// Summary statistics for a finite, possibly empty set of timestamped
/// measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    /// Reference (wrapping monotonic milliseconds) that offsets `timestamp_mean`
    pub(crate) timestamp_reference: u32,

    /// Unix time in seconds of the most recent minimum
    pub(crate) argmin: i64,

    /// Unix time in seconds of the most recent maximum
    pub(crate) argmax: i64,

    /// Count of valid (non-NaN) measurements
    pub(crate) count: usize,

    /// Sum of durations between successive measurements, milliseconds
    pub(crate) duration: u64,

    /// Sum of squared durations, needed for reliability weights
    pub(crate) duration_squared: u64,

    /// Welford-style accumulator for the covariance of values and timestamps
    pub(crate) c2: f64,

    /// Supremum of the empty set is -infinity
    pub(crate) max: f64,

    /// Infimum of the empty set is +infinity
    pub(crate) min: f64,

    /// Welford accumulator for the variance of values
    pub(crate) m2: f64,

    /// Average of the measurements
    pub(crate) mean: f64,

    /// Welford accumulator for the variance of timestamps
    pub(crate) timestamp_m2: f64,

    /// Average timestamp, relative to `timestamp_reference`
    pub(crate) timestamp_mean: f64,
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::identity()
    }
}

impl Aggregate {
    /// The null aggregate: summary of the empty set of measurements and the
    /// identity element of [`combine`](Self::combine).
    pub fn identity() -> Self {
        Self {
            timestamp_reference: 0,
            argmin: 0,
            argmax: 0,
            count: 0,
            duration: 0,
            duration_squared: 0,
            c2: f64::NAN,
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
            m2: f64::NAN,
            mean: f64::NAN,
            timestamp_m2: f64::NAN,
            timestamp_mean: f64::NAN,
        }
    }

    /// Build an aggregate from a single raw measurement.
    ///
    /// A NaN `value` signals "no reading" and yields the identity aggregate.
    ///
    /// * `value` - sensor measurement
    /// * `duration_ms` - elapsed time covered by this measurement
    /// * `timestamp_ms` - wrapping monotonic milliseconds of the observation
    /// * `unix_time` - Unix time in seconds of the observation
    pub fn from_measurement(value: f64, duration_ms: u64, timestamp_ms: u32, unix_time: i64) -> Self {
        if value.is_nan() {
            return Self::identity();
        }

        Self {
            timestamp_reference: timestamp_ms,
            argmin: unix_time,
            argmax: unix_time,
            count: 1,
            duration: duration_ms,
            duration_squared: duration_ms * duration_ms,
            c2: 0.0,
            max: value,
            min: value,
            m2: 0.0,
            mean: value,
            timestamp_m2: 0.0,
            timestamp_mean: 0.0,
        }
    }

    /// Combine with another aggregate summarizing a disjoint set of
    /// measurements.
    ///
    /// The result is statistically identical (within floating-point tolerance)
    /// to folding every underlying measurement into a single aggregate one at
    /// a time, regardless of how the measurements were partitioned.
    pub fn combine(&self, other: &Aggregate, weight_type: WeightType) -> Aggregate {
        // Identity law: combining with the null aggregate changes nothing.
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }

        let mut combined = Aggregate::identity();

        combined.count = self.count + other.count;
        combined.duration = self.duration + other.duration;
        combined.duration_squared = self.duration_squared + other.duration_squared;

        // On an exact tie the more recent occurrence wins.
        if self.max > other.max {
            combined.max = self.max;
            combined.argmax = self.argmax;
        } else if other.max > self.max {
            combined.max = other.max;
            combined.argmax = other.argmax;
        } else {
            combined.max = self.max;
            combined.argmax = self.argmax.max(other.argmax);
        }

        if self.min < other.min {
            combined.min = self.min;
            combined.argmin = self.argmin;
        } else if other.min < self.min {
            combined.min = other.min;
            combined.argmin = other.argmin;
        } else {
            combined.min = self.min;
            combined.argmin = self.argmin.max(other.argmin);
        }

        // Re-reference both timestamp means to the more recent reference so
        // one side is offset by 0 and the magnitudes stay small.
        combined.timestamp_reference =
            more_recent_timestamp(self.timestamp_reference, other.timestamp_reference);
        let a_timestamp_mean = self.timestamp_mean
            - combined
                .timestamp_reference
                .wrapping_sub(self.timestamp_reference) as f64;
        let b_timestamp_mean = other.timestamp_mean
            - combined
                .timestamp_reference
                .wrapping_sub(other.timestamp_reference) as f64;

        let (a_weight, b_weight) = match weight_type {
            WeightType::Simple => (self.count as f64, other.count as f64),
            WeightType::Duration => (self.duration as f64, other.duration as f64),
        };
        let combined_weight = a_weight + b_weight;

        combined.mean = combine_means(self.mean, a_weight, other.mean, b_weight, combined_weight);
        combined.timestamp_mean = combine_means(
            a_timestamp_mean,
            a_weight,
            b_timestamp_mean,
            b_weight,
            combined_weight,
        );

        // Parallel (co-)variance combination: M2 = M2_a + M2_b + w_a*d*d'
        // with d the difference of means and d' = d * w_b / w.
        let delta = other.mean - self.mean;
        let timestamp_delta = b_timestamp_mean - a_timestamp_mean;

        combined.m2 = self.m2 + other.m2 + a_weight * delta * (delta * b_weight / combined_weight);
        combined.timestamp_m2 = self.timestamp_m2
            + other.timestamp_m2
            + a_weight * timestamp_delta * (timestamp_delta * b_weight / combined_weight);
        combined.c2 =
            self.c2 + other.c2 + a_weight * delta * (timestamp_delta * b_weight / combined_weight);

        combined
    }

    /// Variance of the measurements.
    ///
    /// Sample grouping applies Bessel's correction, or reliability weights
    /// when time-weighted. NaN when fewer than two measurements are stored.
    pub fn variance(&self, weight_type: WeightType, group_type: GroupType) -> f64 {
        self.m2 / self.denominator(weight_type, group_type)
    }

    /// Standard deviation of the measurements; NaN below two measurements.
    pub fn std_dev(&self, weight_type: WeightType, group_type: GroupType) -> f64 {
        self.variance(weight_type, group_type).sqrt()
    }

    /// Covariance of the measurements with respect to their timestamps;
    /// NaN below two measurements.
    pub fn covariance(&self, weight_type: WeightType, group_type: GroupType) -> f64 {
        self.c2 / self.denominator(weight_type, group_type)
    }

    /// Slope of the line of best fit for measurements versus timestamps, in
    /// measurement units per millisecond. This is the ordinary least-squares
    /// slope cov(value, t) / var(t); the grouping correction cancels out.
    /// NaN below two measurements.
    pub fn trend(&self) -> f64 {
        if self.count <= 1 {
            return f64::NAN;
        }
        self.c2 / self.timestamp_m2
    }

    /// Mean times duration: a numerical approximation of the integral of the
    /// signal over the aggregate's timespan.
    pub fn quadrature(&self) -> f64 {
        self.mean * self.duration as f64
    }

    /// Count of valid measurements
    pub fn count(&self) -> usize {
        self.count
    }

    /// Total duration covered, milliseconds
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Sum of squared durations, milliseconds squared
    pub fn duration_squared(&self) -> u64 {
        self.duration_squared
    }

    /// Minimum measurement
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum measurement
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Unix time in seconds of the most recent minimum
    pub fn argmin(&self) -> i64 {
        self.argmin
    }

    /// Unix time in seconds of the most recent maximum
    pub fn argmax(&self) -> i64 {
        self.argmax
    }

    /// Average measurement
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Welford accumulator for the variance of values
    pub fn m2(&self) -> f64 {
        self.m2
    }

    /// Welford accumulator for the value/timestamp covariance
    pub fn c2(&self) -> f64 {
        self.c2
    }

    /// Average timestamp relative to [`timestamp_reference`](Self::timestamp_reference)
    pub fn timestamp_mean(&self) -> f64 {
        self.timestamp_mean
    }

    /// Welford accumulator for the variance of timestamps
    pub fn timestamp_m2(&self) -> f64 {
        self.timestamp_m2
    }

    /// Reference offset (wrapping monotonic milliseconds) for `timestamp_mean`
    pub fn timestamp_reference(&self) -> u32 {
        self.timestamp_reference
    }

    /// Denominator for variance and covariance.
    fn denominator(&self, weight_type: WeightType, group_type: GroupType) -> f64 {
        if self.count <= 1 {
            return f64::NAN;
        }

        match (weight_type, group_type) {
            (WeightType::Simple, GroupType::Population) => self.count as f64,
            (WeightType::Simple, GroupType::Sample) => (self.count - 1) as f64,
            (WeightType::Duration, GroupType::Population) => self.duration as f64,
            (WeightType::Duration, GroupType::Sample) => {
                // Reliability weights: duration - duration^2 / duration
                let duration = self.duration as f64;
                duration - self.duration_squared as f64 / duration
            }
        }
    }
}

/// Weighted combination of two means.
///
/// When one side carries under a quarter of the combined weight, a Welford
/// increment of the heavier mean is cheaper and precise enough; when the
/// weights are comparable, the direct weighted average is the more stable
/// form. Both branches agree within floating-point tolerance.
fn combine_means(a_mean: f64, a_weight: f64, b_mean: f64, b_weight: f64, combined_weight: f64) -> f64 {
    if a_weight < 0.25 * combined_weight {
        b_mean + (a_mean - b_mean) * (a_weight / combined_weight)
    } else if b_weight < 0.25 * combined_weight {
        a_mean + (b_mean - a_mean) * (b_weight / combined_weight)
    } else {
        (a_mean * a_weight + b_mean * b_weight) / combined_weight
    }
}

/// The more recent of two wrapping millisecond timestamps.
///
/// A forward distance under half the u32 range means `b` is ahead of `a`,
/// which stays correct across counter rollover.
fn more_recent_timestamp(a: u32, b: u32) -> u32 {
    if b.wrapping_sub(a) < (1 << 31) {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    /// Fold evenly spaced measurements starting at t=0, one second apart.
    fn fold(values: &[f64], weight_type: WeightType) -> Aggregate {
        let mut total = Aggregate::identity();
        for (i, &value) in values.iter().enumerate() {
            let measurement =
                Aggregate::from_measurement(value, 1_000, i as u32 * 1_000, 1_700_000_000 + i as i64);
            total = total.combine(&measurement, weight_type);
        }
        total
    }

    #[test]
    fn test_identity_law() {
        let x = fold(&[2.5, -1.0, 7.25], WeightType::Simple);
        let identity = Aggregate::identity();

        let left = identity.combine(&x, WeightType::Simple);
        let right = x.combine(&identity, WeightType::Simple);

        for combined in [left, right] {
            assert_eq!(combined.count(), x.count());
            assert_eq!(combined.duration(), x.duration());
            assert_close(combined.mean(), x.mean());
            assert_close(combined.m2(), x.m2());
            assert_close(combined.min(), x.min());
            assert_close(combined.max(), x.max());
        }
    }

    #[test]
    fn test_identity_statistics_are_nan() {
        let identity = Aggregate::identity();
        assert_eq!(identity.count(), 0);
        assert!(identity.mean().is_nan());
        assert!(identity.variance(WeightType::Simple, GroupType::Sample).is_nan());
        assert!(identity.trend().is_nan());
        assert_eq!(identity.min(), f64::INFINITY);
        assert_eq!(identity.max(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_single_measurement() {
        let agg = Aggregate::from_measurement(21.5, 500, 12_345, 1_700_000_000);
        assert_eq!(agg.count(), 1);
        assert_eq!(agg.min(), 21.5);
        assert_eq!(agg.max(), 21.5);
        assert_eq!(agg.mean(), 21.5);
        assert_eq!(agg.m2(), 0.0);
        assert_eq!(agg.duration(), 500);
        assert_eq!(agg.duration_squared(), 250_000);
        assert_eq!(agg.argmin(), 1_700_000_000);
        assert_eq!(agg.argmax(), 1_700_000_000);
        assert_eq!(agg.timestamp_reference(), 12_345);
        assert_eq!(agg.timestamp_mean(), 0.0);
        // One measurement is not enough for spread statistics
        assert!(agg.variance(WeightType::Simple, GroupType::Population).is_nan());
        assert!(agg.trend().is_nan());
    }

    #[test]
    fn test_nan_measurement_is_identity() {
        let agg = Aggregate::from_measurement(f64::NAN, 1_000, 5_000, 1_700_000_000);
        assert_eq!(agg.count(), 0);

        let real = fold(&[1.0, 2.0], WeightType::Simple);
        let combined = real.combine(&agg, WeightType::Simple);
        assert_eq!(combined.count(), 2);
        assert_close(combined.mean(), 1.5);
    }

    #[test]
    fn test_known_values() {
        let agg = fold(&[1.0, 2.0, 3.0, 4.0, 5.0], WeightType::Simple);

        assert_eq!(agg.count(), 5);
        assert_close(agg.mean(), 3.0);
        assert_eq!(agg.min(), 1.0);
        assert_eq!(agg.max(), 5.0);
        assert_close(agg.variance(WeightType::Simple, GroupType::Population), 2.0);
        assert_close(agg.variance(WeightType::Simple, GroupType::Sample), 2.5);
        assert_close(agg.std_dev(WeightType::Simple, GroupType::Sample), 2.5_f64.sqrt());
    }

    #[test]
    fn test_fold_equivalence_across_partitions() {
        let values = [4.5, -2.0, 0.0, 13.25, 7.5, 7.5, -100.0, 3.125];
        let whole = fold(&values, WeightType::Simple);

        // combine(combine(m1..m3), combine(m4..m8)) against the one-at-a-time fold
        let mut left = Aggregate::identity();
        let mut right = Aggregate::identity();
        for (i, &value) in values.iter().enumerate() {
            let m =
                Aggregate::from_measurement(value, 1_000, i as u32 * 1_000, 1_700_000_000 + i as i64);
            if i < 3 {
                left = left.combine(&m, WeightType::Simple);
            } else {
                right = right.combine(&m, WeightType::Simple);
            }
        }
        let split = left.combine(&right, WeightType::Simple);

        assert_eq!(split.count(), whole.count());
        assert_close(split.mean(), whole.mean());
        assert_close(split.min(), whole.min());
        assert_close(split.max(), whole.max());
        assert_close(
            split.variance(WeightType::Simple, GroupType::Sample),
            whole.variance(WeightType::Simple, GroupType::Sample),
        );
        assert_close(split.trend(), whole.trend());
    }

    #[test]
    fn test_extrema_tie_takes_most_recent() {
        let early = Aggregate::from_measurement(10.0, 1_000, 1_000, 1_700_000_100);
        let late = Aggregate::from_measurement(10.0, 1_000, 2_000, 1_700_000_200);

        let combined = early.combine(&late, WeightType::Simple);
        assert_eq!(combined.max(), 10.0);
        assert_eq!(combined.argmax(), 1_700_000_200);
        assert_eq!(combined.argmin(), 1_700_000_200);

        // Order of combination must not matter for the tie break
        let reversed = late.combine(&early, WeightType::Simple);
        assert_eq!(reversed.argmax(), 1_700_000_200);
    }

    #[test]
    fn test_trend_of_perfect_line() {
        // value = 2 * t with t in milliseconds
        let mut agg = Aggregate::identity();
        for i in 0..10u32 {
            let t = i * 1_000;
            let m = Aggregate::from_measurement(2.0 * t as f64, 1_000, t, 1_700_000_000 + i as i64);
            agg = agg.combine(&m, WeightType::Simple);
        }
        assert_close(agg.trend(), 2.0);
    }

    #[test]
    fn test_trend_of_constant_signal() {
        let agg = fold(&[5.0; 12], WeightType::Simple);
        assert_close(agg.trend(), 0.0);
    }

    #[test]
    fn test_time_weighted_mean() {
        // 10.0 held for 3 seconds, 20.0 held for 1 second
        let a = Aggregate::from_measurement(10.0, 3_000, 0, 1_700_000_000);
        let b = Aggregate::from_measurement(20.0, 1_000, 3_000, 1_700_000_003);
        let combined = a.combine(&b, WeightType::Duration);

        assert_close(combined.mean(), 12.5);
        assert_eq!(combined.duration(), 4_000);
    }

    #[test]
    fn test_time_weighted_variance_denominators() {
        let a = Aggregate::from_measurement(10.0, 3_000, 0, 1_700_000_000);
        let b = Aggregate::from_measurement(20.0, 1_000, 3_000, 1_700_000_003);
        let combined = a.combine(&b, WeightType::Duration);

        // Population: m2 / duration
        let population = combined.variance(WeightType::Duration, GroupType::Population);
        assert_close(population, combined.m2() / 4_000.0);

        // Sample reliability weights: m2 / (duration - duration^2/duration)
        let expected_denominator = 4_000.0 - (9_000_000.0 + 1_000_000.0) / 4_000.0;
        let sample = combined.variance(WeightType::Duration, GroupType::Sample);
        assert_close(sample, combined.m2() / expected_denominator);
    }

    #[test]
    fn test_timestamp_reference_normalization_across_rollover() {
        // One side just before u32 rollover, the other just after. The
        // combined mean timestamp must land 500 ms before the newer reference.
        let before = Aggregate::from_measurement(1.0, 1_000, u32::MAX - 499, 1_700_000_000);
        let after = Aggregate::from_measurement(3.0, 1_000, 500, 1_700_000_001);

        let combined = before.combine(&after, WeightType::Simple);
        assert_eq!(combined.timestamp_reference(), 500);
        assert_close(combined.timestamp_mean(), -500.0);
        assert_close(combined.mean(), 2.0);
    }

    #[test]
    fn test_mean_branches_agree() {
        // Force both the Welford-increment branch (tiny chunk into large
        // total) and the direct weighted-average branch, and check they stay
        // consistent with the exact mean.
        let big = fold(&vec![10.0; 100], WeightType::Simple);
        let small = Aggregate::from_measurement(20.0, 1_000, 200_000, 1_700_000_200);

        let incremental = big.combine(&small, WeightType::Simple);
        let expected = (100.0 * 10.0 + 20.0) / 101.0;
        assert_close(incremental.mean(), expected);

        let comparable = fold(&[10.0, 20.0], WeightType::Simple);
        assert_close(comparable.mean(), 15.0);
    }

    #[test]
    fn test_quadrature() {
        let agg = fold(&[2.0, 4.0], WeightType::Simple);
        assert_close(agg.quadrature(), 3.0 * 2_000.0);
    }

    #[test]
    fn test_covariance_sign() {
        let rising = fold(&[1.0, 2.0, 3.0, 4.0], WeightType::Simple);
        assert!(rising.covariance(WeightType::Simple, GroupType::Sample) > 0.0);

        let falling = fold(&[4.0, 3.0, 2.0, 1.0], WeightType::Simple);
        assert!(falling.covariance(WeightType::Simple, GroupType::Sample) < 0.0);
    }

    #[test]
    fn test_more_recent_timestamp_rollover() {
        assert_eq!(more_recent_timestamp(100, 200), 200);
        assert_eq!(more_recent_timestamp(200, 100), 200);
        assert_eq!(more_recent_timestamp(u32::MAX - 10, 5), 5);
        assert_eq!(more_recent_timestamp(5, u32::MAX - 10), 5);
    }
}
