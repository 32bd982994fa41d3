//! Reservoir samples backing histograms and timers.

use parking_lot::Mutex;
use rand::Rng;

/// Default reservoir size, large enough for a 99.9% / 5% confidence interval.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// A statistically representative subset of a stream of values.
pub trait Sample: Send + Sync {
    /// Add a value to the sample.
    fn update(&self, value: i64);

    /// Freeze the current contents.
    fn snapshot(&self) -> SampleSnapshot;

    /// Drop every value and reset the update count.
    fn clear(&self);
}

/// A frozen, sorted copy of a sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSnapshot {
    count: u64,
    values: Vec<i64>,
}

impl SampleSnapshot {
    /// Create a snapshot from the number of updates seen and the retained values.
    pub fn new(count: u64, mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self { count, values }
    }

    /// Number of updates ever recorded, including evicted ones.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Retained values in ascending order.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Number of retained values.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Sum of the retained values.
    ///
    /// Accumulated in `i128`, so it cannot overflow for any reservoir size.
    pub fn sum(&self) -> f64 {
        self.values.iter().map(|&v| i128::from(v)).sum::<i128>() as f64
    }

    pub fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum() / self.values.len() as f64
    }

    /// Value at quantile `q` in `[0, 1]`.
    ///
    /// Uses the `(n + 1) * q` rank with linear interpolation between
    /// neighbours; ranks outside the sample clamp to the extremes.
    pub fn percentile(&self, q: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }

        let pos = q * (n as f64 + 1.0);
        if pos < 1.0 {
            self.values[0] as f64
        } else if pos >= n as f64 {
            self.values[n - 1] as f64
        } else {
            let lower = self.values[pos as usize - 1] as f64;
            let upper = self.values[pos as usize] as f64;
            lower + (pos - pos.floor()) * (upper - lower)
        }
    }

    /// Values at each of the given quantiles, in order.
    pub fn percentiles(&self, qs: &[f64]) -> Vec<f64> {
        qs.iter().map(|&q| self.percentile(q)).collect()
    }
}

#[derive(Debug, Default)]
struct Reservoir {
    count: u64,
    values: Vec<i64>,
}

/// Uniform reservoir sample (Vitter's Algorithm R).
///
/// Every value in the stream has an equal chance of being retained.
#[derive(Debug)]
pub struct UniformSample {
    size: usize,
    reservoir: Mutex<Reservoir>,
}

impl UniformSample {
    /// Create a sample retaining at most `size` values.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            reservoir: Mutex::new(Reservoir {
                count: 0,
                values: Vec::with_capacity(size.min(DEFAULT_RESERVOIR_SIZE)),
            }),
        }
    }

    /// Maximum number of retained values.
    pub fn capacity(&self) -> usize {
        self.size
    }
}

impl Default for UniformSample {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVOIR_SIZE)
    }
}

impl Sample for UniformSample {
    fn update(&self, value: i64) {
        let mut reservoir = self.reservoir.lock();
        reservoir.count += 1;

        if reservoir.values.len() < self.size {
            reservoir.values.push(value);
            return;
        }

        let slot = rand::rng().random_range(0..reservoir.count);
        if let Ok(slot) = usize::try_from(slot)
            && slot < self.size
        {
            reservoir.values[slot] = value;
        }
    }

    fn snapshot(&self) -> SampleSnapshot {
        let reservoir = self.reservoir.lock();
        SampleSnapshot::new(reservoir.count, reservoir.values.clone())
    }

    fn clear(&self) {
        let mut reservoir = self.reservoir.lock();
        reservoir.count = 0;
        reservoir.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skewed_snapshot() -> SampleSnapshot {
        let sample = UniformSample::new(1028);
        for _ in 0..94 {
            sample.update(1);
        }
        for _ in 0..5 {
            sample.update(5);
        }
        sample.update(10);
        sample.snapshot()
    }

    #[test]
    fn test_snapshot_stats() {
        let snapshot = skewed_snapshot();
        assert_eq!(snapshot.count(), 100);
        assert_eq!(snapshot.size(), 100);
        assert_eq!(snapshot.sum(), 129.0);
        assert_eq!(snapshot.min(), 1);
        assert_eq!(snapshot.max(), 10);
        assert!((snapshot.mean() - 1.29).abs() < 1e-9);
    }

    #[test]
    fn test_percentiles_skewed() {
        let snapshot = skewed_snapshot();
        let ps = snapshot.percentiles(&[0.05, 0.1, 0.25, 0.5, 0.75, 0.9, 0.95]);
        assert_eq!(ps, vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 5.0]);
        assert!((snapshot.percentile(0.99) - 9.95).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_clamps() {
        let snapshot = SampleSnapshot::new(3, vec![30, 10, 20]);
        assert_eq!(snapshot.values(), &[10, 20, 30]);
        assert_eq!(snapshot.percentile(0.0), 10.0);
        assert_eq!(snapshot.percentile(1.0), 30.0);
        assert_eq!(snapshot.percentile(0.5), 20.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let snapshot = SampleSnapshot::new(4, vec![1, 2, 3, 4]);
        // rank 2.5 sits halfway between 2 and 3
        assert!((snapshot.percentile(0.5) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = SampleSnapshot::default();
        assert_eq!(snapshot.count(), 0);
        assert_eq!(snapshot.sum(), 0.0);
        assert_eq!(snapshot.percentile(0.5), 0.0);
        assert_eq!(snapshot.mean(), 0.0);
    }

    #[test]
    fn test_sum_beyond_i64_range() {
        let snapshot = SampleSnapshot::new(3, vec![i64::MAX, i64::MAX, 1]);
        let expected = 2.0 * i64::MAX as f64 + 1.0;
        assert_eq!(snapshot.sum(), expected);
        assert!(snapshot.mean() > i64::MAX as f64 / 2.0);

        let negative = SampleSnapshot::new(2, vec![i64::MIN, i64::MIN]);
        assert_eq!(negative.sum(), 2.0 * i64::MIN as f64);
    }

    #[test]
    fn test_reservoir_bounded() {
        let sample = UniformSample::new(10);
        for i in 0..1000 {
            sample.update(i);
        }
        let snapshot = sample.snapshot();
        assert_eq!(snapshot.count(), 1000);
        assert_eq!(snapshot.size(), 10);
        assert!(snapshot.values().iter().all(|v| (0..1000).contains(v)));
    }

    #[test]
    fn test_clear() {
        let sample = UniformSample::default();
        sample.update(7);
        sample.clear();
        let snapshot = sample.snapshot();
        assert_eq!(snapshot.count(), 0);
        assert_eq!(snapshot.size(), 0);
        assert_eq!(sample.capacity(), DEFAULT_RESERVOIR_SIZE);
    }
}
