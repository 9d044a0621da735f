//! Implementation of tdigest for computing approximate quantiles.
//!
//! <https://arxiv.org/abs/1902.04023>
//!
//! The size of a centroid is bounded by `4 * n * q * (1 - q) / delta` where
//! `q` is the quantile position of the centroid's midpoint. Centroids near
//! the median may hold many points while centroids near the tails stay close
//! to a single point, keeping tail quantiles accurate.

use serde::{Deserialize, Serialize};
use sketchdb_error::{DbError, Result};
use tracing::trace;

/// Compression used when nothing else is configured.
pub const DEFAULT_COMPRESSION: usize = 200;

/// Number of centroids (as a multiple of compression) we allow before forcing
/// a compression pass.
const COMPRESS_FACTOR: usize = 10;

/// A single centroid in a tdigest. Tracks a weighted cluster of points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub mean: f64,
    pub weight: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TDigest {
    /// Sorted list of centroids by ascending mean.
    centroids: Vec<Centroid>,
    /// Total weight (total count of points inserted).
    total_weight: u64,
    /// Compression parameter 'delta' (controls number of centroids).
    compression: usize,
    /// Centroid count that triggers the next compression pass.
    compress_at: usize,
    /// Exact minimum of all inserted points.
    min: f64,
    /// Exact maximum of all inserted points.
    max: f64,
}

impl TDigest {
    /// Create a new, empty tdigest with the given compression 'delta'.
    pub fn try_new(compression: usize) -> Result<Self> {
        if compression == 0 {
            return Err(DbError::new("Compression cannot be zero"));
        }

        Ok(TDigest {
            centroids: Vec::new(),
            total_weight: 0,
            compression,
            compress_at: compression.saturating_mul(COMPRESS_FACTOR),
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }

    pub fn compression(&self) -> usize {
        self.compression
    }

    /// Total number of points inserted (including points from merged
    /// digests).
    pub fn count(&self) -> u64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight == 0
    }

    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Get the number of centroids currently stored.
    pub fn centroids_count(&self) -> usize {
        self.centroids.len()
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }

    /// Insert a single value `x` into the tdigest.
    ///
    /// This will either merge `x` into the nearest centroid (if size
    /// constraints allow), or create a new centroid at `mean = x, weight = 1`.
    ///
    /// Infinities are accepted but only ever share a centroid with equal
    /// infinities. Errors if `x` is NaN.
    pub fn add(&mut self, x: f64) -> Result<()> {
        if x.is_nan() {
            return Err(DbError::range("Cannot add NaN to tdigest"));
        }

        self.min = self.min.min(x);
        self.max = self.max.max(x);

        if self.centroids.is_empty() {
            self.centroids.push(Centroid { mean: x, weight: 1 });
            self.total_weight = 1;
            return Ok(());
        }

        let idx = match self.centroids.binary_search_by(|c| c.mean.total_cmp(&x)) {
            Ok(i) => i,
            Err(i) => i,
        };

        // Closest centroid among the neighbors of the insertion point. Ties go
        // left.
        let mut best = idx;
        if idx > 0 {
            let left = idx - 1;
            let d_left = (self.centroids[left].mean - x).abs();
            let d_curr = match self.centroids.get(idx) {
                Some(c) => (c.mean - x).abs(),
                None => f64::INFINITY,
            };
            if d_left <= d_curr {
                best = left;
            }
        }

        let cumulative: u64 = self.centroids[..best].iter().map(|c| c.weight).sum();
        let w_best = self.centroids[best].weight;

        let n = self.total_weight as f64;
        let q_best = (cumulative as f64 + w_best as f64 * 0.5) / n;

        if mergeable(&self.centroids[best], x)
            && (w_best + 1) as f64 <= max_weight(n, q_best, self.compression as f64)
        {
            let centroid = &mut self.centroids[best];
            *centroid = merge_centroids(*centroid, Centroid { mean: x, weight: 1 });
        } else {
            self.centroids.insert(idx, Centroid { mean: x, weight: 1 });
        }

        self.total_weight += 1;

        if self.centroids.len() > self.compress_at {
            self.compress();
        }

        Ok(())
    }

    /// Merge another tdigest into self.
    ///
    /// This concatenates all centroids, sums total weights, then runs one
    /// compression pass to restore the size constraint invariants.
    pub fn merge(&mut self, other: &TDigest) -> Result<()> {
        if self.compression != other.compression {
            return Err(
                DbError::new("Cannot merge tdigests with different compression")
                    .with_field("left", self.compression)
                    .with_field("right", other.compression),
            );
        }

        if other.is_empty() {
            return Ok(());
        }

        self.centroids.extend_from_slice(&other.centroids);
        self.total_weight += other.total_weight;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);

        self.compress();

        Ok(())
    }

    /// Query the approximate value at some quantile.
    ///
    /// `q` is clamped to [0, 1]. Returns None if no points have been
    /// inserted.
    ///
    /// The mass of each centroid is centered on its cumulative midpoint, and
    /// we interpolate linearly between the means of neighboring centroids.
    /// Before the first and after the last midpoint we interpolate towards
    /// the exact min and max, so q=0 and q=1 return those exactly.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.is_empty() || q.is_nan() {
            return None;
        }
        let first = self.centroids.first()?;
        let last = self.centroids.last()?;

        let n = self.total_weight as f64;
        let target = q.clamp(0.0, 1.0) * n;

        let first_mid = first.weight as f64 / 2.0;
        if target < first_mid {
            return Some(interpolate(self.min, first.mean, target / first_mid));
        }

        let last_half = last.weight as f64 / 2.0;
        let last_mid = n - last_half;
        if target >= last_mid {
            return Some(interpolate(
                last.mean,
                self.max,
                (target - last_mid) / last_half,
            ));
        }

        let mut cumulative = 0.0;
        for pair in self.centroids.windows(2) {
            let (left, right) = (&pair[0], &pair[1]);
            let left_mid = cumulative + left.weight as f64 / 2.0;
            let right_mid = cumulative + left.weight as f64 + right.weight as f64 / 2.0;
            if target < right_mid {
                return Some(interpolate(
                    left.mean,
                    right.mean,
                    (target - left_mid) / (right_mid - left_mid),
                ));
            }
            cumulative += left.weight as f64;
        }

        // Only reachable through rounding.
        Some(last.mean)
    }

    /// Run one full compression pass.
    ///
    /// This re-sorts all centroids by mean and then merges neighbors whenever
    /// the merged cluster would still satisfy the size constraint for its own
    /// position.
    pub fn compress(&mut self) {
        if self.centroids.len() <= 1 {
            return;
        }

        let before = self.centroids.len();
        self.centroids.sort_by(|a, b| a.mean.total_cmp(&b.mean));

        let n = self.total_weight as f64;
        let delta = self.compression as f64;

        let mut merged: Vec<Centroid> = Vec::with_capacity(self.centroids.len());
        // Weight of everything in `merged` except the last centroid.
        let mut cum_before_last = 0.0;

        for c in &self.centroids {
            let Some(last_idx) = merged.len().checked_sub(1) else {
                merged.push(*c);
                continue;
            };

            let last = merged[last_idx];
            let new_weight = last.weight + c.weight;
            let q = (cum_before_last + new_weight as f64 * 0.5) / n;

            if mergeable(&last, c.mean) && new_weight as f64 <= max_weight(n, q, delta) {
                merged[last_idx] = merge_centroids(last, *c);
            } else {
                cum_before_last += last.weight as f64;
                merged.push(*c);
            }
        }

        self.centroids = merged;
        // Avoid compressing on every insert if the digest naturally holds more
        // centroids than the base threshold.
        self.compress_at = usize::max(
            self.compression.saturating_mul(COMPRESS_FACTOR),
            self.centroids.len() * 2,
        );

        trace!(
            before,
            after = self.centroids.len(),
            total_weight = self.total_weight,
            "compressed tdigest"
        );
    }
}

/// Max weight a centroid at quantile `q` may hold.
fn max_weight(n: f64, q: f64, delta: f64) -> f64 {
    4.0 * n * q * (1.0 - q) / delta
}

/// Finite means may always be combined. An infinite mean only combines with
/// the same infinity, otherwise the weighted mean would absorb the finite
/// side or turn into NaN.
fn mergeable(centroid: &Centroid, mean: f64) -> bool {
    (centroid.mean.is_finite() && mean.is_finite()) || centroid.mean == mean
}

/// Combine two centroids.
///
/// The mean is kept between the two input means so that rounding never
/// moves a centroid past its neighbors.
fn merge_centroids(a: Centroid, b: Centroid) -> Centroid {
    let weight = a.weight + b.weight;
    if a.mean == b.mean {
        return Centroid {
            mean: a.mean,
            weight,
        };
    }
    let mean = (a.mean * a.weight as f64 + b.mean * b.weight as f64) / weight as f64;
    Centroid {
        mean: mean.max(a.mean.min(b.mean)).min(a.mean.max(b.mean)),
        weight,
    }
}

/// Linear interpolation between `a` and `b` (`a <= b`), with the result kept
/// inside `[a, b]`.
fn interpolate(a: f64, b: f64, frac: f64) -> f64 {
    if frac <= 0.0 {
        return a;
    }
    if frac >= 1.0 || a == b {
        return b;
    }
    if a.is_infinite() {
        return a;
    }
    if b.is_infinite() {
        return b;
    }
    let v = a + (b - a) * frac;
    v.max(a).min(b)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use sketchdb_error::ErrorKind;

    use super::*;

    fn digest_from(compression: usize, vals: impl IntoIterator<Item = f64>) -> TDigest {
        let mut td = TDigest::try_new(compression).unwrap();
        for v in vals {
            td.add(v).unwrap();
        }
        td
    }

    #[test]
    fn zero_compression_rejected() {
        assert!(TDigest::try_new(0).is_err());
    }

    #[test]
    fn basic_insert_and_quantile() {
        let td = digest_from(100, (0..1000).map(|i| i as f64));

        // The 50th percentile should be near 499.5
        let median = td.quantile(0.5).unwrap();
        assert!(
            (median - 499.5).abs() < 20.0,
            "median estimate was {median}, expected ~499.5",
        );
        // The 90th percentile should be near 899.0
        let p90 = td.quantile(0.9).unwrap();
        assert!(
            (p90 - 899.0).abs() < 20.0,
            "90th percentile was {p90}, expected ~899.0",
        );
    }

    #[test]
    fn small_inputs_exact() {
        let td = digest_from(200, [3.0, 1.0, 4.0, 2.0]);

        assert_eq!(4, td.centroids_count());
        assert_eq!(Some(1.0), td.quantile(0.0));
        assert_eq!(Some(2.5), td.quantile(0.5));
        assert_eq!(Some(4.0), td.quantile(0.999));
        assert_eq!(Some(4.0), td.quantile(1.0));
    }

    #[test]
    fn single_value() {
        let td = digest_from(200, [7.5]);
        assert_eq!(Some(7.5), td.quantile(0.0));
        assert_eq!(Some(7.5), td.quantile(0.3));
        assert_eq!(Some(7.5), td.quantile(1.0));
    }

    #[test]
    fn empty_quantile() {
        let td = TDigest::try_new(50).unwrap();
        assert_eq!(None, td.quantile(0.5));
        assert_eq!(None, td.min());
        assert_eq!(None, td.max());
    }

    #[test]
    fn nan_rejected() {
        let mut td = TDigest::try_new(50).unwrap();
        let err = td.add(f64::NAN).unwrap_err();
        assert_eq!(ErrorKind::Range, err.kind());
        assert!(td.is_empty());
    }

    #[test]
    fn infinities_carried_to_extremes() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut td = digest_from(50, (0..10_000).map(|_| rng.random_range(0.0..100.0)));
        td.add(f64::INFINITY).unwrap();
        td.add(f64::INFINITY).unwrap();
        td.add(f64::NEG_INFINITY).unwrap();
        td.compress();

        assert_eq!(10_003, td.count());
        assert_eq!(Some(f64::NEG_INFINITY), td.quantile(0.0));
        assert_eq!(Some(f64::INFINITY), td.quantile(1.0));

        // Finite interior is unaffected.
        let median = td.quantile(0.5).unwrap();
        assert!((median - 50.0).abs() < 3.0, "median: {median}");

        // Infinite centroids never absorb finite points.
        for c in td.centroids() {
            assert!(!c.mean.is_nan());
            if c.mean.is_infinite() {
                assert!(c.weight <= 2, "centroid: {c:?}");
            }
        }

        let mut prev = f64::NEG_INFINITY;
        for i in 0..=100 {
            let v = td.quantile(i as f64 / 100.0).unwrap();
            assert!(v >= prev, "q={}: {v} < {prev}", i as f64 / 100.0);
            prev = v;
        }
    }

    #[test]
    fn only_infinity() {
        let td = digest_from(50, [f64::INFINITY]);
        assert_eq!(Some(f64::INFINITY), td.quantile(0.0));
        assert_eq!(Some(f64::INFINITY), td.quantile(1.0));
    }

    #[test]
    fn weights_sum_to_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let td = digest_from(50, (0..20_000).map(|_| rng.random_range(-100.0..100.0)));

        let sum: u64 = td.centroids().iter().map(|c| c.weight).sum();
        assert_eq!(20_000, sum);
        assert_eq!(20_000, td.count());
        assert!(td.centroids().iter().all(|c| c.weight >= 1));
        assert!(
            td.centroids()
                .windows(2)
                .all(|w| w[0].mean <= w[1].mean)
        );
    }

    #[test]
    fn compress_bounds_centroids() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut td = digest_from(100, (0..100_000).map(|_| rng.random::<f64>()));
        td.compress();

        let count = td.centroids_count();
        assert!(count < 2 * 100 * COMPRESS_FACTOR, "centroids: {count}");
        assert!(count < 100_000 / 50, "centroids: {count}");

        // A second pass over an already compressed digest never grows it.
        td.compress();
        assert!(td.centroids_count() <= count);
    }

    #[test]
    fn min_max_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let vals: Vec<f64> = (0..50_000).map(|_| rng.random_range(-5.0..5.0)).collect();
        let td = digest_from(100, vals.iter().copied());

        let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        assert_eq!(Some(min), td.quantile(0.0));
        assert_eq!(Some(max), td.quantile(1.0));
    }

    #[test]
    fn monotonic_quantiles() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let td = digest_from(200, (0..30_000).map(|_| rng.random::<f64>().powi(3) * 1000.0));

        let mut prev = f64::NEG_INFINITY;
        for i in 0..=1000 {
            let q = i as f64 / 1000.0;
            let v = td.quantile(q).unwrap();
            assert!(prev <= v, "quantile({q}) = {v} is less than previous {prev}");
            prev = v;
        }
    }

    #[test]
    fn tails_more_accurate_than_median() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut td = digest_from(200, (0..100_000).map(|_| rng.random::<f64>()));
        td.compress();

        let p50 = td.quantile(0.5).unwrap();
        let p99 = td.quantile(0.99).unwrap();
        let p001 = td.quantile(0.001).unwrap();
        assert!((p50 - 0.5).abs() < 0.02, "p50 = {p50}");
        assert!((p99 - 0.99).abs() < 0.005, "p99 = {p99}");
        assert!((p001 - 0.001).abs() < 0.002, "p0.1 = {p001}");

        // Centroids at the tails are small, the ones in the middle can be
        // large.
        let first = td.centroids().first().unwrap();
        let last = td.centroids().last().unwrap();
        let largest = td.centroids().iter().map(|c| c.weight).max().unwrap();
        assert!(first.weight <= 2);
        assert!(last.weight <= 2);
        assert!(largest > 10);
    }

    #[test]
    fn merge_consistency() {
        let mut td1 = digest_from(100, (0..500).map(|i| i as f64));
        let td2 = digest_from(100, (500..1000).map(|i| i as f64));

        td1.merge(&td2).unwrap();
        assert_eq!(1000, td1.count());

        let median = td1.quantile(0.5).unwrap();
        assert!(
            (median - 499.5).abs() < 20.0,
            "merged median = {median}, expected ~499.5",
        );
        assert_eq!(Some(0.0), td1.quantile(0.0));
        assert_eq!(Some(999.0), td1.quantile(1.0));
    }

    #[test]
    fn merge_is_commutative_enough() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let a: Vec<f64> = (0..10_000).map(|_| rng.random_range(0.0..10.0)).collect();
        let b: Vec<f64> = (0..10_000).map(|_| rng.random_range(5.0..20.0)).collect();

        let mut ab = digest_from(100, a.iter().copied());
        ab.merge(&digest_from(100, b.iter().copied())).unwrap();
        let mut ba = digest_from(100, b.iter().copied());
        ba.merge(&digest_from(100, a.iter().copied())).unwrap();

        for q in [0.01, 0.25, 0.5, 0.75, 0.99] {
            let l = ab.quantile(q).unwrap();
            let r = ba.quantile(q).unwrap();
            assert!((l - r).abs() < 0.2, "q={q}, left={l}, right={r}");
        }
    }

    #[test]
    fn merge_empty_is_noop() {
        let mut td = digest_from(100, [1.0, 2.0]);
        td.merge(&TDigest::try_new(100).unwrap()).unwrap();
        assert_eq!(2, td.count());
        assert_eq!(Some(1.5), td.quantile(0.5));

        let mut empty = TDigest::try_new(100).unwrap();
        empty.merge(&td).unwrap();
        assert_eq!(Some(1.0), empty.quantile(0.0));
        assert_eq!(Some(2.0), empty.quantile(1.0));
    }

    #[test]
    fn merge_different_compression() {
        let mut td1 = TDigest::try_new(100).unwrap();
        let td2 = TDigest::try_new(200).unwrap();
        td1.merge(&td2).unwrap_err();
    }

    #[test]
    fn serde_preserves_estimates() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let td = digest_from(100, (0..5_000).map(|_| rng.random::<f64>()));

        let json = serde_json::to_string(&td).unwrap();
        let restored: TDigest = serde_json::from_str(&json).unwrap();

        assert_eq!(td.count(), restored.count());
        assert_eq!(td.quantile(0.9), restored.quantile(0.9));
    }
}
