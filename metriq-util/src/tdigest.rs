use rand::seq::SliceRandom;

use crate::options::{ApproximateOptions, TDigestOptions};

#[derive(Clone, Debug)]
struct Centroid {
    mean: f64,
    n: f64,
    // Total weight of this centroid and every centroid before it.
    cumn: f64,
    // Total weight before this centroid, plus half of its own.
    mean_cumn: f64,
}

/// A T-Digest quantile sketch.
///
/// Based on [Dunning's T-Digest](tdigest), `TDigest` clusters observations into weighted
/// centroids ordered by mean, merging a new value into its nearest centroid only while that
/// centroid has capacity left at its position in the distribution.  Centroids near the median may
/// grow large, while centroids in the tails stay small, which keeps extreme quantiles accurate.
///
/// Values equal to an existing centroid's mean are always merged into it, so discrete
/// distributions are represented exactly.  In exact mode no other merging happens at all: every
/// distinct value keeps its own centroid and percentiles follow the nearest-rank method.
///
/// Monotonic input is the worst case for compression, since every value lands beyond the current
/// maximum.  [`compress`](TDigest::compress) re-ingests the centroids in a random order to recover
/// from that, and is triggered automatically once the centroid count exceeds `k / delta`.
///
/// [tdigest]: https://arxiv.org/abs/1902.04023
#[derive(Clone, Debug)]
pub struct TDigest {
    centroids: Vec<Centroid>,
    n: f64,
    last_cumulate: f64,
    delta: f64,
    k: usize,
    cx: f64,
    discrete: bool,
    compressing: bool,
}

impl TDigest {
    /// Creates an approximate [`TDigest`].
    ///
    /// `delta` is the compression factor, `k` the recompression threshold (zero disables it), and
    /// `cx` the growth factor after which cached cumulative totals are refreshed during ingest.
    pub fn new(delta: f64, k: usize, cx: f64) -> TDigest {
        TDigest {
            centroids: Vec::new(),
            n: 0.0,
            last_cumulate: 0.0,
            delta,
            k,
            cx,
            discrete: false,
            compressing: false,
        }
    }

    /// Creates an exact [`TDigest`], which never merges distinct values.
    pub fn exact() -> TDigest {
        let defaults = ApproximateOptions::default();
        TDigest { discrete: true, ..TDigest::new(defaults.delta, defaults.k, defaults.cx) }
    }

    /// Creates a [`TDigest`] for the given mode.
    pub fn from_options(options: &TDigestOptions) -> TDigest {
        match options {
            TDigestOptions::Approximate(o) => TDigest::new(o.delta, o.k, o.cx),
            TDigestOptions::Exact => TDigest::exact(),
        }
    }

    /// Number of centroids currently held.
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    /// Returns `true` if nothing has been pushed since creation or the last reset.
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Total weight of all pushed values.
    pub fn count(&self) -> u64 {
        self.n as u64
    }

    /// Pushes a single value.
    ///
    /// NaN carries no rank information and is ignored.
    pub fn push(&mut self, value: f64) {
        self.push_weighted(value, 1.0);
    }

    /// Pushes a value with the given weight.
    pub fn push_weighted(&mut self, value: f64, weight: f64) {
        if value.is_nan() || !(weight > 0.0) {
            return;
        }

        self.digest(value, weight);
    }

    /// Clears all centroids.
    pub fn reset(&mut self) {
        self.centroids.clear();
        self.n = 0.0;
        self.last_cumulate = 0.0;
    }

    /// Re-ingests every centroid in random order, which usually reduces the centroid count.
    pub fn compress(&mut self) {
        if self.compressing {
            return;
        }

        let mut points = std::mem::take(&mut self.centroids);
        self.reset();
        points.shuffle(&mut rand::rng());

        self.compressing = true;
        for point in points {
            self.digest(point.mean, point.n);
        }
        self.cumulate(true);
        self.compressing = false;
    }

    /// Gets the estimated value at the given quantile.
    ///
    /// This is the smallest value at which at least `q` of the observations are less than or equal
    /// to it.  Approximate digests interpolate between the means of the bracketing centroids, while
    /// exact digests select a value with the nearest-rank method.
    ///
    /// If the digest is empty, then the result will be `None`.
    pub fn percentile(&mut self, q: f64) -> Option<f64> {
        if self.centroids.is_empty() {
            return None;
        }

        self.cumulate(true);

        let h = self.n * q;
        let (lower, upper) = self.bound_mean_cumn(h);

        let value = match (lower, upper) {
            (Some(lower), Some(upper)) if std::ptr::eq(lower, upper) => lower.mean,
            (Some(lower), Some(upper)) if !self.discrete => {
                lower.mean
                    + (h - lower.mean_cumn) * (upper.mean - lower.mean)
                        / (upper.mean_cumn - lower.mean_cumn)
            }
            (Some(lower), Some(upper)) => {
                if h <= lower.cumn {
                    lower.mean
                } else {
                    upper.mean
                }
            }
            (Some(only), None) | (None, Some(only)) => only.mean,
            (None, None) => return None,
        };

        Some(value)
    }

    // Finds centroids such that `lower.mean_cumn < h < upper.mean_cumn`, or a single centroid
    // whose `mean_cumn` is exactly `h`.  Either side may be missing at the edges.
    fn bound_mean_cumn(&self, h: f64) -> (Option<&Centroid>, Option<&Centroid>) {
        let idx = self.centroids.partition_point(|c| c.mean_cumn <= h);
        let lower = idx.checked_sub(1).map(|i| &self.centroids[i]);
        let upper = match lower {
            Some(lower) if lower.mean_cumn == h => Some(lower),
            _ => self.centroids.get(idx),
        };

        (lower, upper)
    }

    fn digest(&mut self, x: f64, n: f64) {
        let last = self.centroids.len().saturating_sub(1);

        match self.find_nearest(x) {
            Some(i) if self.centroids[i].mean == x => self.add_weight(i, x, n),
            None | Some(0) => self.new_centroid(x, n, 0.0),
            Some(i) if i == last => self.new_centroid(x, n, self.n),
            Some(i) if self.discrete => {
                let cumn = self.centroids[i].cumn;
                self.new_centroid(x, n, cumn);
            }
            Some(i) => {
                // Either all of `n` fits into the nearest centroid, or none of it does: a partial
                // merge would need a new centroid for the remainder anyway.
                let nearest = &self.centroids[i];
                let p = nearest.mean_cumn / self.n;
                let max_n = (4.0 * self.n * self.delta * p * (1.0 - p)).floor();
                if max_n - nearest.n >= n {
                    self.add_weight(i, x, n);
                } else {
                    let cumn = nearest.cumn;
                    self.new_centroid(x, n, cumn);
                }
            }
        }

        self.cumulate(false);

        if !self.discrete && self.k > 0 && self.centroids.len() as f64 > self.k as f64 / self.delta {
            self.compress();
        }
    }

    fn find_nearest(&self, x: f64) -> Option<usize> {
        if self.centroids.is_empty() {
            return None;
        }

        let lower_bound = self.centroids.partition_point(|c| c.mean < x);
        let candidate = lower_bound.min(self.centroids.len() - 1);
        if self.discrete || self.centroids[candidate].mean == x {
            return Some(candidate);
        }

        match candidate.checked_sub(1) {
            Some(prev)
                if (self.centroids[prev].mean - x).abs()
                    < (self.centroids[candidate].mean - x).abs() =>
            {
                Some(prev)
            }
            _ => Some(candidate),
        }
    }

    fn new_centroid(&mut self, x: f64, n: f64, cumn: f64) {
        let idx = self.centroids.partition_point(|c| c.mean < x);
        self.centroids.insert(idx, Centroid { mean: x, n, cumn, mean_cumn: cumn + n / 2.0 });
        self.n += n;
    }

    fn add_weight(&mut self, idx: usize, x: f64, n: f64) {
        let centroid = &mut self.centroids[idx];
        if x != centroid.mean {
            centroid.mean += n * (x - centroid.mean) / (centroid.n + n);
        }
        centroid.cumn += n;
        centroid.mean_cumn += n / 2.0;
        centroid.n += n;
        self.n += n;
    }

    // Refreshes cumulative totals.  Outside of queries, refreshing is deferred until the weight
    // has grown by a factor of `cx`; slightly stale totals are still good merge estimates.
    fn cumulate(&mut self, exact: bool) {
        if self.n == self.last_cumulate {
            return;
        }

        if !exact && self.cx > 0.0 && self.cx > self.n / self.last_cumulate {
            return;
        }

        let mut cumn = 0.0;
        for centroid in self.centroids.iter_mut() {
            centroid.mean_cumn = cumn + centroid.n / 2.0;
            cumn += centroid.n;
            centroid.cumn = cumn;
        }

        self.n = cumn;
        self.last_cumulate = cumn;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::TDigest;

    // A fixed, well-mixed permutation of 1..=n.
    fn scrambled(n: u64) -> Vec<f64> {
        (0..n).map(|i| ((i * 7919) % n + 1) as f64).collect()
    }

    #[test]
    fn test_empty() {
        let mut digest = TDigest::new(0.01, 25, 1.1);
        assert!(digest.is_empty());
        assert_eq!(digest.percentile(0.5), None);

        digest.push(f64::NAN);
        assert!(digest.is_empty());
    }

    #[test]
    fn test_single_value() {
        let mut digest = TDigest::new(0.01, 25, 1.1);
        digest.push(42.0);

        assert_eq!(digest.percentile(0.0), Some(42.0));
        assert_eq!(digest.percentile(0.5), Some(42.0));
        assert_eq!(digest.percentile(1.0), Some(42.0));
        assert_eq!(digest.count(), 1);
    }

    #[test]
    fn test_sequential_values() {
        let mut digest = TDigest::new(0.01, 25, 1.1);
        for i in 1..=100 {
            digest.push(i as f64);
        }

        assert_eq!(digest.count(), 100);
        assert_abs_diff_eq!(digest.percentile(0.5).unwrap(), 50.0, epsilon = 1.0);
        assert_abs_diff_eq!(digest.percentile(0.9).unwrap(), 90.0, epsilon = 1.0);
        assert_eq!(digest.percentile(0.0), Some(1.0));
        assert_eq!(digest.percentile(1.0), Some(100.0));
    }

    #[test]
    fn test_exact_nearest_rank() {
        let mut digest = TDigest::exact();
        for i in 1..=100 {
            digest.push(i as f64);
        }

        assert_eq!(digest.len(), 100);
        assert_eq!(digest.percentile(0.5), Some(50.0));
        assert_eq!(digest.percentile(0.9), Some(90.0));
        assert_eq!(digest.percentile(0.99), Some(99.0));
    }

    #[test]
    fn test_repeated_values_share_a_centroid() {
        let mut digest = TDigest::new(0.01, 25, 1.1);
        for _ in 0..10 {
            digest.push(3.0);
            digest.push(7.0);
        }

        assert_eq!(digest.len(), 2);
        assert_eq!(digest.count(), 20);
        assert_eq!(digest.percentile(0.0), Some(3.0));
        assert_eq!(digest.percentile(1.0), Some(7.0));
    }

    #[test]
    fn test_scrambled_values() {
        let mut digest = TDigest::new(0.01, 25, 1.1);
        for value in scrambled(10_000) {
            digest.push(value);
        }

        assert_eq!(digest.count(), 10_000);
        assert_abs_diff_eq!(digest.percentile(0.5).unwrap(), 5_000.0, epsilon = 200.0);
        assert_abs_diff_eq!(digest.percentile(0.99).unwrap(), 9_900.0, epsilon = 100.0);
        assert!(digest.len() < 10_000);
    }

    #[test]
    fn test_compress_preserves_distribution() {
        let mut digest = TDigest::new(0.01, 0, 1.1);
        for i in 1..=1_000 {
            digest.push(i as f64);
        }
        assert_eq!(digest.len(), 1_000);

        digest.compress();

        assert!(digest.len() < 1_000);
        assert_eq!(digest.count(), 1_000);
        assert_abs_diff_eq!(digest.percentile(0.5).unwrap(), 500.0, epsilon = 25.0);
        assert_eq!(digest.percentile(0.0), Some(1.0));
        assert_eq!(digest.percentile(1.0), Some(1_000.0));
    }

    #[test]
    fn test_automatic_compression_bounds_size() {
        // k / delta = 100 centroids at most before recompression.
        let mut digest = TDigest::new(0.1, 10, 1.1);
        for i in 1..=5_000 {
            digest.push(i as f64);
        }

        assert!(digest.len() < 500, "digest grew to {} centroids", digest.len());
        assert_eq!(digest.count(), 5_000);
    }

    #[test]
    fn test_reset() {
        let mut digest = TDigest::new(0.01, 25, 1.1);
        digest.push(1.0);
        digest.push(2.0);
        digest.reset();

        assert!(digest.is_empty());
        assert_eq!(digest.count(), 0);
        assert_eq!(digest.percentile(0.5), None);
    }
}
