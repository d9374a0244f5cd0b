use std::marker::PhantomData;
use std::sync::Arc;

use crate::series::{Samples, Series, SeriesSettings};
use crate::{Error, LabelSet, Labels};

/// Bucket boundaries used when none are configured.
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

pub(crate) fn validate_buckets(buckets: &[f64]) -> Result<(), Error> {
    if buckets.is_empty() {
        return Err(Error::InvalidBuckets("at least one bucket is required"));
    }

    if !buckets.iter().all(|b| b.is_finite() && *b > 0.0) {
        return Err(Error::InvalidBuckets("buckets must be finite positive numbers"));
    }

    if !buckets.windows(2).all(|w| w[0] < w[1]) {
        return Err(Error::InvalidBuckets("buckets must be strictly ascending"));
    }

    Ok(())
}

/// Values of one histogram timeseries.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramSnapshot {
    /// Each bucket boundary with the number of observations less than or equal to it.
    pub buckets: Vec<(f64, u64)>,

    /// Sum of all observations.
    pub sum: f64,

    /// Number of observations.
    pub count: u64,
}

struct HistogramValue {
    // One slot per boundary, then the implicit `+Inf` bucket.
    counts: Vec<u64>,
    sum: f64,
}

impl HistogramValue {
    fn new(buckets: usize) -> Self {
        HistogramValue { counts: vec![0; buckets + 1], sum: 0.0 }
    }

    fn observe(&mut self, bounds: &[f64], value: f64) {
        for (count, bound) in self.counts.iter_mut().zip(bounds) {
            if value <= *bound {
                *count += 1;
            }
        }

        if let Some(inf) = self.counts.last_mut() {
            *inf += 1;
        }
        self.sum += value;
    }

    fn snapshot(&self, bounds: &[f64]) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: bounds.iter().copied().zip(self.counts.iter().copied()).collect(),
            sum: self.sum,
            count: self.counts.last().copied().unwrap_or_default(),
        }
    }
}

struct HistogramCore {
    series: Arc<Series<HistogramValue>>,
    buckets: Arc<[f64]>,
}

/// Counts observations into cumulative buckets per timeseries.
///
/// Each bucket counts the observations less than or equal to its boundary, so an observation is
/// counted by its own bucket and every larger one.  An implicit `+Inf` bucket counts every
/// observation.
pub struct Histogram<L = Labels> {
    core: Arc<HistogramCore>,
    _labels: PhantomData<fn(&L)>,
}

impl_handle!(Histogram);

impl Histogram {
    // Buckets must already be validated.
    pub(crate) fn new(settings: SeriesSettings, buckets: Vec<f64>) -> Self {
        let core = HistogramCore { series: Arc::new(Series::new(settings)), buckets: buckets.into() };
        Histogram { core: Arc::new(core), _labels: PhantomData }
    }

    /// Records an observation into the unlabeled timeseries.
    pub fn observe(&self, value: f64) {
        let buckets = &self.core.buckets;
        self.core.series.update_validated(
            &Labels::new(),
            || HistogramValue::new(buckets.len()),
            |h| h.observe(buckets, value),
        );
    }
}

impl<L: LabelSet> Histogram<L> {
    /// Records an observation into the timeseries for `labels`.
    ///
    /// # Errors
    ///
    /// Fails if `labels` contains a reserved key.
    pub fn observe_with(&self, labels: &L, value: f64) -> Result<(), Error> {
        let buckets = &self.core.buckets;
        self.core.series.update(
            &labels.to_labels(),
            || HistogramValue::new(buckets.len()),
            |h| h.observe(buckets, value),
        )
    }

    /// Gets the current buckets, sum and count for `labels`, or `None` if the timeseries does not
    /// exist.
    pub fn get_debug_value(&self, labels: &L) -> Option<HistogramSnapshot> {
        let buckets = &self.core.buckets;
        self.core.series.read(&labels.to_labels(), |h| h.snapshot(buckets))
    }
}

impl<L> Histogram<L> {
    fn series(&self) -> &Series<HistogramValue> {
        &self.core.series
    }

    /// Configured bucket boundaries, in ascending order.
    pub fn buckets(&self) -> &[f64] {
        &self.core.buckets
    }

    /// Iterates over the live timeseries.
    pub fn samples(&self) -> Samples<HistogramSnapshot> {
        let buckets = Arc::clone(&self.core.buckets);
        self.core.series.samples(move |h| h.snapshot(&buckets))
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_buckets, HistogramValue};
    use crate::Error;

    #[test]
    fn test_validate_buckets() {
        assert!(validate_buckets(&[1.0, 2.0, 3.0]).is_ok());
        assert!(matches!(validate_buckets(&[]), Err(Error::InvalidBuckets(_))));
        assert!(matches!(validate_buckets(&[0.0, 1.0]), Err(Error::InvalidBuckets(_))));
        assert!(matches!(validate_buckets(&[-1.0]), Err(Error::InvalidBuckets(_))));
        assert!(matches!(validate_buckets(&[f64::NAN]), Err(Error::InvalidBuckets(_))));
        assert!(matches!(validate_buckets(&[f64::INFINITY]), Err(Error::InvalidBuckets(_))));
        assert!(matches!(validate_buckets(&[2.0, 1.0]), Err(Error::InvalidBuckets(_))));
        assert!(matches!(validate_buckets(&[1.0, 1.0]), Err(Error::InvalidBuckets(_))));
    }

    #[test]
    fn test_cumulative_buckets() {
        let bounds = [1.0, 2.0, 3.0];
        let mut value = HistogramValue::new(bounds.len());
        value.observe(&bounds, 1.5);

        let snapshot = value.snapshot(&bounds);
        assert_eq!(snapshot.buckets, vec![(1.0, 0), (2.0, 1), (3.0, 1)]);
        assert_eq!(snapshot.sum, 1.5);
        assert_eq!(snapshot.count, 1);

        value.observe(&bounds, 0.5);
        value.observe(&bounds, 10.0);
        let snapshot = value.snapshot(&bounds);
        assert_eq!(snapshot.buckets, vec![(1.0, 1), (2.0, 2), (3.0, 2)]);
        assert_eq!(snapshot.sum, 12.0);
        assert_eq!(snapshot.count, 3);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let bounds = [1.0, 2.0];
        let mut value = HistogramValue::new(bounds.len());
        value.observe(&bounds, 2.0);

        assert_eq!(value.snapshot(&bounds).buckets, vec![(1.0, 0), (2.0, 1)]);
    }
}
