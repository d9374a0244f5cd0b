use std::marker::PhantomData;
use std::sync::Arc;

use metriq_util::{Digest, DigestConfig};
use quanta::Clock;

use crate::series::{Samples, Series, SeriesSettings};
use crate::{Error, LabelSet, Labels};

/// Values of one summary timeseries.
#[derive(Clone, Debug, PartialEq)]
pub struct SummarySnapshot {
    /// Each configured percentile with its estimated value.
    ///
    /// The value is `NaN` when the digest holds no observations, which happens for windowed
    /// summaries that saw nothing during the current window.
    pub percentiles: Vec<(f64, f64)>,

    /// Sum of all observations.
    pub sum: f64,

    /// Number of observations.
    pub count: u64,
}

struct SummaryValue {
    digest: Digest,
    sum: f64,
    count: u64,
}

impl SummaryValue {
    fn new(config: &DigestConfig, clock: &Clock) -> Self {
        SummaryValue { digest: Digest::new(config, clock), sum: 0.0, count: 0 }
    }

    fn observe(&mut self, config: &DigestConfig, value: f64) {
        self.digest.observe(value);
        self.sum += value;
        self.count += 1;

        if let Some(every) = config.tdigest().compress_every() {
            if self.count % every == 0 {
                self.digest.compress();
            }
        }
    }

    fn snapshot(&mut self, percentiles: &[f64]) -> SummarySnapshot {
        let percentiles = percentiles
            .iter()
            .map(|p| (*p, self.digest.percentile(*p).unwrap_or(f64::NAN)))
            .collect();

        SummarySnapshot { percentiles, sum: self.sum, count: self.count }
    }
}

struct SummaryCore {
    series: Arc<Series<SummaryValue>>,
    config: Arc<DigestConfig>,
}

/// Estimates quantiles of observations per timeseries.
///
/// Observations feed a [`Digest`], either over the lifetime of the timeseries or over a sliding
/// window of time, alongside a running sum and count.  The digest for a timeseries is created on
/// its first observation.
pub struct Summary<L = Labels> {
    core: Arc<SummaryCore>,
    _labels: PhantomData<fn(&L)>,
}

impl_handle!(Summary);

impl Summary {
    pub(crate) fn new(settings: SeriesSettings, config: DigestConfig) -> Self {
        let core = SummaryCore { series: Arc::new(Series::new(settings)), config: Arc::new(config) };
        Summary { core: Arc::new(core), _labels: PhantomData }
    }

    /// Records an observation into the unlabeled timeseries.
    pub fn observe(&self, value: f64) {
        let SummaryCore { series, config } = &*self.core;
        series.update_validated(
            &Labels::new(),
            || SummaryValue::new(config, series.clock()),
            |s| s.observe(config, value),
        );
    }
}

impl<L: LabelSet> Summary<L> {
    /// Records an observation into the timeseries for `labels`.
    ///
    /// # Errors
    ///
    /// Fails if `labels` contains a reserved key.
    pub fn observe_with(&self, labels: &L, value: f64) -> Result<(), Error> {
        let SummaryCore { series, config } = &*self.core;
        series.update(
            &labels.to_labels(),
            || SummaryValue::new(config, series.clock()),
            |s| s.observe(config, value),
        )
    }

    /// Gets the current percentiles, sum and count for `labels`, or `None` if the timeseries does
    /// not exist.
    pub fn get_debug_value(&self, labels: &L) -> Option<SummarySnapshot> {
        let SummaryCore { series, config } = &*self.core;
        series.read(&labels.to_labels(), |s| s.snapshot(config.percentiles()))
    }
}

impl<L> Summary<L> {
    fn series(&self) -> &Series<SummaryValue> {
        &self.core.series
    }

    /// Configured percentiles.
    pub fn percentiles(&self) -> &[f64] {
        self.core.config.percentiles()
    }

    /// Iterates over the live timeseries.
    pub fn samples(&self) -> Samples<SummarySnapshot> {
        let config = Arc::clone(&self.core.config);
        self.core.series.samples(move |s| s.snapshot(config.percentiles()))
    }
}
