use std::time::Duration;

use metriq_util::DigestOptions;

use crate::instruments::DEFAULT_BUCKETS;
use crate::Labels;

/// Options for a registry.
///
/// Unset fields inherit the values configured on [`MetricsBuilder`](crate::MetricsBuilder).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistryOptions {
    /// Time-to-live of timeseries created by this registry's instruments.
    pub default_ttl: Option<Duration>,

    /// Prefix prepended to the name of every instrument.
    pub common_prefix: Option<String>,

    /// Labels attached to every timeseries of every instrument.
    pub common_labels: Option<Labels>,
}

impl RegistryOptions {
    /// Sets the default time-to-live.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Sets the common name prefix.
    pub fn with_common_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.common_prefix = Some(prefix.into());
        self
    }

    /// Sets the common labels.
    pub fn with_common_labels(mut self, labels: Labels) -> Self {
        self.common_labels = Some(labels);
        self
    }
}

/// Options for a single instrument.
///
/// Unset fields inherit the registry's values.  Set fields replace them: common labels given here
/// are not merged with the registry's.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstrumentOptions {
    /// Time-to-live of each timeseries, refreshed on every write.
    pub ttl: Option<Duration>,

    /// Labels attached to every timeseries when it is created.
    pub common_labels: Option<Labels>,
}

impl InstrumentOptions {
    /// Sets the time-to-live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the common labels.
    pub fn with_common_labels(mut self, labels: Labels) -> Self {
        self.common_labels = Some(labels);
        self
    }
}

/// Options for a histogram.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramOptions {
    /// Options shared by every instrument kind.
    pub instrument: InstrumentOptions,

    /// Bucket boundaries: non-empty, finite, positive and strictly ascending.
    pub buckets: Vec<f64>,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        HistogramOptions { instrument: InstrumentOptions::default(), buckets: DEFAULT_BUCKETS.to_vec() }
    }
}

impl HistogramOptions {
    /// Creates options with the given bucket boundaries.
    pub fn with_buckets<I: IntoIterator<Item = f64>>(buckets: I) -> Self {
        HistogramOptions { buckets: buckets.into_iter().collect(), ..Default::default() }
    }
}

impl From<InstrumentOptions> for HistogramOptions {
    fn from(instrument: InstrumentOptions) -> Self {
        HistogramOptions { instrument, ..Default::default() }
    }
}

/// Options for a summary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummaryOptions {
    /// Options shared by every instrument kind.
    pub instrument: InstrumentOptions,

    /// Percentiles, digest mode and aggregation window.
    pub digest: DigestOptions,
}

impl From<InstrumentOptions> for SummaryOptions {
    fn from(instrument: InstrumentOptions) -> Self {
        SummaryOptions { instrument, ..Default::default() }
    }
}

impl From<DigestOptions> for SummaryOptions {
    fn from(digest: DigestOptions) -> Self {
        SummaryOptions { digest, ..Default::default() }
    }
}
