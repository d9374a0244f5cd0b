use std::marker::PhantomData;
use std::sync::Arc;

use crate::series::{Samples, Series, SeriesSettings};
use crate::{Error, LabelSet, Labels};

/// A monotonically increasing value per timeseries.
///
/// Nothing prevents adding a negative delta, but doing so breaks the expectations of every
/// consumer of counter data.
pub struct Counter<L = Labels> {
    core: Arc<Series<f64>>,
    _labels: PhantomData<fn(&L)>,
}

impl_handle!(Counter);

impl Counter {
    pub(crate) fn new(settings: SeriesSettings) -> Self {
        Counter { core: Arc::new(Series::new(settings)), _labels: PhantomData }
    }

    /// Increments the unlabeled timeseries by one.
    pub fn increment(&self) {
        self.add(1.0);
    }

    /// Adds `delta` to the unlabeled timeseries.
    pub fn add(&self, delta: f64) {
        self.core.update_validated(&Labels::new(), || 0.0, |v| *v += delta);
    }
}

impl<L: LabelSet> Counter<L> {
    /// Increments the timeseries for `labels` by one.
    ///
    /// # Errors
    ///
    /// Fails if `labels` contains a reserved key.
    pub fn increment_with(&self, labels: &L) -> Result<(), Error> {
        self.add_with(labels, 1.0)
    }

    /// Adds `delta` to the timeseries for `labels`.
    ///
    /// # Errors
    ///
    /// Fails if `labels` contains a reserved key.
    pub fn add_with(&self, labels: &L, delta: f64) -> Result<(), Error> {
        self.core.update(&labels.to_labels(), || 0.0, |v| *v += delta)
    }

    /// Gets the current value for `labels`, or `None` if the timeseries does not exist.
    pub fn get_debug_value(&self, labels: &L) -> Option<f64> {
        self.core.read(&labels.to_labels(), |v| *v)
    }
}

impl<L> Counter<L> {
    fn series(&self) -> &Series<f64> {
        &self.core
    }

    /// Iterates over the live timeseries.
    pub fn samples(&self) -> Samples<f64> {
        self.core.samples(|v| *v)
    }
}
