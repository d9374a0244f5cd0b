use std::marker::PhantomData;
use std::sync::Arc;

use crate::series::{Samples, Series, SeriesSettings};
use crate::{Error, LabelSet, Labels};

/// A value per timeseries that can go up and down, or be set outright.
pub struct Gauge<L = Labels> {
    core: Arc<Series<f64>>,
    _labels: PhantomData<fn(&L)>,
}

impl_handle!(Gauge);

impl Gauge {
    pub(crate) fn new(settings: SeriesSettings) -> Self {
        Gauge { core: Arc::new(Series::new(settings)), _labels: PhantomData }
    }

    /// Increments the unlabeled timeseries by one.
    pub fn increment(&self) {
        self.add(1.0);
    }

    /// Adds `delta` to the unlabeled timeseries.
    pub fn add(&self, delta: f64) {
        self.adjust(&Labels::new(), delta);
    }

    /// Decrements the unlabeled timeseries by one.
    pub fn decrement(&self) {
        self.sub(1.0);
    }

    /// Subtracts `delta` from the unlabeled timeseries.
    pub fn sub(&self, delta: f64) {
        self.adjust(&Labels::new(), -delta);
    }

    /// Sets the unlabeled timeseries to `value`.
    pub fn set(&self, value: f64) {
        self.core.update_validated(&Labels::new(), || 0.0, |v| *v = value);
    }

    // Writes with labels known to be valid.
    pub(crate) fn adjust(&self, labels: &Labels, delta: f64) {
        self.core.update_validated(labels, || 0.0, |v| *v += delta);
    }
}

impl<L: LabelSet> Gauge<L> {
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

    /// Decrements the timeseries for `labels` by one.
    ///
    /// # Errors
    ///
    /// Fails if `labels` contains a reserved key.
    pub fn decrement_with(&self, labels: &L) -> Result<(), Error> {
        self.sub_with(labels, 1.0)
    }

    /// Subtracts `delta` from the timeseries for `labels`.
    ///
    /// # Errors
    ///
    /// Fails if `labels` contains a reserved key.
    pub fn sub_with(&self, labels: &L, delta: f64) -> Result<(), Error> {
        self.core.update(&labels.to_labels(), || 0.0, |v| *v -= delta)
    }

    /// Sets the timeseries for `labels` to `value`, ignoring its previous value.
    ///
    /// # Errors
    ///
    /// Fails if `labels` contains a reserved key.
    pub fn set_with(&self, labels: &L, value: f64) -> Result<(), Error> {
        self.core.update(&labels.to_labels(), || 0.0, |v| *v = value)
    }

    /// Gets the current value for `labels`, or `None` if the timeseries does not exist.
    pub fn get_debug_value(&self, labels: &L) -> Option<f64> {
        self.core.read(&labels.to_labels(), |v| *v)
    }
}

impl<L> Gauge<L> {
    fn series(&self) -> &Series<f64> {
        &self.core
    }

    /// Iterates over the live timeseries.
    pub fn samples(&self) -> Samples<f64> {
        self.core.samples(|v| *v)
    }
}
