use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use quanta::Clock;
use tracing::debug;

use crate::instruments::validate_buckets;
use crate::internal::InternalMetrics;
use crate::series::SeriesSettings;
use crate::{
    Counter, Error, Gauge, Histogram, HistogramOptions, Instrument, InstrumentOptions, Labels,
    RegistryOptions, Summary, SummaryOptions,
};

/// State shared by every registry of one [`Metrics`](crate::Metrics) root.
pub(crate) struct Context {
    clock: Clock,
    names: Mutex<HashSet<String>>,
}

impl Context {
    pub fn new(clock: Clock) -> Self {
        Context { clock, names: Mutex::new(HashSet::new()) }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    fn reserve(&self, name: &str) -> Result<(), Error> {
        if !self.names.lock().insert(name.to_owned()) {
            return Err(Error::DuplicateName(name.to_owned()));
        }

        Ok(())
    }
}

/// Fully resolved registry options.
#[derive(Clone, Debug, Default)]
pub(crate) struct Scope {
    pub default_ttl: Option<Duration>,
    pub common_prefix: String,
    pub common_labels: Labels,
}

impl Scope {
    pub fn with_overrides(&self, options: RegistryOptions) -> Scope {
        Scope {
            default_ttl: options.default_ttl.or(self.default_ttl),
            common_prefix: options.common_prefix.unwrap_or_else(|| self.common_prefix.clone()),
            common_labels: options.common_labels.unwrap_or_else(|| self.common_labels.clone()),
        }
    }
}

struct Inner {
    scope: Scope,
    context: Arc<Context>,
    observer: Arc<dyn InternalMetrics>,
    instruments: RwLock<Vec<Instrument>>,
}

/// A group of instruments sharing a name prefix, common labels and a default time-to-live.
///
/// Instrument names are unique across every registry of the same [`Metrics`](crate::Metrics)
/// root, after prefixing.  Instruments are never unregistered.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    pub(crate) fn new(scope: Scope, context: Arc<Context>, observer: Arc<dyn InternalMetrics>) -> Self {
        let inner = Inner { scope, context, observer, instruments: RwLock::new(Vec::new()) };
        Registry { inner: Arc::new(inner) }
    }

    /// Creates a counter with default options.
    ///
    /// # Errors
    ///
    /// Fails if an instrument with the same prefixed name exists, or if the common labels
    /// contain a reserved key.
    pub fn create_counter(&self, name: &str, description: &str) -> Result<Counter, Error> {
        self.create_counter_with(name, description, InstrumentOptions::default())
    }

    /// Creates a counter.
    ///
    /// # Errors
    ///
    /// Fails if an instrument with the same prefixed name exists, or if the common labels
    /// contain a reserved key.
    pub fn create_counter_with(
        &self,
        name: &str,
        description: &str,
        options: InstrumentOptions,
    ) -> Result<Counter, Error> {
        let settings = self.settings(name, description, options, 1)?;
        self.add(settings, Counter::new, "counter")
    }

    /// Creates a gauge with default options.
    ///
    /// # Errors
    ///
    /// Fails if an instrument with the same prefixed name exists, or if the common labels
    /// contain a reserved key.
    pub fn create_gauge(&self, name: &str, description: &str) -> Result<Gauge, Error> {
        self.create_gauge_with(name, description, InstrumentOptions::default())
    }

    /// Creates a gauge.
    ///
    /// # Errors
    ///
    /// Fails if an instrument with the same prefixed name exists, or if the common labels
    /// contain a reserved key.
    pub fn create_gauge_with(
        &self,
        name: &str,
        description: &str,
        options: InstrumentOptions,
    ) -> Result<Gauge, Error> {
        let settings = self.settings(name, description, options, 1)?;
        self.add(settings, Gauge::new, "gauge")
    }

    /// Creates a histogram with the default buckets.
    ///
    /// # Errors
    ///
    /// Fails if an instrument with the same prefixed name exists, or if the common labels
    /// contain a reserved key.
    pub fn create_histogram(&self, name: &str, description: &str) -> Result<Histogram, Error> {
        self.create_histogram_with(name, description, HistogramOptions::default())
    }

    /// Creates a histogram.
    ///
    /// # Errors
    ///
    /// Fails if the buckets are invalid, if an instrument with the same prefixed name exists, or
    /// if the common labels contain a reserved key.
    pub fn create_histogram_with(
        &self,
        name: &str,
        description: &str,
        options: HistogramOptions,
    ) -> Result<Histogram, Error> {
        let HistogramOptions { instrument, buckets } = options;
        validate_buckets(&buckets)?;

        // Every bucket, plus the `+Inf` bucket and the sum.
        let settings = self.settings(name, description, instrument, buckets.len() + 2)?;
        self.add(settings, |settings| Histogram::new(settings, buckets), "histogram")
    }

    /// Creates a summary with default options.
    ///
    /// # Errors
    ///
    /// Fails if an instrument with the same prefixed name exists, or if the common labels
    /// contain a reserved key.
    pub fn create_summary(&self, name: &str, description: &str) -> Result<Summary, Error> {
        self.create_summary_with(name, description, SummaryOptions::default())
    }

    /// Creates a summary.
    ///
    /// # Errors
    ///
    /// Fails if the digest options are invalid, if an instrument with the same prefixed name
    /// exists, or if the common labels contain a reserved key.
    pub fn create_summary_with(
        &self,
        name: &str,
        description: &str,
        options: SummaryOptions,
    ) -> Result<Summary, Error> {
        let config = options.digest.validate()?;

        // Every percentile, plus the sum and the count.
        let components = config.percentiles().len() + 2;
        let settings = self.settings(name, description, options.instrument, components)?;
        self.add(settings, |settings| Summary::new(settings, config), "summary")
    }

    /// Returns `true` if this registry holds an instrument with the given fully-qualified name.
    pub fn has_instrument_name(&self, name: &str) -> bool {
        self.inner.instruments.read().iter().any(|i| i.name() == name)
    }

    /// Gets every instrument of this registry, in registration order.
    pub fn instruments(&self) -> Vec<Instrument> {
        self.inner.instruments.read().clone()
    }

    pub(crate) fn register_counter(&self, name: &str, description: &str) -> Counter {
        let counter = Counter::new(self.settings_unchecked(name, description));
        self.push(counter.clone().into());
        counter
    }

    pub(crate) fn register_gauge(&self, name: &str, description: &str) -> Gauge {
        let gauge = Gauge::new(self.settings_unchecked(name, description));
        self.push(gauge.clone().into());
        gauge
    }

    fn settings(
        &self,
        name: &str,
        description: &str,
        options: InstrumentOptions,
        components: usize,
    ) -> Result<SeriesSettings, Error> {
        let scope = &self.inner.scope;
        let common_labels = options.common_labels.unwrap_or_else(|| scope.common_labels.clone());
        common_labels.validate()?;

        Ok(SeriesSettings {
            name: format!("{}{}", scope.common_prefix, name),
            description: description.to_owned(),
            ttl: options.ttl.or(scope.default_ttl),
            common_labels,
            components,
            clock: self.inner.context.clock().clone(),
            observer: Arc::clone(&self.inner.observer),
        })
    }

    // For fixed internal names that cannot collide and carry no labels.
    fn settings_unchecked(&self, name: &str, description: &str) -> SeriesSettings {
        let settings = SeriesSettings {
            name: name.to_owned(),
            description: description.to_owned(),
            ttl: None,
            common_labels: Labels::new(),
            components: 1,
            clock: self.inner.context.clock().clone(),
            observer: Arc::clone(&self.inner.observer),
        };
        self.inner.context.names.lock().insert(settings.name.clone());
        settings
    }

    fn add<I, F>(&self, settings: SeriesSettings, build: F, kind: &'static str) -> Result<I, Error>
    where
        I: Clone + Into<Instrument>,
        F: FnOnce(SeriesSettings) -> I,
    {
        self.inner.context.reserve(&settings.name)?;

        let instrument = build(settings);
        let registered: Instrument = instrument.clone().into();
        debug!(name = registered.name(), kind, "registered instrument");

        self.push(registered);
        self.inner.observer.on_instrument_added();
        Ok(instrument)
    }

    fn push(&self, instrument: Instrument) {
        self.inner.instruments.write().push(instrument);
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("common_prefix", &self.inner.scope.common_prefix)
            .field("instruments", &self.inner.instruments.read().len())
            .finish()
    }
}
