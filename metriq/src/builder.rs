use std::sync::Arc;
use std::time::Duration;

use quanta::Clock;

use crate::internal::{ActiveInternalMetrics, InternalMetrics, NoopInternalMetrics};
use crate::metrics::Parts;
use crate::registry::{Context, Scope};
use crate::{Labels, Metrics, Registry};

/// Builder for creating and configuring a [`Metrics`] root.
#[derive(Debug)]
pub struct MetricsBuilder {
    default_ttl: Option<Duration>,
    common_prefix: String,
    common_labels: Labels,
    enable_internal_metrics: bool,
    clock: Option<Clock>,
}

impl MetricsBuilder {
    /// Creates a new [`MetricsBuilder`].
    pub fn new() -> Self {
        MetricsBuilder {
            default_ttl: None,
            common_prefix: String::new(),
            common_labels: Labels::new(),
            enable_internal_metrics: true,
            clock: None,
        }
    }

    /// Sets the default time-to-live of timeseries.
    ///
    /// A timeseries that has not been written to for this long is treated as absent, and is
    /// evicted the next time it is read or written.  Registries and instruments may override it.
    ///
    /// Defaults to no expiry.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Sets a prefix prepended to every instrument name.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn common_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.common_prefix = prefix.into();
        self
    }

    /// Adds a label attached to every timeseries.
    ///
    /// Common labels are merged into a timeseries when it is created.  Labels given on a write
    /// take precedence over common labels with the same key.
    #[must_use]
    pub fn common_label<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.common_labels.insert(key, value);
        self
    }

    /// Sets whether `metriq_*` internal instruments are maintained and exported.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn enable_internal_metrics(mut self, enabled: bool) -> Self {
        self.enable_internal_metrics = enabled;
        self
    }

    /// Sets the clock used for expiry and sliding windows.
    ///
    /// Mostly useful with [`Clock::mock`] in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the [`Metrics`] root.
    pub fn build(self) -> Metrics {
        let context = Arc::new(Context::new(self.clock.unwrap_or_default()));

        // Internal instruments never report to themselves, and ignore the root options.
        let noop: Arc<dyn InternalMetrics> = Arc::new(NoopInternalMetrics);
        let internal_registry = Registry::new(Scope::default(), Arc::clone(&context), Arc::clone(&noop));
        let observer: Arc<dyn InternalMetrics> = if self.enable_internal_metrics {
            Arc::new(ActiveInternalMetrics::register(&internal_registry))
        } else {
            noop
        };

        let scope = Scope {
            default_ttl: self.default_ttl,
            common_prefix: self.common_prefix,
            common_labels: self.common_labels,
        };
        let default_registry = Registry::new(scope.clone(), Arc::clone(&context), Arc::clone(&observer));

        Metrics::from_parts(Parts { scope, context, observer, default_registry, internal_registry })
    }
}

impl Default for MetricsBuilder {
    fn default() -> Self {
        MetricsBuilder::new()
    }
}
