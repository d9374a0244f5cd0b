//! Self-instrumentation.
//!
//! Instruments report their lifecycle to an [`InternalMetrics`] observer, and exporters report
//! every completed scrape to it.  When internal metrics are enabled, the observer maintains a set
//! of `metriq_*` instruments in a dedicated registry; otherwise it is a no-op.
use std::time::Duration;

use crate::{Counter, Gauge, Labels, Registry};

/// Observer of instrument lifecycle and scrape events.
pub trait InternalMetrics: Send + Sync {
    /// An instrument was registered.
    fn on_instrument_added(&self);

    /// A timeseries was created for the given instrument.
    ///
    /// `components` is the number of samples each timeseries of the instrument exposes.
    fn on_timeseries_added(&self, instrument: &str, components: usize);

    /// `count` timeseries were removed from the given instrument, whether explicitly or by
    /// expiring.
    fn on_timeseries_removed(&self, instrument: &str, count: usize, components: usize);

    /// A scrape completed, having written `bytes` bytes over `duration`.
    fn on_scrape(&self, bytes: u64, duration: Duration);
}

/// An [`InternalMetrics`] observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopInternalMetrics;

impl InternalMetrics for NoopInternalMetrics {
    fn on_instrument_added(&self) {}

    fn on_timeseries_added(&self, _instrument: &str, _components: usize) {}

    fn on_timeseries_removed(&self, _instrument: &str, _count: usize, _components: usize) {}

    fn on_scrape(&self, _bytes: u64, _duration: Duration) {}
}

/// An [`InternalMetrics`] observer that records events into `metriq_*` instruments.
#[derive(Debug)]
pub struct ActiveInternalMetrics {
    metrics: Gauge,
    timeseries: Gauge,
    samples: Gauge,
    scrapes: Counter,
    scrape_bytes: Gauge,
    scrape_duration: Gauge,
}

impl ActiveInternalMetrics {
    /// Registers the internal instruments in `registry`.
    ///
    /// The registry must report to a no-op observer, so that bookkeeping does not observe itself.
    pub(crate) fn register(registry: &Registry) -> Self {
        let samples = registry.register_gauge("metriq_samples_count", "Current number of samples registered");
        let timeseries =
            registry.register_gauge("metriq_timeseries_count", "Current number of timeseries registered");
        let metrics = registry.register_gauge("metriq_metrics_count", "Current number of metrics registered");

        // The bookkeeping gauges count themselves, unlike the scrape instruments below.
        metrics.add(registry.instruments().len() as f64);

        let scrapes = registry.register_counter("metriq_scrapes_total", "Number of scrapes since startup");
        let scrape_bytes =
            registry.register_gauge("metriq_last_scrape_bytes", "Bytes returned during last scrape");
        let scrape_duration = registry
            .register_gauge("metriq_last_scrape_duration_seconds", "Duration of last scrape in seconds");

        ActiveInternalMetrics { metrics, timeseries, samples, scrapes, scrape_bytes, scrape_duration }
    }

    fn instrument_labels(instrument: &str) -> Labels {
        crate::labels! { "instrument" => instrument }
    }
}

impl InternalMetrics for ActiveInternalMetrics {
    fn on_instrument_added(&self) {
        self.metrics.increment();
    }

    fn on_timeseries_added(&self, instrument: &str, components: usize) {
        let labels = Self::instrument_labels(instrument);
        self.timeseries.adjust(&labels, 1.0);
        self.samples.adjust(&labels, components as f64);
    }

    fn on_timeseries_removed(&self, instrument: &str, count: usize, components: usize) {
        let labels = Self::instrument_labels(instrument);
        self.timeseries.adjust(&labels, -(count as f64));
        self.samples.adjust(&labels, -((count * components) as f64));
    }

    fn on_scrape(&self, bytes: u64, duration: Duration) {
        self.scrapes.increment();
        self.scrape_bytes.set(bytes as f64);
        self.scrape_duration.set(duration.as_secs_f64());
    }
}
