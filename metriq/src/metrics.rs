use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use quanta::Clock;
use tracing::debug;

use crate::internal::InternalMetrics;
use crate::registry::{Context, Scope};
use crate::{
    Counter, Error, Gauge, Histogram, HistogramOptions, Instrument, InstrumentOptions, MetricsBuilder,
    Registry, RegistryOptions, Summary, SummaryOptions,
};

type CollectCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Identifies a registered collect callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

pub(crate) struct Parts {
    pub scope: Scope,
    pub context: Arc<Context>,
    pub observer: Arc<dyn InternalMetrics>,
    pub default_registry: Registry,
    pub internal_registry: Registry,
}

struct Inner {
    scope: Scope,
    context: Arc<Context>,
    observer: Arc<dyn InternalMetrics>,
    default_registry: Registry,
    registries: RwLock<Vec<Registry>>,
    callbacks: Mutex<Vec<(CallbackId, CollectCallback)>>,
    next_callback_id: AtomicU64,
}

/// The root of a set of registries.
///
/// `Metrics` owns a default registry, a registry for its own internal instruments, and any
/// registries created through [`create_registry`](Metrics::create_registry).  Scrapes go through
/// [`collect`](Metrics::collect), which first runs the registered collect callbacks and then
/// gathers every instrument, registry by registry in creation order.
///
/// `Metrics` is cheap to clone: clones share the same registries.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<Inner>,
}

impl Metrics {
    /// Creates a [`Metrics`] root with default options.
    ///
    /// Internal metrics are enabled.
    pub fn new() -> Metrics {
        MetricsBuilder::new().build()
    }

    /// Creates a [`MetricsBuilder`] to configure a [`Metrics`] root.
    pub fn builder() -> MetricsBuilder {
        MetricsBuilder::new()
    }

    pub(crate) fn from_parts(parts: Parts) -> Metrics {
        let Parts { scope, context, observer, default_registry, internal_registry } = parts;

        let inner = Inner {
            scope,
            context,
            observer,
            default_registry: default_registry.clone(),
            registries: RwLock::new(vec![default_registry, internal_registry]),
            callbacks: Mutex::new(Vec::new()),
            next_callback_id: AtomicU64::new(0),
        };
        Metrics { inner: Arc::new(inner) }
    }

    /// Gets the default registry.
    pub fn default_registry(&self) -> &Registry {
        &self.inner.default_registry
    }

    /// Creates a registry.
    ///
    /// Options left unset inherit the values configured on the builder.
    pub fn create_registry(&self, options: RegistryOptions) -> Registry {
        let scope = self.inner.scope.with_overrides(options);
        debug!(common_prefix = scope.common_prefix.as_str(), "created registry");

        let registry =
            Registry::new(scope, Arc::clone(&self.inner.context), Arc::clone(&self.inner.observer));
        self.inner.registries.write().push(registry.clone());
        registry
    }

    /// Creates a counter in the default registry.
    ///
    /// # Errors
    ///
    /// See [`Registry::create_counter`].
    pub fn create_counter(&self, name: &str, description: &str) -> Result<Counter, Error> {
        self.inner.default_registry.create_counter(name, description)
    }

    /// Creates a counter with options in the default registry.
    ///
    /// # Errors
    ///
    /// See [`Registry::create_counter_with`].
    pub fn create_counter_with(
        &self,
        name: &str,
        description: &str,
        options: InstrumentOptions,
    ) -> Result<Counter, Error> {
        self.inner.default_registry.create_counter_with(name, description, options)
    }

    /// Creates a gauge in the default registry.
    ///
    /// # Errors
    ///
    /// See [`Registry::create_gauge`].
    pub fn create_gauge(&self, name: &str, description: &str) -> Result<Gauge, Error> {
        self.inner.default_registry.create_gauge(name, description)
    }

    /// Creates a gauge with options in the default registry.
    ///
    /// # Errors
    ///
    /// See [`Registry::create_gauge_with`].
    pub fn create_gauge_with(
        &self,
        name: &str,
        description: &str,
        options: InstrumentOptions,
    ) -> Result<Gauge, Error> {
        self.inner.default_registry.create_gauge_with(name, description, options)
    }

    /// Creates a histogram in the default registry.
    ///
    /// # Errors
    ///
    /// See [`Registry::create_histogram`].
    pub fn create_histogram(&self, name: &str, description: &str) -> Result<Histogram, Error> {
        self.inner.default_registry.create_histogram(name, description)
    }

    /// Creates a histogram with options in the default registry.
    ///
    /// # Errors
    ///
    /// See [`Registry::create_histogram_with`].
    pub fn create_histogram_with(
        &self,
        name: &str,
        description: &str,
        options: HistogramOptions,
    ) -> Result<Histogram, Error> {
        self.inner.default_registry.create_histogram_with(name, description, options)
    }

    /// Creates a summary in the default registry.
    ///
    /// # Errors
    ///
    /// See [`Registry::create_summary`].
    pub fn create_summary(&self, name: &str, description: &str) -> Result<Summary, Error> {
        self.inner.default_registry.create_summary(name, description)
    }

    /// Creates a summary with options in the default registry.
    ///
    /// # Errors
    ///
    /// See [`Registry::create_summary_with`].
    pub fn create_summary_with(
        &self,
        name: &str,
        description: &str,
        options: SummaryOptions,
    ) -> Result<Summary, Error> {
        self.inner.default_registry.create_summary_with(name, description, options)
    }

    /// Returns `true` if any registry holds an instrument with the given fully-qualified name.
    pub fn has_instrument_name(&self, name: &str) -> bool {
        self.inner.context.has_name(name)
    }

    /// Registers a callback to run before every scrape.
    pub fn add_collect_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.push_callback(Arc::new(move || {
            callback();
            futures_util::future::ready(()).boxed()
        }))
    }

    /// Registers an asynchronous callback to run, and be awaited, before every scrape.
    pub fn add_async_collect_callback<F, Fut>(&self, callback: F) -> CallbackId
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.push_callback(Arc::new(move || callback().boxed()))
    }

    /// Unregisters a collect callback.
    ///
    /// Returns `false` if no callback was registered under `id`.
    pub fn remove_collect_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.inner.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    fn push_callback(&self, callback: CollectCallback) -> CallbackId {
        let id = CallbackId(self.inner.next_callback_id.fetch_add(1, Ordering::Relaxed));
        self.inner.callbacks.lock().push((id, callback));
        id
    }

    /// Runs every collect callback, in registration order, then gathers every instrument.
    ///
    /// Callbacks run one at a time; an asynchronous callback is awaited before the next one
    /// starts.
    pub async fn collect(&self) -> Vec<Instrument> {
        let callbacks =
            self.inner.callbacks.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect::<Vec<_>>();
        for callback in callbacks {
            callback().await;
        }

        self.instruments()
    }

    /// Gathers every instrument without running collect callbacks.
    pub fn instruments(&self) -> Vec<Instrument> {
        self.inner.registries.read().iter().flat_map(|r| r.instruments()).collect()
    }

    /// Gets the clock used for expiry, sliding windows and scrape timing.
    pub fn clock(&self) -> &Clock {
        self.inner.context.clock()
    }

    /// Gets the observer that instruments and exporters report to.
    pub fn internal_metrics(&self) -> Arc<dyn InternalMetrics> {
        Arc::clone(&self.inner.observer)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("registries", &self.inner.registries.read().len())
            .field("callbacks", &self.inner.callbacks.lock().len())
            .finish()
    }
}
