//! In-process metrics instrumentation.
//!
//! `metriq` provides named, labeled instruments (counters, gauges, histograms and summaries)
//! grouped into registries under a single [`Metrics`] root.  Application code updates
//! instruments on the hot path, and an exporter periodically walks every instrument to render
//! its current state.
//!
//! # Instruments
//!
//! Each instrument stores one timeseries per distinct label set.  A timeseries is created on the
//! first write to its label set, and label order never matters: `{a="1",b="2"}` and
//! `{b="2",a="1"}` address the same timeseries.  The `__name__` label is reserved and rejected.
//!
//! ```
//! use metriq::{labels, Metrics};
//!
//! # fn main() -> Result<(), metriq::Error> {
//! let metrics = Metrics::new();
//!
//! let requests = metrics.create_counter("http_requests_total", "Total HTTP requests")?;
//! requests.add_with(&labels! { "method" => "GET" }, 5.0)?;
//!
//! assert_eq!(requests.get_debug_value(&labels! { "method" => "GET" }), Some(5.0));
//! # Ok(())
//! # }
//! ```
//!
//! Handles can be narrowed to an application label type with `with_label_type`, after which the
//! compiler checks that every write carries that type's labels.  See [`LabelSet`].
//!
//! # Expiry
//!
//! A time-to-live may be configured on the root, on a registry, or on a single instrument.  A
//! timeseries that has not been written to for longer than its time-to-live is treated as absent:
//! it disappears from scrapes, and the next write starts over from a fresh value.
//!
//! # Names
//!
//! Instrument names, after prefixing by their registry, are unique across every registry of a
//! [`Metrics`] root.  Creating a second instrument with a taken name fails with
//! [`Error::DuplicateName`].
//!
//! # Internal metrics
//!
//! Unless disabled with [`MetricsBuilder::enable_internal_metrics`], every root maintains a
//! handful of `metriq_*` instruments describing itself: the number of instruments, timeseries
//! and samples, and statistics about the last scrape.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod labels;
pub use self::labels::{LabelSet, Labels, RESERVED_LABEL};

mod error;
pub use self::error::Error;

mod series;
pub use self::series::{Sample, Samples};

mod instruments;
pub use self::instruments::{
    Counter, Gauge, Histogram, HistogramSnapshot, Instrument, Summary, SummarySnapshot,
    DEFAULT_BUCKETS,
};

mod internal;
pub use self::internal::{ActiveInternalMetrics, InternalMetrics, NoopInternalMetrics};

mod options;
pub use self::options::{HistogramOptions, InstrumentOptions, RegistryOptions, SummaryOptions};

mod registry;
pub use self::registry::Registry;

mod metrics;
pub use self::metrics::{CallbackId, Metrics};

mod builder;
pub use self::builder::MetricsBuilder;

pub use metriq_util::{
    ApproximateOptions, DigestOptions, OptionsError, SummaryKind, TDigestOptions, WindowOptions,
};
