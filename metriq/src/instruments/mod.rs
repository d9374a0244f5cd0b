//! Instrument handles.
//!
//! Every handle is a cheap, clonable reference to shared storage: clones write to the same
//! timeseries.  Handles are generic over their label type, which defaults to the untyped
//! [`Labels`](crate::Labels).

/// Implements the operations shared by every handle type.
///
/// The handle must have `core` and `_labels` fields and a private `series()` accessor.
macro_rules! impl_handle {
    ($handle:ident) => {
        impl<L> Clone for $handle<L> {
            fn clone(&self) -> Self {
                $handle { core: std::sync::Arc::clone(&self.core), _labels: std::marker::PhantomData }
            }
        }

        impl<L> std::fmt::Debug for $handle<L> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($handle))
                    .field("name", &self.name())
                    .field("timeseries", &self.len())
                    .finish()
            }
        }

        impl<L> $handle<L> {
            /// Fully-qualified name of this instrument, including any registry prefix.
            pub fn name(&self) -> &str {
                self.series().name()
            }

            /// Description of this instrument.
            pub fn description(&self) -> &str {
                self.series().description()
            }

            /// Number of timeseries currently stored, including any that have expired but not yet
            /// been evicted.
            pub fn len(&self) -> usize {
                self.series().len()
            }

            /// Returns `true` if no timeseries are stored.
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Removes every timeseries of this instrument.
            pub fn clear(&self) {
                self.series().clear();
            }

            /// Removes every timeseries of this instrument.
            ///
            /// Alias of [`clear`](Self::clear).
            pub fn remove_all(&self) {
                self.clear();
            }

            /// Evicts every expired timeseries.
            ///
            /// Expired timeseries are otherwise only evicted when they are next read or written.
            pub fn clear_expired_values(&self) {
                self.series().clear_expired();
            }
        }

        impl<L: $crate::LabelSet> $handle<L> {
            /// Removes the timeseries for the given labels, if present.
            pub fn remove(&self, labels: &L) {
                self.series().remove(&labels.to_labels());
            }
        }

        impl $handle<$crate::Labels> {
            /// Narrows this handle to a typed label set.
            ///
            /// The narrowed handle only offers writes that take an `L`, so every write is checked
            /// at compile time to carry the labels `L` provides.
            pub fn with_label_type<L: $crate::LabelSet>(self) -> $handle<L> {
                $handle { core: self.core, _labels: std::marker::PhantomData }
            }
        }
    };
}

mod counter;
pub use counter::Counter;

mod gauge;
pub use gauge::Gauge;

mod histogram;
pub(crate) use histogram::validate_buckets;
pub use histogram::{Histogram, HistogramSnapshot, DEFAULT_BUCKETS};

mod summary;
pub use summary::{Summary, SummarySnapshot};

/// An instrument of any kind, as yielded by registries during a scrape.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Instrument {
    /// A counter.
    Counter(Counter),

    /// A gauge.
    Gauge(Gauge),

    /// A histogram.
    Histogram(Histogram),

    /// A summary.
    Summary(Summary),
}

impl Instrument {
    /// Fully-qualified name of the instrument.
    pub fn name(&self) -> &str {
        match self {
            Instrument::Counter(c) => c.name(),
            Instrument::Gauge(g) => g.name(),
            Instrument::Histogram(h) => h.name(),
            Instrument::Summary(s) => s.name(),
        }
    }

    /// Description of the instrument.
    pub fn description(&self) -> &str {
        match self {
            Instrument::Counter(c) => c.description(),
            Instrument::Gauge(g) => g.description(),
            Instrument::Histogram(h) => h.description(),
            Instrument::Summary(s) => s.description(),
        }
    }

    /// Number of timeseries currently stored.
    pub fn len(&self) -> usize {
        match self {
            Instrument::Counter(c) => c.len(),
            Instrument::Gauge(g) => g.len(),
            Instrument::Histogram(h) => h.len(),
            Instrument::Summary(s) => s.len(),
        }
    }

    /// Returns `true` if no timeseries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Counter> for Instrument {
    fn from(counter: Counter) -> Self {
        Instrument::Counter(counter)
    }
}

impl From<Gauge> for Instrument {
    fn from(gauge: Gauge) -> Self {
        Instrument::Gauge(gauge)
    }
}

impl From<Histogram> for Instrument {
    fn from(histogram: Histogram) -> Self {
        Instrument::Histogram(histogram)
    }
}

impl From<Summary> for Instrument {
    fn from(summary: Summary) -> Self {
        Instrument::Summary(summary)
    }
}
