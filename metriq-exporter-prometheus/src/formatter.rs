use metriq::{HistogramSnapshot, Instrument, Samples, SummarySnapshot};

use crate::formatting::{encode_number, write_help_line, write_metric_line, write_type_line};
use crate::ExportError;

/// Content type of the Prometheus text format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Content type of the OpenMetrics text format.
pub const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Size, in bytes, at which a formatter flushes its buffer as a chunk.
pub const DEFAULT_BATCH_SIZE: usize = 40_000;

/// A text exposition format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// The Prometheus text format, version 0.0.4.
    Prometheus,

    /// The OpenMetrics text format, version 1.0.0.
    OpenMetrics,
}

impl Format {
    /// Gets the content type of this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Prometheus => PROMETHEUS_CONTENT_TYPE,
            Format::OpenMetrics => OPENMETRICS_CONTENT_TYPE,
        }
    }

    fn counter_suffix(&self) -> Option<&'static str> {
        match self {
            Format::Prometheus => None,
            Format::OpenMetrics => Some("total"),
        }
    }
}

/// Renders instruments in a text exposition format.
///
/// Output is produced as a sequence of chunks: text accumulates in a buffer that is flushed once
/// it reaches the batch size, so memory stays bounded no matter how many timeseries an
/// instrument holds.  The batch size only moves chunk boundaries; the concatenated output is
/// identical for every batch size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Formatter {
    format: Format,
    batch_size: usize,
}

impl Formatter {
    /// Creates a formatter for the given format, with the default batch size.
    pub fn new(format: Format) -> Self {
        Formatter { format, batch_size: DEFAULT_BATCH_SIZE }
    }

    /// Creates a formatter for the Prometheus text format.
    pub fn prometheus() -> Self {
        Formatter::new(Format::Prometheus)
    }

    /// Creates a formatter for the OpenMetrics text format.
    pub fn openmetrics() -> Self {
        Formatter::new(Format::OpenMetrics)
    }

    /// Sets the size, in bytes, at which buffered output is flushed as a chunk.
    ///
    /// Defaults to 40,000.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Gets the format rendered by this formatter.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Gets the content type of the rendered output.
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Renders `instruments` lazily, one chunk per call to [`Iterator::next`].
    pub fn chunks(&self, instruments: Vec<Instrument>) -> Chunks {
        Chunks {
            formatter: *self,
            instruments: instruments.into_iter(),
            family: None,
            buffer: String::new(),
            first: true,
            done: false,
        }
    }
}

// The remaining timeseries of the instrument being rendered.
enum Family {
    Scalar { name: String, suffix: Option<&'static str>, samples: Samples<f64> },
    Histogram { name: String, samples: Samples<HistogramSnapshot> },
    Summary { name: String, samples: Samples<SummarySnapshot> },
}

impl Family {
    /// Writes the next timeseries, returning `false` once there are none left.
    fn write_next(&mut self, buffer: &mut String) -> bool {
        match self {
            Family::Scalar { name, suffix, samples } => samples
                .next()
                .map(|sample| write_metric_line(buffer, name, *suffix, &sample.labels, None, sample.value))
                .is_some(),
            Family::Histogram { name, samples } => samples
                .next()
                .map(|sample| {
                    let labels = &sample.labels;
                    let value = &sample.value;
                    for (boundary, count) in &value.buckets {
                        let le = encode_number(*boundary);
                        write_metric_line(buffer, name, Some("bucket"), labels, Some(("le", &*le)), *count as f64);
                    }
                    let count = value.count as f64;
                    write_metric_line(buffer, name, Some("bucket"), labels, Some(("le", "+Inf")), count);
                    write_metric_line(buffer, name, Some("sum"), labels, None, value.sum);
                    write_metric_line(buffer, name, Some("count"), labels, None, count);
                })
                .is_some(),
            Family::Summary { name, samples } => samples
                .next()
                .map(|sample| {
                    let labels = &sample.labels;
                    let value = &sample.value;
                    for (percentile, estimate) in &value.percentiles {
                        let quantile = encode_number(*percentile);
                        write_metric_line(buffer, name, None, labels, Some(("quantile", &*quantile)), *estimate);
                    }
                    write_metric_line(buffer, name, Some("sum"), labels, None, value.sum);
                    write_metric_line(buffer, name, Some("count"), labels, None, value.count as f64);
                })
                .is_some(),
        }
    }
}

/// Chunks of rendered text, produced by [`Formatter::chunks`].
///
/// Timeseries are read from their instruments only as chunks are requested, and every chunk but
/// the last holds at least the batch size.  Rendering stops at the first error.
pub struct Chunks {
    formatter: Formatter,
    instruments: std::vec::IntoIter<Instrument>,
    family: Option<Family>,
    buffer: String,
    first: bool,
    done: bool,
}

impl Chunks {
    fn open(&mut self, instrument: &Instrument) -> Result<Family, ExportError> {
        let name = instrument.name().to_owned();
        let (kind, family) = match instrument {
            Instrument::Counter(counter) => {
                let suffix = self.formatter.format.counter_suffix();
                ("counter", Family::Scalar { name, suffix, samples: counter.samples() })
            }
            Instrument::Gauge(gauge) => ("gauge", Family::Scalar { name, suffix: None, samples: gauge.samples() }),
            Instrument::Histogram(histogram) => {
                ("histogram", Family::Histogram { name, samples: histogram.samples() })
            }
            Instrument::Summary(summary) => ("summary", Family::Summary { name, samples: summary.samples() }),
            other => return Err(ExportError::UnknownInstrument { name: other.name().to_owned() }),
        };

        if self.first {
            self.first = false;
        } else {
            self.buffer.push('\n');
        }
        write_help_line(&mut self.buffer, instrument.name(), instrument.description());
        write_type_line(&mut self.buffer, instrument.name(), kind);

        Ok(family)
    }

    fn take_buffer(&mut self) -> String {
        let capacity = self.formatter.batch_size.min(DEFAULT_BATCH_SIZE);
        std::mem::replace(&mut self.buffer, String::with_capacity(capacity))
    }
}

impl Iterator for Chunks {
    type Item = Result<String, ExportError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if !self.buffer.is_empty() && self.buffer.len() >= self.formatter.batch_size {
                return Some(Ok(self.take_buffer()));
            }

            if let Some(family) = self.family.as_mut() {
                if !family.write_next(&mut self.buffer) {
                    self.family = None;
                }
                continue;
            }

            match self.instruments.next() {
                Some(instrument) => match self.open(&instrument) {
                    Ok(family) => self.family = Some(family),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
                None => {
                    if self.formatter.format == Format::OpenMetrics {
                        self.buffer.push_str("# EOF\n");
                    }

                    self.done = true;
                    if self.buffer.is_empty() {
                        return None;
                    }
                    return Some(Ok(std::mem::take(&mut self.buffer)));
                }
            }
        }
    }
}

impl std::fmt::Debug for Chunks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunks")
            .field("formatter", &self.formatter)
            .field("remaining_instruments", &self.instruments.len())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use metriq::{labels, HistogramOptions, Labels, Metrics};

    use super::{Format, Formatter};

    fn metrics() -> Metrics {
        Metrics::builder().enable_internal_metrics(false).build()
    }

    fn render(formatter: Formatter, metrics: &Metrics) -> String {
        formatter.chunks(metrics.instruments()).map(|chunk| chunk.expect("formatting should not fail")).collect()
    }

    #[test]
    fn test_format_content_types() {
        assert_eq!(Format::Prometheus.content_type(), "text/plain; version=0.0.4; charset=utf-8");
        assert_eq!(
            Format::OpenMetrics.content_type(),
            "application/openmetrics-text; version=1.0.0; charset=utf-8"
        );
        assert_eq!(Formatter::openmetrics().content_type(), Format::OpenMetrics.content_type());
    }

    #[test]
    fn test_empty() {
        let metrics = metrics();
        assert_eq!(render(Formatter::prometheus(), &metrics), "");
        assert_eq!(render(Formatter::openmetrics(), &metrics), "# EOF\n");
        assert_eq!(Formatter::prometheus().chunks(Vec::new()).count(), 0);
    }

    #[test]
    fn test_instrument_without_timeseries() {
        let metrics = metrics();
        metrics.create_counter("counter", "description").unwrap();

        assert_eq!(
            render(Formatter::prometheus(), &metrics),
            "# HELP counter description\n# TYPE counter counter\n"
        );
        assert_eq!(
            render(Formatter::openmetrics(), &metrics),
            "# HELP counter description\n# TYPE counter counter\n# EOF\n"
        );
    }

    #[test]
    fn test_counter_and_gauge() {
        let metrics = metrics();
        let counter = metrics.create_counter("counter1", "description1").unwrap();
        let gauge = metrics.create_gauge("gauge1", "description2").unwrap();
        counter.add_with(&labels! { "key1" => "value1", "key2" => "value2" }, 5.0).unwrap();
        counter.add_with(&labels! { "key1" => "value3", "key2" => "value4" }, 7.0).unwrap();
        gauge.set(-1.5);

        let expected = "# HELP counter1 description1\n\
                        # TYPE counter1 counter\n\
                        counter1{key1=\"value1\",key2=\"value2\"} 5\n\
                        counter1{key1=\"value3\",key2=\"value4\"} 7\n\
                        \n\
                        # HELP gauge1 description2\n\
                        # TYPE gauge1 gauge\n\
                        gauge1 -1.5\n";
        assert_eq!(render(Formatter::prometheus(), &metrics), expected);

        let expected = "# HELP counter1 description1\n\
                        # TYPE counter1 counter\n\
                        counter1_total{key1=\"value1\",key2=\"value2\"} 5\n\
                        counter1_total{key1=\"value3\",key2=\"value4\"} 7\n\
                        \n\
                        # HELP gauge1 description2\n\
                        # TYPE gauge1 gauge\n\
                        gauge1 -1.5\n\
                        # EOF\n";
        assert_eq!(render(Formatter::openmetrics(), &metrics), expected);
    }

    #[test]
    fn test_histogram() {
        let metrics = metrics();
        let histogram = metrics
            .create_histogram_with("latency", "Request latency", HistogramOptions::with_buckets([0.5, 1.0, 2.5]))
            .unwrap();
        histogram.observe_with(&labels! { "method" => "GET" }, 0.75).unwrap();
        histogram.observe_with(&labels! { "method" => "GET" }, 3.0).unwrap();

        let expected = "# HELP latency Request latency\n\
                        # TYPE latency histogram\n\
                        latency_bucket{method=\"GET\",le=\"0.5\"} 0\n\
                        latency_bucket{method=\"GET\",le=\"1\"} 1\n\
                        latency_bucket{method=\"GET\",le=\"2.5\"} 1\n\
                        latency_bucket{method=\"GET\",le=\"+Inf\"} 2\n\
                        latency_sum{method=\"GET\"} 3.75\n\
                        latency_count{method=\"GET\"} 2\n";
        assert_eq!(render(Formatter::prometheus(), &metrics), expected);
    }

    #[test]
    fn test_summary() {
        let metrics = metrics();
        let options = metriq::DigestOptions {
            percentiles: vec![0.5, 0.9],
            tdigest: metriq::TDigestOptions::Exact,
            kind: metriq::SummaryKind::Cumulative,
        };
        let summary = metrics.create_summary_with("size", "Response size", options.into()).unwrap();
        for i in 1..=10 {
            summary.observe(i as f64);
        }

        let expected = "# HELP size Response size\n\
                        # TYPE size summary\n\
                        size{quantile=\"0.5\"} 5\n\
                        size{quantile=\"0.9\"} 9\n\
                        size_sum 55\n\
                        size_count 10\n\
                        # EOF\n";
        assert_eq!(render(Formatter::openmetrics(), &metrics), expected);
    }

    #[test]
    fn test_escaping() {
        let metrics = metrics();
        let gauge = metrics.create_gauge("path_info", "Paths like \"C:\\\"\nper host").unwrap();
        let mut labels = labels! { "path" => "C:\\Program Files\\\"x\"" };
        labels.insert_optional("host", None::<String>);
        gauge.set_with(&labels, f64::INFINITY).unwrap();
        gauge.set_with(&Labels::new(), f64::NAN).unwrap();

        let expected = "# HELP path_info Paths like \\\"C:\\\\\\\"\\nper host\n\
                        # TYPE path_info gauge\n\
                        path_info{path=\"C:\\\\Program Files\\\\\\\"x\\\"\",host=\"\"} +Inf\n\
                        path_info NaN\n";
        assert_eq!(render(Formatter::prometheus(), &metrics), expected);
    }

    #[test]
    fn test_chunks_respect_batch_size() {
        let metrics = metrics();
        let counter = metrics.create_counter("requests", "Requests").unwrap();
        for i in 0..1_000 {
            counter.increment_with(&labels! { "id" => i.to_string() }).unwrap();
        }

        let chunks = Formatter::openmetrics()
            .with_batch_size(1_000)
            .chunks(metrics.instruments())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(chunks.len() > 1);
        let (last, rest) = chunks.split_last().unwrap();
        assert!(rest.iter().all(|chunk| chunk.len() >= 1_000));
        assert!(last.ends_with("# EOF\n"));

        assert_eq!(chunks.concat(), render(Formatter::openmetrics(), &metrics));
    }
}
