use metriq::Metrics;

use crate::exporter::{PrometheusExporter, ScrapeStream};
use crate::formatter::{Format, Formatter};

const OPENMETRICS_MEDIA_TYPE: &str = "application/openmetrics-text";

/// The response to a scrape request.
#[derive(Debug)]
pub struct ScrapeResult {
    /// Value for the response's `Content-Type` header.
    pub content_type: &'static str,

    /// The response body.
    pub stream: ScrapeStream,
}

/// Serves scrape requests, choosing the exposition format from the request's `Accept` header.
///
/// Clients that accept `application/openmetrics-text` get the OpenMetrics text format; every
/// other client, including those that send no `Accept` header, gets the Prometheus text format.
#[derive(Clone, Debug)]
pub struct ScrapeHandler {
    prometheus: PrometheusExporter,
    openmetrics: PrometheusExporter,
}

impl ScrapeHandler {
    /// Creates a handler exporting `metrics`.
    pub fn new(metrics: Metrics) -> Self {
        ScrapeHandler {
            prometheus: PrometheusExporter::prometheus(metrics.clone()),
            openmetrics: PrometheusExporter::openmetrics(metrics),
        }
    }

    /// Creates a handler exporting `metrics`, flushing output in chunks of `batch_size` bytes.
    pub fn with_batch_size(metrics: Metrics, batch_size: usize) -> Self {
        let formatter = |format| Formatter::new(format).with_batch_size(batch_size);
        ScrapeHandler {
            prometheus: PrometheusExporter::new(metrics.clone(), formatter(Format::Prometheus)),
            openmetrics: PrometheusExporter::new(metrics, formatter(Format::OpenMetrics)),
        }
    }

    /// Chooses the exposition format for an `Accept` header value.
    pub fn negotiate(accept: Option<&str>) -> Format {
        match accept {
            Some(accept) if accept.to_ascii_lowercase().contains(OPENMETRICS_MEDIA_TYPE) => Format::OpenMetrics,
            _ => Format::Prometheus,
        }
    }

    /// Starts a scrape in the format negotiated from `accept`.
    pub fn scrape(&self, accept: Option<&str>) -> ScrapeResult {
        let exporter = match Self::negotiate(accept) {
            Format::Prometheus => &self.prometheus,
            Format::OpenMetrics => &self.openmetrics,
        };

        ScrapeResult { content_type: exporter.content_type(), stream: exporter.generate_stream() }
    }
}

#[cfg(test)]
mod tests {
    use super::ScrapeHandler;
    use crate::formatter::Format;

    #[test]
    fn test_negotiate() {
        let cases = &[
            (None, Format::Prometheus),
            (Some(""), Format::Prometheus),
            (Some("*/*"), Format::Prometheus),
            (Some("text/plain"), Format::Prometheus),
            (Some("text/plain; version=0.0.4"), Format::Prometheus),
            (Some("application/openmetrics-text; version=1.0.0"), Format::OpenMetrics),
            (Some("Application/OpenMetrics-Text"), Format::OpenMetrics),
            (
                Some("application/openmetrics-text;version=1.0.0;q=0.75,text/plain;version=0.0.4;q=0.5,*/*;q=0.1"),
                Format::OpenMetrics,
            ),
        ];

        for (accept, expected) in cases {
            assert_eq!(ScrapeHandler::negotiate(*accept), *expected, "accept: {:?}", accept);
        }
    }
}
