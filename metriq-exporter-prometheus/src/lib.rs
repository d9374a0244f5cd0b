//! Exports `metriq` instruments in the Prometheus and OpenMetrics text formats.
//!
//! A [`Formatter`] renders instruments as text, a [`PrometheusExporter`] turns a
//! [`Metrics`](metriq::Metrics) root into a stream of rendered chunks while recording scrape
//! statistics, and a [`ScrapeHandler`] picks the format for a request from its `Accept` header.
//!
//! ```
//! use futures_util::stream::TryStreamExt;
//! use metriq::{labels, Metrics};
//! use metriq_exporter_prometheus::ScrapeHandler;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Metrics::builder().enable_internal_metrics(false).build();
//! let requests = metrics.create_counter("http_requests_total", "Total HTTP requests")?;
//! requests.add_with(&labels! { "method" => "GET" }, 5.0)?;
//!
//! let handler = ScrapeHandler::new(metrics);
//! let response = handler.scrape(Some("text/plain"));
//! assert_eq!(response.content_type, "text/plain; version=0.0.4; charset=utf-8");
//!
//! let body = response.stream.map_ok(|chunk| chunk.to_vec()).try_concat().await?;
//! assert!(body.ends_with(b"http_requests_total{method=\"GET\"} 5\n"));
//! # Ok(())
//! # }
//! ```
//!
//! Output is produced lazily: a scrape reads timeseries only as the consumer pulls chunks, and
//! each chunk is flushed once it reaches the formatter's batch size, so memory use stays bounded
//! for instruments with any number of timeseries.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod error;
pub use self::error::ExportError;

pub mod formatting;

mod formatter;
pub use self::formatter::{
    Chunks, Format, Formatter, DEFAULT_BATCH_SIZE, OPENMETRICS_CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE,
};

mod exporter;
pub use self::exporter::{PrometheusExporter, ScrapeStream};

mod scrape;
pub use self::scrape::{ScrapeHandler, ScrapeResult};
