use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{Stream, StreamExt};
use metriq::{InternalMetrics, Metrics};
use quanta::{Clock, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::formatter::{Chunks, Format, Formatter};
use crate::ExportError;

/// Exports the instruments of a [`Metrics`] root in a text exposition format.
///
/// Each scrape is a fresh [`ScrapeStream`]; streams are not reusable.  When a stream runs to its
/// end, the number of bytes it produced and the time it took are reported to the root's
/// internal metrics.
#[derive(Clone, Debug)]
pub struct PrometheusExporter {
    metrics: Metrics,
    formatter: Formatter,
}

impl PrometheusExporter {
    /// Creates an exporter rendering `metrics` with the given formatter.
    pub fn new(metrics: Metrics, formatter: Formatter) -> Self {
        PrometheusExporter { metrics, formatter }
    }

    /// Creates an exporter for the Prometheus text format.
    pub fn prometheus(metrics: Metrics) -> Self {
        PrometheusExporter::new(metrics, Formatter::prometheus())
    }

    /// Creates an exporter for the OpenMetrics text format.
    pub fn openmetrics(metrics: Metrics) -> Self {
        PrometheusExporter::new(metrics, Formatter::openmetrics())
    }

    /// Gets the format rendered by this exporter.
    pub fn format(&self) -> Format {
        self.formatter.format()
    }

    /// Gets the content type of the rendered output.
    pub fn content_type(&self) -> &'static str {
        self.formatter.content_type()
    }

    /// Starts a scrape.
    ///
    /// Nothing happens until the stream is polled: collect callbacks run on the first poll, and
    /// timeseries are then read as chunks are requested.  Dropping the stream abandons the
    /// scrape without reporting it.
    pub fn generate_stream(&self) -> ScrapeStream {
        let metrics = self.metrics.clone();
        let collect = async move { metrics.collect().await }.boxed();

        ScrapeStream {
            state: State::Collecting(collect),
            formatter: self.formatter,
            observer: self.metrics.internal_metrics(),
            clock: self.metrics.clock().clone(),
            started: self.metrics.clock().now(),
            bytes: 0,
        }
    }

    /// Scrapes into `writer`, flushing it once the scrape completes.
    ///
    /// # Errors
    ///
    /// Fails if formatting fails or if writing to `writer` fails.  Output written before the
    /// failure is left in place.
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<(), ExportError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stream = self.generate_stream();
        while let Some(chunk) = stream.next().await {
            writer.write_all(&chunk?).await?;
        }

        writer.flush().await?;
        Ok(())
    }

    /// Scrapes into a string.
    ///
    /// # Errors
    ///
    /// Fails if formatting fails.
    pub async fn render(&self) -> Result<String, ExportError> {
        let mut output = String::new();
        let mut stream = self.generate_stream();
        while let Some(chunk) = stream.next().await {
            output.push_str(&String::from_utf8_lossy(&chunk?));
        }

        Ok(output)
    }
}

enum State {
    Collecting(BoxFuture<'static, Vec<metriq::Instrument>>),
    Streaming(Chunks),
    Done,
}

/// The output of a single scrape, as a stream of chunks.
///
/// Produced by [`PrometheusExporter::generate_stream`].
pub struct ScrapeStream {
    state: State,
    formatter: Formatter,
    observer: Arc<dyn InternalMetrics>,
    clock: Clock,
    started: Instant,
    bytes: u64,
}

impl ScrapeStream {
    /// Gets the content type of the streamed output.
    pub fn content_type(&self) -> &'static str {
        self.formatter.content_type()
    }
}

impl Stream for ScrapeStream {
    type Item = Result<Bytes, ExportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                State::Collecting(collect) => {
                    let instruments = ready!(collect.poll_unpin(cx));
                    this.state = State::Streaming(this.formatter.chunks(instruments));
                }
                State::Streaming(chunks) => match chunks.next() {
                    Some(Ok(chunk)) => {
                        this.bytes += chunk.len() as u64;
                        return Poll::Ready(Some(Ok(Bytes::from(chunk))));
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, bytes = this.bytes, "scrape failed");
                        this.state = State::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                    None => {
                        let duration = this.clock.now().duration_since(this.started);
                        debug!(
                            bytes = this.bytes,
                            ?duration,
                            content_type = this.formatter.content_type(),
                            "scrape completed"
                        );

                        this.observer.on_scrape(this.bytes, duration);
                        this.state = State::Done;
                        return Poll::Ready(None);
                    }
                },
                State::Done => return Poll::Ready(None),
            }
        }
    }
}

impl std::fmt::Debug for ScrapeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Collecting(_) => "collecting",
            State::Streaming(_) => "streaming",
            State::Done => "done",
        };

        f.debug_struct("ScrapeStream")
            .field("state", &state)
            .field("formatter", &self.formatter)
            .field("bytes", &self.bytes)
            .finish()
    }
}
