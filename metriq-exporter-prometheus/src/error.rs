use thiserror::Error;

/// Errors that could occur while exporting metrics.
#[derive(Debug, Error)]
pub enum ExportError {
    /// An instrument kind this exporter cannot render was collected.
    ///
    /// This means the exporter is older than the `metriq` it is paired with.
    #[error("unknown instrument type for '{name}'")]
    UnknownInstrument {
        /// Name of the instrument.
        name: String,
    },

    /// Writing the rendered output failed.
    #[error("failed to write metrics: {0}")]
    Io(#[from] std::io::Error),
}
