use metriq_util::OptionsError;
use thiserror::Error as ThisError;

/// Errors that can occur while creating or writing to instruments.
///
/// All of these indicate a programming or configuration mistake: none are transient, and none are
/// retried internally.
#[derive(Clone, Debug, ThisError, PartialEq)]
pub enum Error {
    /// A label set used the reserved `__name__` key.
    #[error("label __name__ is reserved")]
    ReservedLabel,

    /// An instrument with the same fully-qualified name already exists.
    #[error("instrument with name \"{0}\" already exists")]
    DuplicateName(String),

    /// Histogram buckets were empty, not positive, or not ascending.
    #[error("invalid histogram buckets: {0}")]
    InvalidBuckets(&'static str),

    /// Summary options failed validation.
    #[error("invalid summary options: {0}")]
    InvalidSummary(#[from] OptionsError),
}
