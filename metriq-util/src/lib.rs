//! Quantile digests used by metriq summaries.
//!
//! The building block is [`TDigest`], a T-Digest sketch that can either approximate a
//! distribution with bounded memory or keep it exactly.  [`Digest`] layers aggregation on top of
//! it: [`CumulativeDigest`] tracks every observation, while [`SlidingWindowDigest`] only reflects a
//! recent window of time.
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod options;
pub use options::{
    ApproximateOptions, DigestConfig, DigestOptions, OptionsError, SummaryKind, TDigestOptions,
    WindowConfig, WindowOptions, DEFAULT_COMPRESS_EVERY, DEFAULT_CX, DEFAULT_DELTA, DEFAULT_K,
    DEFAULT_PERCENTILES, DEFAULT_WINDOW_DURATION_SECONDS, DEFAULT_WINDOW_STEPS,
};

mod tdigest;
pub use tdigest::TDigest;

mod digest;
pub use digest::{CumulativeDigest, Digest};

mod window;
pub use window::SlidingWindowDigest;
