//! Digest configuration.
//!
//! Options are plain, defaulted structs that callers fill in and hand to
//! [`DigestOptions::validate`], which checks every field once and produces a [`DigestConfig`].
//! Only a validated [`DigestConfig`] can be used to build digests, so misconfiguration is always
//! reported when a summary is created and never when a value is observed.
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Percentiles tracked by a summary when none are configured.
pub const DEFAULT_PERCENTILES: [f64; 7] = [0.01, 0.05, 0.5, 0.9, 0.95, 0.99, 0.999];

/// Default T-Digest compression factor.
pub const DEFAULT_DELTA: f64 = 0.01;

/// Default T-Digest recompression threshold.
pub const DEFAULT_K: usize = 25;

/// Default T-Digest cumulative cache refresh factor.
pub const DEFAULT_CX: f64 = 1.1;

/// Default number of observations between periodic recompressions.
pub const DEFAULT_COMPRESS_EVERY: u64 = 1000;

/// Default sliding window duration, in seconds. Infinite, meaning the window never rotates.
pub const DEFAULT_WINDOW_DURATION_SECONDS: f64 = f64::INFINITY;

/// Default number of ring buffer slots in a sliding window.
pub const DEFAULT_WINDOW_STEPS: usize = 1;

/// Errors that can occur while validating digest options.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum OptionsError {
    /// No percentiles were given.
    #[error("percentiles must be a non-empty list of numbers")]
    EmptyPercentiles,

    /// A percentile was outside of `[0, 1]`.
    #[error("percentiles must be numbers between 0 and 1, got {0}")]
    PercentileOutOfRange(f64),

    /// The T-Digest compression factor was outside of `(0, 1]`.
    #[error("TDigest delta must be a number between 0 and 1, got {0}")]
    Delta(f64),

    /// The T-Digest cache refresh factor was not positive.
    #[error("TDigest CX must be a positive number, got {0}")]
    Cx(f64),

    /// The periodic recompression cadence was zero.
    #[error("TDigest compressEvery must be a positive integer")]
    CompressEvery,

    /// The sliding window duration was not positive.
    #[error("window duration must be a positive number of seconds, got {0}")]
    WindowDuration(f64),

    /// The sliding window had no slots.
    #[error("window steps must be a positive integer")]
    WindowSteps,
}

/// Tuning for the approximate T-Digest mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApproximateOptions {
    /// Compression factor in `(0, 1]`.
    ///
    /// Higher values mean fewer centroids and less memory, at the cost of accuracy.
    pub delta: f64,

    /// Centroid count threshold, scaled by `1 / delta`, that triggers recompression as the digest
    /// grows. Zero disables automatic recompression.
    pub k: usize,

    /// Controls how often cached cumulative totals are refreshed while ingesting.
    ///
    /// Totals are refreshed once the observation count has grown by this factor.
    pub cx: f64,

    /// Number of observations after which a summary compresses its digest.
    pub compress_every: u64,
}

impl Default for ApproximateOptions {
    fn default() -> Self {
        ApproximateOptions {
            delta: DEFAULT_DELTA,
            k: DEFAULT_K,
            cx: DEFAULT_CX,
            compress_every: DEFAULT_COMPRESS_EVERY,
        }
    }
}

/// How a T-Digest stores observations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TDigestOptions {
    /// Merge nearby observations into centroids, bounding memory.
    Approximate(ApproximateOptions),

    /// Keep every distinct value, giving exact nearest-rank percentiles with unbounded memory.
    Exact,
}

impl Default for TDigestOptions {
    fn default() -> Self {
        TDigestOptions::Approximate(ApproximateOptions::default())
    }
}

impl TDigestOptions {
    /// Gets the periodic recompression cadence, if this is the approximate mode.
    pub fn compress_every(&self) -> Option<u64> {
        match self {
            TDigestOptions::Approximate(options) => Some(options.compress_every),
            TDigestOptions::Exact => None,
        }
    }

    fn validate(&self) -> Result<(), OptionsError> {
        let TDigestOptions::Approximate(options) = self else {
            return Ok(());
        };

        if !(options.delta > 0.0 && options.delta <= 1.0) {
            return Err(OptionsError::Delta(options.delta));
        }

        if !(options.cx > 0.0) {
            return Err(OptionsError::Cx(options.cx));
        }

        if options.compress_every == 0 {
            return Err(OptionsError::CompressEvery);
        }

        Ok(())
    }
}

/// Sliding window settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowOptions {
    /// Length of the window in seconds. `f64::INFINITY` disables rotation.
    pub window_duration_seconds: f64,

    /// Number of ring buffer slots the window is divided into.
    pub window_steps: usize,
}

impl Default for WindowOptions {
    fn default() -> Self {
        WindowOptions {
            window_duration_seconds: DEFAULT_WINDOW_DURATION_SECONDS,
            window_steps: DEFAULT_WINDOW_STEPS,
        }
    }
}

/// Whether a summary ages out old observations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SummaryKind {
    /// Only observations from a recent sliding window contribute to quantiles.
    Windowed(WindowOptions),

    /// Every observation over the lifetime of the timeseries contributes to quantiles.
    Cumulative,
}

impl Default for SummaryKind {
    fn default() -> Self {
        SummaryKind::Windowed(WindowOptions::default())
    }
}

/// Unvalidated options for a quantile digest.
#[derive(Clone, Debug, PartialEq)]
pub struct DigestOptions {
    /// Percentiles to report, each in `[0, 1]`.
    pub percentiles: Vec<f64>,

    /// T-Digest storage mode.
    pub tdigest: TDigestOptions,

    /// Cumulative or windowed aggregation.
    pub kind: SummaryKind,
}

impl Default for DigestOptions {
    fn default() -> Self {
        DigestOptions {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            tdigest: TDigestOptions::default(),
            kind: SummaryKind::default(),
        }
    }
}

impl DigestOptions {
    /// Validates these options, producing a [`DigestConfig`].
    pub fn validate(&self) -> Result<DigestConfig, OptionsError> {
        if self.percentiles.is_empty() {
            return Err(OptionsError::EmptyPercentiles);
        }

        if let Some(p) = self.percentiles.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(OptionsError::PercentileOutOfRange(*p));
        }

        self.tdigest.validate()?;

        let window = match self.kind {
            SummaryKind::Cumulative => None,
            SummaryKind::Windowed(window) => Some(WindowConfig::new(window)?),
        };

        Ok(DigestConfig {
            percentiles: self.percentiles.iter().copied().collect(),
            tdigest: self.tdigest,
            window,
        })
    }
}

/// Validated sliding window settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowConfig {
    steps: usize,
    rotation_interval: Option<Duration>,
}

impl WindowConfig {
    fn new(options: WindowOptions) -> Result<WindowConfig, OptionsError> {
        let seconds = options.window_duration_seconds;
        if !(seconds > 0.0) {
            return Err(OptionsError::WindowDuration(seconds));
        }

        if options.window_steps == 0 {
            return Err(OptionsError::WindowSteps);
        }

        let rotation_interval = if seconds.is_finite() {
            let interval = seconds / options.window_steps as f64;
            Some(Duration::try_from_secs_f64(interval).map_err(|_| OptionsError::WindowDuration(seconds))?)
        } else {
            None
        };

        Ok(WindowConfig { steps: options.window_steps, rotation_interval })
    }

    /// Number of ring buffer slots.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Time each slot stays current before the ring advances, or `None` if it never does.
    pub fn rotation_interval(&self) -> Option<Duration> {
        self.rotation_interval
    }
}

/// Validated digest configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct DigestConfig {
    percentiles: Arc<[f64]>,
    tdigest: TDigestOptions,
    window: Option<WindowConfig>,
}

impl DigestConfig {
    /// Percentiles to report.
    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }

    /// T-Digest storage mode.
    pub fn tdigest(&self) -> TDigestOptions {
        self.tdigest
    }

    /// Sliding window settings, or `None` for cumulative digests.
    pub fn window(&self) -> Option<WindowConfig> {
        self.window
    }
}
