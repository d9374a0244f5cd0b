use quanta::Clock;

use crate::options::{DigestConfig, TDigestOptions};
use crate::tdigest::TDigest;
use crate::window::SlidingWindowDigest;

/// A digest over every observation since creation or the last reset.
#[derive(Clone, Debug)]
pub struct CumulativeDigest {
    options: TDigestOptions,
    tdigest: TDigest,
}

impl CumulativeDigest {
    /// Creates a new, empty [`CumulativeDigest`].
    pub fn new(options: TDigestOptions) -> CumulativeDigest {
        CumulativeDigest { options, tdigest: TDigest::from_options(&options) }
    }

    /// Records a value.
    pub fn observe(&mut self, value: f64) {
        self.tdigest.push(value);
    }

    /// Recompresses the underlying T-Digest.
    pub fn compress(&mut self) {
        self.tdigest.compress();
    }

    /// Estimates the value at quantile `q`, or `None` if nothing was observed.
    pub fn percentile(&mut self, q: f64) -> Option<f64> {
        self.tdigest.percentile(q)
    }

    /// Replaces the underlying T-Digest with an empty one.
    pub fn reset(&mut self) {
        self.tdigest = TDigest::from_options(&self.options);
    }
}

/// A quantile digest, either cumulative or aging out observations over a sliding window.
#[derive(Clone, Debug)]
pub enum Digest {
    /// Every observation contributes.
    Cumulative(CumulativeDigest),

    /// Only recent observations contribute.
    SlidingWindow(SlidingWindowDigest),
}

impl Digest {
    /// Creates an empty digest for the given configuration.
    ///
    /// Windowed digests read the time from `clock`.
    pub fn new(config: &DigestConfig, clock: &Clock) -> Digest {
        match config.window() {
            None => Digest::Cumulative(CumulativeDigest::new(config.tdigest())),
            Some(window) => Digest::SlidingWindow(SlidingWindowDigest::new(
                window,
                config.tdigest(),
                clock.clone(),
            )),
        }
    }

    /// Records a value.
    pub fn observe(&mut self, value: f64) {
        match self {
            Digest::Cumulative(d) => d.observe(value),
            Digest::SlidingWindow(d) => d.observe(value),
        }
    }

    /// Recompresses every underlying T-Digest.
    pub fn compress(&mut self) {
        match self {
            Digest::Cumulative(d) => d.compress(),
            Digest::SlidingWindow(d) => d.compress(),
        }
    }

    /// Estimates the value at quantile `q`, or `None` if the relevant digest is empty.
    pub fn percentile(&mut self, q: f64) -> Option<f64> {
        match self {
            Digest::Cumulative(d) => d.percentile(q),
            Digest::SlidingWindow(d) => d.percentile(q),
        }
    }

    /// Discards every observation.
    pub fn reset(&mut self) {
        match self {
            Digest::Cumulative(d) => d.reset(),
            Digest::SlidingWindow(d) => d.reset(),
        }
    }
}
