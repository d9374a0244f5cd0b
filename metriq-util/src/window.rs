use std::time::Duration;

use quanta::{Clock, Instant};

use crate::digest::CumulativeDigest;
use crate::options::{TDigestOptions, WindowConfig};

/// A quantile digest over a sliding window of time.
///
/// The window is split into a ring of `steps` slots, each holding a [`CumulativeDigest`].  Every
/// observation is recorded into all slots, and queries read the current slot.  Each time a rotation
/// interval elapses, the current slot is replaced by an empty digest and the ring advances, so the
/// slot that becomes current has been accumulating for roughly one window duration.
///
/// Rotation is lazy: elapsed time is only checked on observe and on query, and any number of
/// missed intervals are caught up in one go.
#[derive(Clone, Debug)]
pub struct SlidingWindowDigest {
    clock: Clock,
    tdigest_options: TDigestOptions,
    ring: Vec<CumulativeDigest>,
    rotation_interval: Option<Duration>,
    current_step: usize,
    current_step_started: Instant,
}

impl SlidingWindowDigest {
    /// Creates a new [`SlidingWindowDigest`].
    pub fn new(window: WindowConfig, tdigest_options: TDigestOptions, clock: Clock) -> Self {
        let ring = (0..window.steps()).map(|_| CumulativeDigest::new(tdigest_options)).collect();
        let current_step_started = clock.now();

        SlidingWindowDigest {
            clock,
            tdigest_options,
            ring,
            rotation_interval: window.rotation_interval(),
            current_step: 0,
            current_step_started,
        }
    }

    /// Records a value into every slot.
    pub fn observe(&mut self, value: f64) {
        self.rotate();
        for digest in self.ring.iter_mut() {
            digest.observe(value);
        }
    }

    /// Recompresses every slot.
    pub fn compress(&mut self) {
        for digest in self.ring.iter_mut() {
            digest.compress();
        }
    }

    /// Estimates the value at quantile `q` from the current slot.
    ///
    /// Returns `None` if nothing was observed during the current slot's lifetime.
    pub fn percentile(&mut self, q: f64) -> Option<f64> {
        self.rotate();
        self.ring[self.current_step].percentile(q)
    }

    /// Empties every slot and restarts the ring at the current time.
    pub fn reset(&mut self) {
        for digest in self.ring.iter_mut() {
            digest.reset();
        }

        self.current_step = 0;
        self.current_step_started = self.clock.now();
    }

    fn rotate(&mut self) {
        let Some(interval) = self.rotation_interval else {
            return;
        };

        let elapsed = self.clock.now().duration_since(self.current_step_started);
        let interval_nanos = interval.as_nanos().max(1);
        let steps = (elapsed.as_nanos() / interval_nanos).min(self.ring.len() as u128) as usize;
        if steps == 0 {
            return;
        }

        // Only whole intervals are consumed, so the remainder carries over to the next slot.
        self.current_step_started = self.current_step_started + interval * steps as u32;

        for _ in 0..steps {
            self.ring[self.current_step] = CumulativeDigest::new(self.tdigest_options);
            self.current_step = (self.current_step + 1) % self.ring.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quanta::Clock;

    use super::SlidingWindowDigest;
    use crate::options::{DigestOptions, SummaryKind, TDigestOptions, WindowOptions};

    fn window(seconds: f64, steps: usize) -> (SlidingWindowDigest, std::sync::Arc<quanta::Mock>) {
        let options = DigestOptions {
            tdigest: TDigestOptions::Exact,
            kind: SummaryKind::Windowed(WindowOptions {
                window_duration_seconds: seconds,
                window_steps: steps,
            }),
            ..Default::default()
        };
        let config = options.validate().expect("options should be valid");
        let window = config.window().expect("window should be present");

        let (clock, mock) = Clock::mock();
        (SlidingWindowDigest::new(window, config.tdigest(), clock), mock)
    }

    #[test]
    fn test_infinite_window_never_rotates() {
        let (mut digest, mock) = window(f64::INFINITY, 3);
        digest.observe(1.0);

        mock.increment(Duration::from_secs(86_400 * 365));
        assert_eq!(digest.percentile(0.5), Some(1.0));
    }

    #[test]
    fn test_observations_age_out() {
        let (mut digest, mock) = window(60.0, 3);
        digest.observe(10.0);
        assert_eq!(digest.percentile(0.5), Some(10.0));

        // One rotation: the slot that becomes current saw the observation.
        mock.increment(Duration::from_secs(20));
        digest.observe(20.0);
        assert_eq!(digest.percentile(0.0), Some(10.0));
        assert_eq!(digest.percentile(1.0), Some(20.0));

        // Two more rotations: the first observation has left the window.
        mock.increment(Duration::from_secs(40));
        assert_eq!(digest.percentile(0.0), Some(20.0));
        assert_eq!(digest.percentile(1.0), Some(20.0));

        // A full window later, everything is gone.
        mock.increment(Duration::from_secs(60));
        assert_eq!(digest.percentile(0.5), None);
    }

    #[test]
    fn test_rotation_keeps_partial_interval() {
        let (mut digest, mock) = window(10.0, 2);
        digest.observe(1.0);

        // 7s elapsed: one rotation of 5s, with 2s carried into the new slot.
        mock.increment(Duration::from_secs(7));
        assert_eq!(digest.percentile(0.5), Some(1.0));

        // 3 more seconds reach the next 5s boundary and rotate again.
        mock.increment(Duration::from_secs(3));
        assert_eq!(digest.percentile(0.5), None);
    }

    #[test]
    fn test_reset() {
        let (mut digest, mock) = window(60.0, 2);
        digest.observe(5.0);
        mock.increment(Duration::from_secs(45));

        digest.reset();
        assert_eq!(digest.percentile(0.5), None);

        // The ring restarted at reset time, so no rotation is due yet.
        digest.observe(6.0);
        mock.increment(Duration::from_secs(29));
        assert_eq!(digest.percentile(0.5), Some(6.0));
    }
}
