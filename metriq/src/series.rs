//! Label-keyed timeseries storage shared by every instrument kind.
use std::sync::Arc;
use std::time::Duration;

use indexmap::{map::Entry as MapEntry, IndexMap};
use parking_lot::Mutex;
use quanta::{Clock, Instant};
use tracing::trace;

use crate::internal::InternalMetrics;
use crate::labels::Labels;
use crate::Error;

/// A single timeseries observed during a scrape.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample<T> {
    /// Labels of the timeseries, including common labels.
    pub labels: Arc<Labels>,

    /// Snapshot of the timeseries value.
    pub value: T,
}

/// Iterator over the live timeseries of one instrument.
///
/// Samples are read one at a time, so writers are never blocked for the duration of a scrape and
/// may be observed partially.  Expired timeseries are skipped, and evicted in a single sweep once
/// the iterator is exhausted.
pub struct Samples<T> {
    inner: Box<dyn Iterator<Item = Sample<T>> + Send>,
}

impl<T> Iterator for Samples<T> {
    type Item = Sample<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl<T> std::fmt::Debug for Samples<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Samples").finish_non_exhaustive()
    }
}

struct Entry<V> {
    labels: Arc<Labels>,
    value: V,
    expire_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Option<Instant>) -> bool {
        matches!((self.expire_at, now), (Some(expire_at), Some(now)) if expire_at < now)
    }
}

#[derive(Default)]
struct Cursor {
    position: usize,
    skipped_expired: bool,
}

pub(crate) struct SeriesSettings {
    pub name: String,
    pub description: String,
    pub ttl: Option<Duration>,
    pub common_labels: Labels,
    pub components: usize,
    pub clock: Clock,
    pub observer: Arc<dyn InternalMetrics>,
}

pub(crate) struct Series<V> {
    settings: SeriesSettings,
    values: Mutex<IndexMap<String, Entry<V>>>,
}

impl<V> Series<V> {
    pub fn new(settings: SeriesSettings) -> Self {
        Series { settings, values: Mutex::new(IndexMap::new()) }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn description(&self) -> &str {
        &self.settings.description
    }

    pub fn clock(&self) -> &Clock {
        &self.settings.clock
    }

    // Current time, only read when expiry is in play.
    fn now(&self) -> Option<Instant> {
        self.settings.ttl.map(|_| self.settings.clock.now())
    }

    pub fn update(
        &self,
        labels: &Labels,
        init: impl FnOnce() -> V,
        apply: impl FnOnce(&mut V),
    ) -> Result<(), Error> {
        labels.validate()?;
        self.update_validated(labels, init, apply);
        Ok(())
    }

    /// Applies an update to the timeseries for `labels`, creating it with `init` if it does not
    /// exist or has expired.
    pub fn update_validated(&self, labels: &Labels, init: impl FnOnce() -> V, apply: impl FnOnce(&mut V)) {
        let key = labels.key();
        let now = self.now();

        let (evicted, created) = {
            let mut values = self.values.lock();

            let evicted = values.get(&key).map_or(false, |entry| entry.is_expired(now));
            if evicted {
                values.swap_remove(&key);
            }

            let (entry, created) = match values.entry(key) {
                MapEntry::Occupied(o) => (o.into_mut(), false),
                MapEntry::Vacant(v) => {
                    let labels = Arc::new(labels.merged_over(&self.settings.common_labels));
                    (v.insert(Entry { labels, value: init(), expire_at: None }), true)
                }
            };

            apply(&mut entry.value);
            if let (Some(ttl), Some(now)) = (self.settings.ttl, now) {
                // A TTL too large to represent never expires.
                entry.expire_at = now.checked_add(ttl);
            }

            (evicted, created)
        };

        if evicted {
            self.notify_removed(1);
        }
        if created {
            self.settings.observer.on_timeseries_added(self.name(), self.settings.components);
        }
    }

    /// Reads the timeseries for `labels`, or `None` if it does not exist or has expired.
    pub fn read<R>(&self, labels: &Labels, read: impl FnOnce(&mut V) -> R) -> Option<R> {
        let key = labels.key();
        let now = self.now();

        let (evicted, result) = {
            let mut values = self.values.lock();
            if values.get(&key).map_or(false, |entry| entry.is_expired(now)) {
                values.swap_remove(&key);
                (true, None)
            } else {
                (false, values.get_mut(&key).map(|entry| read(&mut entry.value)))
            }
        };

        if evicted {
            self.notify_removed(1);
        }
        result
    }

    pub fn remove(&self, labels: &Labels) {
        let removed = self.values.lock().swap_remove(&labels.key()).is_some();
        if removed {
            self.notify_removed(1);
        }
    }

    pub fn clear(&self) {
        let removed = {
            let mut values = self.values.lock();
            let removed = values.len();
            values.clear();
            removed
        };

        self.notify_removed(removed);
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn clear_expired(&self) {
        let Some(now) = self.now() else {
            return;
        };

        let removed = {
            let mut values = self.values.lock();
            let before = values.len();
            values.retain(|_, entry| !entry.is_expired(Some(now)));
            before - values.len()
        };

        if removed > 0 {
            trace!(instrument = self.name(), removed, "evicted expired timeseries");
            self.notify_removed(removed);
        }
    }

    // Reads the live timeseries at the cursor or after it, advancing the cursor past it.  Expired
    // entries are left in place so positions stay stable for the rest of the scan.
    fn sample_at<R>(&self, cursor: &mut Cursor, read: impl FnOnce(&mut V) -> R) -> Option<Sample<R>> {
        let now = self.now();

        let mut values = self.values.lock();
        while let Some((_, entry)) = values.get_index_mut(cursor.position) {
            cursor.position += 1;
            if entry.is_expired(now) {
                cursor.skipped_expired = true;
                continue;
            }

            return Some(Sample { labels: Arc::clone(&entry.labels), value: read(&mut entry.value) });
        }
        drop(values);

        if std::mem::take(&mut cursor.skipped_expired) {
            self.clear_expired();
        }
        None
    }

    fn notify_removed(&self, count: usize) {
        if count > 0 {
            self.settings.observer.on_timeseries_removed(self.name(), count, self.settings.components);
        }
    }
}

impl<V: Send + 'static> Series<V> {
    /// Iterates over the live timeseries, snapshotting each value with `read`.
    pub fn samples<R, F>(self: &Arc<Self>, mut read: F) -> Samples<R>
    where
        F: FnMut(&mut V) -> R + Send + 'static,
        R: 'static,
    {
        let series = Arc::clone(self);
        let mut cursor = Cursor::default();
        let inner = std::iter::from_fn(move || series.sample_at(&mut cursor, &mut read));

        Samples { inner: Box::new(inner) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use quanta::Clock;

    use super::{Series, SeriesSettings};
    use crate::internal::InternalMetrics;
    use crate::{labels, Error, Labels};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl InternalMetrics for Recorder {
        fn on_instrument_added(&self) {}

        fn on_timeseries_added(&self, instrument: &str, components: usize) {
            self.0.lock().push(format!("added {} {}", instrument, components));
        }

        fn on_timeseries_removed(&self, instrument: &str, count: usize, components: usize) {
            self.0.lock().push(format!("removed {} {} {}", instrument, count, components));
        }

        fn on_scrape(&self, _bytes: u64, _duration: Duration) {}
    }

    fn series(ttl: Option<Duration>) -> (Arc<Series<f64>>, Arc<Recorder>, Arc<quanta::Mock>) {
        let (clock, mock) = Clock::mock();
        let recorder = Arc::new(Recorder::default());
        let series = Series::new(SeriesSettings {
            name: "requests".to_owned(),
            description: "Requests".to_owned(),
            ttl,
            common_labels: labels! { "service" => "api" },
            components: 1,
            clock,
            observer: recorder.clone(),
        });
        (Arc::new(series), recorder, mock)
    }

    fn add(series: &Series<f64>, labels: &Labels, delta: f64) {
        series.update(labels, || 0.0, |v| *v += delta).expect("labels should be valid");
    }

    #[test]
    fn test_update_and_read() {
        let (series, recorder, _mock) = series(None);
        add(&series, &labels! { "a" => "1", "b" => "2" }, 2.0);
        add(&series, &labels! { "b" => "2", "a" => "1" }, 3.0);

        assert_eq!(series.len(), 1);
        assert_eq!(series.read(&labels! { "a" => "1", "b" => "2" }, |v| *v), Some(5.0));
        assert_eq!(series.read(&labels! { "a" => "1" }, |v| *v), None);
        assert_eq!(*recorder.0.lock(), vec!["added requests 1".to_owned()]);
    }

    #[test]
    fn test_reserved_label_is_rejected() {
        let (series, recorder, _mock) = series(None);
        let result = series.update(&labels! { "__name__" => "x" }, || 0.0, |v| *v += 1.0);

        assert_eq!(result, Err(Error::ReservedLabel));
        assert_eq!(series.len(), 0);
        assert!(recorder.0.lock().is_empty());
    }

    #[test]
    fn test_common_labels_are_merged_once() {
        let (series, _recorder, _mock) = series(None);
        add(&series, &labels! { "method" => "GET" }, 1.0);

        let samples = series.samples(|v| *v).collect::<Vec<_>>();
        assert_eq!(samples.len(), 1);
        assert_eq!(*samples[0].labels, labels! { "service" => "api", "method" => "GET" });
    }

    #[test]
    fn test_remove_and_clear() {
        let (series, recorder, _mock) = series(None);
        for i in 0..5 {
            add(&series, &labels! { "i" => i.to_string() }, 1.0);
        }
        assert_eq!(series.samples(|v| *v).count(), 5);

        series.remove(&labels! { "i" => "2" });
        series.remove(&labels! { "i" => "missing" });
        assert_eq!(series.samples(|v| *v).count(), 4);

        series.clear();
        assert_eq!(series.samples(|v| *v).count(), 0);

        let events = recorder.0.lock();
        assert_eq!(events[5], "removed requests 1 1");
        assert_eq!(events[6], "removed requests 4 1");
        assert_eq!(events.len(), 7);
    }

    #[test]
    fn test_samples_preserve_insertion_order() {
        let (series, _recorder, _mock) = series(None);
        for name in ["c", "a", "b"] {
            add(&series, &labels! { "name" => name }, 1.0);
        }

        let names = series
            .samples(|v| *v)
            .map(|s| s.labels.get("name").map(ToOwned::to_owned))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![Some("c".to_owned()), Some("a".to_owned()), Some("b".to_owned())]);
    }

    #[test]
    fn test_ttl_expiry() {
        let (series, recorder, mock) = series(Some(Duration::from_millis(1000)));
        let labels = labels! { "a" => "1" };
        add(&series, &labels, 5.0);

        mock.increment(Duration::from_millis(999));
        assert_eq!(series.read(&labels, |v| *v), Some(5.0));

        mock.increment(Duration::from_millis(2));
        assert_eq!(series.read(&labels, |v| *v), None);
        assert_eq!(series.len(), 0);

        // The next write starts from scratch.
        add(&series, &labels, 1.0);
        assert_eq!(series.read(&labels, |v| *v), Some(1.0));

        let events = recorder.0.lock();
        assert_eq!(
            *events,
            vec![
                "added requests 1".to_owned(),
                "removed requests 1 1".to_owned(),
                "added requests 1".to_owned(),
            ]
        );
    }

    #[test]
    fn test_writes_refresh_ttl() {
        let (series, _recorder, mock) = series(Some(Duration::from_secs(10)));
        let labels = labels! { "a" => "1" };

        for _ in 0..5 {
            add(&series, &labels, 1.0);
            mock.increment(Duration::from_secs(6));
        }

        assert_eq!(series.read(&labels, |v| *v), Some(5.0));
    }

    #[test]
    fn test_expired_write_restarts_value() {
        let (series, _recorder, mock) = series(Some(Duration::from_secs(1)));
        let labels = labels! { "a" => "1" };
        add(&series, &labels, 5.0);

        mock.increment(Duration::from_millis(1001));
        add(&series, &labels, 1.0);
        assert_eq!(series.read(&labels, |v| *v), Some(1.0));
    }

    #[test]
    fn test_samples_skip_expired() {
        let (series, recorder, mock) = series(Some(Duration::from_secs(1)));
        add(&series, &labels! { "a" => "old" }, 1.0);
        mock.increment(Duration::from_secs(2));
        add(&series, &labels! { "a" => "new" }, 1.0);

        let samples = series.samples(|v| *v).collect::<Vec<_>>();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].labels.get("a"), Some("new"));
        assert!(recorder.0.lock().contains(&"removed requests 1 1".to_owned()));
    }

    #[test]
    fn test_samples_sweep_expired_once_exhausted() {
        let (series, recorder, mock) = series(Some(Duration::from_secs(1)));
        for i in 0..4 {
            add(&series, &labels! { "i" => i.to_string() }, 1.0);
        }
        mock.increment(Duration::from_secs(2));
        add(&series, &labels! { "i" => "1" }, 1.0);
        add(&series, &labels! { "i" => "live" }, 1.0);

        let mut samples = series.samples(|v| *v);
        assert!(samples.next().is_some());
        assert!(samples.next().is_some());

        // Expired entries stay put until the scan ends.
        assert_eq!(series.len(), 5);
        assert!(samples.next().is_none());
        assert_eq!(series.len(), 2);

        let events = recorder.0.lock();
        let removals = events.iter().filter(|e| e.starts_with("removed")).map(String::as_str).collect::<Vec<_>>();
        assert_eq!(removals, vec!["removed requests 1 1", "removed requests 3 1"]);
    }

    #[test]
    fn test_samples_over_many_expired() {
        let (series, _recorder, mock) = series(Some(Duration::from_secs(1)));
        for i in 0..50_000 {
            series.update_validated(&labels! { "i" => i.to_string() }, || 0.0, |v| *v += 1.0);
        }
        mock.increment(Duration::from_secs(2));
        add(&series, &labels! { "i" => "live" }, 1.0);

        let started = std::time::Instant::now();
        assert_eq!(series.samples(|v| *v).count(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let (series, _recorder, mock) = series(Some(Duration::from_secs(u64::MAX / 2)));
        let labels = labels! { "a" => "1" };
        add(&series, &labels, 1.0);
        add(&series, &labels, 1.0);

        mock.increment(Duration::from_secs(86_400 * 365));
        assert_eq!(series.read(&labels, |v| *v), Some(2.0));
        series.clear_expired();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_clear_expired() {
        let (series, _recorder, mock) = series(Some(Duration::from_secs(1)));
        add(&series, &labels! { "a" => "1" }, 1.0);
        add(&series, &labels! { "a" => "2" }, 1.0);
        mock.increment(Duration::from_millis(500));
        add(&series, &labels! { "a" => "3" }, 1.0);
        mock.increment(Duration::from_millis(600));

        series.clear_expired();
        assert_eq!(series.len(), 1);
        assert_eq!(series.read(&labels! { "a" => "3" }, |v| *v), Some(1.0));
    }
}
