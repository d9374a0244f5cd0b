use std::borrow::Cow;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::Error;

/// Label key reserved by the exposition formats for the metric name itself.
pub const RESERVED_LABEL: &str = "__name__";

/// A set of labels distinguishing the timeseries of one instrument.
///
/// Labels keep their insertion order, which is the order they are rendered in.  A label may be
/// present without a value, in which case it renders as an empty string.
///
/// Two label sets holding the same pairs in a different order address the same timeseries: see
/// [`Labels::key`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Labels(IndexMap<String, Option<String>>);

impl Labels {
    /// Creates an empty label set.
    pub fn new() -> Labels {
        Labels(IndexMap::new())
    }

    /// Sets a label, keeping its original position if it was already present.
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), Some(value.into()));
    }

    /// Sets a label that may lack a value.
    pub fn insert_optional<K, V>(&mut self, key: K, value: Option<V>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), value.map(Into::into));
    }

    /// Gets the value of a label.
    ///
    /// Returns `None` both for missing labels and for labels without a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    /// Returns `true` if the label is present, with or without a value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the labels in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Generates the canonical storage key for this label set.
    ///
    /// The key is a JSON object with the labels sorted by key, so it does not depend on insertion
    /// order.  Labels without a value serialize as `null`.  The empty set maps to the empty string.
    pub fn key(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }

        let mut pairs = self.0.iter().collect::<Vec<_>>();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let object = pairs
            .into_iter()
            .map(|(k, v)| (k.clone(), v.as_ref().map_or(Value::Null, |v| Value::String(v.clone()))))
            .collect::<Map<_, _>>();

        Value::Object(object).to_string()
    }

    /// Checks that no reserved label is present.
    pub fn validate(&self) -> Result<(), Error> {
        if self.0.contains_key(RESERVED_LABEL) {
            return Err(Error::ReservedLabel);
        }

        Ok(())
    }

    // Labels of `base` first, then ours; ours win on conflicting keys.
    pub(crate) fn merged_over(&self, base: &Labels) -> Labels {
        if base.is_empty() {
            return self.clone();
        }

        let mut merged = base.clone();
        for (k, v) in &self.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }
}

impl<K, V> FromIterator<(K, V)> for Labels
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Labels(iter.into_iter().map(|(k, v)| (k.into(), Some(v.into()))).collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Labels
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Conversion of an application type into the labels of a timeseries.
///
/// Instruments narrowed with `with_label_type` only accept their label type, which lets the
/// compiler enforce which labels every write carries:
///
/// ```
/// use metriq::{LabelSet, Labels};
/// use std::borrow::Cow;
///
/// struct Route {
///     method: &'static str,
///     path: String,
/// }
///
/// impl LabelSet for Route {
///     fn to_labels(&self) -> Cow<'_, Labels> {
///         Cow::Owned(Labels::from([("method", self.method), ("path", self.path.as_str())]))
///     }
/// }
/// ```
pub trait LabelSet {
    /// Converts this value into labels.
    fn to_labels(&self) -> Cow<'_, Labels>;
}

impl LabelSet for Labels {
    fn to_labels(&self) -> Cow<'_, Labels> {
        Cow::Borrowed(self)
    }
}

/// Builds a [`Labels`] from `key => value` pairs.
///
/// ```
/// let labels = metriq::labels! { "method" => "GET", "code" => 200.to_string() };
/// assert_eq!(labels.get("code"), Some("200"));
/// ```
#[macro_export]
macro_rules! labels {
    () => {
        $crate::Labels::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut labels = $crate::Labels::new();
        $(labels.insert($key, $value);)+
        labels
    }};
}
