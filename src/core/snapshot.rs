//! Immutable key/value snapshots produced by a successful fetch.

use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::SystemTime;

/// A fully populated key/value mapping captured by one fetch.
///
/// A snapshot is never mutated after construction. Values are optional: a key
/// may be present with no value, which is distinct from the key being absent.
#[derive(Debug, Clone)]
pub struct Snapshot {
    values: HashMap<String, Option<String>>,
    fetched_at: SystemTime,
}

impl Snapshot {
    /// Create a snapshot from a complete key/value map, stamped with the current time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use periodic_config::core::Snapshot;
    /// use std::collections::HashMap;
    ///
    /// let mut values = HashMap::new();
    /// values.insert("feature.enabled".to_string(), Some("true".to_string()));
    ///
    /// let snapshot = Snapshot::new(values);
    /// assert_eq!(snapshot.get("feature.enabled"), Some("true"));
    /// ```
    pub fn new(values: HashMap<String, Option<String>>) -> Self {
        Self {
            values,
            fetched_at: SystemTime::now(),
        }
    }

    /// Build a snapshot from key/value pairs, rejecting duplicate keys.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::SourceMalformed` if the same key appears twice.
    pub fn try_from_pairs<I, K>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let mut values = HashMap::new();
        for (key, value) in pairs {
            match values.entry(key.into()) {
                Entry::Occupied(entry) => {
                    return Err(ConfigError::malformed(format!(
                        "duplicate key '{}'",
                        entry.key()
                    )));
                }
                Entry::Vacant(entry) => {
                    entry.insert(value);
                }
            }
        }
        Ok(Self::new(values))
    }

    /// Get the value for a key. Absent keys and keys without a value both yield `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    /// Look up a key, distinguishing an absent key (`None`) from a key with no value (`Some(None)`).
    pub fn lookup(&self, key: &str) -> Option<Option<&str>> {
        self.values.get(key).map(|v| v.as_deref())
    }

    /// Whether the snapshot contains the key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of keys in the snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// When the fetch that produced this snapshot completed.
    pub fn fetched_at(&self) -> SystemTime {
        self.fetched_at
    }

    /// Convert to `config` values for merging. Keys without a value are skipped.
    ///
    /// Colon-delimited keys (`Logging:LogLevel`) are rewritten to dotted paths
    /// so they nest like the keys of file and environment layers.
    pub(crate) fn to_config_values(&self) -> HashMap<String, config::Value> {
        self.values
            .iter()
            .filter_map(|(key, value)| {
                value
                    .as_ref()
                    .map(|v| (key.replace(':', "."), config::Value::from(v.clone())))
            })
            .collect()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        )
    }
}
