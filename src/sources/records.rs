//! Record-table projection: one key/value pair per stored record.

use super::ValueSource;
use crate::core::Snapshot;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A stored configuration row with an identifier and an optional value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    /// Configuration key.
    pub id: String,
    /// Configuration value.
    pub value: Option<String>,
}

impl ConfigurationRecord {
    /// Create a record with a value.
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: Some(value.into()),
        }
    }
}

/// A store that returns every configuration record in one call.
///
/// The store opens and closes whatever session or connection it needs inside
/// `load_records`; nothing is held between calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The record type this store yields.
    type Record: Send;

    /// Load all records.
    ///
    /// # Errors
    ///
    /// Should return `SourceUnavailable` on connectivity failures and
    /// `Cancelled` if `cancel` fires while loading.
    async fn load_records(&self, cancel: &CancellationToken) -> Result<Vec<Self::Record>>;

    /// Get a human-readable name for this store.
    fn name(&self) -> String {
        "records".to_string()
    }
}

type KeySelector<R> = Arc<dyn Fn(&R) -> String + Send + Sync>;
type ValueSelector<R> = Arc<dyn Fn(&R) -> Option<String> + Send + Sync>;

/// A value source projecting records from a [`RecordStore`] into a snapshot.
///
/// # Examples
///
/// ```rust
/// use periodic_config::error::Result;
/// use periodic_config::sources::{ConfigurationRecord, RecordSource, RecordStore};
/// use tokio_util::sync::CancellationToken;
///
/// struct SettingsTable;
///
/// #[async_trait::async_trait]
/// impl RecordStore for SettingsTable {
///     type Record = ConfigurationRecord;
///
///     async fn load_records(&self, _cancel: &CancellationToken) -> Result<Vec<ConfigurationRecord>> {
///         Ok(vec![ConfigurationRecord::new("feature.enabled", "true")])
///     }
/// }
///
/// let source = RecordSource::new(SettingsTable);
/// ```
pub struct RecordSource<S: RecordStore> {
    store: S,
    key_selector: KeySelector<S::Record>,
    value_selector: ValueSelector<S::Record>,
}

impl<S> RecordSource<S>
where
    S: RecordStore<Record = ConfigurationRecord>,
{
    /// Project [`ConfigurationRecord`]s by their `id` and `value` fields.
    pub fn new(store: S) -> Self {
        Self::with_selectors(store, |r| r.id.clone(), |r| r.value.clone())
    }
}

impl<S: RecordStore> RecordSource<S> {
    /// Project arbitrary records through key and value selectors.
    pub fn with_selectors<K, V>(store: S, key_selector: K, value_selector: V) -> Self
    where
        K: Fn(&S::Record) -> String + Send + Sync + 'static,
        V: Fn(&S::Record) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            store,
            key_selector: Arc::new(key_selector),
            value_selector: Arc::new(value_selector),
        }
    }
}

#[async_trait]
impl<S: RecordStore> ValueSource for RecordSource<S> {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        if cancel.is_cancelled() {
            return Err(ConfigError::Cancelled);
        }

        let records = self.store.load_records(cancel).await?;

        if cancel.is_cancelled() {
            return Err(ConfigError::Cancelled);
        }

        Snapshot::try_from_pairs(
            records
                .iter()
                .map(|r| ((self.key_selector)(r), (self.value_selector)(r))),
        )
        .map_err(|e| match e {
            ConfigError::SourceMalformed(reason) => {
                ConfigError::malformed(format!("store '{}': {}", self.store.name(), reason))
            }
            other => other,
        })
    }

    fn name(&self) -> String {
        format!("records:{}", self.store.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecStore(Vec<ConfigurationRecord>);

    #[async_trait]
    impl RecordStore for VecStore {
        type Record = ConfigurationRecord;

        async fn load_records(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<Vec<ConfigurationRecord>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> String {
            "vec".to_string()
        }
    }

    struct Setting {
        section: &'static str,
        key: &'static str,
        raw: &'static str,
    }

    struct SettingStore;

    #[async_trait]
    impl RecordStore for SettingStore {
        type Record = Setting;

        async fn load_records(&self, _cancel: &CancellationToken) -> Result<Vec<Setting>> {
            Ok(vec![Setting {
                section: "server",
                key: "port",
                raw: " 8080 ",
            }])
        }
    }

    #[tokio::test]
    async fn test_default_projection() {
        let source = RecordSource::new(VecStore(vec![
            ConfigurationRecord::new("a", "1"),
            ConfigurationRecord {
                id: "b".to_string(),
                value: None,
            },
        ]));

        let snapshot = source.fetch(&CancellationToken::new()).await.unwrap();
        assert_eq!(snapshot.get("a"), Some("1"));
        assert_eq!(snapshot.lookup("b"), Some(None));
        assert_eq!(source.name(), "records:vec");
    }

    #[tokio::test]
    async fn test_custom_selectors() {
        let source = RecordSource::with_selectors(
            SettingStore,
            |s| format!("{}.{}", s.section, s.key),
            |s| Some(s.raw.trim().to_string()),
        );

        let snapshot = source.fetch(&CancellationToken::new()).await.unwrap();
        assert_eq!(snapshot.get("server.port"), Some("8080"));
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_malformed() {
        let source = RecordSource::new(VecStore(vec![
            ConfigurationRecord::new("a", "1"),
            ConfigurationRecord::new("a", "2"),
        ]));

        match source.fetch(&CancellationToken::new()).await {
            Err(err @ ConfigError::SourceMalformed(_)) => assert_eq!(
                err.to_string(),
                "Configuration source returned malformed content: store 'vec': duplicate key 'a'"
            ),
            other => panic!("expected SourceMalformed, got {:?}", other.map(|s| s.len())),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_load() {
        let source = RecordSource::new(VecStore(vec![ConfigurationRecord::new("a", "1")]));
        let token = CancellationToken::new();
        token.cancel();

        assert!(matches!(
            source.fetch(&token).await,
            Err(ConfigError::Cancelled)
        ));
    }
}
