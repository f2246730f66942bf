//! A composition layer backed by a periodically refreshed snapshot.

use super::ConfigLayer;
use crate::core::{PeriodicLayerBuilder, RefreshHandle, RefreshStatus, Snapshot, SnapshotCache};
use crate::error::Result;
use crate::notify::{ChangeCallback, SubscriberRegistry, SubscriptionHandle};
use crate::sources::ValueSource;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default priority of periodic layers: above files, below environment variables.
pub const DEFAULT_PERIODIC_PRIORITY: i32 = 250;

/// A configuration layer fed by a background refresher.
///
/// This is a cheap, clonable handle. Reads go straight to the current
/// snapshot and never wait on a fetch. Dropping the last clone cancels the
/// refresher; [`PeriodicLayer::shutdown`] also waits for it to exit.
///
/// # Examples
///
/// ```rust,no_run
/// use periodic_config::prelude::*;
/// use periodic_config::sources::FnSource;
/// use std::time::Duration;
///
/// # async fn example() -> Result<()> {
/// let source = FnSource::new("flags", |_cancel| async {
///     Ok([("feature.enabled", "true")].into_iter().collect::<Snapshot>())
/// });
///
/// let layer = PeriodicLayer::register("flags", source, Duration::from_secs(60)).await?;
/// assert_eq!(layer.get("feature.enabled").as_deref(), Some("true"));
///
/// layer.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PeriodicLayer {
    inner: Arc<PeriodicLayerInner>,
}

struct PeriodicLayerInner {
    id: String,
    priority: i32,
    cache: Arc<SnapshotCache>,
    subscribers: SubscriberRegistry,
    handle: RefreshHandle,
}

impl PeriodicLayer {
    /// Create a builder for a layer fed by `source`.
    pub fn builder<S>(id: impl Into<String>, source: S) -> PeriodicLayerBuilder
    where
        S: ValueSource + 'static,
    {
        PeriodicLayerBuilder::new(id, source)
    }

    /// Start refreshing `source` every `period` with the default startup policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `period` is zero.
    pub async fn register<S>(id: impl Into<String>, source: S, period: Duration) -> Result<Self>
    where
        S: ValueSource + 'static,
    {
        Self::builder(id, source).with_period(period).build().await
    }

    pub(crate) fn from_parts(
        id: String,
        priority: i32,
        cache: Arc<SnapshotCache>,
        subscribers: SubscriberRegistry,
        handle: RefreshHandle,
    ) -> Self {
        Self {
            inner: Arc::new(PeriodicLayerInner {
                id,
                priority,
                cache,
                subscribers,
                handle,
            }),
        }
    }

    /// The id this layer was registered under.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Read a value from the current snapshot.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.cache.get(key)
    }

    /// The current snapshot, or `None` before the first successful fetch.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.cache.current()
    }

    /// Register a callback invoked after each successful snapshot swap.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }

    /// Current refresher counters and state.
    pub fn status(&self) -> RefreshStatus {
        self.inner.handle.status()
    }

    /// Wait until at least `attempts` fetch attempts have completed.
    pub async fn wait_for_attempts(&self, attempts: u64) {
        self.inner.handle.wait_for_attempts(attempts).await;
    }

    /// Stop the refresher and wait for it to exit. The last snapshot stays readable.
    pub async fn shutdown(&self) {
        self.inner.handle.shutdown().await;
    }
}

impl ConfigLayer for PeriodicLayer {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        Ok(self
            .inner
            .cache
            .current()
            .map(|snapshot| snapshot.to_config_values())
            .unwrap_or_default())
    }

    fn name(&self) -> String {
        format!("periodic:{}", self.inner.id)
    }

    fn priority(&self) -> i32 {
        self.inner.priority
    }

    fn watch(&self, callback: ChangeCallback) -> Option<SubscriptionHandle> {
        Some(self.inner.subscribers.subscribe_shared(callback))
    }
}

impl std::fmt::Debug for PeriodicLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicLayer")
            .field("id", &self.inner.id)
            .field("priority", &self.inner.priority)
            .field("handle", &self.inner.handle)
            .finish()
    }
}
