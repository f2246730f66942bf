//! Builder for periodic layers and the options it accepts.

use crate::core::refresher::{DEFAULT_REFRESH_PERIOD, FailureObserver};
use crate::core::{PeriodicRefresher, SnapshotCache};
use crate::error::{ConfigError, Result};
use crate::layer::{DEFAULT_PERIODIC_PRIORITY, PeriodicLayer};
use crate::notify::SubscriberRegistry;
use crate::sources::ValueSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[cfg(feature = "metrics")]
use crate::metrics::RefreshMetrics;

/// Default upper bound on how long `build` waits for the first fetch.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// How `build` treats the first fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StartupPolicy {
    /// Return immediately with an empty layer; it fills on the first successful tick.
    Background,
    /// Wait for the first attempt to complete or fail, at most `timeout`,
    /// then continue regardless of the outcome.
    Block {
        /// Maximum wait.
        #[serde(rename = "timeout_ms", with = "duration_ms")]
        timeout: Duration,
    },
    /// Wait for the first attempt to complete or fail, however long it takes.
    BlockIndefinitely,
    /// Wait at most `timeout` for a successful first fetch; fail `build` otherwise.
    Require {
        /// Maximum wait.
        #[serde(rename = "timeout_ms", with = "duration_ms")]
        timeout: Duration,
    },
}

impl Default for StartupPolicy {
    fn default() -> Self {
        Self::Block {
            timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

/// Serializable refresher settings, for configuring a layer from another layer.
///
/// ```rust
/// use periodic_config::core::{RefreshOptions, StartupPolicy};
/// use std::time::Duration;
///
/// let options: RefreshOptions = serde_json::from_str(
///     r#"{ "period_ms": 60000, "startup": { "mode": "background" } }"#,
/// ).unwrap();
///
/// assert_eq!(options.period, Duration::from_secs(60));
/// assert_eq!(options.startup, StartupPolicy::Background);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshOptions {
    /// Time between fetch attempts.
    #[serde(rename = "period_ms", with = "duration_ms")]
    pub period: Duration,
    /// Priority of the layer within a composition.
    pub priority: i32,
    /// Startup behavior.
    pub startup: StartupPolicy,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            period: DEFAULT_REFRESH_PERIOD,
            priority: DEFAULT_PERIODIC_PRIORITY,
            startup: StartupPolicy::default(),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Builder for a [`PeriodicLayer`].
///
/// # Examples
///
/// ```rust,no_run
/// use periodic_config::prelude::*;
/// use periodic_config::sources::FnSource;
/// use std::time::Duration;
///
/// # async fn example(source: FnSource) -> Result<()> {
/// let layer = PeriodicLayer::builder("settings-db", source)
///     .with_period(Duration::from_secs(60))
///     .with_failure_observer(|id, err| eprintln!("{id}: {err}"))
///     .with_startup_policy(StartupPolicy::Require { timeout: Duration::from_secs(5) })
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct PeriodicLayerBuilder {
    id: String,
    source: Arc<dyn ValueSource>,
    options: RefreshOptions,
    observer: Option<FailureObserver>,
    #[cfg(feature = "metrics")]
    meter: Option<opentelemetry::metrics::Meter>,
}

impl PeriodicLayerBuilder {
    /// Create a builder with default options (5 minute period, blocking startup).
    pub fn new<S>(id: impl Into<String>, source: S) -> Self
    where
        S: ValueSource + 'static,
    {
        Self {
            id: id.into(),
            source: Arc::new(source),
            options: RefreshOptions::default(),
            observer: None,
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }

    /// Set the refresh period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.options.period = period;
        self
    }

    /// Set the layer priority within a composition.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.options.priority = priority;
        self
    }

    /// Set the startup policy.
    pub fn with_startup_policy(mut self, policy: StartupPolicy) -> Self {
        self.options.startup = policy;
        self
    }

    /// Replace period, priority and startup policy at once.
    pub fn with_options(mut self, options: RefreshOptions) -> Self {
        self.options = options;
        self
    }

    /// Set an observer called once for every failed fetch.
    pub fn with_failure_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&str, &ConfigError) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Record fetch metrics with the given meter.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Start the refresher and apply the startup policy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` for a zero period. Under
    /// [`StartupPolicy::Require`], returns `StartupTimeout` or
    /// `InitialFetchFailed` when no snapshot arrives in time; the refresher is
    /// shut down in that case.
    pub async fn build(self) -> Result<PeriodicLayer> {
        let cache = Arc::new(SnapshotCache::new());
        let subscribers = SubscriberRegistry::new();

        let mut refresher = PeriodicRefresher::new(
            self.id.clone(),
            self.source,
            Arc::clone(&cache),
            subscribers.clone(),
        )
        .with_period(self.options.period)?;

        if let Some(observer) = self.observer {
            refresher = refresher.with_failure_observer(observer);
        }

        #[cfg(feature = "metrics")]
        if let Some(meter) = self.meter {
            refresher = refresher.with_metrics(RefreshMetrics::new(meter).for_source(&self.id));
        }

        let handle = refresher.spawn();

        match self.options.startup {
            StartupPolicy::Background => {}
            StartupPolicy::BlockIndefinitely => handle.wait_for_attempts(1).await,
            StartupPolicy::Block { timeout } => {
                if tokio::time::timeout(timeout, handle.wait_for_attempts(1))
                    .await
                    .is_err()
                {
                    warn!(
                        source = %self.id,
                        timeout_ms = timeout.as_millis() as u64,
                        "first configuration fetch still running; starting with an empty layer"
                    );
                }
            }
            StartupPolicy::Require { timeout } => {
                let waited = tokio::time::timeout(timeout, handle.wait_for_attempts(1)).await;
                if waited.is_err() {
                    handle.shutdown().await;
                    return Err(ConfigError::StartupTimeout(timeout));
                }
                if !cache.is_populated() {
                    let reason = handle
                        .status()
                        .last_error
                        .unwrap_or_else(|| "no snapshot produced".to_string());
                    handle.shutdown().await;
                    return Err(ConfigError::InitialFetchFailed(reason));
                }
            }
        }

        Ok(PeriodicLayer::from_parts(
            self.id,
            self.options.priority,
            cache,
            subscribers,
            handle,
        ))
    }
}
