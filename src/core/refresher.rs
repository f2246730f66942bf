//! Timer-driven, single-flight refresh of a snapshot cache.

use crate::core::SnapshotCache;
use crate::error::{ConfigError, Result};
use crate::notify::SubscriberRegistry;
use crate::sources::ValueSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use crate::metrics::RefreshMetrics;

/// Default time between fetch attempts.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Observer notified once for every failed fetch, with the source id.
pub type FailureObserver = Arc<dyn Fn(&str, &ConfigError) + Send + Sync>;

/// What the refresher is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    /// Waiting for the next tick.
    #[default]
    Idle,
    /// A fetch is in flight.
    Fetching,
    /// The refresher has been shut down.
    Stopped,
}

/// Counters and state published by a running refresher.
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    /// Current state.
    pub state: RefreshState,
    /// Fetch attempts that have completed (successfully or not).
    pub attempts: u64,
    /// Attempts that produced a new snapshot.
    pub successes: u64,
    /// Attempts that failed.
    pub failures: u64,
    /// Ticks dropped because a fetch was still running when they came due.
    pub skipped_ticks: u64,
    /// Message of the most recent failure, if the last attempt failed.
    pub last_error: Option<String>,
}

/// Drives a [`ValueSource`] on a fixed period and publishes results to a [`SnapshotCache`].
///
/// The first tick fires immediately. Fetches never overlap: a tick that comes
/// due while a fetch is still running is dropped, not queued. A failed fetch
/// leaves the cache untouched and is reported to the failure observer; the
/// next tick is a fresh attempt, with no backoff.
pub struct PeriodicRefresher {
    id: String,
    source: Arc<dyn ValueSource>,
    cache: Arc<SnapshotCache>,
    subscribers: SubscriberRegistry,
    period: Duration,
    observer: Option<FailureObserver>,
    status: watch::Sender<RefreshStatus>,
    #[cfg(feature = "metrics")]
    metrics: Option<RefreshMetrics>,
}

impl PeriodicRefresher {
    /// Create a refresher writing into `cache` and signalling `subscribers` after each swap.
    pub fn new(
        id: impl Into<String>,
        source: Arc<dyn ValueSource>,
        cache: Arc<SnapshotCache>,
        subscribers: SubscriberRegistry,
    ) -> Self {
        let (status, _) = watch::channel(RefreshStatus::default());
        Self {
            id: id.into(),
            source,
            cache,
            subscribers,
            period: DEFAULT_REFRESH_PERIOD,
            observer: None,
            status,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set the refresh period.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSettings` for a zero period.
    pub fn with_period(mut self, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(ConfigError::InvalidSettings(
                "refresh period must be greater than zero".to_string(),
            ));
        }
        self.period = period;
        Ok(self)
    }

    /// Set the observer called for every failed fetch.
    pub fn with_failure_observer(mut self, observer: FailureObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Record fetch metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: RefreshMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Start the background task. Must be called from within a Tokio runtime.
    pub fn spawn(self) -> RefreshHandle {
        let token = CancellationToken::new();
        let status = self.status.subscribe();
        let id = self.id.clone();
        let task = tokio::spawn(self.run(token.clone()));

        RefreshHandle {
            id,
            token,
            status,
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(self, token: CancellationToken) {
        info!(
            source = %self.id,
            backend = %self.source.name(),
            period_ms = self.period.as_millis() as u64,
            "starting periodic refresh"
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_completed: Option<Instant> = None;

        loop {
            let scheduled = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                at = ticker.tick() => at,
            };

            if last_completed.is_some_and(|done| scheduled < done) {
                debug!(source = %self.id, "dropping tick that came due during the previous fetch");
                self.status.send_modify(|s| s.skipped_ticks += 1);
                #[cfg(feature = "metrics")]
                if let Some(metrics) = &self.metrics {
                    metrics.record_skipped_tick();
                }
                continue;
            }

            // Failures are already reported inside refresh_once.
            let _ = self.refresh_once(&token).await;
            last_completed = Some(Instant::now());
        }

        self.status.send_modify(|s| s.state = RefreshState::Stopped);
        info!(source = %self.id, "periodic refresh stopped");
    }

    /// Perform a single fetch attempt and publish its outcome.
    ///
    /// On success the cache is swapped and subscribers are signalled. On
    /// failure the cache is left as is and the failure observer is called
    /// exactly once. A snapshot returned after `token` fired is discarded and
    /// reported as `Cancelled`.
    pub async fn refresh_once(&self, token: &CancellationToken) -> Result<()> {
        self.status.send_modify(|s| s.state = RefreshState::Fetching);

        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(|m| m.start_fetch());

        let outcome = match self.source.fetch(token).await {
            Ok(_) if token.is_cancelled() => Err(ConfigError::Cancelled),
            other => other,
        };

        match outcome {
            Ok(snapshot) => {
                let keys = snapshot.len();
                self.cache.set(snapshot);
                debug!(source = %self.id, keys, "configuration snapshot swapped");

                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                    metrics.record_success(timer, keys);
                }

                self.subscribers.notify_all();
                self.status.send_modify(|s| {
                    s.state = RefreshState::Idle;
                    s.attempts += 1;
                    s.successes += 1;
                    s.last_error = None;
                });
                Ok(())
            }
            Err(err) => {
                warn!(
                    source = %self.id,
                    error = %err,
                    "configuration fetch failed; keeping previous snapshot"
                );

                #[cfg(feature = "metrics")]
                if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
                    metrics.record_failure(timer);
                }

                if let Some(observer) = &self.observer {
                    observer(&self.id, &err);
                }
                self.status.send_modify(|s| {
                    s.state = RefreshState::Idle;
                    s.attempts += 1;
                    s.failures += 1;
                    s.last_error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }
}

/// Handle to a running refresher.
///
/// Dropping the handle cancels the refresher; [`RefreshHandle::shutdown`]
/// additionally waits for the task to finish.
pub struct RefreshHandle {
    id: String,
    token: CancellationToken,
    status: watch::Receiver<RefreshStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshHandle {
    /// The id the refresher was registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current counters and state.
    pub fn status(&self) -> RefreshStatus {
        self.status.borrow().clone()
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until at least `attempts` fetch attempts have completed.
    ///
    /// Returns early if the refresher stops first.
    pub async fn wait_for_attempts(&self, attempts: u64) {
        let mut status = self.status.clone();
        let _ = status
            .wait_for(|s| s.attempts >= attempts || s.state == RefreshState::Stopped)
            .await;
    }

    /// Stop scheduling ticks, cancel any in-flight fetch and wait for the task to exit.
    ///
    /// Returns once the in-flight fetch (if any) has honored cancellation.
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(source = %self.id, error = %e, "refresh task ended abnormally");
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("id", &self.id)
            .field("status", &*self.status.borrow())
            .finish()
    }
}
