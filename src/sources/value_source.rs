//! The value source contract.

use crate::core::Snapshot;
use crate::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Produces a complete key/value snapshot on demand.
///
/// Implement this trait to back a periodic layer with a custom store
/// (database table, key-value service, file, HTTP endpoint).
///
/// Implementations must:
/// - acquire and release any connection or session they need within a single call;
/// - return either a complete snapshot or an error, never a partial result;
/// - observe `cancel` and return `ConfigError::Cancelled` once it fires.
#[async_trait]
pub trait ValueSource: Send + Sync {
    /// Fetch a full snapshot.
    ///
    /// # Errors
    ///
    /// `SourceUnavailable` for connectivity failures, `SourceMalformed` when
    /// the content cannot be interpreted, `Cancelled` when `cancel` fired.
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Snapshot>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String {
        "custom".to_string()
    }
}

#[async_trait]
impl<S: ValueSource + ?Sized> ValueSource for Arc<S> {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        (**self).fetch(cancel).await
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

#[async_trait]
impl<S: ValueSource + ?Sized> ValueSource for Box<S> {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        (**self).fetch(cancel).await
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

type FetchFn = dyn Fn(CancellationToken) -> BoxFuture<'static, Result<Snapshot>> + Send + Sync;

/// A value source backed by a closure.
///
/// The closure is built once at registration time and already carries its
/// key/value projection; each call receives a clone of the cancellation token.
///
/// # Examples
///
/// ```rust
/// use periodic_config::core::Snapshot;
/// use periodic_config::sources::FnSource;
///
/// let source = FnSource::new("static", |_cancel| async {
///     Ok([("feature.enabled", "true")].into_iter().collect::<Snapshot>())
/// });
/// ```
#[derive(Clone)]
pub struct FnSource {
    name: String,
    fetcher: Arc<FetchFn>,
}

impl FnSource {
    /// Wrap a fetch function.
    pub fn new<F, Fut>(name: impl Into<String>, fetcher: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Snapshot>> + Send + 'static,
    {
        Self {
            name: name.into(),
            fetcher: Arc::new(move |cancel| Box::pin(fetcher(cancel))),
        }
    }
}

#[async_trait]
impl ValueSource for FnSource {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        (self.fetcher)(cancel.clone()).await
    }

    fn name(&self) -> String {
        format!("fn:{}", self.name)
    }
}

impl std::fmt::Debug for FnSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSource").field("name", &self.name).finish()
    }
}
