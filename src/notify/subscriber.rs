//! Change signals for refreshed configuration.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Callback invoked after each successful snapshot swap.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// Once `drop` returns, no later notification will include the callback. A
/// notification already running on another thread may still invoke it.
pub struct SubscriptionHandle {
    id: usize,
    registry: Weak<RwLock<SubscriberRegistryInner>>,
}

impl SubscriptionHandle {
    /// Unsubscribe explicitly. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let id = self.id;
            registry.write().subscribers.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle").field("id", &self.id).finish()
    }
}

struct SubscriberRegistryInner {
    subscribers: Vec<(usize, ChangeCallback)>,
    next_id: usize,
}

/// Registry for change subscribers.
///
/// Subscribing and notifying never wait on a fetch. Callbacks are invoked
/// outside the registry lock, so a callback may itself subscribe or drop a
/// handle.
///
/// # Examples
///
/// ```rust
/// use periodic_config::notify::SubscriberRegistry;
///
/// let registry = SubscriberRegistry::new();
/// let handle = registry.subscribe(|| println!("Config changed!"));
///
/// registry.notify_all();
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// assert_eq!(registry.subscriber_count(), 0);
/// ```
#[derive(Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<SubscriberRegistryInner>>,
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SubscriberRegistryInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a callback invoked after every successful swap.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe_shared(Arc::new(callback))
    }

    /// Register an already shared callback.
    pub fn subscribe_shared(&self, callback: ChangeCallback) -> SubscriptionHandle {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, callback));

        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke all callbacks in subscription order.
    pub fn notify_all(&self) {
        let callbacks: Vec<ChangeCallback> = self
            .inner
            .read()
            .subscribers
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback();
        }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
