//! Typed configuration rebuilt from a composition on every change.

use crate::error::Result;
use crate::layer::Composition;
use crate::notify::{ChangeCallback, SubscriberRegistry, SubscriptionHandle};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// A typed configuration bound to a [`Composition`].
///
/// Reads are lock-free. Whenever a watched layer swaps in a new snapshot, the
/// composition is merged and deserialized again; if that fails, the previous
/// value is kept and the failure is logged.
///
/// # Examples
///
/// ```rust,no_run
/// use periodic_config::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// # fn example(composition: Composition) -> Result<()> {
/// let config = composition.bind::<AppConfig>()?;
///
/// let _handle = config.subscribe(|| println!("Configuration changed!"));
/// println!("Port: {}", config.get().port);
/// # Ok(())
/// # }
/// ```
pub struct BoundConfig<T> {
    inner: Arc<BoundInner<T>>,
}

struct BoundInner<T> {
    current: ArcSwap<T>,
    composition: Composition,
    subscribers: SubscriberRegistry,
    watches: Mutex<Vec<SubscriptionHandle>>,
    // Serializes load+store so an older merge never overwrites a newer one.
    rebuild_lock: Mutex<()>,
}

impl<T> BoundConfig<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    pub(crate) fn bind(composition: Composition) -> Result<Self> {
        let initial: T = composition.load()?;
        let inner = Arc::new(BoundInner {
            current: ArcSwap::from_pointee(initial),
            composition,
            subscribers: SubscriberRegistry::new(),
            watches: Mutex::new(Vec::new()),
            rebuild_lock: Mutex::new(()),
        });

        let weak = Arc::downgrade(&inner);
        let callback: ChangeCallback = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Err(e) = inner.rebuild() {
                    warn!(error = %e, "failed to rebuild bound configuration; keeping previous value");
                }
            }
        });
        *inner.watches.lock() = inner.composition.watch(callback);

        Ok(Self { inner })
    }

    /// Get a reference-counted handle to the current configuration.
    ///
    /// This is lock-free and never waits on a fetch.
    pub fn get(&self) -> Arc<T> {
        self.inner.current.load_full()
    }

    /// Merge and deserialize the composition now.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer fails to load or deserialization fails; the
    /// current value is left unchanged.
    pub fn reload(&self) -> Result<()> {
        self.inner.rebuild()
    }

    /// Register a callback invoked after each successful rebuild.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(callback)
    }
}

impl<T: DeserializeOwned> BoundInner<T> {
    fn rebuild(&self) -> Result<()> {
        {
            let _guard = self.rebuild_lock.lock();
            let next: T = self.composition.load()?;
            self.current.store(Arc::new(next));
        }
        debug!("bound configuration rebuilt");
        self.subscribers.notify_all();
        Ok(())
    }
}

impl<T> Clone for BoundConfig<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::ConfigLayer;
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::time::Duration;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestConfig {
        value: i32,
    }

    struct Fixed(i64);

    impl ConfigLayer for Fixed {
        fn load(&self) -> Result<HashMap<String, config::Value>> {
            let mut values = HashMap::new();
            values.insert("value".to_string(), config::Value::from(self.0));
            Ok(values)
        }

        fn name(&self) -> String {
            "fixed".to_string()
        }
    }

    #[test]
    fn test_bind_and_read() {
        let config = Composition::new()
            .with_layer(Fixed(42))
            .bind::<TestConfig>()
            .unwrap();

        assert_eq!(config.get().value, 42);
        assert!(config.reload().is_ok());
        assert_eq!(config.clone().get().value, 42);
    }

    #[test]
    fn test_bind_fails_on_missing_field() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct NeedsName {
            name: String,
        }

        let result = Composition::new().with_layer(Fixed(1)).bind::<NeedsName>();
        assert!(result.is_err());
    }

    /// A layer whose next load can be made to stall after reading its value.
    #[derive(Clone, Default)]
    struct Stalling {
        value: Arc<AtomicI64>,
        stall_next: Arc<AtomicBool>,
        stalled: Arc<AtomicBool>,
    }

    impl ConfigLayer for Stalling {
        fn load(&self) -> Result<HashMap<String, config::Value>> {
            let value = self.value.load(Ordering::SeqCst);
            if self.stall_next.swap(false, Ordering::SeqCst) {
                self.stalled.store(true, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(300));
            }
            let mut values = HashMap::new();
            values.insert("value".to_string(), config::Value::from(value));
            Ok(values)
        }

        fn name(&self) -> String {
            "stalling".to_string()
        }
    }

    #[test]
    fn test_overlapping_rebuilds_keep_newest_value() {
        let layer = Stalling::default();
        layer.value.store(1, Ordering::SeqCst);

        let config = Composition::new()
            .with_layer(layer.clone())
            .bind::<TestConfig>()
            .unwrap();

        // A slow rebuild reads value 1 and stalls before storing it
        layer.stall_next.store(true, Ordering::SeqCst);
        let slow = {
            let config = config.clone();
            std::thread::spawn(move || config.reload())
        };
        while !layer.stalled.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }

        layer.value.store(2, Ordering::SeqCst);
        config.reload().unwrap();
        slow.join().unwrap().unwrap();

        assert_eq!(config.get().value, 2);
    }
}
