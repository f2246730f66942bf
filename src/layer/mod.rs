//! Named, prioritized layers of a configuration composition.

mod composition;
mod env;
mod file;
mod periodic;

pub use composition::Composition;
pub use env::EnvLayer;
pub use file::FileLayer;
pub use periodic::{DEFAULT_PERIODIC_PRIORITY, PeriodicLayer};

use crate::error::Result;
use crate::notify::{ChangeCallback, SubscriptionHandle};
use std::collections::HashMap;

/// Trait for configuration layers.
///
/// Implement this trait to contribute values to a [`Composition`]. Layers
/// are merged in ascending priority, so higher priority layers override lower
/// ones key by key.
pub trait ConfigLayer: Send + Sync {
    /// Load the layer's current values.
    ///
    /// Keys may be dotted paths (`server.port`) or top-level keys holding tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer cannot be read or parsed.
    fn load(&self) -> Result<HashMap<String, config::Value>>;

    /// Get a human-readable name for this layer (for logging/debugging).
    fn name(&self) -> String;

    /// Get the priority of this layer (higher = takes precedence).
    ///
    /// Default priorities:
    /// - Environment variables: 300
    /// - Periodic layers: 250
    /// - Files: 100 (+10 for each additional file)
    fn priority(&self) -> i32 {
        100
    }

    /// Register for change signals, if this layer changes over time.
    ///
    /// Static layers return `None`.
    fn watch(&self, _callback: ChangeCallback) -> Option<SubscriptionHandle> {
        None
    }
}
