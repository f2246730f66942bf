//! Layered composition of configuration values.

use super::{ConfigLayer, EnvLayer, FileLayer};
use crate::core::BoundConfig;
use crate::error::{ConfigError, Result};
use crate::notify::{ChangeCallback, SubscriptionHandle};
use config::ValueKind;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Merges configuration layers by priority.
///
/// Layers are merged lowest priority first, so a higher priority layer
/// overrides individual keys of lower ones. Layers with equal priority are
/// merged in insertion order (the later one wins). Nested tables are merged
/// key by key rather than replaced wholesale.
///
/// # Examples
///
/// ```rust,no_run
/// use periodic_config::prelude::*;
/// use periodic_config::sources::FnSource;
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Debug, Deserialize)]
/// struct AppConfig {
///     port: u16,
/// }
///
/// # async fn example(source: FnSource) -> Result<()> {
/// let settings = PeriodicLayer::register("settings-db", source, Duration::from_secs(300)).await?;
///
/// let composition = Composition::new()
///     .with_file("config/default.yaml")
///     .with_layer(settings.clone())
///     .with_env("APP", "__");
///
/// let config = composition.bind::<AppConfig>()?;
/// println!("Port: {}", config.get().port);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Composition {
    layers: Vec<Arc<dyn ConfigLayer>>,
    file_count: usize,
}

impl Composition {
    /// Create an empty composition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer.
    pub fn with_layer<L: ConfigLayer + 'static>(mut self, layer: L) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    /// Add a file layer. Each additional file gets a higher priority than the
    /// previous one (100, 110, 120, ...).
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        let priority = 100 + (self.file_count as i32 * 10);
        self.file_count += 1;
        self.with_layer(FileLayer::new(path).with_priority(priority))
    }

    /// Add an environment variable layer (priority 300).
    pub fn with_env(self, prefix: &str, separator: &str) -> Self {
        self.with_layer(EnvLayer::new(prefix, separator))
    }

    /// Layer names in merge order (lowest priority first).
    pub fn layer_names(&self) -> Vec<String> {
        self.sorted_layers().iter().map(|l| l.name()).collect()
    }

    /// Resolve a single key across all layers.
    ///
    /// # Errors
    ///
    /// Returns an error if a layer fails to load, or the key holds a value
    /// that cannot be read as a string (e.g. a table).
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match self.merged()?.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(ConfigError::DeserializationError(format!(
                "Failed to read '{}': {}",
                key, e
            ))),
        }
    }

    /// Merge all layers and deserialize the result.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no layers, a layer fails to load, or
    /// deserialization fails.
    pub fn load<T: DeserializeOwned>(&self) -> Result<T> {
        self.merged()?.try_deserialize::<T>().map_err(|e| {
            ConfigError::DeserializationError(format!("Failed to deserialize configuration: {}", e))
        })
    }

    /// Bind a typed configuration that is rebuilt whenever a layer changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial load fails.
    pub fn bind<T>(&self) -> Result<BoundConfig<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        BoundConfig::bind(self.clone())
    }

    /// Register `callback` with every layer that emits change signals.
    pub(crate) fn watch(&self, callback: ChangeCallback) -> Vec<SubscriptionHandle> {
        self.layers
            .iter()
            .filter_map(|layer| layer.watch(Arc::clone(&callback)))
            .collect()
    }

    fn sorted_layers(&self) -> Vec<&Arc<dyn ConfigLayer>> {
        let mut sorted: Vec<_> = self.layers.iter().collect();
        sorted.sort_by_key(|l| l.priority());
        sorted
    }

    fn merged(&self) -> Result<config::Config> {
        if self.layers.is_empty() {
            return Err(ConfigError::LoadError(
                "No configuration layers specified".to_string(),
            ));
        }

        let mut builder = config::Config::builder();

        for layer in self.sorted_layers() {
            let values = layer.load().map_err(|e| {
                ConfigError::LoadError(format!("Failed to load layer '{}': {}", layer.name(), e))
            })?;

            let mut entries = Vec::with_capacity(values.len());
            for (key, value) in values {
                flatten(key, value, &mut entries);
            }

            for (key, value) in entries {
                if !is_config_path(&key) {
                    warn!(
                        layer = %layer.name(),
                        key = %key,
                        "skipping key that is not a valid configuration path"
                    );
                    continue;
                }
                builder = builder.set_override(&key, value).map_err(|e| {
                    ConfigError::LoadError(format!(
                        "Failed to merge key '{}' from layer '{}': {}",
                        key,
                        layer.name(),
                        e
                    ))
                })?;
            }
        }

        builder
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to build configuration: {}", e)))
    }
}

impl std::fmt::Debug for Composition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composition")
            .field("layers", &self.layer_names())
            .finish()
    }
}

/// Whether the `config` crate accepts `key` as an override path.
///
/// `set_override` consumes the builder, so a rejected key is detected on a
/// throwaway builder first.
fn is_config_path(key: &str) -> bool {
    config::Config::builder().set_override(key, "").is_ok()
}

/// Split non-empty tables into dotted leaf paths.
fn flatten(path: String, value: config::Value, out: &mut Vec<(String, config::Value)>) {
    match value.kind {
        ValueKind::Table(table) if !table.is_empty() => {
            for (key, child) in table {
                flatten(format!("{}.{}", path, key), child, out);
            }
        }
        kind => out.push((path, config::Value::new(None, kind))),
    }
}
