//! Environment variable configuration layer.

use super::ConfigLayer;
use crate::error::{ConfigError, Result};
use config::Environment;
use std::collections::HashMap;

/// Configuration layer read from prefixed environment variables.
///
/// `APP_SERVER__PORT=8080` with prefix `APP` and separator `__` becomes
/// `server.port = 8080`.
pub struct EnvLayer {
    prefix: String,
    separator: String,
    priority: i32,
}

impl EnvLayer {
    /// Create an environment layer with the default priority (300).
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: separator.into(),
            priority: 300,
        }
    }

    /// Set the priority for this layer.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl ConfigLayer for EnvLayer {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let env_source = Environment::with_prefix(&self.prefix)
            .prefix_separator("_")
            .separator(&self.separator)
            .try_parsing(true);

        config::Config::builder()
            .add_source(env_source)
            .build()
            .map_err(|e| {
                ConfigError::LoadError(format!("Failed to load environment variables: {}", e))
            })?
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| {
                ConfigError::DeserializationError(format!(
                    "Failed to parse environment variables: {}",
                    e
                ))
            })
    }

    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
