//! # periodic-config
//!
//! Periodically refreshed configuration layers with lock-free snapshot reads.
//!
//! ## Overview
//!
//! `periodic-config` pulls a full key/value snapshot from an external store on
//! a fixed timer and exposes it as one layer of a layered configuration:
//! - A [`sources::ValueSource`] produces complete snapshots on demand
//! - A [`core::PeriodicRefresher`] drives it, one fetch at a time
//! - A [`core::SnapshotCache`] holds the current snapshot behind `arc-swap`
//! - A [`layer::PeriodicLayer`] plugs the cache into a [`layer::Composition`]
//!   and signals subscribers after every swap
//!
//! A failed fetch never touches the cached snapshot: the last known good
//! configuration stays visible until the next successful tick.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use periodic_config::prelude::*;
//! use periodic_config::sources::{ConfigurationRecord, RecordSource, RecordStore};
//! use serde::Deserialize;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! struct SettingsTable;
//!
//! #[async_trait::async_trait]
//! impl RecordStore for SettingsTable {
//!     type Record = ConfigurationRecord;
//!
//!     async fn load_records(&self, _cancel: &CancellationToken) -> Result<Vec<ConfigurationRecord>> {
//!         Ok(vec![ConfigurationRecord::new("server.port", "8080")])
//!     }
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct ServerConfig {
//!     port: u16,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     server: ServerConfig,
//! }
//!
//! # async fn example() -> Result<()> {
//! let settings = PeriodicLayer::register(
//!     "settings-db",
//!     RecordSource::new(SettingsTable),
//!     Duration::from_secs(300),
//! )
//! .await?;
//!
//! let config = Composition::new()
//!     .with_file("config/default.yaml")
//!     .with_layer(settings.clone())
//!     .with_env("APP", "__")
//!     .bind::<AppConfig>()?;
//!
//! // Lock-free reads, rebuilt after every successful refresh
//! println!("Server port: {}", config.get().server.port);
//!
//! settings.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `remote`: HTTP value source (`reqwest`)
//! - `metrics`: OpenTelemetry refresh metrics

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod layer;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{BoundConfig, Snapshot, SnapshotCache, StartupPolicy};
    pub use crate::error::{ConfigError, Result};
    pub use crate::layer::{Composition, ConfigLayer, PeriodicLayer};
    pub use crate::sources::ValueSource;
}
