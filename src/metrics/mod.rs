//! Built-in metrics for periodic refresh.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Fetch attempts/success/failures
//! - Fetch duration
//! - Ticks dropped by the single-flight rule
//! - Keys in the current snapshot
//!
//! # Examples
//!
//! ```rust,no_run
//! use periodic_config::prelude::*;
//! use opentelemetry::global;
//!
//! # async fn example(source: periodic_config::sources::FnSource) -> Result<()> {
//! let layer = PeriodicLayer::builder("settings-db", source)
//!     .with_metrics(global::meter("my-app"))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod refresh_metrics;

pub use refresh_metrics::RefreshMetrics;
