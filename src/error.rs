//! Error types for periodic-config.

use std::time::Duration;

/// Result type alias for periodic-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when fetching, caching or composing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The value source could not be reached (connectivity or I/O failure).
    #[error("Configuration source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source answered, but its content could not be turned into a snapshot.
    #[error("Configuration source returned malformed content: {0}")]
    SourceMalformed(String),

    /// The fetch was aborted because the refresher is shutting down.
    #[error("Configuration fetch cancelled")]
    Cancelled,

    /// The first fetch did not complete within the startup timeout.
    #[error("Initial configuration fetch did not complete within {0:?}")]
    StartupTimeout(Duration),

    /// The first fetch completed but failed, and the startup policy requires it.
    #[error("Initial configuration fetch failed: {0}")]
    InitialFetchFailed(String),

    /// Refresher settings were rejected (e.g. a zero refresh period).
    #[error("Invalid refresh settings: {0}")]
    InvalidSettings(String),

    /// Failed to load or merge a configuration layer.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to deserialize configuration.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Create a `SourceUnavailable` error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Create a `SourceMalformed` error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::SourceMalformed(msg.into())
    }

    /// Whether this error belongs to the fetch failure taxonomy
    /// (`SourceUnavailable`, `SourceMalformed` or `Cancelled`).
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_) | Self::SourceMalformed(_) | Self::Cancelled
        )
    }
}
