//! Remote HTTP/HTTPS value source.

use super::ValueSource;
use crate::core::Snapshot;
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Authentication method for HTTP requests.
#[derive(Clone)]
pub enum HttpAuth {
    /// No authentication
    None,
    /// Bearer token authentication
    Bearer(String),
    /// Basic authentication (username, password)
    Basic(String, String),
}

/// HTTP-based value source.
///
/// Fetches a JSON object from a remote endpoint and flattens it into a
/// snapshot: nested objects become dotted keys (`server.port`), array elements
/// become indexed keys (`hosts[0]`) and scalars are stringified. `null` and
/// empty arrays or objects become keys without a value.
///
/// # Examples
///
/// ```rust,no_run
/// use periodic_config::sources::HttpSource;
/// use std::time::Duration;
///
/// # fn example() -> periodic_config::error::Result<()> {
/// let source = HttpSource::builder()
///     .with_url("https://config.example.com/api/config")
///     .with_auth_token("secret-token")
///     .with_timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HttpSource {
    url: String,
    client: Client,
    auth: HttpAuth,
}

impl HttpSource {
    /// Create a new builder for constructing an HTTP source.
    pub fn builder() -> HttpSourceBuilder {
        HttpSourceBuilder::new()
    }

    async fn request(&self) -> Result<Snapshot> {
        let mut request = self.client.get(&self.url);

        // Bearer tokens are validated in `build` and sent as a default header.
        if let HttpAuth::Basic(username, password) = &self.auth {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConfigError::unavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::unavailable(format!(
                "HTTP request failed with status {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ConfigError::unavailable(format!("Failed to read body: {}", e)))?;

        let json: JsonValue = serde_json::from_slice(&body)
            .map_err(|e| ConfigError::malformed(format!("Failed to parse JSON: {}", e)))?;

        json_to_snapshot(json)
    }
}

#[async_trait]
impl ValueSource for HttpSource {
    async fn fetch(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConfigError::Cancelled),
            result = self.request() => result,
        }
    }

    fn name(&self) -> String {
        format!("http:{}", self.url)
    }
}

/// Builder for constructing an `HttpSource`.
pub struct HttpSourceBuilder {
    url: Option<String>,
    auth: HttpAuth,
    timeout: Duration,
}

impl HttpSourceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: None,
            auth: HttpAuth::None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the URL to fetch configuration from.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set Bearer token authentication.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth = HttpAuth::Bearer(token.into());
        self
    }

    /// Set Basic authentication.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = HttpAuth::Basic(username.into(), password.into());
        self
    }

    /// Set the request timeout. Default is 10 seconds.
    ///
    /// The timeout bounds how long a single fetch can hold up shutdown if the
    /// server stops responding.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the HTTP source.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if no URL is provided or the bearer token is
    /// not a valid header value, and `Other` if the HTTP client cannot be
    /// constructed.
    pub fn build(self) -> Result<HttpSource> {
        let url = self.url.ok_or_else(|| {
            ConfigError::InvalidSettings("URL is required for HttpSource".to_string())
        })?;

        let mut headers = HeaderMap::new();
        if let HttpAuth::Bearer(token) = &self.auth {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                ConfigError::InvalidSettings(format!("Invalid bearer token: {}", e))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpSource {
            url,
            client,
            auth: self.auth,
        })
    }
}

impl Default for HttpSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten a JSON object into a snapshot.
fn json_to_snapshot(json: JsonValue) -> Result<Snapshot> {
    match json {
        JsonValue::Object(map) => {
            let mut values = HashMap::new();
            for (key, value) in map {
                flatten_into(&mut values, key, value);
            }
            Ok(Snapshot::new(values))
        }
        other => Err(ConfigError::malformed(format!(
            "Expected JSON object at root level, got {}",
            json_kind(&other)
        ))),
    }
}

fn flatten_into(out: &mut HashMap<String, Option<String>>, path: String, value: JsonValue) {
    match value {
        JsonValue::Null => {
            out.insert(path, None);
        }
        JsonValue::Bool(b) => {
            out.insert(path, Some(b.to_string()));
        }
        JsonValue::Number(n) => {
            out.insert(path, Some(n.to_string()));
        }
        JsonValue::String(s) => {
            out.insert(path, Some(s));
        }
        JsonValue::Array(items) if items.is_empty() => {
            out.insert(path, None);
        }
        JsonValue::Object(map) if map.is_empty() => {
            out.insert(path, None);
        }
        JsonValue::Array(items) => {
            for (index, item) in items.into_iter().enumerate() {
                flatten_into(out, format!("{}[{}]", path, index), item);
            }
        }
        JsonValue::Object(map) => {
            for (key, item) in map {
                flatten_into(out, format!("{}.{}", path, key), item);
            }
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
