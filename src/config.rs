//! Client configuration.
//!
//! Everything the HTTP side needs lives in [`ClientConfig`], built via
//! [`ClientConfig::builder`]. The defaults talk to the public ConvertAPI
//! endpoint; tests point `base_url` at a local mock server.

use crate::error::ConvertApiError;
use crate::progress::ConversionProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default service root. The request path is appended as
/// `/convert/{from}/to/{to}`.
pub const DEFAULT_BASE_URL: &str = "https://v2.convertapi.com";

/// Upper bound on one whole request/response exchange: 30 minutes.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1800;

/// `convertapi-cli/<version> (<os>)`
pub fn default_user_agent() -> String {
    format!(
        "convertapi-cli/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// Configuration for a [`crate::client::ConvertApiClient`].
///
/// # Example
/// ```rust
/// use convertapi_cli::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://127.0.0.1:8080")
///     .timeout_secs(60)
///     .build()
///     .unwrap();
/// assert_eq!(config.timeout_secs, 60);
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Scheme, host and optional port, without a trailing slash.
    pub base_url: String,

    /// Timeout covering connect, upload, response headers and the whole
    /// response body. Default: 1800.
    pub timeout_secs: u64,

    pub user_agent: String,

    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ConversionProgressCallback>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the conversion endpoint.
    pub fn endpoint(&self, from_format: &str, to_format: &str) -> String {
        format!(
            "{}/convert/{}/to/{}",
            self.base_url.trim_end_matches('/'),
            from_format,
            to_format
        )
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ConversionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ConvertApiError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ConvertApiError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.timeout_secs == 0 {
            return Err(ConvertApiError::InvalidConfig(
                "Timeout must be at least 1 second".into(),
            ));
        }
        if c.user_agent.trim().is_empty() {
            return Err(ConvertApiError::InvalidConfig(
                "User agent must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
