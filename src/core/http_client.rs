//! # HTTP Client Factory
//!
//! Centralized HTTP client creation so every probe request goes out with the
//! same timeout and connection settings.

use crate::config::RunConfig;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// HTTP client configuration errors
#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Failed to build HTTP client: {0}")]
    BuildError(#[from] reqwest::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Deadline for the whole request, from connecting until the body is read
    pub timeout: Duration,
    /// Deadline for establishing the connection; never shorter than `timeout`
    pub connect_timeout: Duration,
    /// Idle connections kept between sequential requests
    pub max_idle_per_host: usize,
    pub tcp_keepalive: Option<Duration>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(120),
            max_idle_per_host: 1,
            tcp_keepalive: Some(Duration::from_secs(60)),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl From<&RunConfig> for HttpClientConfig {
    fn from(config: &RunConfig) -> Self {
        let timeout = config.request_timeout();
        Self {
            timeout,
            // The request timeout bounds the whole cycle, connecting included.
            connect_timeout: timeout,
            ..Self::default()
        }
    }
}

/// HTTP client builder with configurable options
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    /// Create a new HTTP client builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    /// Create HTTP client builder from the run configuration
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            config: HttpClientConfig::from(config),
        }
    }

    /// Set the request timeout, which also bounds connecting
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self.config.connect_timeout = timeout;
        self
    }

    /// Build the HTTP client
    pub fn build(self) -> Result<Client, HttpClientError> {
        if self.config.timeout.is_zero() {
            return Err(HttpClientError::InvalidConfig("request timeout must be greater than 0".to_string()));
        }

        let mut builder = Client::builder()
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .pool_max_idle_per_host(self.config.max_idle_per_host)
            .user_agent(self.config.user_agent);

        if let Some(keepalive) = self.config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        builder.build().map_err(HttpClientError::from)
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
