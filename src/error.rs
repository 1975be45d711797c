//! # Error Types
//!
//! Error taxonomy for the probe. Configuration problems are fatal to the whole
//! run, request problems are recorded per request and never abort the run, and
//! session-level problems (client construction, I/O, panics) end the run with
//! a runtime error while still producing a report.

use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::http_client::HttpClientError;

/// Bad or missing settings. Every variant names the offending setting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {name}")]
    Missing { name: &'static str },

    #[error("{name} must be an integer, got: {value}")]
    InvalidInteger { name: &'static str, value: String },

    #[error("{name} must be a number, got: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be a finite number, got: {value}")]
    NonFinite { name: &'static str, value: String },

    #[error("{name} must be > 0")]
    MustBePositive { name: &'static str },

    #[error("{name} must be >= 0")]
    MustBeNonNegative { name: &'static str },

    #[error("{name} is out of range, got: {value}")]
    OutOfRange { name: &'static str, value: String },
}

impl ConfigError {
    /// Name of the setting that failed resolution.
    pub fn setting(&self) -> &'static str {
        match self {
            ConfigError::Missing { name }
            | ConfigError::InvalidInteger { name, .. }
            | ConfigError::InvalidNumber { name, .. }
            | ConfigError::NonFinite { name, .. }
            | ConfigError::MustBePositive { name }
            | ConfigError::MustBeNonNegative { name }
            | ConfigError::OutOfRange { name, .. } => name,
        }
    }
}

/// # Request Errors
///
/// Failure kinds of a single request/response cycle. All of them degrade to the
/// same failed `RequestResult`; only the message prefix tells them apart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// The server answered with a non-200 status.
    #[error("HTTP {status}: {body}")]
    Protocol { status: u16, body: String },

    /// Connection, DNS, socket or timeout failure.
    #[error("Network/Timeout error: {0}")]
    Transport(String),

    /// Anything not classified above.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for RequestError {
    /// Classify reqwest failures by where in the cycle they happened.
    ///
    /// Timeouts, connect failures and failures while sending the request or
    /// reading the body are transport problems. Builder, redirect and decode
    /// failures are not, and fall through to `Unexpected`.
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            RequestError::Transport(message)
        } else if let Some(status) = err.status() {
            RequestError::Protocol {
                status: status.as_u16(),
                body: message,
            }
        } else {
            RequestError::Unexpected(message)
        }
    }
}

/// Session-level failures that end the run early.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    HttpClient(#[from] HttpClientError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected runtime error: {0}")]
    Runtime(String),
}

impl ProbeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProbeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Render an error followed by its sources, joined with `": "`.
///
/// reqwest's top-level message ("error sending request for url ...") hides the
/// actual cause, which lives further down the chain.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
