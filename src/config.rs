//! # Probe Configuration
//!
//! Environment-first configuration for a probe run. Every setting is read by
//! name through a [`SettingsSource`], parsed into a typed value, validated, and
//! frozen into a [`RunConfig`] that is built once per run and shared read-only.
//!
//! The production source is the process environment (optionally primed from a
//! `.env` file by the binary); tests use a plain `HashMap`.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_API_URL: &str = "OPENAI_API_URL";
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MODEL: &str = "OPENAI_MODEL";
pub const ENV_PROMPT: &str = "OPENAI_PROMPT";
pub const ENV_REQUEST_COUNT: &str = "OPENAI_REQUEST_COUNT";
pub const ENV_REQUEST_TIMEOUT: &str = "OPENAI_REQUEST_TIMEOUT_SECONDS";
pub const ENV_MAX_RUNTIME: &str = "OPENAI_MAX_RUNTIME_SECONDS";
pub const ENV_MAX_TOKENS: &str = "OPENAI_MAX_TOKENS";
pub const ENV_REQUEST_PAUSE: &str = "OPENAI_REQUEST_PAUSE_SECONDS";
pub const ENV_TEMPERATURE: &str = "OPENAI_TEMPERATURE";
pub const ENV_README_PATH: &str = "OPENAI_README_PATH";
pub const ENV_CI_SUMMARY: &str = "GITHUB_STEP_SUMMARY";

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PROMPT: &str = "Please reply briefly: the service is available.";
pub const DEFAULT_REQUEST_COUNT: i64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: i64 = 120;
pub const DEFAULT_MAX_RUNTIME_SECONDS: i64 = 0;
pub const DEFAULT_MAX_TOKENS: i64 = 128;
pub const DEFAULT_REQUEST_PAUSE_SECONDS: f64 = 0.0;
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_README_PATH: &str = "README.md";

/// Where named settings come from.
pub trait SettingsSource {
    /// Raw value of a setting, `None` when it is not set at all.
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SettingsSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

impl SettingsSource for HashMap<&str, &str> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).map(|value| value.to_string())
    }
}

/// # Run Configuration
///
/// Immutable settings of one probe run. Numeric fields keep the units they are
/// configured in so the report can echo them back verbatim; use the accessor
/// methods for `Duration`s.
#[derive(Clone, PartialEq)]
pub struct RunConfig {
    /// Chat-completions endpoint receiving the POST requests
    pub api_url: String,
    /// Bearer credential; never logged or rendered
    pub api_key: String,
    pub model: String,
    pub prompt: String,
    /// Planned number of sequential requests (> 0)
    pub request_count: u32,
    /// Per-request timeout covering connect and full body read (> 0)
    pub request_timeout_seconds: u64,
    /// Wall-clock budget for the whole run, 0 means unlimited
    pub max_runtime_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Sleep between consecutive requests (>= 0)
    pub request_pause_seconds: f64,
    /// Document whose delimited region receives the report
    pub output_path: PathBuf,
    /// CI step summary file, appended to when present
    pub ci_summary_path: Option<PathBuf>,
}

impl RunConfig {
    /// Read, parse and validate every setting from `source`.
    ///
    /// Settings are read in a fixed order and the first failure wins, so the
    /// returned error always names a single setting.
    pub fn resolve(source: &impl SettingsSource) -> Result<Self, ConfigError> {
        let api_url = env_str(source, ENV_API_URL, DEFAULT_API_URL);
        let api_key = env_required(source, ENV_API_KEY)?;
        let model = env_str(source, ENV_MODEL, DEFAULT_MODEL);
        let prompt = env_str(source, ENV_PROMPT, DEFAULT_PROMPT);
        let request_count = env_int(source, ENV_REQUEST_COUNT, DEFAULT_REQUEST_COUNT)?;
        let request_timeout = env_int(source, ENV_REQUEST_TIMEOUT, DEFAULT_REQUEST_TIMEOUT_SECONDS)?;
        let max_runtime = env_int(source, ENV_MAX_RUNTIME, DEFAULT_MAX_RUNTIME_SECONDS)?;
        let max_tokens = env_int(source, ENV_MAX_TOKENS, DEFAULT_MAX_TOKENS)?;
        let pause = env_float(source, ENV_REQUEST_PAUSE, DEFAULT_REQUEST_PAUSE_SECONDS)?;
        let temperature = env_float(source, ENV_TEMPERATURE, DEFAULT_TEMPERATURE)?;

        let request_count = positive(ENV_REQUEST_COUNT, request_count)?;
        let request_timeout_seconds = positive(ENV_REQUEST_TIMEOUT, request_timeout)?;
        let max_tokens = positive(ENV_MAX_TOKENS, max_tokens)?;
        let max_runtime_seconds = non_negative(ENV_MAX_RUNTIME, max_runtime)?;
        if pause < 0.0 {
            return Err(ConfigError::MustBeNonNegative { name: ENV_REQUEST_PAUSE });
        }
        if Duration::try_from_secs_f64(pause).is_err() {
            return Err(ConfigError::OutOfRange {
                name: ENV_REQUEST_PAUSE,
                value: pause.to_string(),
            });
        }

        Ok(Self {
            api_url,
            api_key,
            model,
            prompt,
            request_count,
            request_timeout_seconds,
            max_runtime_seconds,
            max_tokens,
            temperature,
            request_pause_seconds: pause,
            output_path: output_path(source),
            ci_summary_path: ci_summary_path(source),
        })
    }

    /// Best-effort configuration for reporting a run whose settings could not
    /// be resolved.
    ///
    /// Every setting that parses is kept as read, even when it failed
    /// validation; settings that do not parse (or do not fit their field)
    /// fall back to their defaults. The credential is never carried over.
    pub fn fallback(source: &impl SettingsSource) -> Self {
        Self {
            api_url: env_str(source, ENV_API_URL, DEFAULT_API_URL),
            api_key: String::new(),
            model: env_str(source, ENV_MODEL, DEFAULT_MODEL),
            prompt: env_str(source, ENV_PROMPT, DEFAULT_PROMPT),
            request_count: lenient_int(source, ENV_REQUEST_COUNT, DEFAULT_REQUEST_COUNT as u32),
            request_timeout_seconds: lenient_int(source, ENV_REQUEST_TIMEOUT, DEFAULT_REQUEST_TIMEOUT_SECONDS as u64),
            max_runtime_seconds: lenient_int(source, ENV_MAX_RUNTIME, DEFAULT_MAX_RUNTIME_SECONDS as u64),
            max_tokens: lenient_int(source, ENV_MAX_TOKENS, DEFAULT_MAX_TOKENS as u32),
            temperature: env_float(source, ENV_TEMPERATURE, DEFAULT_TEMPERATURE).unwrap_or(DEFAULT_TEMPERATURE),
            request_pause_seconds: env_float(source, ENV_REQUEST_PAUSE, DEFAULT_REQUEST_PAUSE_SECONDS)
                .unwrap_or(DEFAULT_REQUEST_PAUSE_SECONDS),
            output_path: output_path(source),
            ci_summary_path: ci_summary_path(source),
        }
    }

    /// Create a test configuration pointed at `api_url`.
    /// This is used for testing purposes only.
    pub fn for_test(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: "sk-test".to_string(),
            model: "test-model".to_string(),
            prompt: "ping".to_string(),
            request_count: 3,
            request_timeout_seconds: 5,
            max_runtime_seconds: 0,
            max_tokens: 16,
            temperature: 0.1,
            request_pause_seconds: 0.0,
            output_path: PathBuf::from(DEFAULT_README_PATH),
            ci_summary_path: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Runtime budget, `None` when unlimited.
    pub fn runtime_budget(&self) -> Option<Duration> {
        (self.max_runtime_seconds > 0).then(|| Duration::from_secs(self.max_runtime_seconds))
    }

    /// Pause between requests, `None` when disabled or not representable.
    pub fn request_pause(&self) -> Option<Duration> {
        if self.request_pause_seconds > 0.0 {
            Duration::try_from_secs_f64(self.request_pause_seconds).ok()
        } else {
            None
        }
    }

    /// Endpoint reduced to scheme and host, safe to log.
    pub fn safe_api_url(&self) -> String {
        match url::Url::parse(&self.api_url) {
            Ok(url) => format!("{}://{}", url.scheme(), url.host_str().unwrap_or("unknown")),
            Err(_) => "invalid-url".to_string(),
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("prompt", &self.prompt)
            .field("request_count", &self.request_count)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("max_runtime_seconds", &self.max_runtime_seconds)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_pause_seconds", &self.request_pause_seconds)
            .field("output_path", &self.output_path)
            .field("ci_summary_path", &self.ci_summary_path)
            .finish()
    }
}

fn non_empty(source: &impl SettingsSource, name: &str) -> Option<String> {
    source.get(name).filter(|value| !value.is_empty())
}

fn env_str(source: &impl SettingsSource, name: &str, default: &str) -> String {
    non_empty(source, name).unwrap_or_else(|| default.to_string())
}

fn env_required(source: &impl SettingsSource, name: &'static str) -> Result<String, ConfigError> {
    non_empty(source, name).ok_or(ConfigError::Missing { name })
}

fn env_int(source: &impl SettingsSource, name: &'static str, default: i64) -> Result<i64, ConfigError> {
    match non_empty(source, name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidInteger { name, value }),
    }
}

fn env_float(source: &impl SettingsSource, name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let Some(value) = non_empty(source, name) else {
        return Ok(default);
    };
    match value.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        Ok(_) => Err(ConfigError::NonFinite { name, value }),
        Err(_) => Err(ConfigError::InvalidNumber { name, value }),
    }
}

/// Parsed value of an integer setting if it fits `T`, else `default`.
fn lenient_int<T: TryFrom<i64>>(source: &impl SettingsSource, name: &str, default: T) -> T {
    non_empty(source, name)
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|value| T::try_from(value).ok())
        .unwrap_or(default)
}

fn positive<T: TryFrom<i64>>(name: &'static str, value: i64) -> Result<T, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::MustBePositive { name });
    }
    // Values beyond the target type are as unusable as non-positive ones.
    T::try_from(value).map_err(|_| ConfigError::InvalidInteger {
        name,
        value: value.to_string(),
    })
}

fn non_negative(name: &'static str, value: i64) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::MustBeNonNegative { name })
}

fn output_path(source: &impl SettingsSource) -> PathBuf {
    PathBuf::from(env_str(source, ENV_README_PATH, DEFAULT_README_PATH))
}

fn ci_summary_path(source: &impl SettingsSource) -> Option<PathBuf> {
    non_empty(source, ENV_CI_SUMMARY).map(PathBuf::from)
}
