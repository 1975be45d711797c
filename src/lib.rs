//! # stream_probe - Streaming Chat-Completion Availability Probe
//!
//! Measures whether an OpenAI-compatible chat-completion endpoint is up and how
//! fast it streams. A run issues a fixed number of streaming requests one after
//! another, records per-request outcome and latency, and writes a Markdown
//! report into a delimited region of a document (and optionally a CI step
//! summary).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stream_probe::{run_probe, ProbeOptions, ProcessEnv};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Reads OPENAI_API_KEY and friends from the environment
//!     let report = run_probe(&ProcessEnv, ProbeOptions::default()).await;
//!     std::process::exit(report.exit_code());
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Settings resolution and validation
//! - [`streaming`] - SSE frame decoding
//! - [`executor`] - One streaming request per call, failures folded into results
//! - [`runner`] - Sequential request loop with pause and runtime budget
//! - [`metrics`] - Per-request results, run summary and outcome classification
//! - [`report`] - Markdown rendering
//! - [`persistence`] - Document region replacement and CI summary sink
//! - [`app`] - The end-to-end session

// Core infrastructure
pub mod core;
pub mod config;
pub mod error;
pub mod schemas;

// Probe pipeline
pub mod streaming;
pub mod executor;
pub mod runner;
pub mod metrics;
pub mod report;
pub mod persistence;
pub mod app;

// Re-export commonly used types for convenience
pub use app::{run_probe, ProbeOptions, ProbeReport};
pub use config::{ProcessEnv, RunConfig, SettingsSource};
pub use error::{ConfigError, ProbeError, RequestError};
pub use executor::{Probe, RequestExecutor};
pub use metrics::{RequestResult, RunOutcome, RunStatus, RunSummary};
pub use runner::{BenchmarkRunner, RunPlan, RunRecord};
pub use schemas::{ChatCompletionRequest, Message};
pub use self::core::http_client::{HttpClientBuilder, HttpClientConfig};

/// The result type used throughout the library
pub type Result<T> = std::result::Result<T, ProbeError>;
