//! # Metrics Module
//!
//! Per-request results and the aggregate view of a run: counts, availability,
//! and latency statistics over the successful requests.

use std::fmt;
use std::time::Duration;

use crate::error::RequestError;

/// # Request Result
///
/// Outcome of one executed request. Built once by the executor and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult {
    /// 1-based position in the run
    pub index: u32,
    pub ok: bool,
    /// Wall time until completion or failure
    pub duration: Duration,
    /// Characters of streamed output, 0 on failure
    pub chars: usize,
    /// Failure message, empty on success
    pub error: String,
}

impl RequestResult {
    pub fn success(index: u32, duration: Duration, chars: usize) -> Self {
        Self {
            index,
            ok: true,
            duration,
            chars,
            error: String::new(),
        }
    }

    pub fn failure(index: u32, duration: Duration, error: &RequestError) -> Self {
        Self {
            index,
            ok: false,
            duration,
            chars: 0,
            error: error.to_string(),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Latency statistics over successful requests, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub average: f64,
    pub fastest: f64,
    pub slowest: f64,
}

impl LatencyStats {
    /// `None` when there are no samples.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let sum: f64 = samples.iter().sum();
        let fastest = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let slowest = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // Floating-point summation can land a hair outside [min, max].
        let average = (sum / samples.len() as f64).clamp(fastest, slowest);
        Some(Self {
            average,
            fastest,
            slowest,
        })
    }
}

/// # Run Summary
///
/// Read-only aggregate over the results of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub planned: u32,
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    /// Successful share of attempted requests (0.0 to 100.0)
    pub availability: f64,
    /// Wall time of the whole run
    pub total_runtime: Duration,
    /// Present if and only if at least one request succeeded
    pub latency: Option<LatencyStats>,
}

impl RunSummary {
    pub fn from_results(planned: u32, results: &[RequestResult], total_runtime: Duration) -> Self {
        let success_durations: Vec<f64> = results
            .iter()
            .filter(|result| result.ok)
            .map(RequestResult::duration_secs)
            .collect();

        let attempted = results.len();
        let successful = success_durations.len();
        let availability = if attempted == 0 {
            0.0
        } else {
            successful as f64 / attempted as f64 * 100.0
        };

        Self {
            planned,
            attempted,
            successful,
            failed: attempted - successful,
            availability,
            total_runtime,
            latency: LatencyStats::from_samples(&success_durations),
        }
    }

    /// Summary of a run that never reached the request loop.
    pub fn empty(planned: u32) -> Self {
        Self::from_results(planned, &[], Duration::ZERO)
    }
}

/// Terminal classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Success,
    PartialSuccess,
    Failed,
    ConfigError,
    RuntimeError,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::PartialSuccess => "PARTIAL_SUCCESS",
            RunStatus::Failed => "FAILED",
            RunStatus::ConfigError => "CONFIG_ERROR",
            RunStatus::RuntimeError => "RUNTIME_ERROR",
        }
    }

    /// Process exit status for this classification
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success | RunStatus::PartialSuccess => 0,
            RunStatus::Failed | RunStatus::RuntimeError => 1,
            RunStatus::ConfigError => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run status plus the message shown in the report header, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub message: Option<String>,
}

impl RunOutcome {
    /// Classify a completed request loop.
    pub fn classify(summary: &RunSummary) -> Self {
        if summary.attempted == 0 {
            Self::failed("No request attempted.")
        } else if summary.successful == 0 {
            Self::failed("All requests failed.")
        } else if summary.failed > 0 {
            Self {
                status: RunStatus::PartialSuccess,
                message: None,
            }
        } else {
            Self {
                status: RunStatus::Success,
                message: None,
            }
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::ConfigError,
            message: Some(message.into()),
        }
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::RuntimeError,
            message: Some(message.into()),
        }
    }

    fn failed(message: &str) -> Self {
        Self {
            status: RunStatus::Failed,
            message: Some(message.to_string()),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(index: u32, secs: f64) -> RequestResult {
        RequestResult::success(index, Duration::from_secs_f64(secs), 10)
    }

    fn failed(index: u32, secs: f64) -> RequestResult {
        RequestResult::failure(
            index,
            Duration::from_secs_f64(secs),
            &RequestError::Transport("timed out".to_string()),
        )
    }

    #[test]
    fn test_empty_run() {
        let summary = RunSummary::from_results(5, &[], Duration::ZERO);
        assert_eq!(summary.attempted, 0);
        assert_eq!(summary.availability, 0.0);
        assert!(summary.latency.is_none());

        let outcome = RunOutcome::classify(&summary);
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.message.as_deref(), Some("No request attempted."));
        assert_eq!(outcome.exit_code(), 1);
    }

    #[test]
    fn test_all_successful() {
        let results: Vec<_> = (1..=5).map(|i| ok(i, 1.0)).collect();
        let summary = RunSummary::from_results(5, &results, Duration::from_secs(5));
        assert_eq!(summary.successful, 5);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.availability, 100.0);
        let latency = summary.latency.unwrap();
        assert_eq!(latency.average, 1.0);
        assert_eq!(latency.fastest, 1.0);
        assert_eq!(latency.slowest, 1.0);

        let outcome = RunOutcome::classify(&summary);
        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.message, None);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_partial_success_stats_only_count_successes() {
        let results = vec![ok(1, 1.0), failed(2, 120.0), ok(3, 3.0)];
        let summary = RunSummary::from_results(3, &results, Duration::from_secs(124));
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.successful + summary.failed, summary.attempted);
        assert!((summary.availability - 200.0 / 3.0).abs() < 1e-9);

        let latency = summary.latency.unwrap();
        assert_eq!(latency.fastest, 1.0);
        assert_eq!(latency.slowest, 3.0);
        assert_eq!(latency.average, 2.0);

        let outcome = RunOutcome::classify(&summary);
        assert_eq!(outcome.status, RunStatus::PartialSuccess);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn test_all_failed() {
        let results = vec![failed(1, 0.5), failed(2, 0.7)];
        let summary = RunSummary::from_results(2, &results, Duration::from_secs(2));
        assert_eq!(summary.availability, 0.0);
        assert!(summary.latency.is_none());

        let outcome = RunOutcome::classify(&summary);
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.message.as_deref(), Some("All requests failed."));
    }

    #[test]
    fn test_average_between_min_and_max() {
        let samples = [0.1, 0.2, 0.3, 0.7, 1.3, 0.1];
        let stats = LatencyStats::from_samples(&samples).unwrap();
        assert!(stats.fastest <= stats.average && stats.average <= stats.slowest);
        assert_eq!(LatencyStats::from_samples(&[]), None);
    }

    #[test]
    fn test_status_exit_codes() {
        assert_eq!(RunStatus::Success.exit_code(), 0);
        assert_eq!(RunStatus::PartialSuccess.exit_code(), 0);
        assert_eq!(RunStatus::Failed.exit_code(), 1);
        assert_eq!(RunStatus::RuntimeError.exit_code(), 1);
        assert_eq!(RunStatus::ConfigError.exit_code(), 2);
        assert_eq!(RunStatus::PartialSuccess.to_string(), "PARTIAL_SUCCESS");
        assert_eq!(RunOutcome::config_error("bad").exit_code(), 2);
    }

    #[test]
    fn test_failure_result_shape() {
        let result = failed(4, 2.5);
        assert!(!result.ok);
        assert_eq!(result.chars, 0);
        assert!(result.error.starts_with("Network/Timeout error: "));
        assert_eq!(result.duration_secs(), 2.5);
    }
}
