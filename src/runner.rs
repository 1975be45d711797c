//! # Benchmark Runner
//!
//! Issues the planned requests strictly one after another. Between requests
//! it applies the optional pause, and before each request it checks the
//! optional wall-clock budget. The budget is only checked at request
//! boundaries: a request already in flight is never cut short, so a slow
//! request can overrun the budget by up to its own timeout.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::executor::Probe;
use crate::metrics::{RequestResult, RunSummary};

/// Scheduling parameters of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunPlan {
    pub request_count: u32,
    /// Stop starting new requests once this much time has passed
    pub runtime_budget: Option<Duration>,
    /// Sleep between consecutive requests
    pub pause: Option<Duration>,
}

impl From<&RunConfig> for RunPlan {
    fn from(config: &RunConfig) -> Self {
        Self {
            request_count: config.request_count,
            runtime_budget: config.runtime_budget(),
            pause: config.request_pause(),
        }
    }
}

/// What the request loop produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    /// Results in execution order; requests skipped by the budget are absent
    pub results: Vec<RequestResult>,
    pub total_runtime: Duration,
    /// Whether the runtime budget ended the loop before all planned requests
    pub stopped_early: bool,
}

impl RunRecord {
    pub fn summary(&self, planned: u32) -> RunSummary {
        RunSummary::from_results(planned, &self.results, self.total_runtime)
    }
}

/// # Benchmark Runner
///
/// Owns the result sequence and the run start instant for the duration of a
/// run. Generic over the [`Probe`] so the loop can be driven without a network.
pub struct BenchmarkRunner<P> {
    probe: P,
    plan: RunPlan,
}

impl<P: Probe> BenchmarkRunner<P> {
    pub fn new(probe: P, plan: RunPlan) -> Self {
        Self { probe, plan }
    }

    pub async fn run(&self) -> RunRecord {
        let total = self.plan.request_count;
        let started = Instant::now();
        let mut results = Vec::new();
        let mut stopped_early = false;

        for index in 1..=total {
            if let Some(budget) = self.plan.runtime_budget {
                let elapsed = started.elapsed();
                if elapsed >= budget {
                    warn!(
                        request = index,
                        elapsed_secs = elapsed.as_secs_f64(),
                        "Reached max runtime limit ({}s). Stopping early at request {}.",
                        budget.as_secs(),
                        index
                    );
                    stopped_early = true;
                    break;
                }
            }

            results.push(self.probe.probe(index, total).await);

            if let Some(pause) = self.plan.pause {
                if index != total {
                    sleep(pause).await;
                }
            }
        }

        let total_runtime = started.elapsed();
        info!(
            attempted = results.len(),
            planned = total,
            total_runtime_secs = total_runtime.as_secs_f64(),
            "Request loop finished"
        );

        RunRecord {
            results,
            total_runtime,
            stopped_early,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use crate::metrics::{RunOutcome, RunStatus};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Probe that takes a fixed time and fails on selected indices.
    struct FakeProbe {
        latency: Duration,
        failing: Vec<u32>,
        calls: AtomicU32,
    }

    impl FakeProbe {
        fn new(latency: Duration) -> Self {
            Self {
                latency,
                failing: Vec::new(),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(mut self, indices: &[u32]) -> Self {
            self.failing = indices.to_vec();
            self
        }
    }

    #[async_trait::async_trait]
    impl Probe for FakeProbe {
        async fn probe(&self, index: u32, _total: u32) -> RequestResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let started = Instant::now();
            sleep(self.latency).await;
            if self.failing.contains(&index) {
                RequestResult::failure(index, started.elapsed(), &RequestError::Transport("timed out".into()))
            } else {
                RequestResult::success(index, started.elapsed(), 12)
            }
        }
    }

    fn plan(request_count: u32, budget_secs: u64, pause_secs: u64) -> RunPlan {
        RunPlan {
            request_count,
            runtime_budget: (budget_secs > 0).then(|| Duration::from_secs(budget_secs)),
            pause: (pause_secs > 0).then(|| Duration::from_secs(pause_secs)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_requests_succeed() {
        let runner = BenchmarkRunner::new(FakeProbe::new(Duration::from_secs(1)), plan(5, 0, 0));
        let record = runner.run().await;

        assert_eq!(record.results.len(), 5);
        assert!(!record.stopped_early);
        let indices: Vec<u32> = record.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);

        let summary = record.summary(5);
        assert_eq!(summary.successful, 5);
        let outcome = RunOutcome::classify(&summary);
        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_budget_stops_before_next_request() {
        let runner = BenchmarkRunner::new(FakeProbe::new(Duration::from_secs(1)), plan(5, 2, 0));
        let record = runner.run().await;

        assert_eq!(record.results.len(), 2);
        assert!(record.stopped_early);
        assert_eq!(runner.probe.calls.load(Ordering::SeqCst), 2);
        assert!(record.results.iter().all(|r| r.index <= 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_always_runs_under_budget() {
        let runner = BenchmarkRunner::new(FakeProbe::new(Duration::from_secs(10)), plan(3, 1, 0));
        let record = runner.run().await;

        // The slow first request overruns the budget instead of being cut short.
        assert_eq!(record.results.len(), 1);
        assert!(record.total_runtime >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_request_count_bounded_by_budget() {
        let runner = BenchmarkRunner::new(FakeProbe::new(Duration::from_secs(2)), plan(u32::MAX, 1, 0));
        let record = runner.run().await;

        assert_eq!(record.results.len(), 1);
        assert!(record.stopped_early);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_not_applied_after_last_request() {
        let runner = BenchmarkRunner::new(FakeProbe::new(Duration::from_secs(1)), plan(3, 0, 2));
        let record = runner.run().await;

        assert_eq!(record.results.len(), 3);
        // Three requests plus two pauses.
        assert!(record.total_runtime >= Duration::from_secs(7));
        assert!(record.total_runtime < Duration::from_millis(7100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_counts_towards_budget() {
        let runner = BenchmarkRunner::new(FakeProbe::new(Duration::from_secs(1)), plan(5, 3, 1));
        let record = runner.run().await;

        // Request 3 would start at t=4s, past the 3s budget.
        assert_eq!(record.results.len(), 2);
        assert!(record.stopped_early);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort_the_run() {
        let probe = FakeProbe::new(Duration::from_millis(200)).failing(&[2, 4]);
        let runner = BenchmarkRunner::new(probe, plan(5, 0, 0));
        let record = runner.run().await;

        assert_eq!(record.results.len(), 5);
        let summary = record.summary(5);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.successful, 3);
        assert_eq!(RunOutcome::classify(&summary).status, RunStatus::PartialSuccess);
    }

    #[test]
    fn test_plan_from_config() {
        let mut config = RunConfig::for_test("http://localhost:8000");
        config.request_count = 7;
        config.max_runtime_seconds = 60;
        config.request_pause_seconds = 0.25;

        let plan = RunPlan::from(&config);
        assert_eq!(plan.request_count, 7);
        assert_eq!(plan.runtime_budget, Some(Duration::from_secs(60)));
        assert_eq!(plan.pause, Some(Duration::from_millis(250)));
    }
}
