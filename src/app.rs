//! # Probe Session
//!
//! End-to-end pipeline of one probe run: resolve the configuration, run the
//! requests, classify the outcome, render the report and persist it. A report
//! is produced for every run, including runs that never got past
//! configuration, so the output document always reflects the latest attempt.

use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::{RunConfig, SettingsSource};
use crate::error::{error_chain, ProbeError};
use crate::executor::RequestExecutor;
use crate::metrics::{RequestResult, RunOutcome, RunSummary};
use crate::persistence;
use crate::report::{MarkdownReport, ReportBuilder};
use crate::runner::{BenchmarkRunner, RunPlan, RunRecord};

/// Session options that are not part of the probe configuration.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOptions {
    /// Print streamed tokens to stdout while requests run
    pub echo_tokens: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self { echo_tokens: true }
    }
}

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub run_id: Uuid,
    /// Resolved configuration, or the fallback used to report a config error
    pub config: RunConfig,
    pub outcome: RunOutcome,
    pub summary: RunSummary,
    pub results: Vec<RequestResult>,
    pub report: MarkdownReport,
    /// Sinks that could not be written
    pub persist_errors: Vec<String>,
}

impl ProbeReport {
    /// Process exit status. A run that would otherwise exit 0 exits 1 when a
    /// sink could not be written.
    pub fn exit_code(&self) -> i32 {
        match self.outcome.exit_code() {
            0 if !self.persist_errors.is_empty() => 1,
            code => code,
        }
    }
}

/// Run a complete probe session with settings read from `source`.
///
/// Never fails: configuration, runtime and persistence problems are all
/// reflected in the returned [`ProbeReport`] and its exit code. Must be called
/// from within a tokio runtime.
pub async fn run_probe(source: &impl SettingsSource, options: ProbeOptions) -> ProbeReport {
    let run_id = Uuid::new_v4();
    let span = info_span!("probe_run", %run_id);

    async move {
        let (config, run) = match RunConfig::resolve(source) {
            Ok(config) => {
                log_run_config(&config);
                let run = execute_run(&config, options).await;
                (config, run)
            }
            Err(err) => {
                error!(setting = err.setting(), "Configuration error: {}", err);
                (RunConfig::fallback(source), Err(ProbeError::from(err)))
            }
        };

        let (record, outcome) = match run {
            Ok(record) => {
                let outcome = RunOutcome::classify(&record.summary(config.request_count));
                (record, outcome)
            }
            Err(ProbeError::Config(err)) => (RunRecord::default(), RunOutcome::config_error(err.to_string())),
            Err(err) => {
                let message = runtime_message(&err);
                error!(error = %message, "Probe run aborted");
                (RunRecord::default(), RunOutcome::runtime_error(message))
            }
        };

        let summary = record.summary(config.request_count);
        log_summary(&summary, &outcome);

        let report = ReportBuilder::new(&config, &summary, &record.results, &outcome, Utc::now())
            .run_id(run_id)
            .build();
        let persist_errors = persist(&config, &report, &record.results);

        ProbeReport {
            run_id,
            config,
            outcome,
            summary,
            results: record.results,
            report,
            persist_errors,
        }
    }
    .instrument(span)
    .await
}

/// Drive the request loop in its own task so a panic ends the run as a
/// runtime error instead of taking the process down.
async fn execute_run(config: &RunConfig, options: ProbeOptions) -> Result<RunRecord, ProbeError> {
    let config = Arc::new(config.clone());

    let task = async move {
        let plan = RunPlan::from(config.as_ref());
        let executor = RequestExecutor::new(config)?.echo_tokens(options.echo_tokens);
        Ok::<RunRecord, ProbeError>(BenchmarkRunner::new(executor, plan).run().await)
    };

    tokio::spawn(task.in_current_span()).await.map_err(|err| {
        if err.is_panic() {
            ProbeError::Runtime(panic_message(err.into_panic()))
        } else {
            ProbeError::Runtime(err.to_string())
        }
    })?
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .unwrap_or_else(|| "panic in probe task".to_string()),
    }
}

fn runtime_message(err: &ProbeError) -> String {
    match err {
        ProbeError::Runtime(_) => err.to_string(),
        other => format!("Unexpected runtime error: {}", error_chain(other)),
    }
}

fn log_run_config(config: &RunConfig) {
    info!(
        api_url = %config.safe_api_url(),
        model = %config.model,
        requests = config.request_count,
        timeout_secs = config.request_timeout_seconds,
        max_runtime_secs = config.max_runtime_seconds,
        pause_secs = config.request_pause_seconds,
        "Starting probe run"
    );
}

fn log_summary(summary: &RunSummary, outcome: &RunOutcome) {
    info!(
        status = %outcome.status,
        planned = summary.planned,
        attempted = summary.attempted,
        successful = summary.successful,
        failed = summary.failed,
        availability = %format!("{:.2}%", summary.availability),
        total_runtime_secs = summary.total_runtime.as_secs_f64(),
        "Probe run finished"
    );
    if let Some(latency) = summary.latency {
        info!(
            average_secs = latency.average,
            fastest_secs = latency.fastest,
            slowest_secs = latency.slowest,
            "Latency over successful requests"
        );
    }
}

/// Write the report to every configured sink, collecting failures.
fn persist(config: &RunConfig, report: &MarkdownReport, results: &[RequestResult]) -> Vec<String> {
    let mut failures = Vec::new();

    match persistence::update_document(&config.output_path, &report.lines()) {
        Ok(()) => info!(path = %config.output_path.display(), "Report written"),
        Err(err) => {
            error!(error = %err, "Failed to write report");
            failures.push(error_chain(&err));
        }
    }

    if let Some(path) = &config.ci_summary_path {
        let lines = persistence::ci_summary_lines(report, results);
        if let Err(err) = persistence::append_ci_summary(path, &lines) {
            error!(error = %err, "Failed to append CI summary");
            failures.push(error_chain(&err));
        }
    }

    failures
}
