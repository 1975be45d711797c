//! # Report Builder
//!
//! Renders a finished run as Markdown: a header of labeled fields followed by
//! a per-request detail table. Rendering is pure; the generation time is an
//! input so the output is reproducible.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::metrics::{RequestResult, RunOutcome, RunSummary};

pub const REPORT_TITLE: &str = "## Latest Probe Run";
pub const DETAILS_TITLE: &str = "### Request Details";

/// Civil timezone shown next to UTC. Asia/Shanghai has no daylight saving,
/// so a fixed offset is exact.
pub const LOCAL_ZONE_NAME: &str = "Asia/Shanghai";
const LOCAL_ZONE_OFFSET_SECS: i32 = 8 * 3600;

const TABLE_HEADER: &str = "| # | Status | Duration (s) | Output chars | Error |";
const TABLE_ALIGNMENT: &str = "|---|---|---:|---:|---|";
const EMPTY_ROW: &str = "| - | - | - | - | no request executed |";

/// Rendered report, kept in sections so sinks can pick what they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownReport {
    /// `- Label: value` lines
    pub fields: Vec<String>,
    /// Table header, alignment row, and one row per request
    pub table: Vec<String>,
}

impl MarkdownReport {
    /// All report lines in document order.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.fields.len() + self.table.len() + 5);
        lines.push(REPORT_TITLE.to_string());
        lines.push(String::new());
        lines.extend(self.fields.iter().cloned());
        lines.push(String::new());
        lines.push(DETAILS_TITLE.to_string());
        lines.push(String::new());
        lines.extend(self.table.iter().cloned());
        lines
    }
}

/// Escape text for a Markdown table cell or inline code span.
pub fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

/// UTC and Asia/Shanghai renderings of `at`, both RFC 3339 with microseconds.
pub fn timestamp_pair(at: DateTime<Utc>) -> (String, String) {
    let utc = at.to_rfc3339_opts(SecondsFormat::Micros, false);
    let local = match FixedOffset::east_opt(LOCAL_ZONE_OFFSET_SECS) {
        Some(offset) => at.with_timezone(&offset).to_rfc3339_opts(SecondsFormat::Micros, false),
        None => utc.clone(),
    };
    (utc, local)
}

/// Render a configured float the way it was most likely written: `0.0`, `0.1`, `1.5`.
fn format_setting(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn format_seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |secs| format!("{:.3}", secs))
}

/// # Report Builder
///
/// Collects the inputs of a report; `build` renders them.
pub struct ReportBuilder<'a> {
    config: &'a RunConfig,
    summary: &'a RunSummary,
    results: &'a [RequestResult],
    outcome: &'a RunOutcome,
    generated_at: DateTime<Utc>,
    run_id: Option<Uuid>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(
        config: &'a RunConfig,
        summary: &'a RunSummary,
        results: &'a [RequestResult],
        outcome: &'a RunOutcome,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            summary,
            results,
            outcome,
            generated_at,
            run_id: None,
        }
    }

    pub fn run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn build(&self) -> MarkdownReport {
        MarkdownReport {
            fields: self.fields(),
            table: self.table(),
        }
    }

    fn fields(&self) -> Vec<String> {
        let config = self.config;
        let summary = self.summary;
        let (utc, local) = timestamp_pair(self.generated_at);
        let latency = summary.latency;

        let mut fields = vec![
            format!("- Status: **{}**", self.outcome.status),
            format!("- Run time (UTC): `{}`", utc),
            format!("- Run time ({}): `{}`", LOCAL_ZONE_NAME, local),
        ];
        if let Some(run_id) = self.run_id {
            fields.push(format!("- Run ID: `{}`", run_id));
        }
        fields.extend([
            format!("- API URL: `{}`", config.api_url),
            format!("- Model: `{}`", config.model),
            format!("- Prompt: `{}`", escape_markdown(&config.prompt)),
            format!("- Planned requests: `{}`", summary.planned),
            format!("- Attempted requests: `{}`", summary.attempted),
            format!("- Request timeout (s): `{}`", config.request_timeout_seconds),
            format!("- Max runtime (s): `{}`", config.max_runtime_seconds),
            format!("- Max tokens: `{}`", config.max_tokens),
            format!("- Temperature: `{}`", format_setting(config.temperature)),
            format!("- Request pause (s): `{}`", format_setting(config.request_pause_seconds)),
            format!("- Successful requests: `{}`", summary.successful),
            format!("- Failed requests: `{}`", summary.failed),
            format!("- Availability: `{:.2}%`", summary.availability),
            format!("- Total runtime (s): `{:.3}`", summary.total_runtime.as_secs_f64()),
            format!("- Average duration (s): `{}`", format_seconds(latency.map(|l| l.average))),
            format!("- Fastest duration (s): `{}`", format_seconds(latency.map(|l| l.fastest))),
            format!("- Slowest duration (s): `{}`", format_seconds(latency.map(|l| l.slowest))),
        ]);
        if let Some(message) = self.outcome.message.as_deref().filter(|m| !m.is_empty()) {
            fields.push(format!("- Error: `{}`", escape_markdown(message)));
        }
        fields
    }

    fn table(&self) -> Vec<String> {
        let mut table = vec![TABLE_HEADER.to_string(), TABLE_ALIGNMENT.to_string()];
        if self.results.is_empty() {
            table.push(EMPTY_ROW.to_string());
            return table;
        }
        table.extend(self.results.iter().map(|result| {
            let state = if result.ok { "SUCCESS" } else { "FAILED" };
            let error = if result.error.is_empty() {
                "-".to_string()
            } else {
                escape_markdown(&result.error)
            };
            format!(
                "| {} | {} | {:.3} | {} | {} |",
                result.index,
                state,
                result.duration_secs(),
                result.chars,
                error
            )
        }));
        table
    }
}
