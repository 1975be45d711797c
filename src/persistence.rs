//! # Persistence and Sinks
//!
//! Writes the report into the output document and, when running under CI,
//! appends an abbreviated version to the step summary file.
//!
//! The document region between [`RESULTS_START`] and [`RESULTS_END`] belongs to
//! the probe and is regenerated on every run; everything outside the markers
//! belongs to whoever maintains the document and is preserved byte for byte.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::ProbeError;
use crate::metrics::RequestResult;
use crate::report::{escape_markdown, MarkdownReport};

pub const RESULTS_START: &str = "<!-- OPENAI_BENCHMARK_RESULTS_START -->";
pub const RESULTS_END: &str = "<!-- OPENAI_BENCHMARK_RESULTS_END -->";

/// Starting content for a document that does not exist yet.
pub const PLACEHOLDER_DOCUMENT: &str = "# OpenAI API Availability Monitor\n\n";

pub const CI_SUMMARY_TITLE: &str = "## Availability Summary";
pub const CI_FAILURES_TITLE: &str = "### Failed request details";

/// Report lines wrapped in the region markers, newline-terminated.
pub fn render_block(lines: &[String]) -> String {
    format!("{}\n{}\n{}\n", RESULTS_START, lines.join("\n").trim(), RESULTS_END)
}

/// Byte range of the existing region, including one newline after the end marker.
fn find_region(document: &str) -> Option<(usize, usize)> {
    let start = document.find(RESULTS_START)?;
    let search_from = start + RESULTS_START.len();
    let end_marker = search_from + document[search_from..].find(RESULTS_END)?;
    let mut end = end_marker + RESULTS_END.len();
    if document[end..].starts_with('\n') {
        end += 1;
    }
    Some((start, end))
}

/// Replace the delimited region of `document` with `lines`.
///
/// An existing region is replaced in place. Without one (or with a start
/// marker that is never closed) the block is appended after a blank line.
pub fn splice_report(document: &str, lines: &[String]) -> String {
    let block = render_block(lines);
    match find_region(document) {
        Some((start, end)) => {
            let mut updated = String::with_capacity(document.len() - (end - start) + block.len());
            updated.push_str(&document[..start]);
            updated.push_str(&block);
            updated.push_str(&document[end..]);
            updated
        }
        None => format!("{}\n\n{}", document.trim_end(), block),
    }
}

/// Rewrite the document at `path` with a fresh report region.
pub fn update_document(path: &Path, lines: &[String]) -> crate::Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => PLACEHOLDER_DOCUMENT.to_string(),
        Err(err) => return Err(ProbeError::io(path, err)),
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| ProbeError::io(parent, err))?;
    }
    fs::write(path, splice_report(&existing, lines)).map_err(|err| ProbeError::io(path, err))
}

/// Abbreviated report for CI: header fields and failure messages, no table.
pub fn ci_summary_lines(report: &MarkdownReport, results: &[RequestResult]) -> Vec<String> {
    let mut lines = vec![CI_SUMMARY_TITLE.to_string(), String::new()];
    lines.extend(report.fields.iter().cloned());

    let failures: Vec<&RequestResult> = results.iter().filter(|result| !result.ok).collect();
    if !failures.is_empty() {
        lines.push(String::new());
        lines.push(CI_FAILURES_TITLE.to_string());
        lines.extend(
            failures
                .into_iter()
                .map(|result| format!("- Request {}: {}", result.index, escape_markdown(&result.error))),
        );
    }
    lines
}

/// Append `lines` to the CI summary file, creating it if needed.
pub fn append_ci_summary(path: &Path, lines: &[String]) -> crate::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| ProbeError::io(path, err))?;
    let mut content = lines.join("\n");
    content.push('\n');
    file.write_all(content.as_bytes()).map_err(|err| ProbeError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use std::time::Duration;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn test_append_when_region_absent() {
        let updated = splice_report("# Title\n\nIntro text.\n\n\n", &lines(&["## Report", "body"]));
        assert_eq!(
            updated,
            format!("# Title\n\nIntro text.\n\n{}\n## Report\nbody\n{}\n", RESULTS_START, RESULTS_END)
        );
    }

    #[test]
    fn test_replace_region_in_place() {
        let before = "# Title\n\nIntro | with pipes\n\n";
        let after = "\n## Notes\n\nMaintained by hand.\n";
        let document = format!("{}{}\nold report\n{}\n{}", before, RESULTS_START, RESULTS_END, after);

        let updated = splice_report(&document, &lines(&["new report"]));
        assert_eq!(updated, format!("{}{}\nnew report\n{}\n{}", before, RESULTS_START, RESULTS_END, after));
        assert!(updated.starts_with(before));
        assert!(updated.ends_with(after));
        assert!(!updated.contains("old report"));
    }

    #[test]
    fn test_repeated_runs_are_stable() {
        let first = splice_report(PLACEHOLDER_DOCUMENT, &lines(&["run 1"]));
        let second = splice_report(&first, &lines(&["run 2"]));
        let third = splice_report(&second, &lines(&["run 2"]));
        assert_eq!(second, third);
        assert_eq!(second.matches(RESULTS_START).count(), 1);
        assert!(second.starts_with("# OpenAI API Availability Monitor\n\n"));
    }

    #[test]
    fn test_unterminated_region_is_treated_as_absent() {
        let document = format!("# Title\n{}\ndangling\n", RESULTS_START);
        let updated = splice_report(&document, &lines(&["fresh"]));
        assert!(updated.starts_with(&document.trim_end().to_string()));
        assert!(updated.ends_with(&format!("{}\nfresh\n{}\n", RESULTS_START, RESULTS_END)));
    }

    #[test]
    fn test_update_document_creates_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs").join("README.md");

        update_document(&path, &lines(&["report"])).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            format!("# OpenAI API Availability Monitor\n\n{}\nreport\n{}\n", RESULTS_START, RESULTS_END)
        );
    }

    #[test]
    fn test_ci_summary_lists_failures_without_table() {
        let report = MarkdownReport {
            fields: lines(&["- Status: **PARTIAL_SUCCESS**"]),
            table: lines(&["| # | Status |", "|---|---|"]),
        };
        let results = vec![
            RequestResult::success(1, Duration::from_secs(1), 5),
            RequestResult::failure(2, Duration::from_secs(1), &RequestError::Transport("reset\nby peer".into())),
        ];

        let summary = ci_summary_lines(&report, &results);
        assert_eq!(
            summary,
            lines(&[
                CI_SUMMARY_TITLE,
                "",
                "- Status: **PARTIAL_SUCCESS**",
                "",
                CI_FAILURES_TITLE,
                "- Request 2: Network/Timeout error: reset by peer",
            ])
        );

        let clean = ci_summary_lines(&report, &results[..1]);
        assert_eq!(clean.len(), 3);
    }

    #[test]
    fn test_append_ci_summary_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        fs::write(&path, "previous step\n").unwrap();

        append_ci_summary(&path, &lines(&["## Availability Summary", "- ok"])).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "previous step\n## Availability Summary\n- ok\n");
    }
}
