//! CLI output: drain reports and error mapping to a stable CLI surface.

use crate::error::SequenceError;
use serde::Serialize;
use serde_json::json;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainOutcome {
    Completed,
    Disposed,
}

/// Result of draining one enumerator from the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DrainReport {
    pub items: Vec<String>,
    /// Values the producer computed, which can exceed `items` by at most one.
    pub produced: u64,
    pub outcome: DrainOutcome,
    /// For single-use sequences: what happened when a second run was requested.
    pub second_enumeration: Option<String>,
}

/// Render a report as text (one item per line plus a summary) or JSON.
pub fn format_report(report: &DrainReport, format: &str) -> Result<String, SequenceError> {
    match format {
        "json" => {
            let value = json!({
                "items": report.items,
                "produced": report.produced,
                "outcome": report.outcome,
                "second_enumeration": report.second_enumeration,
            });
            serde_json::to_string_pretty(&value)
                .map_err(|e| SequenceError::Config(format!("Failed to render JSON: {}", e)))
        }
        "text" => {
            let mut lines = report.items.clone();
            let outcome = match report.outcome {
                DrainOutcome::Completed => "completed",
                DrainOutcome::Disposed => "disposed",
            };
            lines.push(format!(
                "-- {} after {} item(s), producer computed {}",
                outcome,
                report.items.len(),
                report.produced
            ));
            if let Some(second) = &report.second_enumeration {
                lines.push(format!("-- second enumeration: {}", second));
            }
            Ok(lines.join("\n"))
        }
        other => Err(SequenceError::UsageError(format!(
            "Invalid output format: {} (must be 'text' or 'json')",
            other
        ))),
    }
}

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &SequenceError) -> String {
    match e {
        SequenceError::RoutineFailure(err) => format!("error: producer failed: {}", err),
        SequenceError::Cancelled => "error: cancelled".to_string(),
        other => format!("error: {}", other),
    }
}
