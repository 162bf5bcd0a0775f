//! Per-file upload summaries as a table or JSON

use crate::error::Result;
use crate::upload::{UploadResult, UploadStatus};
use crate::OutputFormat;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use logup_common::types::format_byte_size;
use serde::Serialize;

/// Render every result in the requested format
pub fn render(results: &[UploadResult], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(format_as_table(results)),
        OutputFormat::Json => format_as_json(results),
    }
}

/// One-line verdict for the whole run
pub fn status_line(results: &[UploadResult]) -> String {
    let complete = results.iter().filter(|r| r.is_complete()).count();
    let line = format!("{} of {} files uploaded completely", complete, results.len());
    if complete == results.len() {
        format!("{} {}", "✓".green(), line)
    } else {
        format!("{} {}", "✗".red(), line)
    }
}

fn status_cell(status: UploadStatus) -> Cell {
    let color = match status {
        UploadStatus::Complete => Color::Green,
        UploadStatus::PartialFailure => Color::Yellow,
        UploadStatus::Failed | UploadStatus::Aborted => Color::Red,
    };
    Cell::new(status).fg(color)
}

fn format_as_table(results: &[UploadResult]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            "File", "Status", "Chunks", "Succeeded", "Failed", "Cancelled", "Attempts", "Uploaded",
            "Time",
        ]);

    for result in results {
        table.add_row(vec![
            Cell::new(result.path.display()),
            status_cell(result.status),
            Cell::new(result.total_chunks),
            Cell::new(result.chunks_succeeded),
            Cell::new(result.chunks_failed),
            Cell::new(result.chunks_cancelled),
            Cell::new(result.total_attempts),
            Cell::new(format_byte_size(result.bytes_uploaded)),
            Cell::new(format!("{:.2}s", result.elapsed_ms as f64 / 1000.0)),
        ]);
    }

    let mut output = table.to_string();

    let aborted: Vec<&UploadResult> = results
        .iter()
        .filter(|r| r.failures.is_empty() && r.abort_reason.is_some())
        .collect();
    let has_failures = results.iter().any(|r| !r.failures.is_empty());

    if has_failures || !aborted.is_empty() {
        let mut failures = Table::new();
        failures
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["File", "Chunk", "Bytes", "Attempts", "Outcome", "Reason"]);

        for result in &aborted {
            failures.add_row(vec![
                Cell::new(result.path.display()),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(0),
                Cell::new("aborted"),
                Cell::new(result.abort_reason.as_deref().unwrap_or_default()),
            ]);
        }

        for result in results {
            for chunk in &result.failures {
                failures.add_row(vec![
                    Cell::new(result.path.display()),
                    Cell::new(chunk.index),
                    Cell::new(chunk.byte_range()),
                    Cell::new(chunk.attempts),
                    Cell::new(format!("{:?}", chunk.outcome).to_lowercase()),
                    Cell::new(chunk.last_error.as_deref().unwrap_or_default()),
                ]);
            }
        }

        output.push_str("\n\n");
        output.push_str(&failures.to_string());
    }

    output
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    complete: bool,
    files: &'a [UploadResult],
}

fn format_as_json(results: &[UploadResult]) -> Result<String> {
    let summary = JsonSummary {
        complete: results.iter().all(|r| r.is_complete()),
        files: results,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}
