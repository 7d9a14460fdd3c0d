//! Batch summary reports.
//!
//! Writes the one-row-per-job CSV record of a batch run. Both front-ends
//! use this: the CLI writes it automatically, the interactive form offers
//! it as a save action.

use crate::error::{HarvestError, Result};
use crate::jobs::BatchSummary;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use super::unique_path;

/// One line of the summary report.
#[derive(Serialize)]
struct SummaryRow<'a> {
    query_name: &'a str,
    output_files: String,
    row_count: usize,
    duration_min: String,
    status: String,
}

/// Writes `summary` as `summary_{timestamp}.csv` in `output_dir`.
///
/// Columns: query name, output file path(s) in part order, row count,
/// duration in minutes, and a status field carrying the failure message
/// for failed jobs.
pub fn write_summary(
    summary: &BatchSummary,
    output_dir: &Path,
    timestamp: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| {
        HarvestError::write(format!(
            "Cannot create output directory {}: {e}",
            output_dir.display()
        ))
    })?;

    let path = unique_path(output_dir.join(format!("summary_{timestamp}.csv")));

    // The header is written explicitly so an empty batch still produces
    // a header-only report.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .map_err(|e| HarvestError::write(format!("Cannot create {}: {e}", path.display())))?;

    writer
        .write_record([
            "query_name",
            "output_files",
            "row_count",
            "duration_min",
            "status",
        ])
        .map_err(|e| HarvestError::write(e.to_string()))?;

    for result in &summary.results {
        let output_files = result
            .output_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(";");

        let status = match result.failure_message() {
            None => "success".to_string(),
            Some(msg) => format!("failed: {msg}"),
        };

        writer
            .serialize(SummaryRow {
                query_name: &result.job_name,
                output_files,
                row_count: result.row_count,
                duration_min: format!("{:.2}", result.duration_minutes()),
                status,
            })
            .map_err(|e| HarvestError::write(e.to_string()))?;
    }

    writer
        .flush()
        .map_err(|e| HarvestError::write(e.to_string()))?;

    info!("Summary report saved: {}", path.display());
    Ok(path)
}
