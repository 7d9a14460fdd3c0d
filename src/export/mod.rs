//! Export layer for sqlharvest.
//!
//! Serializes result tables to spreadsheet files and batch summaries to
//! CSV reports.

pub mod summary;
pub mod xlsx;

pub use summary::write_summary;
pub use xlsx::{SpreadsheetWriter, MAX_ROWS_PER_FILE};

use std::path::{Path, PathBuf};

/// Returns a file-name timestamp for the current wall-clock time.
///
/// Format matches the output naming scheme: `YYYYMMDD_HHMMSS`.
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Returns `candidate` if it does not exist yet, otherwise appends a
/// numeric suffix until a free name is found.
///
/// Output files are never overwritten: the timestamp keeps names unique
/// across runs, and this guard covers two writes of the same name within
/// the same second.
pub(crate) fn unique_path(candidate: PathBuf) -> PathBuf {
    if !candidate.exists() {
        return candidate;
    }

    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = candidate.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut n = 2u32;
    loop {
        let next = dir.join(format!("{stem}_{n}.{ext}"));
        if !next.exists() {
            return next;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_run_timestamp_format() {
        let ts = run_timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
        assert!(ts.chars().filter(|c| c.is_ascii_digit()).count() == 14);
    }

    #[test]
    fn test_unique_path_passes_through_free_name() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("report.csv");
        assert_eq!(unique_path(candidate.clone()), candidate);
    }

    #[test]
    fn test_unique_path_bumps_taken_name() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = dir.path().join("report.csv");
        fs::write(&candidate, "taken").unwrap();

        let bumped = unique_path(candidate.clone());
        assert_eq!(bumped, dir.path().join("report_2.csv"));

        fs::write(&bumped, "also taken").unwrap();
        assert_eq!(unique_path(candidate), dir.path().join("report_3.csv"));
    }
}
