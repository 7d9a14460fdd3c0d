//! Query source loading.
//!
//! Enumerates SQL script files in a directory and yields one `QueryJob`
//! per file with a recognized extension.

use super::QueryJob;
use std::path::Path;
use tracing::{debug, warn};

/// Extensions recognized as query scripts (matched case-insensitively).
const RECOGNIZED_EXTENSIONS: &[&str] = &["sql", "txt"];

/// Lists the runnable jobs in `dir`.
///
/// One job per `.sql`/`.txt` file, named after the file stem, in
/// directory listing order (not stable across platforms). A missing or
/// empty directory yields zero jobs with a warning; it is never an
/// error, since the front-end decides how to report an empty batch.
pub fn list_jobs(dir: &Path) -> Vec<QueryJob> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read SQL directory {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut jobs = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !has_recognized_extension(&path) {
            continue;
        }

        let name = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot read {}: {e}", path.display());
                continue;
            }
        };

        let source_text = decode_query_text(bytes);
        debug!("Loaded query '{name}' from {}", path.display());
        jobs.push(QueryJob::new(name, source_text));
    }

    if jobs.is_empty() {
        warn!("No SQL files found in {}", dir.display());
    }

    jobs
}

/// Returns true if the path carries a recognized script extension.
fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            RECOGNIZED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Decodes query file bytes to text.
///
/// UTF-8 is attempted first; on failure the bytes are decoded as Latin-1
/// (every byte maps to the Unicode scalar of the same value), which never
/// fails. This is best-effort: non-UTF-8 text in other encodings may be
/// misread, a known limitation rather than an error.
fn decode_query_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_lists_recognized_extensions_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sales.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("orders.txt"), "SELECT 2").unwrap();
        fs::write(dir.path().join("notes.md"), "not a query").unwrap();
        fs::write(dir.path().join("data.csv"), "a,b").unwrap();

        let jobs = list_jobs(dir.path());

        assert_eq!(jobs.len(), 2);
        let mut names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["orders", "sales"]);
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("report.SQL"), "SELECT 1").unwrap();

        let jobs = list_jobs(dir.path());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "report");
    }

    #[test]
    fn test_name_is_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("monthly.revenue.sql"), "SELECT 1").unwrap();

        let jobs = list_jobs(dir.path());
        assert_eq!(jobs[0].name, "monthly.revenue");
    }

    #[test]
    fn test_missing_directory_yields_no_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does_not_exist");

        let jobs = list_jobs(&missing);
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_empty_directory_yields_no_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = list_jobs(dir.path());
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_subdirectories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("archive.sql")).unwrap();
        fs::write(dir.path().join("live.sql"), "SELECT 1").unwrap();

        let jobs = list_jobs(dir.path());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "live");
    }

    #[test]
    fn test_utf8_content_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("q.sql"), "SELECT 'héllo' -- naïve").unwrap();

        let jobs = list_jobs(dir.path());
        assert_eq!(jobs[0].source_text, "SELECT 'héllo' -- naïve");
    }

    #[test]
    fn test_latin1_fallback_never_fails() {
        let dir = tempfile::tempdir().unwrap();
        // 0xE9 is 'é' in Latin-1 but an invalid UTF-8 sequence here.
        fs::write(dir.path().join("legacy.sql"), b"SELECT 'caf\xE9'").unwrap();

        let jobs = list_jobs(dir.path());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source_text, "SELECT 'café'");
    }

    #[test]
    fn test_duplicate_stems_load_as_separate_jobs() {
        // A .sql and a .txt file sharing a stem both load, with the same
        // derived name. Collisions in output naming are handled by the
        // writer's existing-file guard.
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sales.sql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("sales.txt"), "SELECT 2").unwrap();

        let jobs = list_jobs(dir.path());
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.name == "sales"));
    }
}
