//! Spreadsheet serialization for result tables.
//!
//! Writes one table to one or more `.xlsx` files, splitting into part
//! files when the table exceeds the per-file row limit. The xlsx format
//! has a hard ceiling of 1,048,576 rows per sheet; the limit here leaves
//! a safety margin for the header row.

use crate::db::{ResultTable, Row, Value};
use crate::error::{HarvestError, Result};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::unique_path;

/// Maximum data rows written to a single spreadsheet file.
pub const MAX_ROWS_PER_FILE: usize = 1_048_000;

/// Largest integer magnitude an xlsx number cell stores exactly.
/// Cell numbers are f64, which holds integers up to 2^53.
const MAX_EXACT_INT: u64 = 1 << 53;

/// Serializes result tables to spreadsheet files in an output directory.
#[derive(Debug, Clone)]
pub struct SpreadsheetWriter {
    output_dir: PathBuf,
    max_rows_per_file: usize,
}

impl SpreadsheetWriter {
    /// Creates a writer targeting the given output directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_rows_per_file: MAX_ROWS_PER_FILE,
        }
    }

    /// Overrides the per-file row limit. Values below 1 are raised to 1.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows_per_file = max_rows.max(1);
        self
    }

    /// Returns the output directory this writer targets.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `table` under the given base name, returning the paths of
    /// all files produced, in part order.
    ///
    /// Tables within the row limit produce a single `{name}_{timestamp}.xlsx`;
    /// larger tables are split into contiguous `{name}_part_{i}_{timestamp}.xlsx`
    /// chunks with a 1-based index, preserving row order.
    pub fn write(&self, table: ResultTable, name: &str, timestamp: &str) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            HarvestError::write(format!(
                "Cannot create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let total_rows = table.row_count();
        let sizes = chunk_sizes(total_rows, self.max_rows_per_file);

        if sizes.len() > 1 {
            warn!(
                "{name}: {total_rows} rows exceed the per-file limit, splitting into {} parts",
                sizes.len()
            );
        }

        let mut paths = Vec::with_capacity(sizes.len());
        let mut offset = 0usize;

        for (idx, &size) in sizes.iter().enumerate() {
            let file_name = if sizes.len() == 1 {
                format!("{name}_{timestamp}.xlsx")
            } else {
                format!("{name}_part_{}_{timestamp}.xlsx", idx + 1)
            };
            let path = unique_path(self.output_dir.join(file_name));

            let chunk = &table.rows[offset..offset + size];
            write_sheet(&table, chunk, &path)?;
            info!(
                "Saved {} ({} rows)",
                path.file_name().unwrap_or_default().to_string_lossy(),
                size
            );

            paths.push(path);
            offset += size;
        }

        Ok(paths)
    }
}

/// Computes the chunk plan for a table of `row_count` rows.
///
/// Always yields at least one chunk (an empty table still produces one
/// header-only file). Every chunk except the last holds exactly
/// `max_rows` rows; the concatenation of all chunks covers the table
/// exactly once.
pub fn chunk_sizes(row_count: usize, max_rows: usize) -> Vec<usize> {
    let max_rows = max_rows.max(1);
    if row_count <= max_rows {
        return vec![row_count];
    }

    let full_chunks = row_count / max_rows;
    let remainder = row_count % max_rows;

    let mut sizes = vec![max_rows; full_chunks];
    if remainder > 0 {
        sizes.push(remainder);
    }
    sizes
}

/// Writes one chunk of rows (plus the header) to a single xlsx file.
fn write_sheet(table: &ResultTable, rows: &[Row], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header_format = Format::new().set_bold();

    for (col, column) in table.columns.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, &column.name, &header_format)
            .map_err(|e| HarvestError::write(e.to_string()))?;
    }

    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            write_cell(sheet, (r + 1) as u32, c as u16, value)?;
        }
    }

    workbook
        .save(path)
        .map_err(|e| HarvestError::write(format!("Cannot save {}: {e}", path.display())))?;

    Ok(())
}

/// Writes a single value into a worksheet cell.
fn write_cell(
    sheet: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    col: u16,
    value: &Value,
) -> Result<()> {
    let result = match value {
        Value::Null => return Ok(()), // blank cell
        Value::Bool(b) => sheet.write_boolean(row, col, *b),
        Value::Int(i) if i.unsigned_abs() <= MAX_EXACT_INT => {
            sheet.write_number(row, col, *i as f64)
        }
        // Beyond 2^53 an f64 cell would drop digits; keep the exact
        // value as text.
        Value::Int(i) => sheet.write_string(row, col, i.to_string()),
        Value::Float(f) => sheet.write_number(row, col, *f),
        Value::String(s) => sheet.write_string(row, col, s),
        Value::Bytes(b) => sheet.write_string(row, col, format!("<{} bytes>", b.len())),
    };

    result.map_err(|e| HarvestError::write(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ColumnInfo;
    use calamine::{open_workbook, Data, Reader, Xlsx};
    use pretty_assertions::assert_eq;

    /// Reads every cell of the first sheet back, header row included.
    fn read_rows(path: &Path) -> Vec<Vec<Data>> {
        let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    fn table_with_rows(n: usize) -> ResultTable {
        let columns = vec![
            ColumnInfo::new("id", "INT8"),
            ColumnInfo::new("label", "TEXT"),
        ];
        let rows = (1..=n)
            .map(|i| vec![Value::Int(i as i64), Value::String(format!("row {i}"))])
            .collect();
        ResultTable::with_data(columns, rows)
    }

    #[test]
    fn test_chunk_sizes_under_limit() {
        assert_eq!(chunk_sizes(5, 10), vec![5]);
        assert_eq!(chunk_sizes(10, 10), vec![10]);
    }

    #[test]
    fn test_chunk_sizes_empty_table() {
        assert_eq!(chunk_sizes(0, 10), vec![0]);
    }

    #[test]
    fn test_chunk_sizes_with_remainder() {
        assert_eq!(chunk_sizes(25, 10), vec![10, 10, 5]);
    }

    #[test]
    fn test_chunk_sizes_evenly_divisible() {
        assert_eq!(chunk_sizes(30, 10), vec![10, 10, 10]);
    }

    #[test]
    fn test_chunk_sizes_at_format_limit() {
        // 2,096,001 rows split into 1,048,000 + 1,048,000 + 1
        let sizes = chunk_sizes(2_096_001, MAX_ROWS_PER_FILE);
        assert_eq!(sizes, vec![1_048_000, 1_048_000, 1]);
        assert_eq!(sizes.iter().sum::<usize>(), 2_096_001);
    }

    #[test]
    fn test_write_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path());

        let paths = writer
            .write(table_with_rows(5), "sales", "20260825_120000")
            .unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].file_name().unwrap().to_string_lossy(),
            "sales_20260825_120000.xlsx"
        );
        assert!(paths[0].exists());
        assert!(std::fs::metadata(&paths[0]).unwrap().len() > 0);
    }

    #[test]
    fn test_write_split_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path()).with_max_rows(10);

        let paths = writer
            .write(table_with_rows(25), "big", "20260825_120000")
            .unwrap();

        assert_eq!(paths.len(), 3);
        assert_eq!(
            paths[0].file_name().unwrap().to_string_lossy(),
            "big_part_1_20260825_120000.xlsx"
        );
        assert_eq!(
            paths[2].file_name().unwrap().to_string_lossy(),
            "big_part_3_20260825_120000.xlsx"
        );
        for path in &paths {
            assert!(path.exists());
        }
    }

    #[test]
    fn test_round_trip_preserves_values_and_column_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path());

        let paths = writer
            .write(table_with_rows(3), "sales", "20260825_120000")
            .unwrap();

        let rows = read_rows(&paths[0]);
        assert_eq!(rows.len(), 4); // header + 3 data rows
        assert_eq!(
            rows[0],
            vec![Data::String("id".into()), Data::String("label".into())]
        );
        for (i, row) in rows[1..].iter().enumerate() {
            let n = i + 1;
            assert_eq!(
                *row,
                vec![
                    Data::Float(n as f64),
                    Data::String(format!("row {n}")),
                ]
            );
        }
    }

    #[test]
    fn test_split_concatenation_reproduces_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path()).with_max_rows(10);

        let paths = writer
            .write(table_with_rows(25), "big", "20260825_120000")
            .unwrap();
        assert_eq!(paths.len(), 3);

        // Concatenating the data rows of every part, in part order, must
        // reproduce the source table exactly.
        let mut data_rows = Vec::new();
        for path in &paths {
            let rows = read_rows(path);
            assert_eq!(
                rows[0],
                vec![Data::String("id".into()), Data::String("label".into())]
            );
            data_rows.extend(rows[1..].to_vec());
        }

        assert_eq!(data_rows.len(), 25);
        for (i, row) in data_rows.iter().enumerate() {
            let n = i + 1;
            assert_eq!(
                *row,
                vec![
                    Data::Float(n as f64),
                    Data::String(format!("row {n}")),
                ]
            );
        }
    }

    #[test]
    fn test_write_exact_multiple_has_no_short_part() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path()).with_max_rows(10);

        let paths = writer
            .write(table_with_rows(20), "even", "20260825_120000")
            .unwrap();

        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_write_empty_table_produces_header_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path());

        let table = ResultTable::with_data(vec![ColumnInfo::new("id", "INT8")], vec![]);
        let paths = writer.write(table, "empty", "20260825_120000").unwrap();

        assert_eq!(paths.len(), 1);
        assert!(paths[0].exists());
    }

    #[test]
    fn test_write_same_name_twice_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path());

        let first = writer
            .write(table_with_rows(2), "sales", "20260825_120000")
            .unwrap();
        let second = writer
            .write(table_with_rows(2), "sales", "20260825_120000")
            .unwrap();

        assert_ne!(first[0], second[0]);
        assert!(first[0].exists());
        assert!(second[0].exists());
    }

    #[test]
    fn test_write_unwritable_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output directory should be makes
        // create_dir_all fail deterministically on every platform.
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();

        let writer = SpreadsheetWriter::new(blocker.join("out"));
        let result = writer.write(table_with_rows(1), "sales", "20260825_120000");

        assert!(matches!(result.unwrap_err(), HarvestError::Write(_)));
    }

    #[test]
    fn test_write_handles_all_value_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path());

        let columns = vec![
            ColumnInfo::new("n", "INT8"),
            ColumnInfo::new("f", "FLOAT8"),
            ColumnInfo::new("b", "BOOL"),
            ColumnInfo::new("s", "TEXT"),
            ColumnInfo::new("raw", "BYTEA"),
            ColumnInfo::new("missing", "TEXT"),
        ];
        let rows = vec![vec![
            Value::Int(7),
            Value::Float(1.5),
            Value::Bool(true),
            Value::String("hello".to_string()),
            Value::Bytes(vec![0, 1, 2]),
            Value::Null,
        ]];

        let paths = writer
            .write(
                ResultTable::with_data(columns, rows),
                "mixed",
                "20260825_120000",
            )
            .unwrap();

        let read = read_rows(&paths[0]);
        assert_eq!(
            read[1],
            vec![
                Data::Float(7.0),
                Data::Float(1.5),
                Data::Bool(true),
                Data::String("hello".into()),
                Data::String("<3 bytes>".into()),
                Data::Empty,
            ]
        );
    }

    #[test]
    fn test_integers_beyond_f64_precision_kept_exact() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SpreadsheetWriter::new(dir.path());

        let columns = vec![ColumnInfo::new("n", "INT8")];
        let rows = vec![
            vec![Value::Int(42)],
            vec![Value::Int(i64::MAX)],
            vec![Value::Int(i64::MIN)],
        ];

        let paths = writer
            .write(ResultTable::with_data(columns, rows), "ids", "ts")
            .unwrap();

        let read = read_rows(&paths[0]);
        assert_eq!(read[1], vec![Data::Float(42.0)]);
        assert_eq!(read[2], vec![Data::String(i64::MAX.to_string())]);
        assert_eq!(read[3], vec![Data::String(i64::MIN.to_string())]);
    }
}
