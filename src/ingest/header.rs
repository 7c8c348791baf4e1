//! Header row detection for arbitrarily formatted sheets
//!
//! Real-world exports often carry title blocks, logos, or notes above the
//! table. The detector prunes blank rows and columns, scans the top of the
//! sheet for the first row that looks like a header, and returns the data
//! beneath it as a [`Table`].

use crate::config::{MergeConfig, DEFAULT_HEADER_PATTERN};
use crate::error::{MergeError, MergeResult};
use crate::ingest::prune::{prune, PrunePlan};
use crate::types::{Cell, Column, RawGrid, Table};
use regex::Regex;

/// Decides whether a row is the header row
///
/// `cells` holds the row's cells lower-cased and trimmed; `row_index` is the
/// row's position in the pruned grid.
pub trait HeaderPredicate {
    fn is_header(&self, row_index: usize, cells: &[String]) -> bool;
}

impl<F> HeaderPredicate for F
where
    F: Fn(usize, &[String]) -> bool,
{
    fn is_header(&self, row_index: usize, cells: &[String]) -> bool {
        self(row_index, cells)
    }
}

/// Matches a row when any cell matches a regex
#[derive(Debug, Clone)]
pub struct PatternPredicate {
    regex: Regex,
}

impl PatternPredicate {
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }

    pub fn from_pattern(pattern: &str) -> MergeResult<Self> {
        Regex::new(pattern)
            .map(Self::new)
            .map_err(|e| MergeError::Config(format!("Invalid header pattern '{}': {}", pattern, e)))
    }

    /// Serial-number style headers ("S/N", "s n", "sno", "serial no", ...)
    pub fn serial_number() -> Self {
        Self::from_pattern(DEFAULT_HEADER_PATTERN)
            .unwrap_or_else(|_| unreachable!("default header pattern is valid"))
    }
}

impl Default for PatternPredicate {
    fn default() -> Self {
        Self::serial_number()
    }
}

impl HeaderPredicate for PatternPredicate {
    fn is_header(&self, _row_index: usize, cells: &[String]) -> bool {
        cells.iter().any(|cell| self.regex.is_match(cell))
    }
}

/// Treats a fixed row of the pruned grid as the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRow(pub usize);

impl HeaderPredicate for FixedRow {
    fn is_header(&self, row_index: usize, _cells: &[String]) -> bool {
        row_index == self.0
    }
}

/// Outcome of header detection
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// No row in the scan window matched
    HeaderNotFound { scanned: usize },
    /// A header matched at `header_row` (index into the pruned grid); the
    /// table may still have zero rows
    Detected { header_row: usize, table: Table },
}

impl Detection {
    pub fn row_count(&self) -> usize {
        match self {
            Detection::HeaderNotFound { .. } => 0,
            Detection::Detected { table, .. } => table.row_count(),
        }
    }

    pub fn header_row(&self) -> Option<usize> {
        match self {
            Detection::HeaderNotFound { .. } => None,
            Detection::Detected { header_row, .. } => Some(*header_row),
        }
    }

    /// Collapse to the plain `(table, row_count)` form
    pub fn into_table(self) -> (Table, usize) {
        match self {
            Detection::HeaderNotFound { .. } => (Table::default(), 0),
            Detection::Detected { table, .. } => {
                let rows = table.row_count();
                (table, rows)
            }
        }
    }

    /// A table with at least one data row, or the reason there is none
    pub fn into_result(self) -> MergeResult<Table> {
        match self {
            Detection::HeaderNotFound { scanned } => Err(MergeError::HeaderNotFound { scanned }),
            Detection::Detected { header_row, table } if table.is_empty() => {
                Err(MergeError::NoDataRows { header_row })
            }
            Detection::Detected { table, .. } => Ok(table),
        }
    }
}

/// Header detector with a swappable row predicate
#[derive(Debug, Clone)]
pub struct HeaderDetector<P = PatternPredicate> {
    predicate: P,
    scan_rows: usize,
    placeholder_prefix: String,
}

impl Default for HeaderDetector<PatternPredicate> {
    fn default() -> Self {
        Self::with_predicate(PatternPredicate::serial_number())
    }
}

impl HeaderDetector<PatternPredicate> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MergeConfig) -> MergeResult<Self> {
        Ok(Self::with_predicate(PatternPredicate::new(config.header_regex()?))
            .with_scan_rows(config.header.scan_rows)
            .with_placeholder_prefix(&config.header.placeholder_prefix))
    }
}

impl<P: HeaderPredicate> HeaderDetector<P> {
    pub fn with_predicate(predicate: P) -> Self {
        Self {
            predicate,
            scan_rows: 30,
            placeholder_prefix: "col_".to_string(),
        }
    }

    pub fn with_scan_rows(mut self, scan_rows: usize) -> Self {
        self.scan_rows = scan_rows;
        self
    }

    pub fn with_placeholder_prefix(mut self, prefix: &str) -> Self {
        self.placeholder_prefix = prefix.to_string();
        self
    }

    /// Index of the first header-like row within the scan window of an
    /// already pruned grid
    pub fn locate(&self, pruned: &RawGrid) -> Option<usize> {
        pruned
            .rows()
            .iter()
            .take(self.scan_rows)
            .enumerate()
            .find(|(idx, row)| {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| cell.as_text().trim().to_lowercase())
                    .collect();
                self.predicate.is_header(*idx, &cells)
            })
            .map(|(idx, _)| idx)
    }

    /// Full diagnostic detection
    pub fn analyze(&self, grid: &RawGrid) -> Detection {
        let pruned = prune(grid);
        let Some(header_row) = self.locate(&pruned) else {
            return Detection::HeaderNotFound {
                scanned: pruned.height().min(self.scan_rows),
            };
        };

        let rows = pruned.rows();
        let names = header_names(&rows[header_row], &self.placeholder_prefix);
        let data = &rows[header_row + 1..];

        // The rows around a header are often sparse, so prune again below it
        let plan = PrunePlan::for_rows(data, pruned.width());
        let kept_names: Vec<String> = plan.columns.iter().map(|&c| names[c].clone()).collect();
        let mut table = build_table(kept_names, plan.apply(data));

        // The table ends logically where its first column runs blank
        table.retain_rows(|row| row.first().is_some_and(|cell| !cell.is_empty()));

        tracing::debug!(header_row, rows = table.row_count(), "header detected");
        Detection::Detected { header_row, table }
    }

    /// Detect the header and return the data table with its row count
    ///
    /// A missing header yields an empty table and a count of zero; use
    /// [`analyze`](Self::analyze) to tell that apart from an empty table.
    pub fn detect(&self, grid: &RawGrid) -> (Table, usize) {
        self.analyze(grid).into_table()
    }
}

/// Names from a header row, with positional placeholders for blank cells
fn header_names(row: &[Cell], placeholder_prefix: &str) -> Vec<String> {
    row.iter()
        .enumerate()
        .map(|(idx, cell)| {
            if cell.is_empty() {
                format!("{}{}", placeholder_prefix, idx)
            } else {
                cell.as_text().trim().to_string()
            }
        })
        .collect()
}

fn build_table(names: Vec<String>, rows: Vec<Vec<Cell>>) -> Table {
    let mut columns: Vec<Column> = names
        .into_iter()
        .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
        .collect();
    for row in rows {
        for (column, cell) in columns.iter_mut().zip(row) {
            column.values.push(cell);
        }
    }
    // Columns come from one rectangular grid, so lengths always agree
    Table::from_columns("", columns).unwrap_or_default()
}

/// Plain-table mode: the first non-blank row is the header, every row
/// below it is data (no contiguity rule)
pub fn table_from_first_row(grid: &RawGrid, placeholder_prefix: &str) -> Table {
    let pruned = prune(grid);
    let Some(header) = pruned.row(0) else {
        return Table::default();
    };
    let names = header_names(header, placeholder_prefix);
    build_table(names, pruned.rows()[1..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(table: &Table) -> Vec<&str> {
        table.column_names()
    }

    #[test]
    fn test_default_pattern_variants() {
        let predicate = PatternPredicate::serial_number();
        for header in ["s/n", "s n", "sn", "s-n", "s_n", "s\\n", "serial no", "serial_no", "serialno"] {
            assert!(
                predicate.is_header(0, &[header.to_string()]),
                "{header} should match"
            );
        }
        for other in ["name", "serial", "id", "", "account sn"] {
            assert!(!predicate.is_header(0, &[other.to_string()]), "{other} should not match");
        }
    }

    #[test]
    fn test_detects_header_below_junk() {
        let grid = RawGrid::from_strs(&[
            &["junk"],
            &["S/N", "Name"],
            &["1", "Alice"],
            &["2", "Bob"],
        ]);
        let detection = HeaderDetector::new().analyze(&grid);
        assert_eq!(detection.header_row(), Some(1));
        let (table, rows) = detection.into_table();
        assert_eq!(rows, 2);
        assert_eq!(names(&table), vec!["S/N", "Name"]);
        assert_eq!(
            table.column("Name").unwrap().values,
            vec![Cell::from("Alice"), Cell::from("Bob")]
        );
    }

    #[test]
    fn test_first_match_wins() {
        let grid = RawGrid::from_strs(&[
            &["Serial No", "A"],
            &["S/N", "B"],
            &["1", "x"],
        ]);
        let detection = HeaderDetector::new().analyze(&grid);
        assert_eq!(detection.header_row(), Some(0));
        assert_eq!(detection.row_count(), 2);
    }

    #[test]
    fn test_no_header_in_window() {
        let mut rows: Vec<&[&str]> = vec![&["title"]; 30];
        rows.push(&["S/N", "Name"]);
        rows.push(&["1", "late"]);
        let grid = RawGrid::from_strs(&rows);
        let detection = HeaderDetector::new().analyze(&grid);
        assert_eq!(detection, Detection::HeaderNotFound { scanned: 30 });
        let (table, count) = HeaderDetector::new().detect(&grid);
        assert_eq!(count, 0);
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn test_header_on_last_scanned_row() {
        let mut rows: Vec<&[&str]> = vec![&["title"]; 29];
        rows.push(&["S/N", "Name"]);
        rows.push(&["1", "edge"]);
        let grid = RawGrid::from_strs(&rows);
        let detection = HeaderDetector::new().analyze(&grid);
        assert_eq!(detection.header_row(), Some(29));
        assert_eq!(detection.row_count(), 1);
    }

    #[test]
    fn test_scan_window_counts_surviving_rows() {
        let mut rows: Vec<&[&str]> = Vec::new();
        for _ in 0..29 {
            rows.push(&["title"]);
            rows.push(&[""]);
        }
        rows.push(&["S/N", "Name"]);
        rows.push(&["1", "kept"]);
        let grid = RawGrid::from_strs(&rows);
        assert_eq!(HeaderDetector::new().analyze(&grid).header_row(), Some(29));
        assert_eq!(
            HeaderDetector::new().with_scan_rows(29).analyze(&grid),
            Detection::HeaderNotFound { scanned: 29 }
        );
    }

    #[test]
    fn test_header_as_last_row() {
        let grid = RawGrid::from_strs(&[&["report"], &["S/N", "Name"]]);
        let detection = HeaderDetector::new().analyze(&grid);
        assert_eq!(detection.header_row(), Some(1));
        assert_eq!(detection.row_count(), 0);
        assert!(matches!(
            detection.into_result(),
            Err(MergeError::NoDataRows { header_row: 1 })
        ));
    }

    #[test]
    fn test_blank_header_cells_get_placeholders() {
        let grid = RawGrid::from_strs(&[&["S/N", "", "Amount"], &["1", "x", "10"]]);
        let (table, _) = HeaderDetector::new().detect(&grid);
        assert_eq!(names(&table), vec!["S/N", "col_1", "Amount"]);
    }

    #[test]
    fn test_contiguity_drops_rows_with_blank_first_column() {
        let grid = RawGrid::from_strs(&[
            &["S/N", "Name"],
            &["1", "Alice"],
            &["", "Total: 2"],
            &["2", "Bob"],
        ]);
        let (table, rows) = HeaderDetector::new().detect(&grid);
        assert_eq!(rows, 2);
        assert_eq!(
            table.column("Name").unwrap().values,
            vec![Cell::from("Alice"), Cell::from("Bob")]
        );
    }

    #[test]
    fn test_columns_blank_below_header_are_dropped() {
        let grid = RawGrid::from_strs(&[
            &["S/N", "Notes", "Name"],
            &["1", "", "Alice"],
        ]);
        let (table, _) = HeaderDetector::new().detect(&grid);
        assert_eq!(names(&table), vec!["S/N", "Name"]);
    }

    #[test]
    fn test_header_cells_are_trimmed() {
        let grid = RawGrid::from_strs(&[&["  SN ", " Meter No "], &["1", "M-1"]]);
        let (table, _) = HeaderDetector::new().detect(&grid);
        assert_eq!(names(&table), vec!["SN", "Meter No"]);
    }

    #[test]
    fn test_fixed_row_predicate() {
        let grid = RawGrid::from_strs(&[&["a", "b"], &["id", "value"], &["1", "2"]]);
        let (table, rows) = HeaderDetector::with_predicate(FixedRow(1)).detect(&grid);
        assert_eq!(names(&table), vec!["id", "value"]);
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_closure_predicate() {
        let grid = RawGrid::from_strs(&[&["x"], &["code", "qty"], &["A", "3"]]);
        let detector =
            HeaderDetector::with_predicate(|_: usize, cells: &[String]| cells.iter().any(|c| c == "code"));
        assert_eq!(detector.analyze(&grid).header_row(), Some(1));
    }

    #[test]
    fn test_numeric_header_cells() {
        let grid = RawGrid::new(vec![
            vec![Cell::from("S/N"), Cell::Number(2024.0)],
            vec![Cell::from("1"), Cell::Number(5.0)],
        ]);
        let (table, _) = HeaderDetector::new().detect(&grid);
        assert_eq!(names(&table), vec!["S/N", "2024"]);
    }

    #[test]
    fn test_table_from_first_row() {
        let grid = RawGrid::from_strs(&[&["", ""], &["id", "name"], &["1", ""], &["", "x"]]);
        let table = table_from_first_row(&grid, "col_");
        assert_eq!(names(&table), vec!["id", "name"]);
        assert_eq!(table.row_count(), 2);
    }
}
