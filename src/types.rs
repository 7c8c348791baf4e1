use crate::error::{MergeError, MergeResult};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

//==============================================================================
// Cells
//==============================================================================

/// A single untyped cell value
///
/// Text that is blank after trimming is normalized to [`Cell::Empty`] when
/// built through [`Cell::text`], so "no value" has exactly one representation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Cell {
    /// The empty marker
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Build a text cell, mapping blank strings to the empty marker
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Render the cell as text (numbers use shortest round-trip formatting)
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Empty => Cow::Borrowed(""),
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(n.to_string()),
            Cell::Bool(b) => Cow::Owned(b.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

//==============================================================================
// Raw grid
//==============================================================================

/// Untyped two-dimensional data as read from a file, before header detection
///
/// Rows are always rectangular: short rows are padded with empty cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawGrid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl RawGrid {
    pub fn new(mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }
        Self { rows, width }
    }

    /// Convenience constructor for literal grids of text cells
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|s| Cell::text(*s)).collect())
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.width == 0
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&[Cell]> {
        self.rows.get(idx).map(Vec::as_slice)
    }
}

//==============================================================================
// Provenance
//==============================================================================

/// Where a table came from: a member file inside a container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceDescriptor {
    pub container: String,
    pub member: String,
}

impl SourceDescriptor {
    pub fn new(container: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            member: member.into(),
        }
    }

    /// A file uploaded on its own acts as a container of one member
    pub fn standalone(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            container: name.clone(),
            member: name,
        }
    }

    /// Member name with any `/` or `\` path stripped
    pub fn file_name(&self) -> &str {
        file_name(&self.member)
    }

    /// Member name with path and extension stripped
    pub fn stem(&self) -> String {
        file_stem(&self.member)
    }

    /// Human-readable identifier used in error logs
    pub fn label(&self) -> String {
        if self.container == self.member {
            self.member.clone()
        } else {
            format!("{} inside {}", self.member, self.container)
        }
    }
}

/// Strip a `/` or `\` separated path prefix
pub fn file_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name)
}

/// Strip path and extension, following `Path::file_stem` rules
pub fn file_stem(name: &str) -> String {
    let base = file_name(name);
    Path::new(base)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lower-cased extension of a member name, without the dot
pub fn extension(name: &str) -> String {
    Path::new(file_name(name))
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

//==============================================================================
// Tables
//==============================================================================

/// A named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Named-column data after header interpretation
///
/// Every column has exactly `row_count` cells. Mutators reject columns of
/// the wrong length instead of letting the table go ragged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    columns: Vec<Column>,
    row_count: usize,
    source: Option<SourceDescriptor>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build a table from columns, validating that all lengths agree
    pub fn from_columns(name: impl Into<String>, columns: Vec<Column>) -> MergeResult<Self> {
        let mut table = Self::new(name);
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    /// Build a table from a header and row-major data
    ///
    /// Rows shorter than the header are padded with empty cells; longer rows
    /// are a validation error.
    pub fn from_rows(
        name: impl Into<String>,
        header: Vec<String>,
        rows: Vec<Vec<Cell>>,
    ) -> MergeResult<Self> {
        let width = header.len();
        let mut values: Vec<Vec<Cell>> = vec![Vec::with_capacity(rows.len()); width];
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(MergeError::Validation(format!(
                    "Row {} has {} cells, header has {} columns",
                    row_idx,
                    row.len(),
                    width
                )));
            }
            let mut cells = row.into_iter();
            for column in values.iter_mut() {
                column.push(cells.next().unwrap_or_default());
            }
        }
        let mut table = Self::new(name);
        table.row_count = values.first().map_or(0, Vec::len);
        table.columns = header
            .into_iter()
            .zip(values)
            .map(|(name, values)| Column::new(name, values))
            .collect();
        Ok(table)
    }

    pub fn with_source(mut self, source: SourceDescriptor) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&SourceDescriptor> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: Option<SourceDescriptor>) {
        self.source = source;
    }

    /// Name used when reporting problems with this table
    pub fn source_label(&self) -> String {
        self.source
            .as_ref()
            .map(SourceDescriptor::label)
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.columns.get(col).and_then(|c| c.values.get(row))
    }

    /// Cells of one row, in column order
    pub fn row(&self, idx: usize) -> Vec<&Cell> {
        self.columns.iter().map(|c| &c.values[idx]).collect()
    }

    /// Append a column; its length must equal the row count
    ///
    /// The first column of a column-less table defines the row count.
    pub fn push_column(&mut self, column: Column) -> MergeResult<()> {
        if self.columns.is_empty() {
            self.row_count = column.len();
        } else if column.len() != self.row_count {
            return Err(MergeError::Validation(format!(
                "Column '{}' has {} rows, expected {} rows",
                column.name,
                column.len(),
                self.row_count
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace the first column named `name`, or append it
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> MergeResult<()> {
        match self.column_index(name) {
            Some(idx) if values.len() == self.row_count => {
                self.columns[idx].values = values;
                Ok(())
            }
            Some(_) => Err(MergeError::Validation(format!(
                "Column '{}' has {} rows, expected {} rows",
                name,
                values.len(),
                self.row_count
            ))),
            None => self.push_column(Column::new(name, values)),
        }
    }

    /// Rename every column through `rename`
    pub fn rename_columns<F>(&mut self, mut rename: F)
    where
        F: FnMut(&str) -> String,
    {
        for column in &mut self.columns {
            column.name = rename(&column.name);
        }
    }

    /// Remove every column named `name`, returning the first one removed
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.column_index(name)?;
        let removed = self.columns.remove(idx);
        self.columns.retain(|c| c.name != name);
        Some(removed)
    }

    /// Keep only the rows whose cells satisfy `keep`
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[&Cell]) -> bool,
    {
        let mask: Vec<bool> = (0..self.row_count).map(|idx| keep(&self.row(idx))).collect();
        for column in &mut self.columns {
            let mut flags = mask.iter();
            column.values.retain(|_| *flags.next().unwrap_or(&false));
        }
        self.row_count = mask.iter().filter(|k| **k).count();
    }

    /// Reorder rows by a permutation of row indices
    pub fn reorder_rows(&mut self, order: &[usize]) -> MergeResult<()> {
        if order.len() != self.row_count {
            return Err(MergeError::Validation(format!(
                "Row order has {} entries, table has {} rows",
                order.len(),
                self.row_count
            )));
        }
        for column in &mut self.columns {
            column.values = order.iter().map(|&idx| column.values[idx].clone()).collect();
        }
        Ok(())
    }

    /// Rename columns so that every name is unique within the table
    ///
    /// The first occurrence keeps its name; later ones become `name.1`,
    /// `name.2`, ... skipping any suffix already taken.
    pub fn dedupe_column_names(&mut self) {
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        for idx in 0..self.columns.len() {
            let name = self.columns[idx].name.clone();
            if seen.insert(name.clone()) {
                continue;
            }
            let mut counter = 1;
            let mut candidate = format!("{}.{}", name, counter);
            while seen.contains(&candidate) || self.columns.iter().any(|c| c.name == candidate) {
                counter += 1;
                candidate = format!("{}.{}", name, counter);
            }
            seen.insert(candidate.clone());
            self.columns[idx].name = candidate;
        }
    }
}

//==============================================================================
// Batch records
//==============================================================================

/// Row count of one member inside one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub container: String,
    pub member: String,
    pub rows: usize,
}

impl SummaryEntry {
    pub fn new(container: impl Into<String>, member: impl Into<String>, rows: usize) -> Self {
        Self {
            container: container.into(),
            member: member.into(),
            rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    fn tag(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub source: String,
    pub message: String,
    pub severity: Severity,
}

/// Append-only log of per-file problems collected during a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorLog {
    entries: Vec<ErrorEntry>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, source: impl Into<String>, message: impl Into<String>) {
        self.entries.push(ErrorEntry {
            source: source.into(),
            message: message.into(),
            severity,
        });
    }

    pub fn error(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, source, message);
    }

    pub fn warning(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, source, message);
    }

    pub fn info(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Info, source, message);
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if any entry is a warning or an error (info entries don't count)
    pub fn has_problems(&self) -> bool {
        self.entries.iter().any(|e| e.severity != Severity::Info)
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Error)
            .count()
    }

    /// Line-oriented text form, one entry per line
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{:<5} {}: {}\n", e.severity.tag(), e.source, e.message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_becomes_empty_marker() {
        assert_eq!(Cell::text("   "), Cell::Empty);
        assert_eq!(Cell::text(""), Cell::Empty);
        assert_eq!(Cell::text(" a "), Cell::Text(" a ".to_string()));
    }

    #[test]
    fn test_number_rendering() {
        assert_eq!(Cell::Number(1.0).as_text(), "1");
        assert_eq!(Cell::Number(2.5).as_text(), "2.5");
        assert_eq!(Cell::Bool(true).as_text(), "true");
    }

    #[test]
    fn test_grid_pads_ragged_rows() {
        let grid = RawGrid::from_strs(&[&["a"], &["b", "c", "d"]]);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.row(0).unwrap().len(), 3);
        assert!(grid.row(0).unwrap()[2].is_empty());
    }

    #[test]
    fn test_source_descriptor_paths() {
        let source = SourceDescriptor::new("batch.zip", "reports/march\\sales.final.xlsx");
        assert_eq!(source.file_name(), "sales.final.xlsx");
        assert_eq!(source.stem(), "sales.final");
        assert_eq!(source.label(), "reports/march\\sales.final.xlsx inside batch.zip");
        assert_eq!(SourceDescriptor::standalone("a.csv").label(), "a.csv");
        assert_eq!(extension("dir/A.CSV"), "csv");
    }

    #[test]
    fn test_push_column_rejects_wrong_length() {
        let mut table = Table::new("t");
        table
            .push_column(Column::new("a", vec![Cell::from(1.0), Cell::from(2.0)]))
            .unwrap();
        let result = table.push_column(Column::new("b", vec![Cell::from(1.0)]));
        assert!(result.is_err());
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_from_rows_pads_short_rows() {
        let table = Table::from_rows(
            "t",
            vec!["a".into(), "b".into()],
            vec![vec![Cell::from("1")], vec![Cell::from("2"), Cell::from("x")]],
        )
        .unwrap();
        assert_eq!(table.row_count(), 2);
        assert!(table.cell(0, 1).unwrap().is_empty());
    }

    #[test]
    fn test_retain_rows() {
        let mut table = Table::from_rows(
            "t",
            vec!["id".into()],
            vec![vec![Cell::from("1")], vec![Cell::Empty], vec![Cell::from("3")]],
        )
        .unwrap();
        table.retain_rows(|row| !row[0].is_empty());
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, 0), Some(&Cell::from("3")));
    }

    #[test]
    fn test_dedupe_column_names() {
        let mut table = Table::from_rows(
            "t",
            vec!["x".into(), "x".into(), "x.1".into(), "x".into()],
            vec![],
        )
        .unwrap();
        table.dedupe_column_names();
        assert_eq!(table.column_names(), vec!["x", "x.2", "x.1", "x.3"]);
    }

    #[test]
    fn test_error_log_render_and_severity() {
        let mut log = ErrorLog::new();
        log.info("a.csv", "Sheet name reused");
        assert!(!log.has_problems());
        log.error("b.csv inside c.zip", "No header row found");
        assert!(log.has_problems());
        assert_eq!(log.error_count(), 1);
        let text = log.render();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("ERROR b.csv inside c.zip: No header row found"));
    }
}
