//! Schema reconciliation: concatenating tables into one

use crate::error::{MergeError, MergeResult};
use crate::types::{Cell, Column, Table};
use std::collections::{BTreeSet, HashSet};

/// What the provenance column records for each row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvenanceStyle {
    /// Member name without path or extension (`sales.csv` → `sales`)
    #[default]
    Stem,
    /// Member name without path (`dir/sales.csv` → `sales.csv`)
    FileName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatOptions {
    pub provenance_column: String,
    pub style: ProvenanceStyle,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            provenance_column: "SourceFile".to_string(),
            style: ProvenanceStyle::Stem,
        }
    }
}

impl ConcatOptions {
    pub fn new(provenance_column: impl Into<String>) -> Self {
        Self {
            provenance_column: provenance_column.into(),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: ProvenanceStyle) -> Self {
        self.style = style;
        self
    }
}

/// Provenance value for rows of `table`; falls back to the table name
fn provenance_of(table: &Table, style: ProvenanceStyle) -> String {
    match (table.source(), style) {
        (Some(source), ProvenanceStyle::Stem) => source.stem(),
        (Some(source), ProvenanceStyle::FileName) => source.file_name().to_string(),
        (None, _) => table.name.clone(),
    }
}

/// Copy of `table` with unique column names
fn with_unique_names(table: &Table) -> Table {
    let mut copy = table.clone();
    copy.dedupe_column_names();
    copy
}

/// Unique column names, any existing provenance column dropped
fn prepare(table: &Table, provenance_column: &str) -> Table {
    let mut prepared = with_unique_names(table);
    prepared.remove_column(provenance_column);
    prepared
}

/// Concatenate tables that share one column set
///
/// Column sets are compared order-insensitively against the first table,
/// including any column already named like the provenance column. The
/// output uses the first table's column order with provenance appended last.
pub fn strict_concat(tables: &[Table], options: &ConcatOptions) -> MergeResult<Table> {
    let deduped: Vec<Table> = tables.iter().map(with_unique_names).collect();
    let Some(first) = deduped.first() else {
        return empty_result(options);
    };

    let expected: Vec<String> = first.column_names().iter().map(|s| s.to_string()).collect();
    let expected_set: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
    for table in &deduped[1..] {
        let found: BTreeSet<&str> = table.column_names().into_iter().collect();
        if found != expected_set {
            return Err(MergeError::SchemaMismatch {
                source_name: table.source_label(),
                expected: expected.clone(),
                found: table.column_names().iter().map(|s| s.to_string()).collect(),
            });
        }
    }

    let columns: Vec<String> = expected
        .into_iter()
        .filter(|name| name != &options.provenance_column)
        .collect();
    let prepared: Vec<Table> = deduped
        .iter()
        .map(|t| prepare(t, &options.provenance_column))
        .collect();
    stack(&prepared, &columns, options)
}

/// Concatenate tables with differing schemas
///
/// Output columns are the lexicographically sorted union of all names;
/// columns a table lacks are filled with empty cells. A provenance column is
/// appended last. Never fails on mismatched schemas.
pub fn union_concat(tables: &[Table], options: &ConcatOptions) -> MergeResult<Table> {
    let prepared: Vec<Table> = tables
        .iter()
        .map(|t| prepare(t, &options.provenance_column))
        .collect();

    let union: BTreeSet<String> = prepared
        .iter()
        .flat_map(|t| t.column_names().into_iter().map(str::to_string))
        .collect();
    let columns: Vec<String> = union.into_iter().collect();

    if prepared.is_empty() {
        return empty_result(options);
    }
    stack(&prepared, &columns, options)
}

fn empty_result(options: &ConcatOptions) -> MergeResult<Table> {
    Table::from_columns(
        "",
        vec![Column::new(options.provenance_column.clone(), Vec::new())],
    )
}

/// Stack `tables` row-wise over `columns`, adding provenance
fn stack(tables: &[Table], columns: &[String], options: &ConcatOptions) -> MergeResult<Table> {
    let total: usize = tables.iter().map(Table::row_count).sum();
    let mut values: Vec<Vec<Cell>> = vec![Vec::with_capacity(total); columns.len()];
    let mut provenance = Vec::with_capacity(total);

    for table in tables {
        let rows = table.row_count();
        for (name, out) in columns.iter().zip(values.iter_mut()) {
            match table.column(name) {
                Some(column) => out.extend(column.values.iter().cloned()),
                None => out.extend(std::iter::repeat(Cell::Empty).take(rows)),
            }
        }
        let label = Cell::text(provenance_of(table, options.style));
        provenance.extend(std::iter::repeat(label).take(rows));
    }

    let mut out: Vec<Column> = columns
        .iter()
        .zip(values)
        .map(|(name, values)| Column::new(name.clone(), values))
        .collect();
    out.push(Column::new(options.provenance_column.clone(), provenance));

    tracing::debug!(
        tables = tables.len(),
        rows = total,
        columns = out.len(),
        "concatenated tables"
    );
    Table::from_columns("", out)
}

/// Project `table` onto `names`, in the order given
///
/// A name absent from the table is a `ColumnMissing` error; a name listed
/// twice appears once.
pub fn select_columns(table: &Table, names: &[String]) -> MergeResult<Table> {
    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            continue;
        }
        let column = table.column(name).ok_or_else(|| MergeError::ColumnMissing {
            column: name.clone(),
            source_name: table.source_label(),
        })?;
        columns.push(column.clone());
    }

    if columns.is_empty() {
        return Err(MergeError::Validation(
            "No columns selected".to_string(),
        ));
    }

    let mut projected = Table::from_columns(table.name.clone(), columns)?;
    projected.set_source(table.source().cloned());
    Ok(projected)
}
