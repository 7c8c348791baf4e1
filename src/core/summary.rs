//! Summaries over a batch and change flags over a table

use crate::error::{MergeError, MergeResult};
use crate::types::{Cell, Column, SummaryEntry, Table};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const MEMBER_COLUMN: &str = "Member";

/// Row counts with one row per member and one column per container
///
/// Both axes are sorted lexicographically. A member missing from a container
/// counts 0; repeated (member, container) pairs are summed.
pub fn pivot_row_counts(entries: &[SummaryEntry]) -> Table {
    let containers: BTreeSet<&str> = entries.iter().map(|e| e.container.as_str()).collect();
    let mut counts: BTreeMap<&str, HashMap<&str, usize>> = BTreeMap::new();
    for entry in entries {
        *counts
            .entry(entry.member.as_str())
            .or_default()
            .entry(entry.container.as_str())
            .or_default() += entry.rows;
    }

    let mut columns = vec![Column::new(
        MEMBER_COLUMN,
        counts.keys().map(|m| Cell::text(*m)).collect(),
    )];
    for container in &containers {
        let values = counts
            .values()
            .map(|per| Cell::Number(per.get(container).copied().unwrap_or(0) as f64))
            .collect();
        columns.push(Column::new(*container, values));
    }

    // Every column has one cell per member, so lengths always agree
    Table::from_columns("Summary", columns).unwrap_or_default()
}

/// Long-form summary: `Container`, `Member`, `Rows`, one row per entry
pub fn summary_table(entries: &[SummaryEntry]) -> Table {
    let columns = vec![
        Column::new(
            "Container",
            entries.iter().map(|e| Cell::text(e.container.as_str())).collect(),
        ),
        Column::new(
            MEMBER_COLUMN,
            entries.iter().map(|e| Cell::text(e.member.as_str())).collect(),
        ),
        Column::new(
            "Rows",
            entries.iter().map(|e| Cell::Number(e.rows as f64)).collect(),
        ),
    ];
    Table::from_columns("Details", columns).unwrap_or_default()
}

/// Add change flags for a table already sorted by `(a, b)`
///
/// `{b}_changed` is true when a row's `b` differs from the previous row with
/// the same `a`. `{a}_changed` does the same with the roles swapped. The first
/// row of each group is never flagged. Values compare by text rendering.
pub fn flag_changes(table: &Table, a: &str, b: &str) -> MergeResult<Table> {
    let missing = |column: &str| MergeError::ColumnMissing {
        column: column.to_string(),
        source_name: table.source_label(),
    };
    let col_a = table.column(a).ok_or_else(|| missing(a))?;
    let col_b = table.column(b).ok_or_else(|| missing(b))?;

    let b_changed = changes_within_groups(&col_a.values, &col_b.values);
    let a_changed = changes_within_groups(&col_b.values, &col_a.values);

    let mut flagged = table.clone();
    flagged.set_column(&format!("{}_changed", b), b_changed)?;
    flagged.set_column(&format!("{}_changed", a), a_changed)?;
    Ok(flagged)
}

fn changes_within_groups(group: &[Cell], compared: &[Cell]) -> Vec<Cell> {
    let mut last_seen: HashMap<String, String> = HashMap::new();
    group
        .iter()
        .zip(compared)
        .map(|(g, v)| {
            let value = v.as_text().into_owned();
            let changed = match last_seen.insert(g.as_text().into_owned(), value.clone()) {
                Some(previous) => previous != value,
                None => false,
            };
            Cell::Bool(changed)
        })
        .collect()
}

/// Column that holds a tariff's band
pub const BAND_COLUMN: &str = "band";

/// Zero-based character position of the band inside a tariff code
pub const BAND_POSITION: usize = 4;

/// Add `target`, holding the character at `position` of each `source` value
///
/// Values too short to have that character give an empty cell. An existing
/// `target` column is overwritten.
pub fn derive_char_column(
    table: &Table,
    source: &str,
    target: &str,
    position: usize,
) -> MergeResult<Table> {
    let column = table.column(source).ok_or_else(|| MergeError::ColumnMissing {
        column: source.to_string(),
        source_name: table.source_label(),
    })?;
    let values = column
        .values
        .iter()
        .map(|cell| match cell.as_text().chars().nth(position) {
            Some(c) => Cell::text(c.to_string()),
            None => Cell::Empty,
        })
        .collect();

    let mut derived = table.clone();
    derived.set_column(target, values)?;
    Ok(derived)
}
