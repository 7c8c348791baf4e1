//! Per-source template of a joined table
//!
//! A join leaves base columns unsuffixed and companion columns suffixed
//! `_{file name}` when their names collide. The template folds those back
//! into one row per (id values, field) with one column per source file.

use crate::error::{MergeError, MergeResult};
use crate::types::{Cell, Column, Table};
use std::collections::BTreeMap;

/// Column naming the field each template row carries
pub const FIELD_COLUMN: &str = "Column";

/// Reshape `joined` into one row per id tuple and field
///
/// Every column outside `id_columns` is split into `(field, source)`: a name
/// ending in `_{source}` for one of `sources` (longest match wins) belongs to
/// that source, anything else belongs to `base_label`. Output columns are
/// the id columns, [`FIELD_COLUMN`], then one column per source that owns a
/// field, base first. Rows are sorted by id text then field; the first
/// non-empty value wins when several land in the same slot, and slots with
/// no value at all produce no row.
pub fn source_template(
    joined: &Table,
    id_columns: &[String],
    base_label: &str,
    sources: &[String],
) -> MergeResult<Table> {
    if id_columns.iter().any(|c| c == FIELD_COLUMN) {
        return Err(MergeError::Validation(format!(
            "'{}' is reserved for the template field column",
            FIELD_COLUMN
        )));
    }
    let id_idx: Vec<usize> = id_columns
        .iter()
        .map(|name| {
            joined.column_index(name).ok_or_else(|| MergeError::ColumnMissing {
                column: name.clone(),
                source_name: joined.source_label(),
            })
        })
        .collect::<MergeResult<_>>()?;

    let mut labels: Vec<String> = vec![base_label.to_string()];
    for source in sources {
        if !labels.contains(source) {
            labels.push(source.clone());
        }
    }

    // (column index, field, source index) for every non-id column
    let fields: Vec<(usize, String, usize)> = joined
        .columns()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !id_idx.contains(idx))
        .map(|(idx, column)| {
            let (field, source) = split_source(&column.name, &labels[1..]);
            (idx, field, source.map_or(0, |s| s + 1))
        })
        .collect();

    let mut slots: BTreeMap<(Vec<String>, String), (Vec<Cell>, Vec<Cell>)> = BTreeMap::new();
    for row in 0..joined.row_count() {
        let ids: Vec<Cell> = id_idx
            .iter()
            .map(|&col| joined.cell(row, col).cloned().unwrap_or_default())
            .collect();
        let id_text: Vec<String> = ids.iter().map(|c| c.as_text().into_owned()).collect();

        for (col, field, source) in &fields {
            let Some(value) = joined.cell(row, *col).filter(|c| !c.is_empty()) else {
                continue;
            };
            let (_, values) = slots
                .entry((id_text.clone(), field.clone()))
                .or_insert_with(|| (ids.clone(), vec![Cell::Empty; labels.len()]));
            if values[*source].is_empty() {
                values[*source] = value.clone();
            }
        }
    }

    let used: Vec<usize> = (0..labels.len())
        .filter(|&s| fields.iter().any(|(_, _, source)| *source == s))
        .collect();

    let mut id_values: Vec<Vec<Cell>> = vec![Vec::with_capacity(slots.len()); id_columns.len()];
    let mut field_values = Vec::with_capacity(slots.len());
    let mut source_values: Vec<Vec<Cell>> = vec![Vec::with_capacity(slots.len()); used.len()];
    for ((_, field), (ids, values)) in slots {
        for (out, id) in id_values.iter_mut().zip(ids) {
            out.push(id);
        }
        field_values.push(Cell::text(field));
        for (out, &s) in source_values.iter_mut().zip(&used) {
            out.push(values[s].clone());
        }
    }

    let mut columns: Vec<Column> = id_columns
        .iter()
        .zip(id_values)
        .map(|(name, values)| Column::new(name.clone(), values))
        .collect();
    columns.push(Column::new(FIELD_COLUMN, field_values));
    columns.extend(
        used.iter()
            .zip(source_values)
            .map(|(&s, values)| Column::new(labels[s].clone(), values)),
    );

    let mut template = Table::from_columns("template", columns)?;
    template.dedupe_column_names();
    template.set_source(joined.source().cloned());
    tracing::debug!(rows = template.row_count(), sources = used.len(), "template built");
    Ok(template)
}

/// Split `name` into its field and the index of the source named by its
/// suffix, if any
fn split_source(name: &str, sources: &[String]) -> (String, Option<usize>) {
    sources
        .iter()
        .enumerate()
        .filter_map(|(idx, source)| {
            let field = name.strip_suffix(source.as_str())?.strip_suffix('_')?;
            (!field.is_empty()).then_some((field, idx, source.len()))
        })
        .max_by_key(|(_, _, len)| *len)
        .map_or((name.to_string(), None), |(field, idx, _)| {
            (field.to_string(), Some(idx))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceDescriptor;
    use pretty_assertions::assert_eq;

    fn joined() -> Table {
        Table::from_rows(
            "joined",
            ["AccountNo.", "District", "Reading", "Reading_feb.xlsx", "Status_feb.xlsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            vec![
                vec![
                    Cell::text("A1"),
                    Cell::text("East"),
                    Cell::Number(10.0),
                    Cell::Number(12.0),
                    Cell::text("ok"),
                ],
                vec![
                    Cell::text("A0"),
                    Cell::text("West"),
                    Cell::Number(3.0),
                    Cell::Empty,
                    Cell::Empty,
                ],
            ],
        )
        .unwrap()
        .with_source(SourceDescriptor::standalone("jan.xlsx"))
    }

    fn rendered(table: &Table) -> Vec<Vec<String>> {
        (0..table.row_count())
            .map(|r| table.row(r).iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_one_column_per_source() {
        let ids = vec!["AccountNo.".to_string(), "District".to_string()];
        let template =
            source_template(&joined(), &ids, "jan.xlsx", &["feb.xlsx".to_string()]).unwrap();

        assert_eq!(
            template.column_names(),
            vec!["AccountNo.", "District", "Column", "jan.xlsx", "feb.xlsx"]
        );
        assert_eq!(
            rendered(&template),
            vec![
                vec!["A0", "West", "Reading", "3", ""],
                vec!["A1", "East", "Reading", "10", "12"],
                vec!["A1", "East", "Status", "", "ok"],
            ]
        );
    }

    #[test]
    fn test_longest_source_suffix_wins() {
        let sources = vec!["b.csv".to_string(), "a_b.csv".to_string()];
        assert_eq!(
            split_source("Qty_a_b.csv", &sources),
            ("Qty".to_string(), Some(1))
        );
        assert_eq!(split_source("Qty", &sources), ("Qty".to_string(), None));
        assert_eq!(split_source("_b.csv", &sources), ("_b.csv".to_string(), None));
    }

    #[test]
    fn test_missing_or_reserved_id_column() {
        let err = source_template(&joined(), &["Meter".to_string()], "jan.xlsx", &[]).unwrap_err();
        assert!(matches!(err, MergeError::ColumnMissing { ref column, .. } if column == "Meter"));

        let err = source_template(&joined(), &["Column".to_string()], "jan.xlsx", &[]).unwrap_err();
        assert!(matches!(err, MergeError::Validation(_)));
    }
}
