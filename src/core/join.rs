//! Cross-file joins on a shared key column

use crate::error::{MergeError, MergeResult};
use crate::types::{Cell, ErrorLog, Table};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Full outer join of `base` with each companion in turn, on `key`
///
/// Each companion is first projected onto the key plus those of
/// `extra_columns` it actually has (in the companion's column order). Companion
/// columns whose names are already taken get a `_{file name}` suffix, then a
/// further `_{n}` if still taken.
///
/// Keys are compared by their text rendering and empty keys never match.
/// Duplicate keys produce every pairing. Output rows are the accumulated rows
/// in order, each expanded by its matches, followed by unmatched companion
/// rows in companion order.
///
/// A base without the key column is an error; a companion without it is
/// logged and skipped.
pub fn outer_join(
    base: &Table,
    companions: &[Table],
    key: &str,
    extra_columns: &[String],
    log: &mut ErrorLog,
) -> MergeResult<Table> {
    if !base.has_column(key) {
        return Err(MergeError::JoinKeyMissing {
            key: key.to_string(),
            source_name: base.source_label(),
        });
    }

    let mut acc = base.clone();
    acc.dedupe_column_names();

    for companion in companions {
        if !companion.has_column(key) {
            let err = MergeError::JoinKeyMissing {
                key: key.to_string(),
                source_name: companion.source_label(),
            };
            tracing::warn!(source = %companion.source_label(), key, "companion skipped");
            log.error(companion.source_label(), err.to_string());
            continue;
        }
        acc = join_one(&acc, companion, key, extra_columns)?;
    }

    acc.set_source(base.source().cloned());
    Ok(acc)
}

fn join_one(acc: &Table, companion: &Table, key: &str, extra: &[String]) -> MergeResult<Table> {
    let wanted: HashSet<&str> = extra.iter().map(String::as_str).collect();
    let projected: Vec<usize> = companion
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.name != key && wanted.contains(c.name.as_str()))
        .map(|(idx, _)| idx)
        .collect();

    // Output header: accumulated names then renamed companion names
    let mut header: Vec<String> = acc.column_names().iter().map(|s| s.to_string()).collect();
    let suffix = companion
        .source()
        .map(|s| s.file_name().to_string())
        .unwrap_or_else(|| companion.name.clone());
    for &idx in &projected {
        let name = &companion.columns()[idx].name;
        let unique = unique_name(name, &suffix, &header);
        header.push(unique);
    }

    let acc_key = acc.column_index(key).unwrap_or(0);
    let comp_key = companion.column_index(key).unwrap_or(0);

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..companion.row_count() {
        if let Some(text) = key_text(companion.cell(row, comp_key)) {
            index.entry(text).or_default().push(row);
        }
    }

    let companion_values = |row: Option<usize>| -> Vec<Cell> {
        projected
            .iter()
            .map(|&col| match row {
                Some(row) => companion.cell(row, col).cloned().unwrap_or_default(),
                None => Cell::Empty,
            })
            .collect()
    };

    let mut matched = vec![false; companion.row_count()];
    let mut rows: Vec<Vec<Cell>> = Vec::with_capacity(acc.row_count());

    for row in 0..acc.row_count() {
        let left: Vec<Cell> = acc.row(row).into_iter().cloned().collect();
        let matches = key_text(acc.cell(row, acc_key)).and_then(|text| index.get(&text));
        match matches {
            Some(partners) => {
                for &partner in partners {
                    matched[partner] = true;
                    let mut out = left.clone();
                    out.extend(companion_values(Some(partner)));
                    rows.push(out);
                }
            }
            None => {
                let mut out = left;
                out.extend(companion_values(None));
                rows.push(out);
            }
        }
    }

    for (row, _) in matched.iter().enumerate().filter(|(_, m)| !**m) {
        let mut out = vec![Cell::Empty; acc.column_count()];
        out[acc_key] = companion.cell(row, comp_key).cloned().unwrap_or_default();
        out.extend(companion_values(Some(row)));
        rows.push(out);
    }

    tracing::debug!(
        companion = %companion.source_label(),
        rows = rows.len(),
        added_columns = projected.len(),
        "joined companion"
    );
    Table::from_rows(acc.name.clone(), header, rows)
}

fn key_text(cell: Option<&Cell>) -> Option<String> {
    match cell {
        None | Some(Cell::Empty) => None,
        Some(cell) => Some(cell.as_text().into_owned()),
    }
}

fn unique_name(name: &str, suffix: &str, taken: &[String]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|t| t == candidate);
    if !is_taken(name) {
        return name.to_string();
    }
    let base = format!("{}_{}", name, suffix);
    if !is_taken(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Stable multi-column row sort
///
/// Numbers sort before text and booleans, numbers numerically, text
/// lexicographically; empty cells sort last.
pub fn sort_rows(table: &mut Table, columns: &[String]) -> MergeResult<()> {
    let indices = columns
        .iter()
        .map(|name| {
            table.column_index(name).ok_or_else(|| MergeError::ColumnMissing {
                column: name.clone(),
                source_name: table.source_label(),
            })
        })
        .collect::<MergeResult<Vec<usize>>>()?;

    let mut order: Vec<usize> = (0..table.row_count()).collect();
    order.sort_by(|&a, &b| {
        indices
            .iter()
            .map(|&col| compare_cells(table.cell(a, col), table.cell(b, col)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    table.reorder_rows(&order)
}

fn compare_cells(a: Option<&Cell>, b: Option<&Cell>) -> Ordering {
    fn rank(cell: Option<&Cell>) -> u8 {
        match cell {
            Some(Cell::Number(_)) => 0,
            Some(Cell::Text(_)) | Some(Cell::Bool(_)) => 1,
            Some(Cell::Empty) | None => 2,
        }
    }
    match (a, b) {
        (Some(Cell::Number(x)), Some(Cell::Number(y))) => x.total_cmp(y),
        (Some(x), Some(y)) if rank(a) == 1 && rank(b) == 1 => x.as_text().cmp(&y.as_text()),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceDescriptor, Severity};
    use pretty_assertions::assert_eq;

    fn table(member: &str, header: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            member,
            header.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| Cell::text(*s)).collect())
                .collect(),
        )
        .unwrap()
        .with_source(SourceDescriptor::standalone(member))
    }

    fn rendered(table: &Table) -> Vec<Vec<String>> {
        (0..table.row_count())
            .map(|r| table.row(r).iter().map(|c| c.as_text().into_owned()).collect())
            .collect()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_outer_join_keeps_all_keys() {
        let base = table("base.csv", &["id", "name"], &[&["1", "a"], &["2", "b"]]);
        let comp = table("extra.csv", &["id", "score", "junk"], &[&["2", "90", "x"], &["3", "70", "y"]]);
        let mut log = ErrorLog::new();
        let out = outer_join(&base, &[comp], "id", &cols(&["score"]), &mut log).unwrap();

        assert_eq!(out.column_names(), vec!["id", "name", "score"]);
        assert_eq!(
            rendered(&out),
            vec![
                vec!["1", "a", ""],
                vec!["2", "b", "90"],
                vec!["3", "", "70"],
            ]
        );
        assert!(log.is_empty());
    }

    #[test]
    fn test_join_collision_suffix() {
        let base = table("base.csv", &["id", "score"], &[&["1", "5"]]);
        let comp = table("q2.xlsx", &["id", "score"], &[&["1", "6"]]);
        let out = outer_join(&base, &[comp], "id", &cols(&["score"]), &mut ErrorLog::new()).unwrap();
        assert_eq!(out.column_names(), vec!["id", "score", "score_q2.xlsx"]);
        assert_eq!(rendered(&out), vec![vec!["1", "5", "6"]]);
    }

    #[test]
    fn test_join_collision_numbered_when_suffix_taken() {
        let base = table("base.csv", &["id", "v", "v_c.csv"], &[&["1", "a", "b"]]);
        let comp = table("c.csv", &["id", "v"], &[&["1", "c"]]);
        let out = outer_join(&base, &[comp], "id", &cols(&["v"]), &mut ErrorLog::new()).unwrap();
        assert_eq!(out.column_names(), vec!["id", "v", "v_c.csv", "v_c.csv_1"]);
    }

    #[test]
    fn test_duplicate_keys_produce_all_pairings() {
        let base = table("base.csv", &["id", "l"], &[&["1", "a"], &["1", "b"]]);
        let comp = table("c.csv", &["id", "r"], &[&["1", "x"], &["1", "y"]]);
        let out = outer_join(&base, &[comp], "id", &cols(&["r"]), &mut ErrorLog::new()).unwrap();
        assert_eq!(out.row_count(), 4);
        assert_eq!(
            rendered(&out),
            vec![
                vec!["1", "a", "x"],
                vec!["1", "a", "y"],
                vec!["1", "b", "x"],
                vec!["1", "b", "y"],
            ]
        );
    }

    #[test]
    fn test_empty_keys_never_match() {
        let base = table("base.csv", &["id", "l"], &[&["", "a"]]);
        let comp = table("c.csv", &["id", "r"], &[&["", "x"]]);
        let out = outer_join(&base, &[comp], "id", &cols(&["r"]), &mut ErrorLog::new()).unwrap();
        assert_eq!(rendered(&out), vec![vec!["", "a", ""], vec!["", "", "x"]]);
    }

    #[test]
    fn test_numeric_and_text_keys_match_by_rendering() {
        let base = Table::from_rows(
            "base",
            cols(&["id", "l"]),
            vec![vec![Cell::Number(7.0), Cell::text("a")]],
        )
        .unwrap();
        let comp = table("c.csv", &["id", "r"], &[&["7", "x"]]);
        let out = outer_join(&base, &[comp], "id", &cols(&["r"]), &mut ErrorLog::new()).unwrap();
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn test_companion_without_key_is_logged() {
        let base = table("base.csv", &["id"], &[&["1"]]);
        let bad = table("bad.csv", &["other"], &[&["1"]]);
        let good = table("good.csv", &["id", "v"], &[&["1", "z"]]);
        let mut log = ErrorLog::new();
        let out = outer_join(&base, &[bad, good], "id", &cols(&["v"]), &mut log).unwrap();
        assert_eq!(rendered(&out), vec![vec!["1", "z"]]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].source, "bad.csv");
        assert_eq!(log.entries()[0].severity, Severity::Error);
    }

    #[test]
    fn test_base_without_key_is_error() {
        let base = table("base.csv", &["other"], &[&["1"]]);
        let err = outer_join(&base, &[], "id", &[], &mut ErrorLog::new()).unwrap_err();
        assert!(matches!(err, MergeError::JoinKeyMissing { ref key, .. } if key == "id"));
    }

    #[test]
    fn test_sort_rows_mixed_types() {
        let mut t = Table::from_rows(
            "t",
            cols(&["k", "v"]),
            vec![
                vec![Cell::text("b"), Cell::Number(1.0)],
                vec![Cell::Empty, Cell::Number(2.0)],
                vec![Cell::Number(10.0), Cell::Number(3.0)],
                vec![Cell::text("a"), Cell::Number(4.0)],
                vec![Cell::Number(9.0), Cell::Number(5.0)],
                vec![Cell::text("a"), Cell::Number(6.0)],
            ],
        )
        .unwrap();
        sort_rows(&mut t, &cols(&["k"])).unwrap();
        let v: Vec<String> = t.column("v").unwrap().values.iter().map(|c| c.to_string()).collect();
        assert_eq!(v, vec!["5", "3", "4", "6", "1", "2"]);
    }

    #[test]
    fn test_sort_rows_multi_column_and_missing() {
        let mut t = table("t", &["a", "b"], &[&["x", "2"], &["x", "1"], &["w", "9"]]);
        sort_rows(&mut t, &cols(&["a", "b"])).unwrap();
        assert_eq!(rendered(&t), vec![vec!["w", "9"], vec!["x", "1"], vec!["x", "2"]]);
        assert!(sort_rows(&mut t, &cols(&["zz"])).is_err());
    }
}
