//! Ingestion tests: sheet ids, pruning, header detection

use pretty_assertions::assert_eq;
use royalbit_sheetmerge::ingest::header::{Detection, FixedRow, HeaderDetector};
use royalbit_sheetmerge::ingest::{prune, SheetIdAllocator};
use royalbit_sheetmerge::{Cell, MergeConfig, RawGrid};
use std::collections::HashSet;

// ═══════════════════════════════════════════════════════════════════════════
// SHEET IDS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_allocated_ids_are_valid_and_distinct() {
    let names: Vec<String> = [
        "report.csv",
        "Report.xlsx",
        "dir/report.csv",
        "a very long file name that keeps going and going.xlsx",
        "a very long file name that keeps going and going.csv",
        "a very long file name that keeps going and going (copy).csv",
        "...",
        "",
        "数据.csv",
        "数据.xlsx",
        "C:\\exports\\meter readings #4.xls",
        "meter_readings__4.csv",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain((0..50).map(|i| format!("batch/sheet-{}.csv", i % 7)))
    .collect();

    let mut allocator = SheetIdAllocator::default();
    let mut seen = HashSet::new();
    for name in &names {
        let id = allocator.allocate(name);
        assert!(id.len() <= 31, "{id} too long");
        assert!(!id.is_empty());
        assert!(
            id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "{id} has invalid characters"
        );
        assert!(seen.insert(id.to_lowercase()), "{id} allocated twice");
    }
    assert_eq!(seen.len(), names.len());
}

// ═══════════════════════════════════════════════════════════════════════════
// PRUNING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_prune_is_idempotent() {
    let grids = [
        RawGrid::from_strs(&[&["", "", ""], &["", "x", ""], &["", "", "y"]]),
        RawGrid::from_strs(&[&["  "], &[""]]),
        RawGrid::from_strs(&[&["a", "b"], &["c", "d"]]),
        RawGrid::default(),
    ];
    for grid in &grids {
        let once = prune(grid);
        assert_eq!(prune(&once), once);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HEADER DETECTION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_junk_row_then_serial_header() {
    let grid = RawGrid::from_strs(&[&["junk"], &["S/N", "Name"], &["1", "Alice"], &["2", "Bob"]]);
    let detection = HeaderDetector::new().analyze(&grid);
    assert_eq!(detection.header_row(), Some(1));

    let (table, rows) = detection.into_table();
    assert_eq!(rows, 2);
    assert_eq!(
        table.column("Name").unwrap().values,
        vec![Cell::text("Alice"), Cell::text("Bob")]
    );
}

#[test]
fn test_header_missing_and_header_without_data_are_distinguished() {
    let detector = HeaderDetector::new();

    let missing = detector.analyze(&RawGrid::from_strs(&[&["a", "b"], &["1", "2"]]));
    assert!(matches!(missing, Detection::HeaderNotFound { scanned: 2 }));

    let empty = detector.analyze(&RawGrid::from_strs(&[&["title"], &["Serial No", "Qty"]]));
    assert!(matches!(empty, Detection::Detected { header_row: 1, .. }));
    assert_eq!(empty.row_count(), 0);
}

#[test]
fn test_configured_pattern_and_fixed_row() {
    let config = MergeConfig::from_yaml("header:\n  pattern: '^meter'\n").unwrap();
    let grid = RawGrid::from_strs(&[&["x"], &["MeterNo", "Reading"], &["M1", "12"]]);
    let (table, rows) = HeaderDetector::from_config(&config).unwrap().detect(&grid);
    assert_eq!(rows, 1);
    assert_eq!(table.column_names(), vec!["MeterNo", "Reading"]);

    let (table, _) = HeaderDetector::with_predicate(FixedRow(0)).detect(&grid);
    assert_eq!(table.column_names(), vec!["x", "col_1"]);
}
