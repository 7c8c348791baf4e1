//! Delimited-text export: Table → CSV

use crate::error::{MergeError, MergeResult};
use crate::types::Table;
use std::fs;
use std::path::Path;

/// Serialize a table as comma-separated text with a header row
pub fn to_csv_bytes(table: &Table) -> MergeResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.column_names())?;
    for row_idx in 0..table.row_count() {
        writer.write_record(table.row(row_idx).iter().map(|cell| cell.as_text().into_owned()))?;
    }
    writer
        .into_inner()
        .map_err(|e| MergeError::Export(format!("Failed to flush CSV: {}", e)))
}

pub fn to_csv_string(table: &Table) -> MergeResult<String> {
    let bytes = to_csv_bytes(table)?;
    String::from_utf8(bytes).map_err(|e| MergeError::Export(e.to_string()))
}

pub fn write_csv(table: &Table, path: &Path) -> MergeResult<()> {
    fs::write(path, to_csv_bytes(table)?)?;
    Ok(())
}
