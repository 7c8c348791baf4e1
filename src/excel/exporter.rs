//! Workbook exporter: named tables → .xlsx

use crate::error::{MergeError, MergeResult};
use crate::types::{Cell, Table};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::HashSet;
use std::path::Path;

/// Excel's hard row limit, header row included
const MAX_ROWS: usize = 1_048_576;
/// Excel's hard column limit
const MAX_COLUMNS: usize = 16_384;

/// Builds a workbook with one worksheet per table
///
/// Row 0 of every sheet holds the column names in bold; data rows follow in
/// table order. Empty cells are left unwritten.
pub struct WorkbookExporter {
    workbook: Workbook,
    header_format: Format,
    /// Lower-cased names already used; Excel compares sheet names case-insensitively
    sheet_names: HashSet<String>,
}

impl Default for WorkbookExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkbookExporter {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            header_format: Format::new().set_bold(),
            sheet_names: HashSet::new(),
        }
    }

    /// Build an exporter from `(sheet name, table)` pairs in order
    pub fn from_sheets<'a, I>(sheets: I) -> MergeResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a Table)>,
    {
        let mut exporter = Self::new();
        for (name, table) in sheets {
            exporter.add_table(name, table)?;
        }
        Ok(exporter)
    }

    pub fn sheet_count(&self) -> usize {
        self.sheet_names.len()
    }

    /// Write `table` to a new worksheet named `sheet_name`
    pub fn add_table(&mut self, sheet_name: &str, table: &Table) -> MergeResult<()> {
        if table.row_count() + 1 > MAX_ROWS || table.column_count() > MAX_COLUMNS {
            return Err(MergeError::Export(format!(
                "Table for sheet '{}' ({} rows x {} columns) exceeds worksheet limits",
                sheet_name,
                table.row_count(),
                table.column_count()
            )));
        }
        if !self.sheet_names.insert(sheet_name.to_lowercase()) {
            return Err(MergeError::Export(format!(
                "Duplicate worksheet name '{}'",
                sheet_name
            )));
        }

        let header_format = self.header_format.clone();
        let worksheet = self.workbook.add_worksheet();
        worksheet.set_name(sheet_name).map_err(|e| {
            MergeError::Export(format!("Failed to set worksheet name '{}': {}", sheet_name, e))
        })?;

        for (col_idx, column) in table.columns().iter().enumerate() {
            let col = col_idx as u16;
            worksheet
                .write_string_with_format(0, col, &column.name, &header_format)
                .map_err(|e| MergeError::Export(format!("Failed to write header: {}", e)))?;

            for (row_idx, cell) in column.values.iter().enumerate() {
                Self::write_cell(worksheet, (row_idx + 1) as u32, col, cell)?;
            }
        }

        tracing::debug!(
            sheet = sheet_name,
            rows = table.row_count(),
            "worksheet written"
        );
        Ok(())
    }

    fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> MergeResult<()> {
        match cell {
            Cell::Empty => {}
            Cell::Text(value) => {
                worksheet
                    .write_string(row, col, value)
                    .map_err(|e| MergeError::Export(format!("Failed to write text: {}", e)))?;
            }
            Cell::Number(value) => {
                worksheet
                    .write_number(row, col, *value)
                    .map_err(|e| MergeError::Export(format!("Failed to write number: {}", e)))?;
            }
            Cell::Bool(value) => {
                worksheet
                    .write_boolean(row, col, *value)
                    .map_err(|e| MergeError::Export(format!("Failed to write boolean: {}", e)))?;
            }
        }
        Ok(())
    }

    /// Save the workbook to disk
    pub fn save(mut self, path: &Path) -> MergeResult<()> {
        self.workbook
            .save(path)
            .map_err(|e| MergeError::Export(format!("Failed to save Excel file: {}", e)))
    }

    /// Serialize the workbook to bytes
    pub fn to_buffer(mut self) -> MergeResult<Vec<u8>> {
        Ok(self.workbook.save_to_buffer()?)
    }
}
