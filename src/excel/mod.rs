//! Spreadsheet and CSV input/output
//!
//! - Import: .csv / .xls / .xlsx bytes → untyped grid
//! - Export: tables → .xlsx worksheets or CSV text

pub mod delimited;
mod exporter;
mod importer;

pub use delimited::{to_csv_bytes, to_csv_string, write_csv};
pub use exporter::WorkbookExporter;
pub use importer::GridReader;
