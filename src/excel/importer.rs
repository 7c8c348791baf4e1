//! Grid reader: member bytes (.csv / .xls / .xlsx) → RawGrid

use crate::error::{MergeError, MergeResult};
use crate::types::{extension, Cell, RawGrid};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes tabular member files into untyped grids
///
/// The format is chosen from the member's extension. Workbooks are read from
/// their first worksheet only.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridReader;

impl GridReader {
    pub fn new() -> Self {
        Self
    }

    /// Decode `bytes` according to the extension of `member`
    pub fn read(&self, member: &str, bytes: &[u8]) -> MergeResult<RawGrid> {
        let grid = match extension(member).as_str() {
            "csv" => Self::read_csv(bytes),
            "xls" | "xlsx" => Self::read_workbook(bytes),
            _ => return Err(MergeError::UnsupportedFormat(member.to_string())),
        }
        .map_err(|e| e.in_member(member))?;

        tracing::debug!(
            member,
            rows = grid.height(),
            columns = grid.width(),
            "decoded grid"
        );
        Ok(grid)
    }

    /// Read a CSV document with no header semantics
    ///
    /// Rows may have differing lengths. Invalid UTF-8 is replaced rather than
    /// rejected. Fields whose number renders back unchanged become numbers;
    /// everything else, identifiers like `007` included, stays text.
    pub fn read_csv(bytes: &[u8]) -> MergeResult<RawGrid> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);

        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|field| csv_cell(&String::from_utf8_lossy(field)))
                    .collect(),
            );
        }
        Ok(RawGrid::new(rows))
    }

    /// Read the first worksheet of an .xls or .xlsx workbook
    pub fn read_workbook(bytes: &[u8]) -> MergeResult<RawGrid> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range?,
            None => return Ok(RawGrid::default()),
        };
        Ok(range_to_grid(&range))
    }
}

/// A field becomes a number only if the number renders back to the same
/// text, so long identifiers, leading zeros and `1.50` stay as written
fn csv_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() && n.to_string() == trimmed => Cell::Number(n),
        _ => Cell::text(field),
    }
}

/// Convert a calamine range into a grid anchored at A1
///
/// calamine trims leading empty rows and columns; those would be pruned
/// anyway, so the range is used as-is.
fn range_to_grid(range: &Range<Data>) -> RawGrid {
    let rows = range
        .rows()
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect();
    RawGrid::new(rows)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.as_str()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.as_str()),
        Data::Error(e) => Cell::text(e.to_string()),
    }
}
