//! Ingestion: from raw member bytes to clean, header-aware tables
//!
//! - `container`: ZIP archives and standalone files as named members
//! - `prune`: blank row/column removal
//! - `header`: header row detection
//! - `sheet_id`: safe, unique, length-bounded sheet identifiers

pub mod container;
pub mod header;
pub mod prune;
pub mod sheet_id;

pub use container::{is_supported, open_path, unpack_zip, ContainerInput, MemberBlob};
pub use header::{
    table_from_first_row, Detection, FixedRow, HeaderDetector, HeaderPredicate, PatternPredicate,
};
pub use prune::prune;
pub use sheet_id::{normalize, SheetIdAllocator};
