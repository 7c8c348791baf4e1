//! SheetMerge - tabular ingestion and consolidation
//!
//! Reads heterogeneous CSV / XLS / XLSX files (loose or bundled in ZIPs),
//! finds the real header row in each, and consolidates the results.
//!
//! # Features
//!
//! - Header detection with a swappable predicate (default: `S/N` / `Serial No`)
//! - Blank row and column pruning
//! - Safe, unique, length-bounded sheet ids
//! - Strict and column-aligned concatenation with provenance
//! - Full outer joins across files on a key
//! - Row-count pivots and change flags
//! - Batch runs with per-member error logging
//!
//! # Example
//!
//! ```no_run
//! use royalbit_sheetmerge::config::MergeConfig;
//! use royalbit_sheetmerge::core::run_batch;
//! use royalbit_sheetmerge::ingest::open_path;
//! use royalbit_sheetmerge::writer::OutputWriter;
//! use std::path::Path;
//!
//! let container = open_path(Path::new("north.zip"))?;
//! let mut outcome = run_batch(vec![container], &MergeConfig::default())?;
//!
//! println!("Sheets: {}", outcome.sheet_count());
//! println!("Problems: {}", outcome.errors.error_count());
//!
//! OutputWriter::new("out").write(&mut outcome)?;
//! # Ok::<(), royalbit_sheetmerge::error::MergeError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod excel;
pub mod ingest;
pub mod types;
pub mod writer;

pub use config::MergeConfig;
pub use error::{MergeError, MergeResult};
pub use types::{Cell, Column, ErrorLog, RawGrid, SourceDescriptor, SummaryEntry, Table};
