//! Consolidation engine: reconcile, join, summarize, template, and drive batches

pub mod batch;
pub mod join;
pub mod reconcile;
pub mod summary;
pub mod template;

pub use batch::{
    run_batch, BatchContext, BatchInput, BatchOrchestrator, BatchOutcome, BatchStatus,
    ContainerOutput,
};
pub use join::{outer_join, sort_rows};
pub use reconcile::{select_columns, strict_concat, union_concat, ConcatOptions, ProvenanceStyle};
pub use summary::{
    derive_char_column, flag_changes, pivot_row_counts, summary_table, BAND_COLUMN, BAND_POSITION,
};
pub use template::{source_template, FIELD_COLUMN};
