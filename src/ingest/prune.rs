//! Blank row and column removal

use crate::types::{Cell, RawGrid};

/// Remove every all-empty row, then every column that is empty in all
/// remaining rows. Surviving rows and columns keep their relative order.
pub fn prune(grid: &RawGrid) -> RawGrid {
    let plan = PrunePlan::for_rows(grid.rows(), grid.width());
    RawGrid::new(plan.apply(grid.rows()))
}

/// Indices of the rows and columns that survive pruning
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PrunePlan {
    pub rows: Vec<usize>,
    pub columns: Vec<usize>,
}

impl PrunePlan {
    pub fn for_rows(rows: &[Vec<Cell>], width: usize) -> Self {
        let kept_rows: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|cell| !cell.is_empty()))
            .map(|(idx, _)| idx)
            .collect();

        let columns = (0..width)
            .filter(|&col| {
                kept_rows
                    .iter()
                    .any(|&row| rows[row].get(col).is_some_and(|cell| !cell.is_empty()))
            })
            .collect();

        Self {
            rows: kept_rows,
            columns,
        }
    }

    pub fn apply(&self, rows: &[Vec<Cell>]) -> Vec<Vec<Cell>> {
        self.rows
            .iter()
            .map(|&row| {
                self.columns
                    .iter()
                    .map(|&col| rows[row].get(col).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}
