//! Row-level change classification between two turns of one sheet.
//!
//! Rows are identified by the [`CoordUid`] of their row-header cell, which
//! survives content edits and lock changes but is fresh for every inserted row.

use crate::grid::{Cell, CellUid, CoordUid, Sheet};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Classification of one row against the previous turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    New,
    Updated,
    Kept,
    /// Present last turn, gone now; shown once as a tombstone.
    Deleted,
}

/// One displayed row with its classification.
#[derive(Debug, Clone, Serialize)]
pub struct RowDiff {
    pub identity: CoordUid,
    pub status: RowStatus,
    /// Grid columns whose cell changed since the previous turn.
    pub updated_columns: Vec<usize>,
    /// Row cells, flagged `is_deleted` for tombstones.
    pub cells: Vec<Cell>,
}

impl RowDiff {
    pub fn values(&self) -> Vec<&str> {
        self.cells.iter().map(Cell::value).collect()
    }
}

/// Computes highlight views and owns the one-pass tombstones.
#[derive(Debug, Default)]
pub struct DiffEngine {
    tombstones: HashSet<CoordUid>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows shown as deleted by the most recent pass.
    pub fn tombstones(&self) -> &HashSet<CoordUid> {
        &self.tombstones
    }

    /// Classify every row of `current` against `previous`.
    ///
    /// Tombstones from the prior pass are purged first. Rows deleted since
    /// `previous` are reinserted at their previous position with every cell
    /// flagged `is_deleted`.
    pub fn diff(&mut self, previous: &Sheet, current: &Sheet) -> Vec<RowDiff> {
        self.tombstones.clear();

        let previous_rows = (0..previous.row_count())
            .filter_map(|row| {
                let (identity, slots) = row_slots(previous, row)?;
                Some((identity, (row, slots.into_iter().collect::<HashMap<_, _>>())))
            })
            .collect::<HashMap<_, _>>();
        let mut seen = HashSet::new();

        let mut rows = Vec::with_capacity(current.row_count());
        for row in 0..current.row_count() {
            let Some((identity, slots)) = row_slots(current, row) else {
                continue;
            };
            seen.insert(identity.clone());
            let (status, updated_columns) = match previous_rows.get(&identity) {
                None => (RowStatus::New, Vec::new()),
                Some((_, before)) => {
                    let updated = slots
                        .iter()
                        .enumerate()
                        .filter(|(_, (coord, uid))| before.get(coord) != Some(uid))
                        .map(|(col, _)| col)
                        .collect::<Vec<_>>();
                    if updated.is_empty() {
                        (RowStatus::Kept, updated)
                    } else {
                        (RowStatus::Updated, updated)
                    }
                }
            };
            rows.push(RowDiff {
                identity,
                status,
                updated_columns,
                cells: row_cells(current, row),
            });
        }

        let mut deleted = previous_rows
            .iter()
            .filter(|(identity, _)| !seen.contains(*identity))
            .map(|(identity, (row, _))| (*row, identity.clone()))
            .collect::<Vec<_>>();
        deleted.sort();
        for (row, identity) in deleted {
            let mut cells = row_cells(previous, row);
            for cell in &mut cells {
                cell.is_deleted = true;
            }
            rows.insert(
                row.min(rows.len()),
                RowDiff {
                    identity: identity.clone(),
                    status: RowStatus::Deleted,
                    updated_columns: Vec::new(),
                    cells,
                },
            );
            self.tombstones.insert(identity);
        }

        tracing::debug!(
            sheet = %current.uid,
            rows = rows.len(),
            tombstones = self.tombstones.len(),
            "diff computed"
        );
        rows
    }
}

/// Row identity and its `coord -> uid` slots, in grid column order.
fn row_slots(sheet: &Sheet, row: usize) -> Option<(CoordUid, Vec<(CoordUid, CellUid)>)> {
    let identity = sheet.cell_at(row, 0)?.coord_uid.clone();
    let slots = (0..sheet.col_count())
        .filter_map(|col| sheet.cell_at(row, col))
        .map(|cell| (cell.coord_uid.clone(), cell.uid.clone()))
        .collect();
    Some((identity, slots))
}

fn row_cells(sheet: &Sheet, row: usize) -> Vec<Cell> {
    (0..sheet.col_count())
        .filter_map(|col| sheet.cell_at(row, col).cloned())
        .collect()
}
