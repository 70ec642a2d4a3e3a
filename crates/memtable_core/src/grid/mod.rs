//! Versioned, identity-stable grid of cells.
//!
//! A [`Sheet`] owns an append-only log of [`Cell`] versions and a rectangular
//! [`Grid`] of version ids. Content edits never touch an existing cell: they
//! append a new version sharing the slot's [`CoordUid`] and repoint one grid slot.

/// Cell versions and identifiers.
pub mod cell;
/// Sheet metadata, policy, and persisted form.
pub mod sheet;
/// Content writes, history, and position lookup.
mod store;
/// Row/column insert and delete.
mod structure;


pub use cell::{value_patch, Cell, CellKind, CellUid, CoordUid, Fields};
pub use sheet::{Sheet, SheetDomain, SheetOp, SheetRecord, SheetType};

use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Smallest legal grid dimension (one header plus one content line).
pub const MIN_GRID_DIMENSION: usize = 2;

/// Rectangular matrix of cell version ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<CellUid>>,
}

impl Grid {
    /// Allocate a `rows` x `cols` grid of fresh cells.
    ///
    /// Each slot gets a fresh [`CoordUid`] and a [`CellKind`] derived from its
    /// position.
    ///
    /// # Returns
    /// The grid and the cells it references, in row-major order.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidIndex`] when either dimension is below 2.
    pub fn create(rows: usize, cols: usize) -> Result<(Self, Vec<Cell>), AppError> {
        if rows < MIN_GRID_DIMENSION || cols < MIN_GRID_DIMENSION {
            return Err(AppError::InvalidIndex(format!(
                "grid must be at least {min}x{min}, got {rows}x{cols}",
                min = MIN_GRID_DIMENSION
            )));
        }
        Ok(Self::allocate(rows, cols))
    }

    pub(crate) fn allocate(rows: usize, cols: usize) -> (Self, Vec<Cell>) {
        let mut cells = Vec::with_capacity(rows * cols);
        let grid_rows = (0..rows)
            .map(|row| {
                (0..cols)
                    .map(|col| {
                        let cell = Cell::fresh(CellKind::at(row, col));
                        let uid = cell.uid.clone();
                        cells.push(cell);
                        uid
                    })
                    .collect()
            })
            .collect();
        (Self { rows: grid_rows }, cells)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&CellUid> {
        self.rows.get(row).and_then(|cells| cells.get(col))
    }

    pub fn row(&self, row: usize) -> Option<&[CellUid]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    /// Iterate rows in grid order.
    pub fn rows(&self) -> impl Iterator<Item = &[CellUid]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, uid: CellUid) -> bool {
        match self.rows.get_mut(row).and_then(|cells| cells.get_mut(col)) {
            Some(slot) => {
                *slot = uid;
                true
            }
            None => false,
        }
    }

    pub(crate) fn insert_row(&mut self, at: usize, row: Vec<CellUid>) {
        self.rows.insert(at, row);
    }

    pub(crate) fn remove_row(&mut self, at: usize) -> Vec<CellUid> {
        self.rows.remove(at)
    }

    pub(crate) fn insert_column(&mut self, at: usize, column: Vec<CellUid>) {
        for (row, uid) in self.rows.iter_mut().zip(column) {
            row.insert(at, uid);
        }
    }

    pub(crate) fn remove_column(&mut self, at: usize) -> Vec<CellUid> {
        self.rows.iter_mut().map(|row| row.remove(at)).collect()
    }

    /// Check rectangularity and minimum size.
    pub(crate) fn check_shape(&self) -> Result<(), String> {
        if self.row_count() < MIN_GRID_DIMENSION || self.col_count() < MIN_GRID_DIMENSION {
            return Err(format!(
                "grid is {}x{}, minimum is {min}x{min}",
                self.row_count(),
                self.col_count(),
                min = MIN_GRID_DIMENSION
            ));
        }
        let width = self.col_count();
        if let Some(index) = self.rows.iter().position(|row| row.len() != width) {
            return Err(format!(
                "row {} has {} cells, expected {}",
                index,
                self.rows[index].len(),
                width
            ));
        }
        Ok(())
    }
}
