//! Row and column insert/delete under the sheet's mutability policy.

use super::sheet::SheetOp;
use super::{CellUid, Sheet, MIN_GRID_DIMENSION};
use crate::error::AppError;

impl Sheet {
    /// Insert a row of fresh cells directly below grid row `after`.
    ///
    /// # Returns
    /// Grid index of the new row.
    ///
    /// # Errors
    /// Returns [`AppError::Forbidden`] when the sheet type disallows row inserts
    /// and [`AppError::InvalidIndex`] when `after` is past the last row.
    pub fn insert_row(&mut self, after: usize) -> Result<usize, AppError> {
        self.ensure_allowed(SheetOp::InsertRow)?;
        let last = self.row_count().saturating_sub(1);
        if after > last {
            return Err(AppError::InvalidIndex(format!(
                "cannot insert after row {after}; last row is {last}"
            )));
        }
        let at = after + 1;
        let row = (0..self.col_count())
            .map(|col| self.fresh_cell(at, col))
            .collect::<Vec<_>>();
        self.grid.insert_row(at, row);
        self.positions.invalidate();
        tracing::debug!(sheet = %self.uid, row = at, "row inserted");
        Ok(at)
    }

    /// Insert a column of fresh cells directly right of grid column `after`.
    ///
    /// # Returns
    /// Grid index of the new column.
    ///
    /// # Errors
    /// Returns [`AppError::Forbidden`] when the sheet type disallows column
    /// inserts and [`AppError::InvalidIndex`] when `after` is past the last column.
    pub fn insert_column(&mut self, after: usize) -> Result<usize, AppError> {
        self.ensure_allowed(SheetOp::InsertColumn)?;
        let last = self.col_count().saturating_sub(1);
        if after > last {
            return Err(AppError::InvalidIndex(format!(
                "cannot insert after column {after}; last column is {last}"
            )));
        }
        let at = after + 1;
        let column = (0..self.row_count())
            .map(|row| self.fresh_cell(row, at))
            .collect::<Vec<_>>();
        self.grid.insert_column(at, column);
        self.positions.invalidate();
        tracing::debug!(sheet = %self.uid, col = at, "column inserted");
        Ok(at)
    }

    /// Remove grid row `row`. Its cell versions stay in the log.
    ///
    /// # Returns
    /// The version ids that occupied the removed row.
    ///
    /// # Errors
    /// Returns [`AppError::Forbidden`] for the header row, a locked row, a
    /// sheet at minimum height, or a type that disallows row deletes, and
    /// [`AppError::InvalidIndex`] past the last row.
    pub fn delete_row(&mut self, row: usize) -> Result<Vec<CellUid>, AppError> {
        self.ensure_allowed(SheetOp::DeleteRow)?;
        if row == 0 {
            return Err(AppError::Forbidden(
                "the header row cannot be deleted".to_string(),
            ));
        }
        if self.row_count() <= MIN_GRID_DIMENSION {
            return Err(AppError::Forbidden(format!(
                "sheet '{}' is at its minimum of {} rows",
                self.name, MIN_GRID_DIMENSION
            )));
        }
        if row >= self.row_count() {
            return Err(AppError::InvalidIndex(format!(
                "row {row} does not exist; last row is {}",
                self.row_count() - 1
            )));
        }
        if self.is_row_locked(row) {
            return Err(AppError::Forbidden(format!("row {row} is locked")));
        }
        let removed = self.grid.remove_row(row);
        self.positions.invalidate();
        tracing::debug!(sheet = %self.uid, row, "row deleted");
        Ok(removed)
    }

    /// Remove grid column `col`. Its cell versions stay in the log.
    ///
    /// # Returns
    /// The version ids that occupied the removed column.
    ///
    /// # Errors
    /// Returns [`AppError::Forbidden`] for the header column, a sheet at minimum
    /// width, or a type that disallows column deletes, and
    /// [`AppError::InvalidIndex`] past the last column.
    pub fn delete_column(&mut self, col: usize) -> Result<Vec<CellUid>, AppError> {
        self.ensure_allowed(SheetOp::DeleteColumn)?;
        if col == 0 {
            return Err(AppError::Forbidden(
                "the header column cannot be deleted".to_string(),
            ));
        }
        if self.col_count() <= MIN_GRID_DIMENSION {
            return Err(AppError::Forbidden(format!(
                "sheet '{}' is at its minimum of {} columns",
                self.name, MIN_GRID_DIMENSION
            )));
        }
        if col >= self.col_count() {
            return Err(AppError::InvalidIndex(format!(
                "column {col} does not exist; last column is {}",
                self.col_count() - 1
            )));
        }
        let removed = self.grid.remove_column(col);
        self.positions.invalidate();
        tracing::debug!(sheet = %self.uid, col, "column deleted");
        Ok(removed)
    }
}
