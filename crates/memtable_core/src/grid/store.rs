//! Content writes, version history, and cached position lookup.

use super::cell::{Cell, CellKind, CellUid, CoordUid, Fields};
use super::Sheet;
use crate::error::AppError;
use std::collections::HashMap;

/// Lazily rebuilt `uid -> (row, col)` index over the current grid.
#[derive(Debug, Clone)]
pub(crate) struct PositionCache {
    positions: HashMap<CellUid, (usize, usize)>,
    dirty: bool,
}

impl Default for PositionCache {
    fn default() -> Self {
        Self {
            positions: HashMap::new(),
            dirty: true,
        }
    }
}

impl PositionCache {
    pub(crate) fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Sheet {
    /// Write `patch` over the cell at `(row, col)` as a new version.
    ///
    /// The previous version stays in the log untouched; the new one shares its
    /// [`CoordUid`] and takes over the grid slot. This is the only way content
    /// changes.
    ///
    /// # Returns
    /// The newly appended cell version.
    ///
    /// # Errors
    /// Returns [`AppError::OutOfBounds`] when `(row, col)` is outside the grid.
    pub fn edit_cell(&mut self, row: usize, col: usize, patch: &Fields) -> Result<Cell, AppError> {
        let current = self
            .cell_at(row, col)
            .ok_or(AppError::OutOfBounds { row, col })?;
        let next = current.next_version(patch);
        self.commit_version(row, col, next)
    }

    /// Set a single field on the cell at `(row, col)` as a new version.
    ///
    /// # Errors
    /// Returns [`AppError::OutOfBounds`] when `(row, col)` is outside the grid.
    pub fn set_field(
        &mut self,
        row: usize,
        col: usize,
        key: &str,
        value: impl Into<String>,
    ) -> Result<Cell, AppError> {
        let mut patch = Fields::new();
        patch.insert(key.to_string(), value.into());
        self.edit_cell(row, col, &patch)
    }

    /// Lock or unlock grid row `row` through a new row-header version.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidIndex`] for the header row and
    /// [`AppError::OutOfBounds`] past the last row.
    pub fn set_row_locked(&mut self, row: usize, locked: bool) -> Result<Cell, AppError> {
        if row == 0 {
            return Err(AppError::InvalidIndex(
                "the header row cannot be locked".to_string(),
            ));
        }
        let current = self
            .cell_at(row, 0)
            .ok_or(AppError::OutOfBounds { row, col: 0 })?;
        let mut next = current.next_version(&Fields::new());
        next.locked = locked;
        self.commit_version(row, 0, next)
    }

    /// Put an older version's fields back into its slot as a new version.
    ///
    /// # Errors
    /// Returns [`AppError::OutOfBounds`] outside the grid and
    /// [`AppError::NotFound`] when `uid` never occupied the slot at `(row, col)`.
    pub fn restore_version(
        &mut self,
        row: usize,
        col: usize,
        uid: &CellUid,
    ) -> Result<Cell, AppError> {
        let current = self
            .cell_at(row, col)
            .ok_or(AppError::OutOfBounds { row, col })?;
        let target = self.cell(uid).ok_or(AppError::NotFound)?;
        if target.coord_uid != current.coord_uid {
            return Err(AppError::NotFound);
        }
        let mut next = current.next_version(&Fields::new());
        next.fields = target.fields.clone();
        self.commit_version(row, col, next)
    }

    /// Every version of the slot `coord`, oldest first.
    pub fn history(&self, coord: &CoordUid) -> Vec<&Cell> {
        self.cell_log
            .iter()
            .filter(|cell| &cell.coord_uid == coord)
            .collect()
    }

    /// Every version of the slot currently at `(row, col)`, oldest first.
    ///
    /// # Errors
    /// Returns [`AppError::OutOfBounds`] when `(row, col)` is outside the grid.
    pub fn history_at(&self, row: usize, col: usize) -> Result<Vec<&Cell>, AppError> {
        let current = self
            .cell_at(row, col)
            .ok_or(AppError::OutOfBounds { row, col })?;
        Ok(self.history(&current.coord_uid))
    }

    /// Current grid position of the version `uid`.
    ///
    /// Superseded versions and removed rows/columns are not in the grid and
    /// report [`AppError::NotFound`].
    pub fn position_of(&mut self, uid: &CellUid) -> Result<(usize, usize), AppError> {
        if self.positions.dirty {
            self.rebuild_positions();
        }
        self.positions
            .positions
            .get(uid)
            .copied()
            .ok_or(AppError::NotFound)
    }

    fn rebuild_positions(&mut self) {
        let cache = &mut self.positions;
        cache.positions.clear();
        for (row, uids) in self.grid.rows().enumerate() {
            for (col, uid) in uids.iter().enumerate() {
                cache.positions.insert(uid.clone(), (row, col));
            }
        }
        cache.dirty = false;
        tracing::trace!(sheet = %self.uid, "position cache rebuilt");
    }

    /// Allocate a fresh cell for a new slot at `(row, col)` and log it.
    pub(crate) fn fresh_cell(&mut self, row: usize, col: usize) -> CellUid {
        let cell = Cell::fresh(CellKind::at(row, col));
        let uid = cell.uid.clone();
        self.append(cell);
        uid
    }

    fn commit_version(&mut self, row: usize, col: usize, next: Cell) -> Result<Cell, AppError> {
        if !self.grid.set(row, col, next.uid.clone()) {
            return Err(AppError::OutOfBounds { row, col });
        }
        self.append(next.clone());
        self.positions.invalidate();
        Ok(next)
    }
}
