//! HTTP request handlers.

/// Model-output batch endpoint.
pub mod edits;
/// Sheet, cell, row and column endpoints.
pub mod sheet;

use crate::{AppState, SheetLockError};
use memtable_core::{AppError, Sheet};

/// Newest snapshot of `uid` at or before `turn`.
pub(crate) fn load_at(state: &AppState, uid: &str, turn: u64) -> Result<(u64, Sheet), AppError> {
    state
        .db
        .sheets
        .load_latest(uid, turn)?
        .ok_or(AppError::NotFound)
}

pub(crate) fn map_sheet_mutation_error(err: SheetLockError) -> AppError {
    match err {
        SheetLockError::Mutating { .. } => {
            AppError::Busy("Sheet is currently being edited.".to_string())
        }
        SheetLockError::Poisoned => {
            AppError::StorageMessage("Sheet lock manager is unavailable.".to_string())
        }
    }
}
