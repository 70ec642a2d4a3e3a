//! Sheet HTTP handlers.
//!
//! Every mutating endpoint loads the newest snapshot at or before the path
//! turn, applies one human edit, and stores the result under that turn.

use super::{load_at, map_sheet_mutation_error};
use crate::{error::HttpError, models::*, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use memtable_core::db::SheetMeta;
use memtable_core::grid::cell::{
    DELETE_RULE_KEY, INSERT_RULE_KEY, NOTE_KEY, REQUIRED_KEY, UPDATE_RULE_KEY, VALUE_KEY,
};
use memtable_core::grid::{Cell, CellUid};
use memtable_core::prompt::render_table;
use memtable_core::{AppError, DiffEngine, RowDiff, Sheet};

/// Run `edit` on the sheet at `turn` and persist the result at `turn`.
///
/// The sheet stays guarded from load to save; a concurrent edit of the same
/// sheet fails with [`AppError::Busy`].
fn mutate<T>(
    state: &AppState,
    uid: &str,
    turn: u64,
    edit: impl FnOnce(&mut Sheet) -> Result<T, AppError>,
) -> Result<(T, Sheet), AppError> {
    let _mutation_guard = state
        .locks
        .begin_mutation(uid)
        .map_err(map_sheet_mutation_error)?;
    let (_, mut sheet) = load_at(state, uid, turn)?;
    let output = edit(&mut sheet)?;
    state.db.sheets.save(turn, &sheet)?;
    Ok((output, sheet))
}

/// List metadata for every stored sheet.
///
/// # Errors
/// Returns an error if storage access fails.
pub async fn list_sheets(
    State(state): State<AppState>,
) -> Result<Json<Vec<SheetMeta>>, HttpError> {
    Ok(Json(state.db.sheets.list_meta()?))
}

/// Create a sheet and store its first snapshot.
///
/// # Arguments
/// - `state`: Application state.
/// - `req`: Sheet shape, policy and annotations.
///
/// # Returns
/// The stored sheet view.
///
/// # Errors
/// Returns 400 for an empty name or a required column past the last column.
pub async fn create_sheet(
    State(state): State<AppState>,
    Json(req): Json<CreateSheetRequest>,
) -> Result<(StatusCode, Json<SheetView>), HttpError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("sheet name must not be empty".to_string()).into());
    }

    let mut sheet = Sheet::with_columns(name, req.sheet_type, req.columns.as_slice())
        .with_domain(req.domain);
    sheet.required_non_empty = req.required_non_empty;
    sheet.enabled = req.enabled;
    for (key, value) in [
        (NOTE_KEY, req.note),
        (INSERT_RULE_KEY, req.insert_rule),
        (UPDATE_RULE_KEY, req.update_rule),
        (DELETE_RULE_KEY, req.delete_rule),
    ] {
        if let Some(value) = value {
            sheet.set_field(0, 0, key, value)?;
        }
    }
    for column in req.required_columns {
        if column >= sheet.data_column_count() {
            return Err(AppError::InvalidIndex(format!(
                "required column {column} does not exist"
            ))
            .into());
        }
        sheet.set_field(0, column + 1, REQUIRED_KEY, "true")?;
    }

    state.db.sheets.save(req.turn, &sheet)?;
    tracing::info!(sheet = %sheet.uid, name = %sheet.name, turn = req.turn, "sheet created");
    Ok((StatusCode::CREATED, Json(SheetView::new(req.turn, &sheet))))
}

/// Change sheet settings and store the result at `turn`.
///
/// # Errors
/// Returns 400 for an empty name and 423 while the sheet is being edited.
pub async fn update_sheet(
    State(state): State<AppState>,
    Path((uid, turn)): Path<(String, u64)>,
    Json(req): Json<UpdateSheetRequest>,
) -> Result<Json<SheetView>, HttpError> {
    let name = match req.name.as_deref().map(str::trim) {
        Some("") => {
            return Err(AppError::BadRequest("sheet name must not be empty".to_string()).into())
        }
        other => other.map(str::to_string),
    };
    let (_, sheet) = mutate(&state, &uid, turn, |sheet| {
        if let Some(name) = name {
            sheet.name = name;
        }
        if let Some(enabled) = req.enabled {
            sheet.enabled = enabled;
        }
        if let Some(required_non_empty) = req.required_non_empty {
            sheet.required_non_empty = required_non_empty;
        }
        Ok(())
    })?;
    tracing::info!(sheet = %sheet.uid, enabled = sheet.enabled, turn, "sheet settings updated");
    Ok(Json(SheetView::new(turn, &sheet)))
}

/// Delete a sheet with its whole snapshot history.
///
/// # Errors
/// Returns 404 when the sheet does not exist.
pub async fn delete_sheet(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<StatusCode, HttpError> {
    if state.db.sheets.delete(&uid)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound.into())
    }
}

/// Fetch the sheet as of `turn`.
///
/// # Errors
/// Returns 404 when no snapshot exists at or before `turn`.
pub async fn get_sheet(
    State(state): State<AppState>,
    Path((uid, turn)): Path<(String, u64)>,
) -> Result<Json<SheetView>, HttpError> {
    let (stored, sheet) = load_at(&state, &uid, turn)?;
    Ok(Json(SheetView::new(stored, &sheet)))
}

/// Render the sheet the way the model sees it.
pub async fn sheet_prompt(
    State(state): State<AppState>,
    Path((uid, turn)): Path<(String, u64)>,
    Query(query): Query<PromptQuery>,
) -> Result<String, HttpError> {
    let (_, sheet) = load_at(&state, &uid, turn)?;
    Ok(render_table(query.index, &sheet))
}

/// Write fields over one cell as a new version.
///
/// # Returns
/// The new cell version.
///
/// # Errors
/// Returns 400 for an empty patch or coordinates outside the grid.
pub async fn edit_cell(
    State(state): State<AppState>,
    Path((uid, turn, row, col)): Path<(String, u64, usize, usize)>,
    Json(req): Json<EditCellRequest>,
) -> Result<Json<Cell>, HttpError> {
    let patch = req.into_patch();
    if patch.is_empty() {
        return Err(AppError::BadRequest("no fields to write".to_string()).into());
    }
    let (cell, _) = mutate(&state, &uid, turn, |sheet| sheet.edit_cell(row, col, &patch))?;
    Ok(Json(cell))
}

/// Restore an older version of one slot.
///
/// # Errors
/// Returns 404 when `uid` never occupied the slot.
pub async fn restore_cell(
    State(state): State<AppState>,
    Path((uid, turn, row, col)): Path<(String, u64, usize, usize)>,
    Json(req): Json<RestoreCellRequest>,
) -> Result<Json<Cell>, HttpError> {
    let version = CellUid::from(req.uid);
    let (cell, _) = mutate(&state, &uid, turn, |sheet| {
        sheet.restore_version(row, col, &version)
    })?;
    Ok(Json(cell))
}

pub async fn cell_history(
    State(state): State<AppState>,
    Path((uid, turn, row, col)): Path<(String, u64, usize, usize)>,
) -> Result<Json<Vec<Cell>>, HttpError> {
    let (_, sheet) = load_at(&state, &uid, turn)?;
    let history = sheet.history_at(row, col)?.into_iter().cloned().collect();
    Ok(Json(history))
}

/// Lock or unlock a content row against model edits.
pub async fn lock_row(
    State(state): State<AppState>,
    Path((uid, turn, row)): Path<(String, u64, usize)>,
    Json(req): Json<LockRowRequest>,
) -> Result<Json<Cell>, HttpError> {
    let (cell, _) = mutate(&state, &uid, turn, |sheet| {
        sheet.set_row_locked(row, req.locked)
    })?;
    Ok(Json(cell))
}

/// Insert a blank row, appending unless `after` is given.
///
/// # Errors
/// Returns 403 when the sheet type forbids row inserts.
pub async fn insert_row(
    State(state): State<AppState>,
    Path((uid, turn)): Path<(String, u64)>,
    req: Option<Json<InsertRequest>>,
) -> Result<Json<SheetView>, HttpError> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let (_, sheet) = mutate(&state, &uid, turn, |sheet| {
        let after = req.after.unwrap_or(sheet.row_count() - 1);
        sheet.insert_row(after)
    })?;
    Ok(Json(SheetView::new(turn, &sheet)))
}

/// Delete one content row.
///
/// # Errors
/// Returns 403 when the sheet type forbids row deletes or the row is the last one.
pub async fn delete_row(
    State(state): State<AppState>,
    Path((uid, turn, row)): Path<(String, u64, usize)>,
) -> Result<Json<SheetView>, HttpError> {
    let (_, sheet) = mutate(&state, &uid, turn, |sheet| sheet.delete_row(row))?;
    Ok(Json(SheetView::new(turn, &sheet)))
}

/// Insert a column, appending unless `after` is given, optionally named.
///
/// # Errors
/// Returns 403 when the sheet type forbids column inserts.
pub async fn insert_column(
    State(state): State<AppState>,
    Path((uid, turn)): Path<(String, u64)>,
    req: Option<Json<InsertRequest>>,
) -> Result<Json<SheetView>, HttpError> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let (_, sheet) = mutate(&state, &uid, turn, |sheet| {
        let after = req.after.unwrap_or(sheet.col_count() - 1);
        let col = sheet.insert_column(after)?;
        if let Some(name) = req.name {
            sheet.set_field(0, col, VALUE_KEY, name)?;
        }
        Ok(col)
    })?;
    Ok(Json(SheetView::new(turn, &sheet)))
}

pub async fn delete_column(
    State(state): State<AppState>,
    Path((uid, turn, col)): Path<(String, u64, usize)>,
) -> Result<Json<SheetView>, HttpError> {
    let (_, sheet) = mutate(&state, &uid, turn, |sheet| sheet.delete_column(col))?;
    Ok(Json(SheetView::new(turn, &sheet)))
}

/// Row-level changes between the snapshots at `from` and `to`.
///
/// # Errors
/// Returns 404 when either turn has no snapshot at or before it.
pub async fn sheet_diff(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<DiffQuery>,
) -> Result<Json<Vec<RowDiff>>, HttpError> {
    let (_, previous) = load_at(&state, &uid, query.from)?;
    let (_, current) = load_at(&state, &uid, query.to)?;
    Ok(Json(DiffEngine::new().diff(&previous, &current)))
}
