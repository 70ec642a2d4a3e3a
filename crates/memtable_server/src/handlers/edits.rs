//! Model-output batch handler.

use super::{load_at, map_sheet_mutation_error};
use crate::{error::HttpError, models::*, AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use memtable_core::{preview_batch, run_batch, AppError};

/// Apply (or preview) model output against the listed sheets.
///
/// Sheets are loaded from `base_turn` and, unless `dry_run` is set, saved under
/// the path turn. A save failure is reported as a warning; the other sheets
/// are still saved.
///
/// # Arguments
/// - `state`: Application state.
/// - `turn`: Turn the edited sheets are stored under.
/// - `req`: Sheet uids in table order plus the raw model text.
///
/// # Returns
/// The batch report with its one-line summary.
///
/// # Errors
/// Returns 423 while another batch runs or a listed sheet is being edited, 404 for an unknown sheet, and 422
/// when the text fails to parse or validate.
pub async fn apply_edits(
    State(state): State<AppState>,
    Path(turn): Path<u64>,
    Json(req): Json<EditBatchRequest>,
) -> Result<Json<EditBatchResponse>, HttpError> {
    if req.sheets.is_empty() {
        return Err(AppError::BadRequest("at least one sheet is required".to_string()).into());
    }
    let base_turn = req.base_turn.unwrap_or(turn);
    if base_turn > turn {
        return Err(AppError::BadRequest(format!(
            "base turn {base_turn} is after target turn {turn}"
        ))
        .into());
    }

    let _permit = state.gate.try_begin()?;
    let _mutation_guard = state
        .locks
        .begin_batch_mutation(&req.sheets)
        .map_err(map_sheet_mutation_error)?;
    let mut sheets = req
        .sheets
        .iter()
        .map(|uid| load_at(&state, uid, base_turn).map(|(_, sheet)| sheet))
        .collect::<Result<Vec<_>, _>>()?;
    let options = state.config.batch_options();

    if req.dry_run {
        let report = preview_batch(&req.text, &sheets, options)?;
        return Ok(Json(EditBatchResponse::new(report, true, Vec::new())));
    }

    let report = run_batch(&req.text, &mut sheets, options)?;
    let mut warnings = Vec::new();
    for sheet in &sheets {
        if let Err(err) = state.db.sheets.save(turn, sheet) {
            tracing::warn!(sheet = %sheet.uid, turn, error = %err, "failed to save edited sheet");
            warnings.push(format!("sheet '{}' was not saved: {}", sheet.name, err));
        }
    }
    Ok(Json(EditBatchResponse::new(report, false, warnings)))
}
