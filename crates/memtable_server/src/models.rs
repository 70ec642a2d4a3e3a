//! Request and response payloads of the HTTP API.
//!
//! Cell, row and column coordinates in paths are grid indices: row 0 is the
//! column-header row and column 0 the row-header column.

use memtable_core::grid::cell::VALUE_KEY;
use memtable_core::grid::Fields;
use memtable_core::{BatchReport, Sheet, SheetDomain, SheetType};
use serde::{Deserialize, Serialize};

/// Request payload for creating a sheet.
#[derive(Debug, Deserialize)]
pub struct CreateSheetRequest {
    pub name: String,
    #[serde(default)]
    pub sheet_type: SheetType,
    #[serde(default)]
    pub domain: SheetDomain,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Data column indices (0-based) that must be filled on insert.
    #[serde(default)]
    pub required_columns: Vec<usize>,
    #[serde(default)]
    pub required_non_empty: bool,
    /// Disabled sheets are hidden from the prompt and reject model actions.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub note: Option<String>,
    pub insert_rule: Option<String>,
    pub update_rule: Option<String>,
    pub delete_rule: Option<String>,
    /// Turn the first snapshot is stored under.
    #[serde(default)]
    pub turn: u64,
}

fn enabled_by_default() -> bool {
    true
}

/// Request payload for changing sheet settings; absent fields are kept.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSheetRequest {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub required_non_empty: Option<bool>,
}

/// Request payload for a human cell edit.
///
/// `value` is shorthand for `fields.value`; both may be given.
#[derive(Debug, Deserialize)]
pub struct EditCellRequest {
    pub value: Option<String>,
    #[serde(default)]
    pub fields: Fields,
}

impl EditCellRequest {
    pub fn into_patch(self) -> Fields {
        let mut patch = self.fields;
        if let Some(value) = self.value {
            patch.insert(VALUE_KEY.to_string(), value);
        }
        patch
    }
}

/// Request payload for restoring an older cell version.
#[derive(Debug, Deserialize)]
pub struct RestoreCellRequest {
    pub uid: String,
}

#[derive(Debug, Deserialize)]
pub struct LockRowRequest {
    pub locked: bool,
}

/// Request payload for row/column inserts; defaults to appending.
#[derive(Debug, Default, Deserialize)]
pub struct InsertRequest {
    pub after: Option<usize>,
    /// Header text for a new column.
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromptQuery {
    #[serde(default)]
    pub index: usize,
}

/// Query parameters of the diff endpoint.
#[derive(Debug, Deserialize)]
pub struct DiffQuery {
    pub from: u64,
    pub to: u64,
}

/// Request payload for applying model output at a turn.
#[derive(Debug, Deserialize)]
pub struct EditBatchRequest {
    /// Sheet uids in table-index order.
    pub sheets: Vec<String>,
    /// Turn to load the sheets from; defaults to the target turn.
    pub base_turn: Option<u64>,
    pub text: String,
    #[serde(default)]
    pub dry_run: bool,
}

/// Outcome of an edit batch.
#[derive(Debug, Serialize)]
pub struct EditBatchResponse {
    pub summary: String,
    pub dry_run: bool,
    #[serde(flatten)]
    pub report: BatchReport,
    /// Sheets that could not be saved; the batch still counts as applied.
    pub warnings: Vec<String>,
}

impl EditBatchResponse {
    pub fn new(report: BatchReport, dry_run: bool, warnings: Vec<String>) -> Self {
        Self {
            summary: report.summary(),
            dry_run,
            report,
            warnings,
        }
    }
}

/// Column header as shown to clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ColumnView {
    pub name: String,
    pub required: bool,
}

/// One content row as shown to clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct RowView {
    /// Grid row index.
    pub row: usize,
    pub locked: bool,
    pub values: Vec<String>,
}

/// Current state of a sheet at a turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct SheetView {
    pub uid: String,
    pub name: String,
    pub domain: SheetDomain,
    pub sheet_type: SheetType,
    pub enabled: bool,
    pub required_non_empty: bool,
    /// Turn the snapshot was stored under.
    pub turn: u64,
    pub note: Option<String>,
    pub columns: Vec<ColumnView>,
    pub rows: Vec<RowView>,
}

impl SheetView {
    pub fn new(turn: u64, sheet: &Sheet) -> Self {
        let required = sheet.required_columns();
        let columns = sheet
            .column_names()
            .into_iter()
            .enumerate()
            .map(|(index, name)| ColumnView {
                name,
                required: required.contains(&index),
            })
            .collect();
        let rows = (1..sheet.row_count())
            .map(|row| RowView {
                row,
                locked: sheet.is_row_locked(row),
                values: sheet.row_values(row),
            })
            .collect();
        Self {
            uid: sheet.uid.clone(),
            name: sheet.name.clone(),
            domain: sheet.domain,
            sheet_type: sheet.sheet_type,
            enabled: sheet.enabled,
            required_non_empty: sheet.required_non_empty,
            turn,
            note: sheet.note().map(str::to_string),
            columns,
            rows,
        }
    }
}
