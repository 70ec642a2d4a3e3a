use super::{Action, ActionKind, BatchOptions, BatchReport, RowData, SkippedAction};
use crate::error::ApplyError;
use crate::grid::cell::VALUE_KEY;
use crate::grid::{Sheet, SheetOp};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Rows and cells touched by a batch, in data coordinates.
///
/// `inserted_rows` and `updated_cells` index the grid as it stands after the
/// batch. `deleted_rows` index the grid just before the deletes ran, since
/// those rows no longer exist afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub inserted_rows: BTreeSet<usize>,
    pub updated_cells: BTreeSet<(usize, usize)>,
    pub deleted_rows: BTreeSet<usize>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted_rows.is_empty()
            && self.updated_cells.is_empty()
            && self.deleted_rows.is_empty()
    }

    /// Shift inserted and updated rows past the recorded deletes.
    ///
    /// Rows deleted later in the same batch are dropped from both sets.
    fn settle_deletes(&mut self) {
        if self.deleted_rows.is_empty() {
            return;
        }
        let deleted = &self.deleted_rows;
        let shifted = |row: usize| {
            (!deleted.contains(&row)).then(|| row - deleted.range(..row).count())
        };
        self.inserted_rows = self
            .inserted_rows
            .iter()
            .filter_map(|&row| shifted(row))
            .collect();
        self.updated_cells = self
            .updated_cells
            .iter()
            .filter_map(|&(row, col)| shifted(row).map(|row| (row, col)))
            .collect();
    }
}

/// Deduplicated actions in apply order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub actions: Vec<Action>,
    pub duplicates_dropped: usize,
}

/// Order and deduplicate `actions` against the current `sheets`.
///
/// Inserts and updates keep their relative order and run first; deletes follow,
/// sorted by table and then by descending row so no pending delete index is
/// shifted by an earlier one.
pub fn plan(actions: &[Action], sheets: &[Sheet]) -> ExecutionPlan {
    let (mut ordered, deletes): (Vec<&Action>, Vec<&Action>) = actions
        .iter()
        .partition(|action| action.kind != ActionKind::Delete);

    let mut seen_rows: HashSet<(usize, blake3::Hash)> = HashSet::new();
    for (table_index, sheet) in sheets.iter().enumerate() {
        for row in 1..sheet.row_count() {
            if !sheet.is_blank_row(row) {
                let values = sheet.row_values(row);
                seen_rows.insert((table_index, row_fingerprint(values.iter().enumerate())));
            }
        }
    }
    let mut seen_actions: HashSet<(ActionKind, usize, Option<usize>, Option<&RowData>)> =
        HashSet::new();
    let before = ordered.len();
    ordered.retain(|action| match (action.kind, &action.data) {
        (ActionKind::Insert, Some(data)) => {
            let fingerprint = row_fingerprint(data.iter().map(|(col, value)| (*col, value)));
            seen_rows.insert((action.table_index, fingerprint))
        }
        _ => seen_actions.insert((
            action.kind,
            action.table_index,
            action.row_index,
            action.data.as_ref(),
        )),
    });
    let mut duplicates_dropped = before - ordered.len();

    let mut seen_deletes = HashSet::new();
    let mut deletes = deletes
        .into_iter()
        .filter(|action| seen_deletes.insert((action.table_index, action.row_index)))
        .collect::<Vec<_>>();
    duplicates_dropped += actions.len() - before - deletes.len();
    deletes.sort_by(|a, b| {
        a.table_index
            .cmp(&b.table_index)
            .then(b.row_index.cmp(&a.row_index))
    });

    ExecutionPlan {
        actions: ordered.into_iter().chain(deletes).cloned().collect(),
        duplicates_dropped,
    }
}

/// Hash of a row's non-empty `(column, value)` pairs, in column order.
fn row_fingerprint<'a, I>(cells: I) -> blake3::Hash
where
    I: Iterator<Item = (usize, &'a String)>,
{
    let mut cells = cells
        .filter(|(_, value)| !value.trim().is_empty())
        .collect::<Vec<_>>();
    cells.sort_by_key(|(col, _)| *col);
    let mut hasher = blake3::Hasher::new();
    for (col, value) in cells {
        hasher.update(&(col as u64).to_le_bytes());
        hasher.update(&(value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.finalize()
}

/// Apply `plan` to `sheets`, skipping actions that fail.
pub fn apply(plan: &ExecutionPlan, sheets: &mut [Sheet], options: BatchOptions) -> BatchReport {
    let mut report = BatchReport {
        total: plan.actions.len(),
        duplicates_dropped: plan.duplicates_dropped,
        tables: vec![ChangeSet::default(); sheets.len()],
        ..BatchReport::default()
    };

    for action in &plan.actions {
        match apply_one(action, sheets, options, &mut report.tables) {
            Ok(()) => report.applied += 1,
            Err(error) => {
                tracing::warn!(statement = %action.raw, %error, "action skipped");
                if matches!(error, ApplyError::DeleteSuppressed { .. }) {
                    report.notices.push(error.to_string());
                }
                report.skipped.push(SkippedAction {
                    statement: action.raw.clone(),
                    error,
                });
            }
        }
    }
    for changes in &mut report.tables {
        changes.settle_deletes();
    }
    report
}

/// Run `plan` against scratch copies of `sheets` and report the outcome.
///
/// Shares [`apply`] so the preview always matches the committed result.
pub fn dry_run(plan: &ExecutionPlan, sheets: &[Sheet], options: BatchOptions) -> BatchReport {
    let mut scratch = sheets.to_vec();
    apply(plan, &mut scratch, options)
}

fn apply_one(
    action: &Action,
    sheets: &mut [Sheet],
    options: BatchOptions,
    tables: &mut [ChangeSet],
) -> Result<(), ApplyError> {
    let table = action.table_index;
    let sheet = sheets
        .get_mut(table)
        .ok_or(ApplyError::TableNotFound(table))?;
    if !sheet.enabled {
        return Err(ApplyError::Rejected(format!("table {table} is disabled")));
    }
    let changes = &mut tables[table];

    match action.kind {
        ActionKind::Insert => {
            let data = non_empty_data(action)?;
            sheet.ensure_allowed(SheetOp::InsertRow)?;
            sheet.ensure_allowed(SheetOp::EditContent)?;
            check_columns(sheet, data)?;
            let placeholder = blank_placeholder(sheet);
            let next_row = placeholder.map_or(sheet.data_row_count(), |row| row - 1);
            for col in sheet.required_columns() {
                if data.get(&col).map_or(true, |value| value.trim().is_empty()) {
                    return Err(ApplyError::MissingRequiredColumn { row: next_row, col });
                }
            }
            let row = match placeholder {
                Some(row) => row,
                None => sheet.insert_row(sheet.row_count() - 1)?,
            };
            for (col, value) in data {
                if !value.is_empty() {
                    sheet.set_field(row, col + 1, VALUE_KEY, value.clone())?;
                }
            }
            changes.inserted_rows.insert(row - 1);
        }
        ActionKind::Update => {
            let data = non_empty_data(action)?;
            let row = existing_row(sheet, action)?;
            sheet.ensure_allowed(SheetOp::EditContent)?;
            if sheet.is_row_locked(row + 1) {
                return Err(ApplyError::RowLocked(row));
            }
            if sheet.value_at(row + 1, 1).trim().is_empty() {
                return Err(ApplyError::EmptyIdentity(row));
            }
            check_columns(sheet, data)?;
            for col in sheet.required_columns() {
                if data.get(&col).is_some_and(|value| value.trim().is_empty()) {
                    return Err(ApplyError::MissingRequiredColumn { row, col });
                }
            }
            for (col, value) in data {
                if sheet.value_at(row + 1, col + 1) != value.as_str() {
                    sheet.set_field(row + 1, col + 1, VALUE_KEY, value.clone())?;
                    changes.updated_cells.insert((row, *col));
                }
            }
        }
        ActionKind::Delete => {
            let row = existing_row(sheet, action)?;
            if options.ignore_delete && table != 0 {
                return Err(ApplyError::DeleteSuppressed { table, row });
            }
            if sheet.is_row_locked(row + 1) {
                return Err(ApplyError::RowLocked(row));
            }
            sheet.delete_row(row + 1)?;
            changes.deleted_rows.insert(row);
        }
    }
    tracing::debug!(kind = ?action.kind, table, "action applied");
    Ok(())
}

/// The lone blank content row of an otherwise empty sheet, if unlocked.
fn blank_placeholder(sheet: &Sheet) -> Option<usize> {
    (sheet.data_row_count() == 1 && sheet.is_blank_row(1) && !sheet.is_row_locked(1)).then_some(1)
}

fn non_empty_data(action: &Action) -> Result<&RowData, ApplyError> {
    action
        .data
        .as_ref()
        .filter(|data| !data.is_empty())
        .ok_or_else(|| ApplyError::Rejected(format!("no column data in `{}`", action.raw)))
}

/// Data row addressed by `action`, checked against the sheet.
fn existing_row(sheet: &Sheet, action: &Action) -> Result<usize, ApplyError> {
    let Some(row) = action.row_index else {
        return Err(ApplyError::Rejected(format!("no row index in `{}`", action.raw)));
    };
    if row >= sheet.data_row_count() {
        return Err(ApplyError::RowNotFound(row));
    }
    Ok(row)
}

fn check_columns(sheet: &Sheet, data: &RowData) -> Result<(), ApplyError> {
    match data.keys().find(|&&col| col >= sheet.data_column_count()) {
        Some(&col) => Err(ApplyError::ColumnNotFound(col)),
        None => Ok(()),
    }
}
