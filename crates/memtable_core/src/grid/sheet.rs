//! Sheet metadata, mutability policy, and the persisted record form.

use super::cell::{
    Cell, CellUid, DELETE_RULE_KEY, INSERT_RULE_KEY, NOTE_KEY, REQUIRED_KEY, UPDATE_RULE_KEY,
    VALUE_KEY,
};
use super::store::PositionCache;
use super::{Grid, MIN_GRID_DIMENSION};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Storage scope of a sheet. Opaque to the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetDomain {
    Global,
    Role,
    #[default]
    Chat,
}

/// Mutability policy of a sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetType {
    Free,
    #[default]
    Dynamic,
    Fixed,
    Static,
}

/// Mutation classes governed by [`SheetType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetOp {
    InsertRow,
    InsertColumn,
    DeleteRow,
    DeleteColumn,
    EditContent,
}

impl SheetType {
    /// Whether this sheet type permits `op`.
    pub fn allows(self, op: SheetOp) -> bool {
        match self {
            Self::Free => true,
            Self::Dynamic => matches!(
                op,
                SheetOp::InsertRow | SheetOp::DeleteRow | SheetOp::EditContent
            ),
            Self::Fixed => op == SheetOp::EditContent,
            Self::Static => false,
        }
    }
}

impl fmt::Display for SheetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Free => "free",
            Self::Dynamic => "dynamic",
            Self::Fixed => "fixed",
            Self::Static => "static",
        })
    }
}

impl fmt::Display for SheetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InsertRow => "insert row",
            Self::InsertColumn => "insert column",
            Self::DeleteRow => "delete row",
            Self::DeleteColumn => "delete column",
            Self::EditContent => "edit content",
        })
    }
}

/// One memory table: metadata, current grid, and full version history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SheetRecord", into = "SheetRecord")]
pub struct Sheet {
    pub uid: String,
    pub name: String,
    pub domain: SheetDomain,
    pub sheet_type: SheetType,
    pub enabled: bool,
    pub required_non_empty: bool,
    pub(crate) grid: Grid,
    pub(crate) cell_log: Vec<Cell>,
    /// Derived `uid -> cell_log index`, rebuilt on load.
    pub(crate) cells: HashMap<CellUid, usize>,
    pub(crate) positions: PositionCache,
}

impl Sheet {
    /// Create an empty 2x2 sheet.
    pub fn new(name: impl Into<String>, sheet_type: SheetType) -> Self {
        Self::with_columns(name, sheet_type, &[] as &[&str])
    }

    /// Create a sheet whose header row carries `columns` and one blank content row.
    ///
    /// An empty `columns` list still yields the minimum 2x2 grid.
    pub fn with_columns<S: AsRef<str>>(
        name: impl Into<String>,
        sheet_type: SheetType,
        columns: &[S],
    ) -> Self {
        let cols = columns.len().max(MIN_GRID_DIMENSION - 1) + 1;
        let (grid, mut cells) = Grid::allocate(MIN_GRID_DIMENSION, cols);
        for (index, column) in columns.iter().enumerate() {
            // Row 0 occupies the first `cols` entries of the row-major cell list.
            cells[index + 1]
                .fields
                .insert(VALUE_KEY.to_string(), column.as_ref().to_string());
        }
        let mut sheet = Self {
            uid: Uuid::new_v4().to_string(),
            name: name.into(),
            domain: SheetDomain::default(),
            sheet_type,
            enabled: true,
            required_non_empty: false,
            grid,
            cell_log: Vec::with_capacity(cells.len()),
            cells: HashMap::new(),
            positions: PositionCache::default(),
        };
        for cell in cells {
            sheet.append(cell);
        }
        sheet
    }

    /// Set the storage domain.
    pub fn with_domain(mut self, domain: SheetDomain) -> Self {
        self.domain = domain;
        self
    }

    /// Current grid of version ids.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Copy of the current grid, for later diffing.
    pub fn snapshot(&self) -> Grid {
        self.grid.clone()
    }

    /// Every cell version ever created, in creation order.
    pub fn cell_log(&self) -> &[Cell] {
        &self.cell_log
    }

    pub fn cell(&self, uid: &CellUid) -> Option<&Cell> {
        self.cells.get(uid).map(|&index| &self.cell_log[index])
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Option<&Cell> {
        self.grid.get(row, col).and_then(|uid| self.cell(uid))
    }

    /// Displayed content at `(row, col)`, empty when absent.
    pub fn value_at(&self, row: usize, col: usize) -> &str {
        self.cell_at(row, col).map(Cell::value).unwrap_or("")
    }

    pub fn row_count(&self) -> usize {
        self.grid.row_count()
    }

    pub fn col_count(&self) -> usize {
        self.grid.col_count()
    }

    /// Rows below the header row.
    pub fn data_row_count(&self) -> usize {
        self.row_count().saturating_sub(1)
    }

    /// Columns right of the header column.
    pub fn data_column_count(&self) -> usize {
        self.col_count().saturating_sub(1)
    }

    /// Column names from the header row, excluding the origin.
    pub fn column_names(&self) -> Vec<String> {
        (1..self.col_count())
            .map(|col| self.value_at(0, col).to_string())
            .collect()
    }

    /// Content of grid row `row`, excluding its row header.
    pub fn row_values(&self, row: usize) -> Vec<String> {
        (1..self.col_count())
            .map(|col| self.value_at(row, col).to_string())
            .collect()
    }

    /// Whether every content cell of grid row `row` is empty.
    pub fn is_blank_row(&self, row: usize) -> bool {
        (1..self.col_count()).all(|col| self.value_at(row, col).trim().is_empty())
    }

    /// Data-column indices whose header is flagged `required`.
    pub fn required_columns(&self) -> Vec<usize> {
        (1..self.col_count())
            .filter(|&col| {
                self.cell_at(0, col)
                    .and_then(|cell| cell.field(REQUIRED_KEY))
                    .is_some_and(|flag| flag.eq_ignore_ascii_case("true"))
            })
            .map(|col| col - 1)
            .collect()
    }

    pub fn is_row_locked(&self, row: usize) -> bool {
        self.cell_at(row, 0).is_some_and(|cell| cell.locked)
    }

    /// Sheet-level note stored on the origin cell.
    pub fn note(&self) -> Option<&str> {
        self.origin_field(NOTE_KEY)
    }

    /// Edit trigger rules stored on the origin cell, as `(insert, update, delete)`.
    pub fn edit_rules(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            self.origin_field(INSERT_RULE_KEY),
            self.origin_field(UPDATE_RULE_KEY),
            self.origin_field(DELETE_RULE_KEY),
        )
    }

    fn origin_field(&self, key: &str) -> Option<&str> {
        self.cell_at(0, 0)
            .and_then(|cell| cell.field(key))
            .filter(|value| !value.trim().is_empty())
    }

    /// Reject `op` when this sheet's type forbids it.
    ///
    /// # Errors
    /// Returns [`AppError::Forbidden`] naming the operation and sheet.
    pub fn ensure_allowed(&self, op: SheetOp) -> Result<(), AppError> {
        if self.sheet_type.allows(op) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} is not allowed on {} sheet '{}'",
                op, self.sheet_type, self.name
            )))
        }
    }

    /// Push a new version onto the log and index it.
    pub(crate) fn append(&mut self, cell: Cell) -> usize {
        let index = self.cell_log.len();
        self.cells.insert(cell.uid.clone(), index);
        self.cell_log.push(cell);
        index
    }
}

/// Persisted form of a [`Sheet`]; the derived lookup and caches are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetRecord {
    pub uid: String,
    pub name: String,
    #[serde(default)]
    pub domain: SheetDomain,
    #[serde(default)]
    pub sheet_type: SheetType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub required_non_empty: bool,
    pub grid: Grid,
    pub cell_log: Vec<Cell>,
}

fn default_enabled() -> bool {
    true
}

impl TryFrom<SheetRecord> for Sheet {
    type Error = AppError;

    fn try_from(record: SheetRecord) -> Result<Self, Self::Error> {
        let invalid = |reason: String| {
            AppError::StorageMessage(format!("Sheet '{}' is corrupt: {}", record.uid, reason))
        };
        record.grid.check_shape().map_err(invalid)?;

        let mut cells = HashMap::with_capacity(record.cell_log.len());
        for (index, cell) in record.cell_log.iter().enumerate() {
            if cells.insert(cell.uid.clone(), index).is_some() {
                return Err(invalid(format!("duplicate cell uid {}", cell.uid)));
            }
        }
        for (row, uids) in record.grid.rows().enumerate() {
            for (col, uid) in uids.iter().enumerate() {
                if !cells.contains_key(uid) {
                    return Err(invalid(format!(
                        "slot ({row}, {col}) references unknown cell {uid}"
                    )));
                }
            }
        }

        Ok(Self {
            uid: record.uid,
            name: record.name,
            domain: record.domain,
            sheet_type: record.sheet_type,
            enabled: record.enabled,
            required_non_empty: record.required_non_empty,
            grid: record.grid,
            cell_log: record.cell_log,
            cells,
            positions: PositionCache::default(),
        })
    }
}

impl From<Sheet> for SheetRecord {
    fn from(sheet: Sheet) -> Self {
        Self {
            uid: sheet.uid,
            name: sheet.name,
            domain: sheet.domain,
            sheet_type: sheet.sheet_type,
            enabled: sheet.enabled,
            required_non_empty: sheet.required_non_empty,
            grid: sheet.grid,
            cell_log: sheet.cell_log,
        }
    }
}
