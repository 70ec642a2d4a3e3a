//! Shared test-only helpers for memtable_core.

use crate::grid::cell::VALUE_KEY;
use crate::grid::{Sheet, SheetType};
use crate::Database;
use tempfile::TempDir;

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing files.
///
/// # Panics
/// Panics if temp-dir creation or database initialization fails.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().expect("db path")).expect("db");
    (db, temp_dir)
}

/// A `name`/`role` sheet whose first column holds `names`, one row each.
///
/// # Panics
/// Panics if `names` is empty.
pub(crate) fn people_sheet(sheet_type: SheetType, names: &[&str]) -> Sheet {
    let mut sheet = Sheet::with_columns("people", SheetType::Free, &["name", "role"]);
    sheet
        .set_field(1, 1, VALUE_KEY, names[0])
        .expect("seed first row");
    for name in &names[1..] {
        let row = sheet.insert_row(sheet.row_count() - 1).expect("insert row");
        sheet.set_field(row, 1, VALUE_KEY, *name).expect("seed row");
    }
    sheet.sheet_type = sheet_type;
    sheet
}
