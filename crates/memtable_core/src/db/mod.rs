//! Database layer for sheet snapshots.

/// Sheet snapshot storage.
pub mod sheet;
/// redb table definitions.
pub mod tables;

#[cfg(test)]
mod tests;

use crate::error::AppError;
use crate::grid::Sheet;
use crate::pipeline::SheetPersistence;
use std::path::Path;
use std::sync::Arc;

pub use sheet::{SheetDb, SheetMeta};
pub use tables::REDB_FILE_NAME;

/// Database handle with access to the sheet tables.
pub struct Database {
    pub db: Arc<redb::Database>,
    pub sheets: SheetDb,
}

impl Database {
    /// Open (or create) the database inside the `path` directory.
    ///
    /// # Returns
    /// A fully initialized [`Database`].
    ///
    /// # Errors
    /// Returns an error when the directory cannot be created or redb cannot
    /// open the database file.
    pub fn new(path: &str) -> Result<Self, AppError> {
        std::fs::create_dir_all(path).map_err(|err| {
            AppError::StorageMessage(format!(
                "Failed to create database directory '{}': {}",
                path, err
            ))
        })?;
        let file = Path::new(path).join(REDB_FILE_NAME);
        let db = Arc::new(redb::Database::create(&file)?);
        tracing::info!("Opened database at {}", file.display());
        Ok(Self {
            sheets: SheetDb::new(db.clone())?,
            db,
        })
    }

    /// Create another handle to the same open database.
    ///
    /// # Errors
    /// Returns an error if table initialization fails.
    pub fn share(&self) -> Result<Self, AppError> {
        Ok(Self {
            sheets: SheetDb::new(self.db.clone())?,
            db: self.db.clone(),
        })
    }
}

impl SheetPersistence for Database {
    fn save(&self, turn_id: u64, sheet: &Sheet) -> Result<(), AppError> {
        self.sheets.save(turn_id, sheet)
    }

    fn load(&self, turn_id: u64, sheet_uid: &str) -> Result<Sheet, AppError> {
        self.sheets.load(turn_id, sheet_uid)
    }
}
