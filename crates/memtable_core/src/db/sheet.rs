//! Sheet snapshot storage backed by redb.

use crate::db::tables::{SHEETS_META, SHEET_SNAPSHOTS};
use crate::error::AppError;
use crate::grid::{Sheet, SheetDomain, SheetType};
use crate::pipeline::SheetPersistence;
use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Listing metadata for one sheet, refreshed on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetMeta {
    pub uid: String,
    pub name: String,
    pub domain: SheetDomain,
    pub sheet_type: SheetType,
    pub enabled: bool,
    /// Highest turn with a stored snapshot.
    pub latest_turn: u64,
    pub rows: usize,
    pub columns: usize,
    pub updated_at: DateTime<Utc>,
}

impl SheetMeta {
    fn describe(sheet: &Sheet, latest_turn: u64) -> Self {
        Self {
            uid: sheet.uid.clone(),
            name: sheet.name.clone(),
            domain: sheet.domain,
            sheet_type: sheet.sheet_type,
            enabled: sheet.enabled,
            latest_turn,
            rows: sheet.data_row_count(),
            columns: sheet.data_column_count(),
            updated_at: Utc::now(),
        }
    }
}

/// Accessor for sheet snapshot and metadata tables.
pub struct SheetDb {
    db: Arc<redb::Database>,
}

impl SheetDb {
    /// Initialize sheet tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(SHEET_SNAPSHOTS)?;
        write_txn.open_table(SHEETS_META)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Store `sheet` as of `turn_id`, replacing any snapshot at that turn.
    ///
    /// # Errors
    /// Returns an error when serialization or storage operations fail.
    pub fn save(&self, turn_id: u64, sheet: &Sheet) -> Result<(), AppError> {
        let snapshot = serde_json::to_vec(sheet)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut snapshots = write_txn.open_table(SHEET_SNAPSHOTS)?;
            let mut metas = write_txn.open_table(SHEETS_META)?;

            let previous_latest = match metas.get(sheet.uid.as_str())? {
                Some(guard) => Some(bincode::deserialize::<SheetMeta>(guard.value())?.latest_turn),
                None => None,
            };
            let latest_turn = previous_latest.map_or(turn_id, |latest| latest.max(turn_id));
            let encoded_meta = bincode::serialize(&SheetMeta::describe(sheet, latest_turn))?;

            snapshots.insert((sheet.uid.as_str(), turn_id), snapshot.as_slice())?;
            metas.insert(sheet.uid.as_str(), encoded_meta.as_slice())?;
        }
        write_txn.commit()?;
        tracing::debug!(sheet = %sheet.uid, turn = turn_id, "sheet snapshot saved");
        Ok(())
    }

    /// Load the snapshot of `sheet_uid` stored exactly at `turn_id`.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when missing, or a storage error when the
    /// row cannot be read or fails validation.
    pub fn load(&self, turn_id: u64, sheet_uid: &str) -> Result<Sheet, AppError> {
        let read_txn = self.db.begin_read()?;
        let snapshots = read_txn.open_table(SHEET_SNAPSHOTS)?;
        match snapshots.get((sheet_uid, turn_id))? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Err(AppError::NotFound),
        }
    }

    /// Load the newest snapshot of `sheet_uid` at or before `turn_id`.
    ///
    /// # Returns
    /// `Ok(Some((turn, sheet)))` when a snapshot exists, `Ok(None)` otherwise.
    ///
    /// # Errors
    /// Returns an error when storage access or deserialization fails.
    pub fn load_latest(
        &self,
        sheet_uid: &str,
        turn_id: u64,
    ) -> Result<Option<(u64, Sheet)>, AppError> {
        let read_txn = self.db.begin_read()?;
        let snapshots = read_txn.open_table(SHEET_SNAPSHOTS)?;
        let mut range = snapshots.range((sheet_uid, 0u64)..=(sheet_uid, turn_id))?;
        match range.next_back() {
            Some(item) => {
                let (key, value) = item?;
                let (_, turn) = key.value();
                Ok(Some((turn, serde_json::from_slice(value.value())?)))
            }
            None => Ok(None),
        }
    }

    /// Every stored turn of `sheet_uid`, ascending.
    ///
    /// # Errors
    /// Returns an error when storage access fails.
    pub fn list_turns(&self, sheet_uid: &str) -> Result<Vec<u64>, AppError> {
        let read_txn = self.db.begin_read()?;
        let snapshots = read_txn.open_table(SHEET_SNAPSHOTS)?;
        let mut turns = Vec::new();
        for item in snapshots.range((sheet_uid, 0u64)..=(sheet_uid, u64::MAX))? {
            let (key, _) = item?;
            turns.push(key.value().1);
        }
        Ok(turns)
    }

    /// Fetch metadata for one sheet.
    ///
    /// # Errors
    /// Returns an error when storage access or deserialization fails.
    pub fn get_meta(&self, sheet_uid: &str) -> Result<Option<SheetMeta>, AppError> {
        let read_txn = self.db.begin_read()?;
        let metas = read_txn.open_table(SHEETS_META)?;
        match metas.get(sheet_uid)? {
            Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
            None => Ok(None),
        }
    }

    /// Metadata for every stored sheet, sorted by name.
    ///
    /// # Errors
    /// Returns an error when storage access or deserialization fails.
    pub fn list_meta(&self) -> Result<Vec<SheetMeta>, AppError> {
        let read_txn = self.db.begin_read()?;
        let metas = read_txn.open_table(SHEETS_META)?;
        let mut listed = Vec::new();
        for item in metas.iter()? {
            let (_, value) = item?;
            listed.push(bincode::deserialize::<SheetMeta>(value.value())?);
        }
        listed.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.uid.cmp(&b.uid)));
        Ok(listed)
    }

    /// Delete every snapshot and the metadata row of `sheet_uid`.
    ///
    /// # Returns
    /// `true` when the sheet existed.
    ///
    /// # Errors
    /// Returns an error when storage operations fail.
    pub fn delete(&self, sheet_uid: &str) -> Result<bool, AppError> {
        let turns = self.list_turns(sheet_uid)?;
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut snapshots = write_txn.open_table(SHEET_SNAPSHOTS)?;
            let mut metas = write_txn.open_table(SHEETS_META)?;
            for turn in &turns {
                let _ = snapshots.remove((sheet_uid, *turn))?;
            }
            let removed = metas.remove(sheet_uid)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(existed || !turns.is_empty())
    }
}

impl SheetPersistence for SheetDb {
    fn save(&self, turn_id: u64, sheet: &Sheet) -> Result<(), AppError> {
        SheetDb::save(self, turn_id, sheet)
    }

    fn load(&self, turn_id: u64, sheet_uid: &str) -> Result<Sheet, AppError> {
        SheetDb::load(self, turn_id, sheet_uid)
    }
}
