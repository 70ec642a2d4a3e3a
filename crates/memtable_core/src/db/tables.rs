//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// File name for the redb database within the configured DB directory.
pub const REDB_FILE_NAME: &str = "data.redb";

/// Sheet snapshots keyed by `(sheet_uid, turn_id)`, stored as JSON.
pub const SHEET_SNAPSHOTS: TableDefinition<(&str, u64), &[u8]> =
    TableDefinition::new("sheet_snapshots");
/// Sheet metadata rows (`SheetMeta`, bincode-encoded).
pub const SHEETS_META: TableDefinition<&str, &[u8]> = TableDefinition::new("sheets_meta");
