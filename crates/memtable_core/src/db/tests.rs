//! Snapshot storage tests against a temporary redb file.

use crate::error::AppError;
use crate::grid::cell::VALUE_KEY;
use crate::grid::{SheetDomain, SheetType};
use crate::test_support::{people_sheet, setup_temp_db};

#[test]
fn save_and_load_round_trips_history() {
    let (db, _temp) = setup_temp_db();
    let mut sheet = people_sheet(SheetType::Dynamic, &["Ann", "Bo"]);
    sheet.set_field(1, 2, VALUE_KEY, "pilot").expect("edit");
    sheet.set_row_locked(2, true).expect("lock");

    db.sheets.save(3, &sheet).expect("save");
    let loaded = db.sheets.load(3, &sheet.uid).expect("load");

    assert_eq!(loaded.grid(), sheet.grid());
    assert_eq!(loaded.cell_log(), sheet.cell_log());
    assert_eq!(loaded.value_at(1, 2), "pilot");
    assert!(loaded.is_row_locked(2));
    assert_eq!(loaded.history_at(1, 2).expect("history").len(), 2);
}

#[test]
fn load_missing_snapshot_is_not_found() {
    let (db, _temp) = setup_temp_db();
    let err = db.sheets.load(1, "missing").expect_err("missing");
    assert!(matches!(err, AppError::NotFound));
}

#[test]
fn load_latest_picks_newest_turn_not_after_request() {
    let (db, _temp) = setup_temp_db();
    let mut sheet = people_sheet(SheetType::Free, &["Ann"]);
    db.sheets.save(2, &sheet).expect("save turn 2");
    sheet.set_field(1, 1, VALUE_KEY, "Anne").expect("edit");
    db.sheets.save(5, &sheet).expect("save turn 5");

    let (turn, at_four) = db
        .sheets
        .load_latest(&sheet.uid, 4)
        .expect("load")
        .expect("snapshot");
    assert_eq!(turn, 2);
    assert_eq!(at_four.value_at(1, 1), "Ann");

    let (turn, _) = db
        .sheets
        .load_latest(&sheet.uid, 99)
        .expect("load")
        .expect("snapshot");
    assert_eq!(turn, 5);
    assert!(db.sheets.load_latest(&sheet.uid, 1).expect("load").is_none());
    assert_eq!(db.sheets.list_turns(&sheet.uid).expect("turns"), vec![2, 5]);
}

#[test]
fn meta_tracks_latest_turn_and_shape() {
    let (db, _temp) = setup_temp_db();
    let sheet = people_sheet(SheetType::Fixed, &["Ann", "Bo"]).with_domain(SheetDomain::Role);
    db.sheets.save(7, &sheet).expect("save");
    db.sheets.save(4, &sheet).expect("save older turn");

    let meta = db
        .sheets
        .get_meta(&sheet.uid)
        .expect("meta")
        .expect("present");
    assert_eq!(meta.latest_turn, 7);
    assert_eq!(meta.rows, 2);
    assert_eq!(meta.columns, 2);
    assert_eq!(meta.sheet_type, SheetType::Fixed);
    assert_eq!(meta.domain, SheetDomain::Role);
}

#[test]
fn list_meta_is_sorted_by_name() {
    let (db, _temp) = setup_temp_db();
    let mut zeta = people_sheet(SheetType::Free, &["z"]);
    zeta.name = "zeta".to_string();
    let mut alpha = people_sheet(SheetType::Free, &["a"]);
    alpha.name = "alpha".to_string();
    db.sheets.save(1, &zeta).expect("save");
    db.sheets.save(1, &alpha).expect("save");

    let names = db
        .sheets
        .list_meta()
        .expect("list")
        .into_iter()
        .map(|meta| meta.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[test]
fn delete_removes_snapshots_and_meta() {
    let (db, _temp) = setup_temp_db();
    let sheet = people_sheet(SheetType::Free, &["Ann"]);
    db.sheets.save(1, &sheet).expect("save");
    db.sheets.save(2, &sheet).expect("save");

    assert!(db.sheets.delete(&sheet.uid).expect("delete"));
    assert!(db.sheets.list_turns(&sheet.uid).expect("turns").is_empty());
    assert!(db.sheets.get_meta(&sheet.uid).expect("meta").is_none());
    assert!(!db.sheets.delete(&sheet.uid).expect("second delete"));
}

#[test]
fn shared_handle_sees_committed_writes() {
    let (db, _temp) = setup_temp_db();
    let other = db.share().expect("share");
    let sheet = people_sheet(SheetType::Free, &["Ann"]);
    db.sheets.save(1, &sheet).expect("save");
    assert_eq!(other.sheets.list_turns(&sheet.uid).expect("turns"), vec![1]);
}
