//! Shared integration-test server bootstrap helpers.

use axum_test::TestServer;
use memtable_server::{create_app, AppState, BatchGate, Config, Database, SheetLockManager};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) fn test_config_for_db_path(db_path: &Path) -> Config {
    Config {
        port: 0,
        db_path: db_path.to_str().expect("db path").to_string(),
        max_edit_text_size: 1_000_000,
        ignore_delete: false,
    }
}

pub(crate) fn test_server_for_config(config: Config) -> (TestServer, Arc<BatchGate>) {
    let db = Database::new(config.db_path.as_str()).expect("open db");
    let gate = Arc::new(BatchGate::new());
    let state = AppState::with_gate(config, db, gate.clone());
    let app = create_app(state, false);
    let server = TestServer::new(app).expect("server");
    (server, gate)
}

pub(crate) fn setup_test_server() -> (TestServer, TempDir, Arc<BatchGate>) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("test.db");
    let config = test_config_for_db_path(&db_path);
    let (server, gate) = test_server_for_config(config);
    (server, temp_dir, gate)
}

/// Server whose per-sheet lock manager is shared with the caller.
pub(crate) fn setup_test_server_with_locks() -> (TestServer, TempDir, Arc<SheetLockManager>) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config_for_db_path(&temp_dir.path().join("test.db"));
    let db = Database::new(config.db_path.as_str()).expect("open db");
    let locks = Arc::new(SheetLockManager::default());
    let state = AppState::new(config, db).with_locks(locks.clone());
    let server = TestServer::new(create_app(state, false)).expect("server");
    (server, temp_dir, locks)
}

/// Create a `name, role` sheet at turn 1 and return its uid.
pub(crate) async fn create_people_sheet(server: &TestServer, sheet_type: &str) -> String {
    let response = server
        .post("/api/sheets")
        .json(&json!({
            "name": "people",
            "sheet_type": sheet_type,
            "columns": ["name", "role"],
            "turn": 1
        }))
        .await;
    let sheet: Value = response.json();
    sheet["uid"].as_str().expect("uid").to_string()
}
