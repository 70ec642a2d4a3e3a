//! Integration tests for the memtable HTTP API.

mod support;

use axum::http::StatusCode;
use serde_json::{json, Value};
use support::{
    create_people_sheet, setup_test_server, setup_test_server_with_locks,
    test_config_for_db_path, test_server_for_config,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_sheet_lifecycle() {
    let (server, _temp, _gate) = setup_test_server();

    let create_response = server
        .post("/api/sheets")
        .json(&json!({
            "name": "quests",
            "sheet_type": "dynamic",
            "domain": "role",
            "columns": ["title", "status"],
            "required_columns": [0],
            "note": "Open quests",
            "insert_rule": "a quest is accepted",
            "turn": 3
        }))
        .await;
    assert_eq!(create_response.status_code(), StatusCode::CREATED);
    let created: Value = create_response.json();
    let uid = created["uid"].as_str().expect("uid").to_string();
    assert_eq!(created["columns"][0]["name"], "title");
    assert_eq!(created["columns"][0]["required"], true);
    assert_eq!(created["columns"][1]["required"], false);
    assert_eq!(created["note"], "Open quests");

    let listed: Value = server.get("/api/sheets").await.json();
    assert_eq!(listed.as_array().expect("list").len(), 1);
    assert_eq!(listed[0]["latest_turn"], 3);

    // Later turns fall back to the newest stored snapshot.
    let fetched = server.get(&format!("/api/sheets/{}/turns/9", uid)).await;
    assert_eq!(fetched.status_code(), StatusCode::OK);
    let fetched: Value = fetched.json();
    assert_eq!(fetched["turn"], 3);
    assert_eq!(fetched["domain"], "role");

    let earlier = server.get(&format!("/api/sheets/{}/turns/2", uid)).await;
    assert_eq!(earlier.status_code(), StatusCode::NOT_FOUND);

    let prompt = server
        .get(&format!("/api/sheets/{}/turns/3/prompt?index=4", uid))
        .await
        .text();
    assert!(prompt.starts_with("[4:quests]\nNote: Open quests\nrowIndex,0:title,1:status\n"));
    assert!(prompt.contains("- insert: a quest is accepted"));

    let deleted = server.delete(&format!("/api/sheets/{}", uid)).await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
    let missing = server.get(&format!("/api/sheets/{}/turns/3", uid)).await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_rejects_bad_input() {
    let (server, _temp, _gate) = setup_test_server();

    let blank = server
        .post("/api/sheets")
        .json(&json!({ "name": "  ", "columns": ["a"] }))
        .await;
    assert_eq!(blank.status_code(), StatusCode::BAD_REQUEST);

    let past_end = server
        .post("/api/sheets")
        .json(&json!({ "name": "x", "columns": ["a"], "required_columns": [3] }))
        .await;
    assert_eq!(past_end.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = past_end.json();
    assert!(body["error"].as_str().expect("error").contains("required column 3"));
}

#[tokio::test]
async fn test_cell_edit_history_and_restore() {
    let (server, _temp, _gate) = setup_test_server();
    let uid = create_people_sheet(&server, "dynamic").await;
    let cell_path = format!("/api/sheets/{}/turns/1/cells/1/1", uid);

    let first: Value = server
        .put(&cell_path)
        .json(&json!({ "value": "Ann" }))
        .await
        .json();
    assert_eq!(first["fields"]["value"], "Ann");
    let second = server
        .put(&cell_path)
        .json(&json!({ "fields": { "value": "Anne", "note": "nickname" } }))
        .await;
    assert_eq!(second.status_code(), StatusCode::OK);

    let history: Value = server.get(&format!("{}/history", cell_path)).await.json();
    let history = history.as_array().expect("history");
    assert_eq!(history.len(), 3);
    assert_eq!(history[2]["fields"]["note"], "nickname");
    assert_eq!(history[0]["coord_uid"], history[2]["coord_uid"]);

    let restored = server
        .post(&format!("{}/restore", cell_path))
        .json(&json!({ "uid": first["uid"] }))
        .await;
    assert_eq!(restored.status_code(), StatusCode::OK);
    let restored: Value = restored.json();
    assert_eq!(restored["fields"]["value"], "Ann");
    assert_ne!(restored["uid"], first["uid"]);

    let sheet: Value = server
        .get(&format!("/api/sheets/{}/turns/1", uid))
        .await
        .json();
    assert_eq!(sheet["rows"][0]["values"][0], "Ann");

    let empty = server.put(&cell_path).json(&json!({})).await;
    assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
    let outside = server
        .put(&format!("/api/sheets/{}/turns/1/cells/9/9", uid))
        .json(&json!({ "value": "x" }))
        .await;
    assert_eq!(outside.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_structure_follows_sheet_type() {
    let (server, _temp, _gate) = setup_test_server();
    let fixed = create_people_sheet(&server, "fixed").await;
    let free = create_people_sheet(&server, "free").await;

    let forbidden = server
        .post(&format!("/api/sheets/{}/turns/1/rows", fixed))
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let added: Value = server
        .post(&format!("/api/sheets/{}/turns/1/columns", free))
        .json(&json!({ "name": "level" }))
        .await
        .json();
    assert_eq!(added["columns"][2]["name"], "level");

    let rows: Value = server
        .post(&format!("/api/sheets/{}/turns/1/rows", free))
        .json(&json!({ "after": 0 }))
        .await
        .json();
    assert_eq!(rows["rows"].as_array().expect("rows").len(), 2);

    let removed: Value = server
        .delete(&format!("/api/sheets/{}/turns/1/columns/3", free))
        .await
        .json();
    assert_eq!(removed["columns"].as_array().expect("columns").len(), 2);

    let removed: Value = server
        .delete(&format!("/api/sheets/{}/turns/1/rows/2", free))
        .await
        .json();
    assert_eq!(removed["rows"].as_array().expect("rows").len(), 1);

    let last_row = server
        .delete(&format!("/api/sheets/{}/turns/1/rows/1", free))
        .await;
    assert_eq!(last_row.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_edit_batch_applies_and_saves_at_turn() {
    let (server, _temp, _gate) = setup_test_server();
    let uid = create_people_sheet(&server, "dynamic").await;
    server
        .put(&format!("/api/sheets/{}/turns/1/cells/1/1", uid))
        .json(&json!({ "value": "Ann" }))
        .await;

    let response = server
        .post("/api/turns/2/edits")
        .json(&json!({
            "sheets": [uid],
            "base_turn": 1,
            "text": "<tableEdit>\n<!--\ninsertRow(0, {\"0\":\"Bo\", \"1\":\"cook\"})\nupdateRow(0, 0, {\"1\":\"pilot\"})\n-->\n</tableEdit>"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let report: Value = response.json();
    assert_eq!(report["summary"], "2 of 2 operations applied");
    assert_eq!(report["dry_run"], false);
    assert_eq!(report["tables"][0]["inserted_rows"], json!([1]));
    assert!(report["warnings"].as_array().expect("warnings").is_empty());

    let at_two: Value = server
        .get(&format!("/api/sheets/{}/turns/2", uid))
        .await
        .json();
    assert_eq!(at_two["turn"], 2);
    assert_eq!(at_two["rows"][0]["values"], json!(["Ann", "pilot"]));
    assert_eq!(at_two["rows"][1]["values"], json!(["Bo", "cook"]));

    let at_one: Value = server
        .get(&format!("/api/sheets/{}/turns/1", uid))
        .await
        .json();
    assert_eq!(at_one["rows"].as_array().expect("rows").len(), 1);
    assert_eq!(at_one["rows"][0]["values"], json!(["Ann", ""]));
}

#[tokio::test]
async fn test_edit_batch_dry_run_and_rejections() {
    let (server, _temp, _gate) = setup_test_server();
    let uid = create_people_sheet(&server, "dynamic").await;

    let preview: Value = server
        .post("/api/turns/1/edits")
        .json(&json!({
            "sheets": [uid],
            "text": "insertRow(0, {\"0\":\"Bo\"})",
            "dry_run": true
        }))
        .await
        .json();
    assert_eq!(preview["applied"], 1);
    assert_eq!(preview["dry_run"], true);

    let malformed = server
        .post("/api/turns/1/edits")
        .json(&json!({ "sheets": [uid], "text": "insertRow(0, {\"0\":\"Bo\"}" }))
        .await;
    assert_eq!(malformed.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let sheet: Value = server
        .get(&format!("/api/sheets/{}/turns/1", uid))
        .await
        .json();
    assert_eq!(sheet["rows"].as_array().expect("rows").len(), 1);
    assert_eq!(sheet["rows"][0]["values"], json!(["", ""]));

    let unknown = server
        .post("/api/turns/1/edits")
        .json(&json!({ "sheets": ["missing"], "text": "" }))
        .await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);

    let backwards = server
        .post("/api/turns/1/edits")
        .json(&json!({ "sheets": [uid], "base_turn": 2, "text": "" }))
        .await;
    assert_eq!(backwards.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_locked_row_is_skipped_by_model() {
    let (server, _temp, _gate) = setup_test_server();
    let uid = create_people_sheet(&server, "dynamic").await;
    server
        .put(&format!("/api/sheets/{}/turns/1/cells/1/1", uid))
        .json(&json!({ "value": "Ann" }))
        .await;
    let lock = server
        .put(&format!("/api/sheets/{}/turns/1/rows/1/lock", uid))
        .json(&json!({ "locked": true }))
        .await;
    assert_eq!(lock.status_code(), StatusCode::OK);

    let report: Value = server
        .post("/api/turns/2/edits")
        .json(&json!({ "sheets": [uid], "text": "updateRow(0, 0, {\"1\":\"captain\"})" }))
        .await
        .json();
    assert_eq!(report["applied"], 0);
    assert_eq!(report["skipped"].as_array().expect("skipped").len(), 1);
    assert!(report["summary"].as_str().expect("summary").contains("locked"));

    let sheet: Value = server
        .get(&format!("/api/sheets/{}/turns/2", uid))
        .await
        .json();
    assert_eq!(sheet["rows"][0]["locked"], true);
    assert_eq!(sheet["rows"][0]["values"], json!(["Ann", ""]));
}

#[tokio::test]
async fn test_busy_gate_returns_locked() {
    let (server, _temp, gate) = setup_test_server();
    let uid = create_people_sheet(&server, "dynamic").await;

    let permit = gate.try_begin().expect("permit");
    let busy = server
        .post("/api/turns/1/edits")
        .json(&json!({ "sheets": [uid], "text": "" }))
        .await;
    assert_eq!(busy.status_code(), StatusCode::LOCKED);
    drop(permit);

    let free = server
        .post("/api/turns/1/edits")
        .json(&json!({ "sheets": [uid], "text": "" }))
        .await;
    assert_eq!(free.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_sheet_under_edit_rejects_other_writers() {
    let (server, _temp, locks) = setup_test_server_with_locks();
    let uid = create_people_sheet(&server, "dynamic").await;
    let other = create_people_sheet(&server, "dynamic").await;

    let guard = locks.begin_mutation(&uid).expect("hold sheet");
    let cell = server
        .put(&format!("/api/sheets/{}/turns/1/cells/1/1", uid))
        .json(&json!({ "value": "Ann" }))
        .await;
    assert_eq!(cell.status_code(), StatusCode::LOCKED);
    let batch = server
        .post("/api/turns/1/edits")
        .json(&json!({ "sheets": [other, uid], "text": "insertRow(0, {\"0\":\"Bo\"})" }))
        .await;
    assert_eq!(batch.status_code(), StatusCode::LOCKED);
    let untouched = server
        .put(&format!("/api/sheets/{}/turns/1/cells/1/1", other))
        .json(&json!({ "value": "Cy" }))
        .await;
    assert_eq!(untouched.status_code(), StatusCode::OK);
    drop(guard);

    let cell = server
        .put(&format!("/api/sheets/{}/turns/1/cells/1/1", uid))
        .json(&json!({ "value": "Ann" }))
        .await;
    assert_eq!(cell.status_code(), StatusCode::OK);
    let sheet: Value = server
        .get(&format!("/api/sheets/{}/turns/1", other))
        .await
        .json();
    assert_eq!(sheet["rows"][0]["values"], json!(["Cy", ""]));
}

#[tokio::test]
async fn test_disabled_sheet_rejects_model_actions() {
    let (server, _temp, _gate) = setup_test_server();
    let created: Value = server
        .post("/api/sheets")
        .json(&json!({ "name": "notes", "columns": ["text"], "enabled": false, "turn": 1 }))
        .await
        .json();
    assert_eq!(created["enabled"], false);
    let uid = created["uid"].as_str().expect("uid").to_string();

    let skipped: Value = server
        .post("/api/turns/1/edits")
        .json(&json!({ "sheets": [uid], "text": "insertRow(0, {\"0\":\"hi\"})" }))
        .await
        .json();
    assert_eq!(skipped["applied"], 0);

    let enabled = server
        .patch(&format!("/api/sheets/{}/turns/2", uid))
        .json(&json!({ "enabled": true, "name": "journal" }))
        .await;
    assert_eq!(enabled.status_code(), StatusCode::OK);
    let view: Value = enabled.json();
    assert_eq!(view["enabled"], true);
    assert_eq!(view["name"], "journal");

    let applied: Value = server
        .post("/api/turns/2/edits")
        .json(&json!({ "sheets": [uid], "text": "insertRow(0, {\"0\":\"hi\"})" }))
        .await
        .json();
    assert_eq!(applied["applied"], 1);
    assert_eq!(applied["tables"][0]["inserted_rows"], json!([0]));

    let blank_name = server
        .patch(&format!("/api/sheets/{}/turns/2", uid))
        .json(&json!({ "name": "  " }))
        .await;
    assert_eq!(blank_name.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_diff_between_turns() {
    let (server, _temp, _gate) = setup_test_server();
    let uid = create_people_sheet(&server, "dynamic").await;
    server
        .put(&format!("/api/sheets/{}/turns/1/cells/1/1", uid))
        .json(&json!({ "value": "Ann" }))
        .await;
    server
        .post("/api/turns/2/edits")
        .json(&json!({
            "sheets": [uid],
            "text": "insertRow(0, {\"0\":\"Bo\"})\ndeleteRow(0, 0)"
        }))
        .await;

    let diff = server
        .get(&format!("/api/sheets/{}/diff?from=1&to=2", uid))
        .await;
    assert_eq!(diff.status_code(), StatusCode::OK);
    let rows: Value = diff.json();
    let statuses = rows
        .as_array()
        .expect("rows")
        .iter()
        .map(|row| row["status"].as_str().expect("status").to_string())
        .collect::<Vec<_>>();
    assert_eq!(statuses, vec!["kept", "deleted", "new"]);
    assert_eq!(rows[1]["cells"][1]["fields"]["value"], "Ann");

    let unknown = server
        .get(&format!("/api/sheets/{}/diff?from=0&to=2", uid))
        .await;
    assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_body_limit_rejects_oversized_edits() {
    let temp_dir = TempDir::new().expect("temp dir");
    let mut config = test_config_for_db_path(&temp_dir.path().join("test.db"));
    config.max_edit_text_size = 256;
    let (server, _gate) = test_server_for_config(config);

    let response = server
        .post("/api/turns/1/edits")
        .json(&json!({ "sheets": ["any"], "text": "x".repeat(1024) }))
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let (server, _temp, _gate) = setup_test_server();
    let response = server.get("/api/sheets").await;
    response.assert_header("x-content-type-options", "nosniff");
    response.assert_header("x-frame-options", "DENY");
}
