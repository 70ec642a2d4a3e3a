use super::{Action, ActionKind, Arg, RowData, Statement, StatementKind};
use crate::error::AppError;
use serde_json::Value;

/// Convert parsed statements into actions, rejecting the batch on the first
/// malformed one.
///
/// Comments are dropped. Positional arguments map as: argument 0 is the table
/// index, argument 1 is the row index when it is an integer, and the first
/// object argument anywhere is the row data.
///
/// # Errors
/// Returns [`AppError::Validation`] when a table index is not an integer, an
/// update or delete has no integer row index, or a data key is not a string of
/// digits.
pub fn validate(statements: &[Statement]) -> Result<Vec<Action>, AppError> {
    statements
        .iter()
        .filter_map(|statement| {
            let kind = match statement.kind {
                StatementKind::Comment => return None,
                StatementKind::Insert => ActionKind::Insert,
                StatementKind::Update => ActionKind::Update,
                StatementKind::Delete => ActionKind::Delete,
            };
            Some(validate_one(statement, kind))
        })
        .collect()
}

fn validate_one(statement: &Statement, kind: ActionKind) -> Result<Action, AppError> {
    let reject = |reason: &str| AppError::validation(statement.raw.clone(), reason);

    let table_index = match statement.args.first() {
        Some(Arg::Int(index)) => *index,
        _ => return Err(reject("tableIndex must be an integer")),
    };
    let row_index = match statement.args.get(1) {
        Some(Arg::Int(index)) => Some(*index),
        _ => None,
    };
    if row_index.is_none() && matches!(kind, ActionKind::Update | ActionKind::Delete) {
        return Err(reject("rowIndex must be an integer"));
    }

    let data = statement
        .args
        .iter()
        .find_map(|arg| match arg {
            Arg::Object(map) => Some(map),
            _ => None,
        })
        .map(|map| {
            map.iter()
                .map(|(key, value)| {
                    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(reject(&format!(
                            "column key `{key}` is not a numeric index"
                        )));
                    }
                    let col = key
                        .parse::<usize>()
                        .map_err(|_| reject(&format!("column key `{key}` is out of range")))?;
                    Ok((col, cell_text(value)))
                })
                .collect::<Result<RowData, _>>()
        })
        .transpose()?;

    tracing::debug!(?kind, table_index, ?row_index, "statement validated");
    Ok(Action {
        kind,
        table_index,
        row_index,
        data,
        raw: statement.raw.clone(),
    })
}

/// Flatten one JSON value into cell text.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::parse_statements;

    fn actions(text: &str) -> Result<Vec<Action>, AppError> {
        validate(&parse_statements(text).expect("parse"))
    }

    #[test]
    fn positional_arguments_are_assigned() {
        let actions = actions(
            "// note\ninsertRow(0, {\"0\": \"Ann\", \"1\": 3})\nupdateRow(1, 2, {\"0\": null})\ndeleteRow(0, 4)",
        )
        .expect("valid");
        assert_eq!(actions.len(), 3);

        assert_eq!(actions[0].kind, ActionKind::Insert);
        assert_eq!(actions[0].row_index, None);
        let data = actions[0].data.as_ref().expect("data");
        assert_eq!(data.get(&0).map(String::as_str), Some("Ann"));
        assert_eq!(data.get(&1).map(String::as_str), Some("3"));

        assert_eq!(actions[1].table_index, 1);
        assert_eq!(actions[1].row_index, Some(2));
        assert_eq!(
            actions[1].data.as_ref().and_then(|d| d.get(&0)).map(String::as_str),
            Some("")
        );

        assert_eq!(actions[2].kind, ActionKind::Delete);
        assert_eq!(actions[2].data, None);
    }

    #[test]
    fn non_numeric_data_keys_are_rejected() {
        let err = actions("updateRow(0, 1, {\"name\":\"x\"})").expect_err("invalid key");
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn update_and_delete_need_integer_rows() {
        assert!(actions("updateRow(0, {\"0\":\"x\"})").is_err());
        assert!(actions("deleteRow(0, 'one')").is_err());
        assert!(actions("deleteRow(0)").is_err());
    }

    #[test]
    fn table_index_must_be_an_integer() {
        let err = actions("insertRow('people', {\"0\":\"x\"})").expect_err("string table");
        assert!(err.to_string().contains("tableIndex"));
    }
}
