//! Plain-text rendering of sheets for the model's context window.
//!
//! Row and column numbers printed here are the data coordinates the action
//! language addresses: `rowIndex` 0 is the first content row, column `0:` the
//! first content column.

use crate::grid::Sheet;
use std::fmt::Write;

/// Shown in place of content rows when a sheet has none.
pub const EMPTY_TABLE_MESSAGE: &str = "(This table is empty.)";

const REQUIRED_HINT: &str =
    "This table must not stay empty; insert a row as soon as the conversation provides one.";

/// Render one sheet as table `index`.
pub fn render_table(index: usize, sheet: &Sheet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{index}:{}]", sheet.name);
    if let Some(note) = sheet.note() {
        let _ = writeln!(out, "Note: {}", flatten(note));
    }

    let header = sheet
        .column_names()
        .iter()
        .enumerate()
        .map(|(col, name)| format!("{col}:{}", sanitize(name)))
        .collect::<Vec<_>>();
    let _ = writeln!(out, "rowIndex,{}", header.join(","));

    let mut rendered_rows = 0;
    for row in 1..sheet.row_count() {
        if sheet.is_blank_row(row) {
            continue;
        }
        let values = sheet
            .row_values(row)
            .iter()
            .map(|value| sanitize(value))
            .collect::<Vec<_>>();
        let _ = writeln!(out, "{},{}", row - 1, values.join(","));
        rendered_rows += 1;
    }
    if rendered_rows == 0 {
        let _ = writeln!(out, "{EMPTY_TABLE_MESSAGE}");
        if sheet.required_non_empty {
            let _ = writeln!(out, "{REQUIRED_HINT}");
        }
    }

    let (insert, update, delete) = sheet.edit_rules();
    if insert.or(update).or(delete).is_some() {
        let _ = writeln!(out, "Edit rules:");
        for (verb, rule) in [("insert", insert), ("update", update), ("delete", delete)] {
            if let Some(rule) = rule {
                let _ = writeln!(out, "- {verb}: {}", flatten(rule));
            }
        }
    }
    out
}

/// Render every enabled sheet, numbered by its position in `sheets`.
pub fn render_tables(sheets: &[Sheet]) -> String {
    sheets
        .iter()
        .enumerate()
        .filter(|(_, sheet)| sheet.enabled)
        .map(|(index, sheet)| render_table(index, sheet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cell text made safe for one comma-separated line.
fn sanitize(value: &str) -> String {
    flatten(value).replace(',', "/")
}

fn flatten(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
