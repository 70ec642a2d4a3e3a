//! Loosely formatted object literals as emitted by language models.
//!
//! Accepts unquoted or single-quoted keys, single-quoted strings, bare word
//! values, and trailing commas, by rewriting the literal into strict JSON and
//! handing it to `serde_json`.

use serde_json::{Map, Value};

/// Parse a brace-delimited loose object into a JSON map.
///
/// # Errors
/// Returns a human-readable reason when the literal cannot be read as an object.
pub(crate) fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    let strict = to_strict_json(text)?;
    match serde_json::from_str::<Value>(&strict) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("expected an object literal".to_string()),
        Err(err) => Err(format!("malformed object literal: {err}")),
    }
}

fn to_strict_json(text: &str) -> Result<String, String> {
    let chars = text.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(text.len() + 8);
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        match ch {
            '"' | '\'' => {
                let (literal, next) = read_quoted(&chars, index)?;
                out.push_str(&json_string(&literal));
                index = next;
            }
            '}' | ']' => {
                trim_trailing_comma(&mut out);
                out.push(ch);
                index += 1;
            }
            '{' | '[' | ',' | ':' => {
                out.push(ch);
                index += 1;
            }
            c if c.is_whitespace() => {
                out.push(c);
                index += 1;
            }
            _ => {
                let start = index;
                while index < chars.len() && !matches!(chars[index], ',' | '}' | ']' | ':') {
                    index += 1;
                }
                let raw = chars[start..index].iter().collect::<String>();
                let raw = raw.trim();
                let is_key = chars.get(index) == Some(&':');
                if is_key || !is_json_scalar(raw) {
                    out.push_str(&json_string(raw));
                } else {
                    out.push_str(raw);
                }
            }
        }
    }
    Ok(out)
}

/// Read a quoted string starting at `start`, returning its unescaped content
/// and the index just past the closing quote.
fn read_quoted(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut literal = String::new();
    let mut index = start + 1;
    while index < chars.len() {
        match chars[index] {
            '\\' => {
                let Some(&escaped) = chars.get(index + 1) else {
                    break;
                };
                literal.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                index += 2;
            }
            c if c == quote => return Ok((literal, index + 1)),
            c => {
                literal.push(c);
                index += 1;
            }
        }
    }
    Err("unterminated string in object literal".to_string())
}

fn is_json_scalar(raw: &str) -> bool {
    matches!(raw, "true" | "false" | "null")
        || (raw.parse::<f64>().is_ok()
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')))
}

fn json_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

fn trim_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}
