//! Tokenizer turning model-authored edit text into typed statements.

use super::loose;
use super::{Arg, Statement, StatementKind};
use crate::error::AppError;

/// Verb prefixes, longest first so `insertRow` wins over `insert`.
const VERBS: [(&str, StatementKind); 6] = [
    ("insertRow", StatementKind::Insert),
    ("updateRow", StatementKind::Update),
    ("deleteRow", StatementKind::Delete),
    ("insert", StatementKind::Insert),
    ("update", StatementKind::Update),
    ("delete", StatementKind::Delete),
];

const OPEN_TAG: &str = "<tableEdit>";
const CLOSE_TAG: &str = "</tableEdit>";
const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// Pull the statement body out of a `<tableEdit>` block.
///
/// Text without the tag is returned trimmed. One `<!-- ... -->` wrapper inside
/// the block is stripped.
pub fn extract_edit_block(text: &str) -> &str {
    let body = match text.find(OPEN_TAG) {
        Some(start) => {
            let inner = &text[start + OPEN_TAG.len()..];
            match inner.find(CLOSE_TAG) {
                Some(end) => &inner[..end],
                None => inner,
            }
        }
        None => text,
    };
    let body = body.trim();
    match body.strip_prefix(COMMENT_OPEN) {
        Some(rest) => rest.strip_suffix(COMMENT_CLOSE).unwrap_or(rest).trim(),
        None => body,
    }
}

/// Split `text` into statements.
///
/// Physical lines are joined into one logical statement until their
/// parentheses balance, so object arguments may wrap across lines.
///
/// # Errors
/// Returns [`AppError::Parse`] for unbalanced parentheses or braces,
/// unterminated strings, and malformed object literals.
pub fn parse_statements(text: &str) -> Result<Vec<Statement>, AppError> {
    let mut statements = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    let mut depth: i64 = 0;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Outside a statement, anything not opening with a verb is pass-through
        // text, whatever parentheses it carries.
        if pending.is_empty() && !starts_with_verb(trimmed) {
            statements.push(Statement::comment(trimmed));
            continue;
        }
        pending.push(trimmed);
        depth += paren_delta(trimmed);
        if depth < 0 {
            return Err(AppError::parse(pending.join(" "), "unexpected ')'"));
        }
        if depth == 0 {
            let logical = pending.join(" ");
            pending.clear();
            statements.push(parse_logical(&logical)?);
        }
    }

    if !pending.is_empty() {
        return Err(AppError::parse(
            pending.join(" "),
            "unbalanced parentheses",
        ));
    }
    Ok(statements)
}

fn starts_with_verb(line: &str) -> bool {
    VERBS.iter().any(|(verb, _)| line.starts_with(verb))
}

/// Parse one logical statement whose parentheses already balance.
fn parse_logical(logical: &str) -> Result<Statement, AppError> {
    let compact = compact_delimiters(logical);
    let Some(kind) = VERBS
        .iter()
        .find(|(verb, _)| compact.starts_with(verb))
        .map(|(_, kind)| *kind)
    else {
        return Ok(Statement::comment(&compact));
    };
    let Some(open) = compact.find('(') else {
        return Ok(Statement::comment(&compact));
    };
    let close = matching_close(&compact, open)
        .ok_or_else(|| AppError::parse(compact.clone(), "unbalanced parentheses"))?;
    let args = split_args(&compact[open + 1..close])
        .map_err(|reason| AppError::parse(compact.clone(), reason))?
        .into_iter()
        .map(|token| classify(&token))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| AppError::parse(compact.clone(), reason))?;

    tracing::trace!(statement = %compact, args = args.len(), "statement parsed");
    Ok(Statement {
        raw: compact,
        kind,
        args,
    })
}

/// Net parenthesis count of one line, ignoring quoted text.
fn paren_delta(line: &str) -> i64 {
    let mut scan = QuoteScanner::default();
    let mut delta = 0;
    for ch in line.chars() {
        if scan.step(ch) {
            continue;
        }
        match ch {
            '(' => delta += 1,
            ')' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Drop whitespace touching `(`, `)` or `,` outside quoted text.
fn compact_delimiters(text: &str) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(text.len());
    let mut scan = QuoteScanner::default();
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        if scan.step(ch) || !ch.is_whitespace() {
            out.push(ch);
            index += 1;
            continue;
        }
        let run_end = chars[index..]
            .iter()
            .position(|c| !c.is_whitespace())
            .map(|offset| index + offset)
            .unwrap_or(chars.len());
        let before = out.chars().last();
        let after = chars.get(run_end).copied();
        let touches_delimiter = [before, after]
            .into_iter()
            .flatten()
            .any(|c| matches!(c, '(' | ')' | ','));
        if !touches_delimiter && before.is_some() && after.is_some() {
            out.extend(&chars[index..run_end]);
        }
        index = run_end;
    }
    out
}

/// Index of the `)` closing the `(` at `open`.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut scan = QuoteScanner::default();
    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        if scan.step(ch) {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split an argument list on commas outside strings and braces.
fn split_args(args: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut scan = QuoteScanner::default();
    let mut braces: i64 = 0;

    for ch in args.chars() {
        if scan.step(ch) {
            current.push(ch);
            continue;
        }
        match ch {
            '{' => braces += 1,
            '}' => {
                braces -= 1;
                if braces < 0 {
                    return Err("unexpected '}'".to_string());
                }
            }
            ',' if braces == 0 => {
                tokens.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    if scan.in_string() {
        return Err("unterminated string".to_string());
    }
    if braces != 0 {
        return Err("unbalanced braces".to_string());
    }
    if !current.trim().is_empty() || !tokens.is_empty() {
        tokens.push(current);
    }
    // A trailing comma leaves one empty token behind.
    if tokens.len() > 1 && tokens.last().is_some_and(|token| token.trim().is_empty()) {
        tokens.pop();
    }
    Ok(tokens)
}

fn classify(token: &str) -> Result<Arg, String> {
    let token = token.trim();
    if token.starts_with('{') && token.ends_with('}') {
        return loose::parse_object(token).map(Arg::Object);
    }
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        return token
            .parse::<usize>()
            .map(Arg::Int)
            .map_err(|err| format!("integer `{token}` out of range: {err}"));
    }
    Ok(Arg::Str(strip_quotes(token).to_string()))
}

fn strip_quotes(token: &str) -> &str {
    for quote in ['"', '\''] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return &token[1..token.len() - 1];
        }
    }
    token
}

/// Tracks whether a character stream is inside a quoted string.
///
/// A `'` only opens a string when it does not follow a letter or digit, so
/// apostrophes in bare words ("Alice's") are left alone.
#[derive(Default)]
struct QuoteScanner {
    quote: Option<char>,
    escaped: bool,
    previous: Option<char>,
}

impl QuoteScanner {
    /// Feed one character; returns `true` when it belongs to a quoted string
    /// (delimiters included).
    fn step(&mut self, ch: char) -> bool {
        let previous = self.previous.replace(ch);
        match self.quote {
            Some(quote) => {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == quote {
                    self.quote = None;
                }
                true
            }
            None => {
                let opens = match ch {
                    '"' => true,
                    '\'' => !previous.is_some_and(char::is_alphanumeric),
                    _ => false,
                };
                if opens {
                    self.quote = Some(ch);
                }
                opens
            }
        }
    }

    fn in_string(&self) -> bool {
        self.quote.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_edit_block_strips_tag_and_comment_wrapper() {
        let text = "Sure!\n<tableEdit>\n<!--\ninsertRow(0, {\"0\":\"a\"})\n-->\n</tableEdit>\nbye";
        assert_eq!(extract_edit_block(text), "insertRow(0, {\"0\":\"a\"})");
        assert_eq!(extract_edit_block("  deleteRow(0, 1) "), "deleteRow(0, 1)");
    }

    #[test]
    fn compact_keeps_whitespace_inside_strings() {
        assert_eq!(
            compact_delimiters("insertRow( 0 , {\"0\":\"A, B\"} )"),
            "insertRow(0,{\"0\":\"A, B\"})"
        );
        assert_eq!(compact_delimiters("note to self"), "note to self");
    }

    #[test]
    fn split_args_respects_strings_and_braces() {
        let tokens = split_args(r#"0,{"0":"A, B","1":"C"}"#).expect("split");
        assert_eq!(tokens, vec!["0".to_string(), r#"{"0":"A, B","1":"C"}"#.to_string()]);

        let tokens = split_args(r#"0,'it\'s, fine',{"a":{"b":1}}"#).expect("split");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn split_args_reports_unbalanced_input() {
        assert!(split_args(r#"0,{"0":"a""#).is_err());
        assert!(split_args(r#"0,"open"#).is_err());
        assert!(split_args("0,}").is_err());
    }

    #[test]
    fn split_args_handles_empty_and_trailing_comma() {
        assert!(split_args("").expect("empty").is_empty());
        assert_eq!(split_args("0,1,").expect("trailing").len(), 2);
    }

    #[test]
    fn classify_types_tokens() {
        assert!(matches!(classify("12"), Ok(Arg::Int(12))));
        assert!(matches!(classify("'x'"), Ok(Arg::Str(ref s)) if s == "x"));
        assert!(matches!(classify("\"1\""), Ok(Arg::Str(ref s)) if s == "1"));
        assert!(matches!(classify("{0: 'a'}"), Ok(Arg::Object(_))));
        assert!(classify("99999999999999999999999999").is_err());
    }

    #[test]
    fn apostrophes_in_bare_words_do_not_open_strings() {
        assert_eq!(paren_delta("insertRow(0, {0: Alice's cat})"), 0);
        assert_eq!(paren_delta("updateRow(0, 1, {\"0\": \"smile :)\"})"), 0);
    }

    #[test]
    fn unknown_verbs_and_bare_prose_become_comments() {
        let statements = parse_statements("mergeRow(0, 1)\ndelete nothing here").expect("parse");
        assert_eq!(statements.len(), 2);
        assert!(statements
            .iter()
            .all(|statement| statement.kind == StatementKind::Comment));
    }

    #[test]
    fn prose_with_stray_parentheses_is_passed_through() {
        let text = "insertRow(0, {\"0\":\"Ann\"})\nNothing else changed :)\n1) added Ann\nsee (notes";
        let statements = parse_statements(text).expect("parse");
        assert_eq!(statements.len(), 4);
        assert_eq!(statements[0].kind, StatementKind::Insert);
        assert!(statements[1..]
            .iter()
            .all(|statement| statement.kind == StatementKind::Comment));
        assert_eq!(statements[1].raw, "Nothing else changed :)");
    }

    #[test]
    fn statement_with_extra_close_paren_is_still_rejected() {
        let err = parse_statements("deleteRow(0, 1))").expect_err("stray paren");
        assert!(matches!(err, AppError::Parse { .. }));
    }

    #[test]
    fn multiline_object_is_joined_into_one_statement() {
        let text = "insertRow(0, {\n  \"0\": \"Ann\",\n  \"1\": \"pilot\"\n})\n// done";
        let statements = parse_statements(text).expect("parse");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].kind, StatementKind::Insert);
        assert_eq!(statements[0].args.len(), 2);
        assert_eq!(statements[1].kind, StatementKind::Comment);
    }

    #[test]
    fn dangling_open_paren_is_a_parse_error() {
        let err = parse_statements("insertRow(0, {\"0\":\"a\"}").expect_err("unbalanced");
        assert!(matches!(err, AppError::Parse { .. }));
    }
}
