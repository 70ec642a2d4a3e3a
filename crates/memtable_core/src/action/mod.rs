//! Action language: parse, validate, and apply model-authored table edits.
//!
//! A batch moves through [`BatchContext`]: [`BatchContext::parse`] and
//! [`BatchContext::validate`] are all-or-nothing gates that run before any
//! mutation; [`BatchContext::apply`] is best-effort per action.

/// Ordering, deduplication, and application of validated actions.
pub mod executor;
mod loose;
/// Statement tokenizer.
pub mod parser;
/// Parse-time statement checks.
pub mod validator;


pub use executor::{plan, ChangeSet, ExecutionPlan};
pub use parser::{extract_edit_block, parse_statements};
pub use validator::validate;

use crate::error::{AppError, ApplyError};
use crate::grid::Sheet;
use serde::Serialize;
use std::collections::BTreeMap;

/// Statement class recognized from its verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Comment,
    Insert,
    Update,
    Delete,
}

/// One typed call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(usize),
    Str(String),
    Object(serde_json::Map<String, serde_json::Value>),
}

/// One logical statement of an edit block.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Statement text after joining wrapped lines.
    pub raw: String,
    pub kind: StatementKind,
    pub args: Vec<Arg>,
}

impl Statement {
    pub(crate) fn comment(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            kind: StatementKind::Comment,
            args: Vec::new(),
        }
    }
}

/// Mutating action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Insert,
    Update,
    Delete,
}

/// Column values keyed by data-column index.
pub type RowData = BTreeMap<usize, String>;

/// A validated action in data coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub table_index: usize,
    pub row_index: Option<usize>,
    pub data: Option<RowData>,
    /// Source statement, kept for error reporting.
    pub raw: String,
}

/// Knobs applied while executing a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Skip deletes on every table except table 0.
    pub ignore_delete: bool,
}

/// An action dropped at apply time, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAction {
    pub statement: String,
    #[serde(serialize_with = "serialize_display")]
    pub error: ApplyError,
}

fn serialize_display<S: serde::Serializer>(
    error: &ApplyError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Outcome of applying or previewing one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Actions left after deduplication.
    pub total: usize,
    pub applied: usize,
    pub skipped: Vec<SkippedAction>,
    pub duplicates_dropped: usize,
    pub notices: Vec<String>,
    /// Highlight sets, indexed like the sheets passed in.
    pub tables: Vec<ChangeSet>,
}

impl BatchReport {
    /// Human-readable one-line summary of the batch.
    pub fn summary(&self) -> String {
        let mut summary = format!("{} of {} operations applied", self.applied, self.total);
        if !self.skipped.is_empty() {
            let reasons = self
                .skipped
                .iter()
                .map(|skip| skip.error.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            summary.push_str(&format!("; {} skipped: {}", self.skipped.len(), reasons));
        }
        if self.duplicates_dropped > 0 {
            summary.push_str(&format!(
                "; {} duplicate(s) dropped",
                self.duplicates_dropped
            ));
        }
        summary
    }
}

/// Per-batch state threaded from parsing to execution.
#[derive(Debug, Clone)]
pub struct BatchContext {
    /// Statement body with any `<tableEdit>` wrapper removed.
    pub source: String,
    pub options: BatchOptions,
    pub statements: Vec<Statement>,
    /// Comment and pass-through lines, in source order.
    pub comments: Vec<String>,
    pub actions: Vec<Action>,
}

impl BatchContext {
    pub fn new(text: &str, options: BatchOptions) -> Self {
        Self {
            source: extract_edit_block(text).to_string(),
            options,
            statements: Vec::new(),
            comments: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Tokenize the source into statements.
    ///
    /// # Errors
    /// Returns [`AppError::Parse`] naming the first malformed statement.
    pub fn parse(&mut self) -> Result<&mut Self, AppError> {
        self.statements = parse_statements(&self.source)?;
        self.comments = self
            .statements
            .iter()
            .filter(|statement| statement.kind == StatementKind::Comment)
            .map(|statement| statement.raw.clone())
            .collect();
        Ok(self)
    }

    /// Turn parsed statements into actions.
    ///
    /// # Errors
    /// Returns [`AppError::Validation`] naming the first invalid statement.
    pub fn validate(&mut self) -> Result<&mut Self, AppError> {
        self.actions = validate(&self.statements)?;
        Ok(self)
    }

    /// Apply the validated actions to `sheets`, indexed by table index.
    pub fn apply(&self, sheets: &mut [Sheet]) -> BatchReport {
        let plan = plan(&self.actions, sheets);
        executor::apply(&plan, sheets, self.options)
    }

    /// Report what [`Self::apply`] would do without touching `sheets`.
    pub fn dry_run(&self, sheets: &[Sheet]) -> BatchReport {
        let plan = plan(&self.actions, sheets);
        executor::dry_run(&plan, sheets, self.options)
    }
}

/// Parse, validate, and apply `text` against `sheets`.
///
/// # Errors
/// Returns [`AppError::Parse`] or [`AppError::Validation`] before any sheet is
/// touched; per-action failures are reported in the [`BatchReport`].
pub fn run_batch(
    text: &str,
    sheets: &mut [Sheet],
    options: BatchOptions,
) -> Result<BatchReport, AppError> {
    let mut context = BatchContext::new(text, options);
    context.parse()?.validate()?;
    let report = context.apply(sheets);
    tracing::info!(summary = %report.summary(), "edit batch applied");
    Ok(report)
}

/// Parse, validate, and dry-run `text` against `sheets`.
///
/// # Errors
/// Same gates as [`run_batch`].
pub fn preview_batch(
    text: &str,
    sheets: &[Sheet],
    options: BatchOptions,
) -> Result<BatchReport, AppError> {
    let mut context = BatchContext::new(text, options);
    context.parse()?.validate()?;
    Ok(context.dry_run(sheets))
}
