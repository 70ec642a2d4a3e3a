//! Core library for memtable: versioned memory sheets edited by humans and
//! language models.
//!
//! The [`grid`] module owns cell identity and history, [`action`] turns model
//! output into ordered edits, [`diff`] classifies changes between turns, and
//! [`db`] stores per-turn snapshots.

/// Edit language parsing, validation, and execution.
pub mod action;
/// Configuration loading and defaults.
pub mod config;
/// Shared defaults.
pub mod constants;
/// Snapshot storage.
pub mod db;
/// Turn-over-turn row classification.
pub mod diff;
/// Scoped environment overrides for tests.
pub mod env;
/// Application error types.
pub mod error;
/// Versioned cell grid.
pub mod grid;
/// Model turn orchestration.
pub mod pipeline;
/// Read-side rendering of sheets.
pub mod prompt;
#[cfg(test)]
pub(crate) mod test_support;

pub use action::{preview_batch, run_batch, BatchOptions, BatchReport, ChangeSet};
pub use config::Config;
pub use db::Database;
pub use diff::{DiffEngine, RowDiff, RowStatus};
pub use error::{AppError, ApplyError};
pub use grid::{Sheet, SheetDomain, SheetType};
pub use pipeline::{BatchGate, SheetPersistence};
