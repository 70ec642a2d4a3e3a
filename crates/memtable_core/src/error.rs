//! Application error types for the grid, action pipeline, and storage.
use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Storage error: {0}")]
    StorageMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Cell ({row}, {col}) is out of bounds")]
    OutOfBounds { row: usize, col: usize },

    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Parse error in `{statement}`: {reason}")]
    Parse { statement: String, reason: String },

    #[error("Invalid statement `{statement}`: {reason}")]
    Validation { statement: String, reason: String },

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub(crate) fn parse(statement: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            statement: statement.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(statement: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            statement: statement.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts a whole batch before any mutation.
    pub fn is_batch_rejection(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Validation { .. })
    }
}

impl From<redb::DatabaseError> for AppError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TransactionError> for AppError {
    fn from(value: redb::TransactionError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TableError> for AppError {
    fn from(value: redb::TableError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::StorageError> for AppError {
    fn from(value: redb::StorageError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::CommitError> for AppError {
    fn from(value: redb::CommitError) -> Self {
        Self::Database(value.into())
    }
}

/// Per-action failure recorded while applying a batch.
///
/// Unlike [`AppError::Parse`] and [`AppError::Validation`], these never abort
/// the batch: the action is skipped and the rest proceeds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("table {0} not found")]
    TableNotFound(usize),

    #[error("row {0} not found")]
    RowNotFound(usize),

    #[error("row {0} has an empty identity column")]
    EmptyIdentity(usize),

    #[error("row {row} missing required column {col}")]
    MissingRequiredColumn { row: usize, col: usize },

    #[error("column {0} not found")]
    ColumnNotFound(usize),

    #[error("row {0} is locked")]
    RowLocked(usize),

    #[error("delete of row {row} in table {table} ignored by policy")]
    DeleteSuppressed { table: usize, row: usize },

    #[error("{0}")]
    Rejected(String),
}

impl From<AppError> for ApplyError {
    fn from(value: AppError) -> Self {
        match value {
            AppError::Forbidden(reason) => Self::Rejected(reason),
            other => Self::Rejected(other.to_string()),
        }
    }
}
