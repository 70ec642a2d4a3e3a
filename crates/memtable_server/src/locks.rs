//! In-memory per-sheet mutation guards shared by the human-edit and batch handlers.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Mutation-guard runtime errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetLockError {
    /// The sheet is already under an active mutation guard.
    Mutating { sheet_uid: String },
    /// Internal mutex state is poisoned.
    Poisoned,
}

impl fmt::Display for SheetLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mutating { sheet_uid } => {
                write!(f, "sheet '{sheet_uid}' is currently being edited")
            }
            Self::Poisoned => write!(f, "sheet lock manager state is poisoned"),
        }
    }
}

impl std::error::Error for SheetLockError {}

/// Tracks which sheet uids are mid load-edit-save.
#[derive(Default)]
pub struct SheetLockManager {
    mutating: Mutex<HashSet<String>>,
}

/// Guard marking one or more sheet uids as under mutation.
///
/// While this guard is alive, new guards on the same uids are rejected.
pub struct SheetMutationGuard<'a> {
    manager: &'a SheetLockManager,
    sheet_uids: Vec<String>,
}

impl Drop for SheetMutationGuard<'_> {
    fn drop(&mut self) {
        match self.manager.mutating.lock() {
            Ok(mut mutating) => {
                for uid in &self.sheet_uids {
                    mutating.remove(uid);
                }
            }
            Err(_) => {
                tracing::error!(
                    "Failed to clear mutation guard for {:?}: lock manager poisoned",
                    self.sheet_uids
                );
            }
        }
    }
}

impl SheetLockManager {
    fn state(&self) -> Result<MutexGuard<'_, HashSet<String>>, SheetLockError> {
        self.mutating.lock().map_err(|_| SheetLockError::Poisoned)
    }

    /// Begin a mutation guard for one sheet.
    ///
    /// # Errors
    /// Returns an error when `sheet_uid` is already mutating or lock state is
    /// poisoned.
    pub fn begin_mutation(&self, sheet_uid: &str) -> Result<SheetMutationGuard<'_>, SheetLockError> {
        self.begin_batch_mutation([sheet_uid])
    }

    /// Begin a mutation guard for several sheets at once.
    ///
    /// Nothing is guarded unless every uid is free.
    ///
    /// # Errors
    /// Returns an error when any uid is already mutating or lock state is
    /// poisoned.
    pub fn begin_batch_mutation<'a, I>(
        &'a self,
        sheet_uids: I,
    ) -> Result<SheetMutationGuard<'a>, SheetLockError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut deduped = Vec::new();
        let mut seen = HashSet::new();
        for uid in sheet_uids {
            let uid = uid.as_ref();
            if seen.insert(uid.to_string()) {
                deduped.push(uid.to_string());
            }
        }

        let mut mutating = self.state()?;
        if let Some(uid) = deduped.iter().find(|uid| mutating.contains(*uid)) {
            return Err(SheetLockError::Mutating {
                sheet_uid: uid.clone(),
            });
        }
        mutating.extend(deduped.iter().cloned());
        Ok(SheetMutationGuard {
            manager: self,
            sheet_uids: deduped,
        })
    }

    /// Whether `sheet_uid` is under a mutation guard.
    ///
    /// # Errors
    /// Returns [`SheetLockError::Poisoned`] when lock state is poisoned.
    pub fn is_mutating(&self, sheet_uid: &str) -> Result<bool, SheetLockError> {
        Ok(self.state()?.contains(sheet_uid))
    }
}
