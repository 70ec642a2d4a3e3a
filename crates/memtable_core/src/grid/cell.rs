//! Cell versions and the identifiers that address them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Field key holding a cell's displayed content.
pub const VALUE_KEY: &str = "value";
/// Free-form annotation (sheet note on the origin, column note on headers).
pub const NOTE_KEY: &str = "note";
/// Column header flag marking a non-nullable column (`"true"`).
pub const REQUIRED_KEY: &str = "required";
/// Origin-cell rule describing when rows should be inserted.
pub const INSERT_RULE_KEY: &str = "insert_rule";
/// Origin-cell rule describing when rows should be updated.
pub const UPDATE_RULE_KEY: &str = "update_rule";
/// Origin-cell rule describing when rows should be deleted.
pub const DELETE_RULE_KEY: &str = "delete_rule";

/// Ordered field map carried by each cell version.
pub type Fields = IndexMap<String, String>;

/// Identity of one version of a cell's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellUid(String);

/// Identity of a grid slot, shared by every version that occupies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordUid(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Allocate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Return this identifier as a string slice.
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(CellUid);
string_id!(CoordUid);

/// Role of a cell, fixed by its grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Origin,
    ColumnHeader,
    RowHeader,
    Data,
}

impl CellKind {
    /// Kind of the cell living at `(row, col)`.
    pub fn at(row: usize, col: usize) -> Self {
        match (row, col) {
            (0, 0) => Self::Origin,
            (0, _) => Self::ColumnHeader,
            (_, 0) => Self::RowHeader,
            _ => Self::Data,
        }
    }
}

/// One immutable version of a grid slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub uid: CellUid,
    pub coord_uid: CoordUid,
    pub kind: CellKind,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub locked: bool,
    /// Tombstone marker set only on diff output.
    #[serde(skip)]
    pub is_deleted: bool,
}

impl Cell {
    /// Create the first version of a brand-new slot.
    pub(crate) fn fresh(kind: CellKind) -> Self {
        Self {
            uid: CellUid::generate(),
            coord_uid: CoordUid::generate(),
            kind,
            fields: Fields::new(),
            locked: false,
            is_deleted: false,
        }
    }

    /// Derive the next version of this slot with `patch` merged over the fields.
    pub(crate) fn next_version(&self, patch: &Fields) -> Self {
        let mut fields = self.fields.clone();
        for (key, value) in patch {
            fields.insert(key.clone(), value.clone());
        }
        Self {
            uid: CellUid::generate(),
            coord_uid: self.coord_uid.clone(),
            kind: self.kind,
            fields,
            locked: self.locked,
            is_deleted: false,
        }
    }

    /// Displayed content, empty when unset.
    pub fn value(&self) -> &str {
        self.field(VALUE_KEY).unwrap_or("")
    }

    /// Look up an annotation field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Build a single-key patch, the common shape for content writes.
pub fn value_patch(value: impl Into<String>) -> Fields {
    let mut patch = Fields::new();
    patch.insert(VALUE_KEY.to_string(), value.into());
    patch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_position() {
        assert_eq!(CellKind::at(0, 0), CellKind::Origin);
        assert_eq!(CellKind::at(0, 3), CellKind::ColumnHeader);
        assert_eq!(CellKind::at(2, 0), CellKind::RowHeader);
        assert_eq!(CellKind::at(1, 1), CellKind::Data);
    }

    #[test]
    fn next_version_keeps_slot_and_merges_fields() {
        let mut original = Cell::fresh(CellKind::Data);
        original.fields.insert(NOTE_KEY.to_string(), "keep".to_string());
        original.fields.insert(VALUE_KEY.to_string(), "old".to_string());

        let next = original.next_version(&value_patch("new"));
        assert_ne!(next.uid, original.uid);
        assert_eq!(next.coord_uid, original.coord_uid);
        assert_eq!(next.value(), "new");
        assert_eq!(next.field(NOTE_KEY), Some("keep"));
        assert_eq!(original.value(), "old");
    }
}
