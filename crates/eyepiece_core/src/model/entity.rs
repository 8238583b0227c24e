//! Entity field tables.
//!
//! # Responsibility
//! - Let a plain data type describe its persisted fields as typed
//!   read/write accessors keyed by column name.
//! - Resolve a column name to one accessor and storage kind.
//!
//! # Invariants
//! - Only text and whole-number kinds exist.
//! - When a field declares both kinds, text wins.

use serde::{Deserialize, Serialize};

/// Row identity assigned by the store on insert.
pub type EntityId = i64;

/// Storage kind of one persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Integer,
}

impl ColumnKind {
    /// SQLite type name used in `CREATE TABLE`.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
        }
    }
}

/// One column value moved between an entity and a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Text(String),
    Integer(i64),
}

impl ColumnValue {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Text(_) => ColumnKind::Text,
            Self::Integer(_) => ColumnKind::Integer,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

/// Typed read/write pair for one field.
///
/// Readers return `None` for "no value", which stores omit from writes.
pub enum FieldAccessor<T> {
    Text {
        get: fn(&T) -> Option<String>,
        set: fn(&mut T, String),
    },
    Integer {
        get: fn(&T) -> Option<i64>,
        set: fn(&mut T, i64),
    },
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldAccessor<T> {}

impl<T> FieldAccessor<T> {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Text { .. } => ColumnKind::Text,
            Self::Integer { .. } => ColumnKind::Integer,
        }
    }

    pub fn read(&self, entity: &T) -> Option<ColumnValue> {
        match self {
            Self::Text { get, .. } => get(entity).map(ColumnValue::Text),
            Self::Integer { get, .. } => get(entity).map(ColumnValue::Integer),
        }
    }

    /// Applies `value` to `entity`.
    ///
    /// Returns `false` without touching the entity when the value kind does
    /// not match this accessor.
    pub fn write(&self, entity: &mut T, value: ColumnValue) -> bool {
        match (self, value) {
            (Self::Text { set, .. }, ColumnValue::Text(value)) => {
                set(entity, value);
                true
            }
            (Self::Integer { set, .. }, ColumnValue::Integer(value)) => {
                set(entity, value);
                true
            }
            _ => false,
        }
    }
}

struct FieldEntry<T> {
    name: &'static str,
    accessor: FieldAccessor<T>,
}

/// Statically declared accessors of an entity type, keyed by column name.
pub struct FieldTable<T> {
    fields: Vec<FieldEntry<T>>,
}

impl<T> Default for FieldTable<T> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<T> FieldTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a text field.
    pub fn text(
        mut self,
        name: &'static str,
        get: fn(&T) -> Option<String>,
        set: fn(&mut T, String),
    ) -> Self {
        self.fields.push(FieldEntry {
            name,
            accessor: FieldAccessor::Text { get, set },
        });
        self
    }

    /// Declares a whole-number field.
    pub fn integer(
        mut self,
        name: &'static str,
        get: fn(&T) -> Option<i64>,
        set: fn(&mut T, i64),
    ) -> Self {
        self.fields.push(FieldEntry {
            name,
            accessor: FieldAccessor::Integer { get, set },
        });
        self
    }

    /// Resolves `column` to an accessor, probing text before integer.
    pub fn resolve(&self, column: &str) -> Option<FieldAccessor<T>> {
        self.find(column, ColumnKind::Text)
            .or_else(|| self.find(column, ColumnKind::Integer))
    }

    /// Resolves `column` only if it is declared with `kind`.
    pub fn find(&self, column: &str, kind: ColumnKind) -> Option<FieldAccessor<T>> {
        self.fields
            .iter()
            .find(|entry| entry.name == column && entry.accessor.kind() == kind)
            .map(|entry| entry.accessor)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Plain data type persisted by an entity store.
///
/// `Default` provides the blank instance rows are decoded into.
pub trait Entity: Default + 'static {
    /// Field accessors for every persistable field, including `id` and `name`.
    fn field_table() -> FieldTable<Self>;
}

#[cfg(test)]
mod tests {
    use super::{ColumnKind, ColumnValue, FieldTable};

    #[derive(Debug, Default)]
    struct Lens {
        label: String,
        code: i64,
    }

    fn lens_fields() -> FieldTable<Lens> {
        FieldTable::<Lens>::new()
            .integer("code", |lens| Some(lens.code), |lens, value| lens.code = value)
            .text(
                "code",
                |lens| Some(lens.code.to_string()),
                |lens, value| lens.code = value.parse().unwrap_or_default(),
            )
            .text(
                "label",
                |lens| Some(lens.label.clone()),
                |lens, value| lens.label = value,
            )
    }

    #[test]
    fn resolve_prefers_text_accessor_when_both_exist() {
        let table = lens_fields();
        let accessor = table.resolve("code").expect("code should resolve");
        assert_eq!(accessor.kind(), ColumnKind::Text);
    }

    #[test]
    fn resolve_is_stable_across_calls() {
        let table = lens_fields();
        let kinds: Vec<_> = (0..3)
            .map(|_| table.resolve("code").map(|accessor| accessor.kind()))
            .collect();
        assert_eq!(kinds, vec![Some(ColumnKind::Text); 3]);
    }

    #[test]
    fn resolve_returns_none_for_unknown_column() {
        assert!(lens_fields().resolve("aperture").is_none());
    }

    #[test]
    fn write_rejects_value_of_other_kind() {
        let table = lens_fields();
        let label = table.resolve("label").expect("label should resolve");
        let mut lens = Lens::default();

        assert!(!label.write(&mut lens, ColumnValue::Integer(7)));
        assert!(lens.label.is_empty());

        assert!(label.write(&mut lens, ColumnValue::Text("wide".to_string())));
        assert_eq!(
            label.read(&lens),
            Some(ColumnValue::Text("wide".to_string()))
        );
    }
}
