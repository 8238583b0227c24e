//! Resolved table layout for one entity store.
//!
//! # Responsibility
//! - Bind declared column names to the entity's field accessors once.
//! - Build the SQL statements used by the store and its schema hooks.
//! - Translate between entity fields, bind values and row values.
//!
//! # Invariants
//! - `id` and `name` always occupy positions 0 and 1.
//! - Layout and SQL never change after resolution.
//! - Columns without an accessor are reported, never silently dropped.

use super::entity_store::{RepoError, RepoResult};
use crate::db::{quote_identifier, DbResult, SchemaParticipant, UpgradePolicy};
use crate::model::entity::{ColumnKind, ColumnValue, Entity, EntityId, FieldAccessor};
use log::{info, warn};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, Row};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// Identity column present in every entity table.
pub const ID_COLUMN: &str = "id";
/// Display-name column present in every entity table.
pub const NAME_COLUMN: &str = "name";

/// Name and storage kind of one physical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
}

/// Mismatch between a store's declared columns and its entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDiagnostic {
    /// No accessor exists for the column; it is left out of the table.
    UnresolvedAccessor { table: String, column: String },
    /// A standard column's accessor has the wrong kind; it is not bound.
    TypeMismatch {
        table: String,
        column: String,
        expected: ColumnKind,
        found: ColumnKind,
    },
}

impl SchemaDiagnostic {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnresolvedAccessor { .. } => "unresolved_accessor",
            Self::TypeMismatch { .. } => "type_mismatch",
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Self::UnresolvedAccessor { column, .. } | Self::TypeMismatch { column, .. } => column,
        }
    }
}

impl Display for SchemaDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedAccessor { table, column } => {
                write!(f, "no accessor for column `{table}.{column}`")
            }
            Self::TypeMismatch {
                table,
                column,
                expected,
                found,
            } => write!(
                f,
                "accessor for `{table}.{column}` is {}, expected {}",
                found.as_str(),
                expected.as_str()
            ),
        }
    }
}

/// One row as read from an entity table, in layout order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub values: Vec<(String, Option<ColumnValue>)>,
}

impl EntryRow {
    /// Value of `column`, or `None` when absent or NULL.
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn id(&self) -> Option<EntityId> {
        self.get(ID_COLUMN).and_then(ColumnValue::as_integer)
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_COLUMN).and_then(ColumnValue::as_text)
    }
}

struct SchemaColumn<T> {
    descriptor: ColumnDescriptor,
    accessor: Option<FieldAccessor<T>>,
}

/// Resolved layout of one entity table; also its schema participant.
pub struct EntitySchema<T> {
    table: String,
    columns: Vec<SchemaColumn<T>>,
    diagnostics: Vec<SchemaDiagnostic>,
    create_sql: String,
    select_sql: String,
    upgrade_policy: Box<dyn UpgradePolicy>,
}

impl<T: Entity> EntitySchema<T> {
    /// Binds `declared` columns to `T`'s field table.
    ///
    /// # Errors
    /// - `InvalidIdentifier` for table/column names that are not plain SQL
    ///   identifiers.
    /// - `DuplicateColumn` when a column is declared twice or shadows
    ///   `id`/`name`.
    pub(crate) fn resolve(
        table: &str,
        declared: &[&str],
        upgrade_policy: Box<dyn UpgradePolicy>,
    ) -> RepoResult<Self> {
        validate_identifier(table)?;
        let fields = T::field_table();
        let mut columns = Vec::with_capacity(declared.len() + 2);
        let mut diagnostics = Vec::new();

        for (name, kind) in [(ID_COLUMN, ColumnKind::Integer), (NAME_COLUMN, ColumnKind::Text)] {
            let accessor = fields.find(name, kind);
            if accessor.is_none() {
                diagnostics.push(match fields.resolve(name) {
                    Some(other) => SchemaDiagnostic::TypeMismatch {
                        table: table.to_string(),
                        column: name.to_string(),
                        expected: kind,
                        found: other.kind(),
                    },
                    None => SchemaDiagnostic::UnresolvedAccessor {
                        table: table.to_string(),
                        column: name.to_string(),
                    },
                });
            }
            columns.push(SchemaColumn {
                descriptor: ColumnDescriptor {
                    name: name.to_string(),
                    kind,
                },
                accessor,
            });
        }

        let mut seen: HashSet<&str> = [ID_COLUMN, NAME_COLUMN].into_iter().collect();
        for &name in declared {
            validate_identifier(name)?;
            if !seen.insert(name) {
                return Err(RepoError::DuplicateColumn {
                    table: table.to_string(),
                    column: name.to_string(),
                });
            }

            match fields.resolve(name) {
                Some(accessor) => columns.push(SchemaColumn {
                    descriptor: ColumnDescriptor {
                        name: name.to_string(),
                        kind: accessor.kind(),
                    },
                    accessor: Some(accessor),
                }),
                None => diagnostics.push(SchemaDiagnostic::UnresolvedAccessor {
                    table: table.to_string(),
                    column: name.to_string(),
                }),
            }
        }

        for diagnostic in &diagnostics {
            warn!(
                "event=schema_diagnostic module=repo status=warn code={} table={} column={}",
                diagnostic.code(),
                table,
                diagnostic.column()
            );
        }

        let create_sql = build_create_sql(table, &columns);
        let select_sql = build_select_sql(table, &columns);

        Ok(Self {
            table: table.to_string(),
            columns,
            diagnostics,
            create_sql,
            select_sql,
            upgrade_policy,
        })
    }
}

impl<T> EntitySchema<T> {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnDescriptor> + '_ {
        self.columns.iter().map(|column| &column.descriptor)
    }

    pub fn diagnostics(&self) -> &[SchemaDiagnostic] {
        &self.diagnostics
    }

    pub fn create_sql(&self) -> &str {
        &self.create_sql
    }

    pub fn upgrade_policy_name(&self) -> &'static str {
        self.upgrade_policy.name()
    }

    /// Bind values for every bound column that currently has a value.
    pub(crate) fn write_values(&self, entity: &T, include_id: bool) -> Vec<(&str, Value)> {
        self.columns
            .iter()
            .filter(|column| include_id || column.descriptor.name != ID_COLUMN)
            .filter_map(|column| {
                let value = column.accessor?.read(entity)?;
                Some((column.descriptor.name.as_str(), to_sql_value(value)))
            })
            .collect()
    }

    pub(crate) fn insert_sql(&self, columns: &[&str]) -> String {
        let table = quote_identifier(&self.table);
        if columns.is_empty() {
            return format!("INSERT INTO {table} DEFAULT VALUES;");
        }

        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let names = columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO {table} ({names}) VALUES ({placeholders});")
    }

    pub(crate) fn update_sql(&self, columns: &[&str]) -> String {
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{} = ?{}", quote_identifier(column), index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {assignments} WHERE {} = ?{};",
            quote_identifier(&self.table),
            quote_identifier(ID_COLUMN),
            columns.len() + 1
        )
    }

    pub(crate) fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = ?1;",
            quote_identifier(&self.table),
            quote_identifier(ID_COLUMN)
        )
    }

    pub(crate) fn select_by_id_sql(&self) -> String {
        format!("{} WHERE {} = ?1;", self.select_sql, quote_identifier(ID_COLUMN))
    }

    pub(crate) fn select_all_sql(&self) -> String {
        format!("{} ORDER BY {} ASC;", self.select_sql, quote_identifier(ID_COLUMN))
    }

    /// Reads one row selected with this layout's column list.
    pub(crate) fn decode_row(&self, row: &Row<'_>) -> RepoResult<EntryRow> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (index, column) in self.columns.iter().enumerate() {
            let value = self.decode_value(&column.descriptor, row.get_ref(index)?);
            values.push((column.descriptor.name.clone(), value));
        }
        Ok(EntryRow { values })
    }

    /// Rebuilds an entity by invoking each bound column's writer.
    pub(crate) fn entity_from_row(&self, row: EntryRow) -> T
    where
        T: Default,
    {
        let mut entity = T::default();
        for (column, (_, value)) in self.columns.iter().zip(row.values) {
            if let (Some(accessor), Some(value)) = (column.accessor, value) {
                accessor.write(&mut entity, value);
            }
        }
        entity
    }

    fn decode_value(&self, column: &ColumnDescriptor, value: ValueRef<'_>) -> Option<ColumnValue> {
        match (column.kind, value) {
            (_, ValueRef::Null) => None,
            (ColumnKind::Integer, ValueRef::Integer(value)) => Some(ColumnValue::Integer(value)),
            (ColumnKind::Text, ValueRef::Text(bytes)) => match std::str::from_utf8(bytes) {
                Ok(text) => Some(ColumnValue::Text(text.to_string())),
                Err(_) => {
                    self.report_value_mismatch(column, "invalid_utf8");
                    None
                }
            },
            (_, other) => {
                self.report_value_mismatch(column, &other.data_type().to_string());
                None
            }
        }
    }

    fn report_value_mismatch(&self, column: &ColumnDescriptor, found: &str) {
        warn!(
            "event=schema_diagnostic module=repo status=warn code=type_mismatch table={} column={} expected={} found={}",
            self.table,
            column.name,
            column.kind.as_str(),
            found
        );
    }
}

impl<T: Entity> SchemaParticipant for EntitySchema<T> {
    fn owned_tables(&self) -> Vec<String> {
        vec![self.table.clone()]
    }

    fn on_create(&self, conn: &Connection) -> DbResult<()> {
        conn.execute_batch(&self.create_sql)?;
        info!(
            "event=schema_create module=repo status=ok table={} columns={}",
            self.table,
            self.columns.len()
        );
        Ok(())
    }

    fn on_upgrade(&self, conn: &Connection, old_version: u32, new_version: u32) -> DbResult<()> {
        self.upgrade_policy
            .apply(conn, &self.table, &self.create_sql, old_version, new_version)?;
        info!(
            "event=schema_upgrade module=repo status=ok policy={} table={} old_version={} new_version={}",
            self.upgrade_policy.name(),
            self.table,
            old_version,
            new_version
        );
        Ok(())
    }
}

fn build_create_sql<T>(table: &str, columns: &[SchemaColumn<T>]) -> String {
    let definitions = columns
        .iter()
        .map(|column| {
            let descriptor = &column.descriptor;
            let name = quote_identifier(&descriptor.name);
            match descriptor.name.as_str() {
                ID_COLUMN => format!("{name} INTEGER PRIMARY KEY AUTOINCREMENT"),
                NAME_COLUMN => format!("{name} TEXT NOT NULL"),
                _ => format!("{name} {}", descriptor.kind.sql_type()),
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({definitions});", quote_identifier(table))
}

fn build_select_sql<T>(table: &str, columns: &[SchemaColumn<T>]) -> String {
    let names = columns
        .iter()
        .map(|column| quote_identifier(&column.descriptor.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {names} FROM {}", quote_identifier(table))
}

fn to_sql_value(value: ColumnValue) -> Value {
    match value {
        ColumnValue::Text(text) => Value::Text(text),
        ColumnValue::Integer(number) => Value::Integer(number),
    }
}

fn validate_identifier(value: &str) -> RepoResult<()> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(RepoError::InvalidIdentifier(value.to_string()))
    }
}
