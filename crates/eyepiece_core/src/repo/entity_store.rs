//! Generic entity store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over one entity table without per-type SQL.
//! - Register the table with its `DbManager` as a schema participant.
//!
//! # Invariants
//! - A store never retains entity instances between calls.
//! - Missing rows are `None`/`false`, not errors.
//! - Constraint failures surface as `RepoError::ConstraintViolation`.
//! - Statements and row cursors are released before each call returns.

use super::schema::{ColumnDescriptor, EntitySchema, EntryRow, SchemaDiagnostic};
use crate::db::{
    DbError, DbManager, DbResult, DestructiveUpgrade, SchemaParticipant, UpgradePolicy,
};
use crate::model::entity::{Entity, EntityId};
use log::debug;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for entity store construction and CRUD operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    ConstraintViolation { table: String, message: String },
    NoWritableColumns { table: String },
    InvalidIdentifier(String),
    DuplicateColumn { table: String, column: String },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ConstraintViolation { table, message } => {
                write!(f, "constraint violation on `{table}`: {message}")
            }
            Self::NoWritableColumns { table } => {
                write!(f, "entity has no writable column values for `{table}`")
            }
            Self::InvalidIdentifier(value) => write!(f, "invalid SQL identifier `{value}`"),
            Self::DuplicateColumn { table, column } => {
                write!(f, "column `{column}` declared more than once for `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::ConstraintViolation { .. }
            | Self::NoWritableColumns { .. }
            | Self::InvalidIdentifier(_)
            | Self::DuplicateColumn { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// CRUD interface over one entity type.
pub trait EntityRepository<T> {
    /// Inserts `entity` and returns the assigned identity.
    fn insert(&self, entity: &T) -> RepoResult<EntityId>;
    /// Overwrites row `id`; `false` when no such row exists.
    fn update(&self, id: EntityId, entity: &T) -> RepoResult<bool>;
    /// Deletes row `id`; `false` when no such row exists.
    fn remove(&self, id: EntityId) -> RepoResult<bool>;
    fn get_entry(&self, id: EntityId) -> RepoResult<Option<T>>;
    /// Every row as raw column values, in storage order.
    fn get_all_entries(&self) -> RepoResult<Vec<EntryRow>>;
    /// Every row rebuilt as an entity, in storage order.
    fn get_all_entries_as_list(&self) -> RepoResult<Vec<T>>;
}

/// SQLite-backed store for entity type `T`.
pub struct EntityStore<T: Entity> {
    manager: Rc<DbManager>,
    schema: Rc<EntitySchema<T>>,
}

impl<T: Entity> EntityStore<T> {
    /// Resolves the table layout and registers it with `manager`, using
    /// `DestructiveUpgrade` for version bumps.
    ///
    /// `columns` lists persisted fields beyond `id` and `name`, in table
    /// order.
    pub fn new(manager: &Rc<DbManager>, table: &str, columns: &[&str]) -> RepoResult<Self> {
        Self::with_upgrade_policy(manager, table, columns, DestructiveUpgrade)
    }

    pub fn with_upgrade_policy(
        manager: &Rc<DbManager>,
        table: &str,
        columns: &[&str],
        upgrade_policy: impl UpgradePolicy + 'static,
    ) -> RepoResult<Self> {
        let schema = Rc::new(EntitySchema::resolve(
            table,
            columns,
            Box::new(upgrade_policy),
        )?);
        manager.add_participant(schema.clone())?;

        Ok(Self {
            manager: Rc::clone(manager),
            schema,
        })
    }

    pub fn table_name(&self) -> &str {
        self.schema.table()
    }

    /// Physical columns in table order.
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.schema.columns().cloned().collect()
    }

    /// Declared columns the entity type could not bind.
    pub fn diagnostics(&self) -> &[SchemaDiagnostic] {
        self.schema.diagnostics()
    }

    pub fn create_table_sql(&self) -> &str {
        self.schema.create_sql()
    }

    pub fn upgrade_policy_name(&self) -> &'static str {
        self.schema.upgrade_policy_name()
    }

    pub fn manager(&self) -> &Rc<DbManager> {
        &self.manager
    }

    fn query_rows(
        &self,
        conn: &Connection,
        sql: &str,
        id: Option<EntityId>,
    ) -> RepoResult<Vec<EntryRow>> {
        let mut stmt = conn.prepare(sql)?;
        let mut rows = match id {
            Some(id) => stmt.query([id])?,
            None => stmt.query([])?,
        };

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(self.schema.decode_row(row)?);
        }
        Ok(entries)
    }

    fn write_error(&self, err: rusqlite::Error) -> RepoError {
        match err {
            rusqlite::Error::SqliteFailure(ref failure, ref message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                RepoError::ConstraintViolation {
                    table: self.schema.table().to_string(),
                    message: message.clone().unwrap_or_else(|| failure.to_string()),
                }
            }
            other => other.into(),
        }
    }
}

impl<T: Entity> EntityRepository<T> for EntityStore<T> {
    fn insert(&self, entity: &T) -> RepoResult<EntityId> {
        let (columns, values): (Vec<&str>, Vec<_>) =
            self.schema.write_values(entity, true).into_iter().unzip();
        let sql = self.schema.insert_sql(&columns);

        let conn = self.manager.open()?;
        conn.execute(&sql, params_from_iter(values))
            .map_err(|err| self.write_error(err))?;
        let id = conn.last_insert_rowid();

        debug!(
            "event=entity_write module=repo status=ok op=insert table={} columns={}",
            self.schema.table(),
            columns.len()
        );
        Ok(id)
    }

    fn update(&self, id: EntityId, entity: &T) -> RepoResult<bool> {
        let (columns, mut values): (Vec<&str>, Vec<_>) =
            self.schema.write_values(entity, false).into_iter().unzip();
        if columns.is_empty() {
            return Err(RepoError::NoWritableColumns {
                table: self.schema.table().to_string(),
            });
        }
        let sql = self.schema.update_sql(&columns);
        values.push(rusqlite::types::Value::Integer(id));

        let conn = self.manager.open()?;
        let changed = conn
            .execute(&sql, params_from_iter(values))
            .map_err(|err| self.write_error(err))?;

        debug!(
            "event=entity_write module=repo status=ok op=update table={} changed={}",
            self.schema.table(),
            changed
        );
        Ok(changed > 0)
    }

    fn remove(&self, id: EntityId) -> RepoResult<bool> {
        let conn = self.manager.open()?;
        let changed = conn
            .execute(&self.schema.delete_sql(), [id])
            .map_err(|err| self.write_error(err))?;

        debug!(
            "event=entity_write module=repo status=ok op=remove table={} changed={}",
            self.schema.table(),
            changed
        );
        Ok(changed > 0)
    }

    fn get_entry(&self, id: EntityId) -> RepoResult<Option<T>> {
        let conn = self.manager.open()?;
        let entry = self
            .query_rows(&conn, &self.schema.select_by_id_sql(), Some(id))?
            .into_iter()
            .next();
        Ok(entry.map(|row| self.schema.entity_from_row(row)))
    }

    fn get_all_entries(&self) -> RepoResult<Vec<EntryRow>> {
        let conn = self.manager.open()?;
        self.query_rows(&conn, &self.schema.select_all_sql(), None)
    }

    fn get_all_entries_as_list(&self) -> RepoResult<Vec<T>> {
        Ok(self
            .get_all_entries()?
            .into_iter()
            .map(|row| self.schema.entity_from_row(row))
            .collect())
    }
}

impl<T: Entity> SchemaParticipant for EntityStore<T> {
    fn owned_tables(&self) -> Vec<String> {
        self.schema.owned_tables()
    }

    fn on_create(&self, conn: &Connection) -> DbResult<()> {
        self.schema.on_create(conn)
    }

    fn on_upgrade(&self, conn: &Connection, old_version: u32, new_version: u32) -> DbResult<()> {
        self.schema.on_upgrade(conn, old_version, new_version)
    }
}
