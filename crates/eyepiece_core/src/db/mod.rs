//! SQLite connection lifecycle and schema participant dispatch.
//!
//! # Responsibility
//! - Open and configure the single SQLite connection owned by a manager.
//! - Replay registered participants' create/upgrade logic in registration order.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - A version of `0` means the database has never been initialized.
//! - Callers must not read/write entity tables before participants succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod config;
mod manager;
pub mod participant;

pub use config::{DbConfig, DbLocation, DEFAULT_DB_FILE_NAME, DEFAULT_SCHEMA_VERSION};
pub use manager::DbManager;
pub use participant::{quote_identifier, DestructiveUpgrade, SchemaParticipant, UpgradePolicy};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    InvalidTargetVersion(u32),
    NotOpen,
    HandleInUse,
    DuplicateTable(String),
    Participant {
        table: String,
        source: Box<DbError>,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidTargetVersion(version) => {
                write!(f, "target schema version must be >= 1, got {version}")
            }
            Self::NotOpen => write!(f, "database handle is not open"),
            Self::HandleInUse => write!(f, "database handle is still borrowed"),
            Self::DuplicateTable(table) => {
                write!(f, "table `{table}` is already owned by another participant")
            }
            Self::Participant { table, source } => {
                write!(f, "schema participant for `{table}` failed: {source}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Participant { source, .. } => Some(source.as_ref()),
            Self::UnsupportedSchemaVersion { .. }
            | Self::InvalidTargetVersion(_)
            | Self::NotOpen
            | Self::HandleInUse
            | Self::DuplicateTable(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
