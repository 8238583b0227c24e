//! Persistence core for the eyepiece calculator.
//! Maps optics records to SQLite tables and owns the shared schema lifecycle.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use db::{
    DbConfig, DbError, DbLocation, DbManager, DbResult, DestructiveUpgrade, SchemaParticipant,
    UpgradePolicy,
};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::entity::{ColumnKind, ColumnValue, Entity, EntityId, FieldAccessor, FieldTable};
pub use model::eyepiece::Eyepiece;
pub use model::telescope::Telescope;
pub use repo::entity_store::{EntityRepository, EntityStore, RepoError, RepoResult};
pub use repo::optics::{eyepiece_store, telescope_store, EyepieceStore, TelescopeStore};
pub use repo::schema::{ColumnDescriptor, EntryRow, SchemaDiagnostic};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
