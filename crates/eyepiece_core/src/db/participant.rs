//! Schema participant contract and upgrade policies.
//!
//! # Responsibility
//! - Define the hooks a table owner exposes to `DbManager`.
//! - Keep the upgrade strategy a named, swappable policy.
//!
//! # Invariants
//! - A participant only creates, drops or alters tables it owns.
//! - `on_upgrade` is never dispatched with `old_version == new_version`.

use super::DbResult;
use log::warn;
use rusqlite::Connection;

/// Anything that creates or evolves its own tables when the database is
/// created or its schema version increases.
pub trait SchemaParticipant {
    /// Tables this participant creates and upgrades.
    ///
    /// Used by the registry to reject two owners for the same table.
    fn owned_tables(&self) -> Vec<String>;

    /// Called once when no database existed before the current open.
    fn on_create(&self, conn: &Connection) -> DbResult<()>;

    /// Called once per open when the stored version is below the target.
    fn on_upgrade(&self, conn: &Connection, old_version: u32, new_version: u32) -> DbResult<()>;
}

/// Strategy used by a table owner to move its table between versions.
pub trait UpgradePolicy {
    /// Stable policy id used in log events.
    fn name(&self) -> &'static str;

    /// Brings `table` to the shape described by `create_sql`.
    fn apply(
        &self,
        conn: &Connection,
        table: &str,
        create_sql: &str,
        old_version: u32,
        new_version: u32,
    ) -> DbResult<()>;
}

/// Drops the owned table and recreates it; existing rows are discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestructiveUpgrade;

impl UpgradePolicy for DestructiveUpgrade {
    fn name(&self) -> &'static str {
        "destructive"
    }

    fn apply(
        &self,
        conn: &Connection,
        table: &str,
        create_sql: &str,
        old_version: u32,
        new_version: u32,
    ) -> DbResult<()> {
        warn!(
            "event=schema_upgrade module=db status=start policy=destructive table={} old_version={} new_version={} data_loss=true",
            table, old_version, new_version
        );
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_identifier(table)))?;
        conn.execute_batch(create_sql)?;
        Ok(())
    }
}

/// Wraps `name` in double quotes so keywords such as `order` stay usable as
/// table or column names. Embedded quotes are doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
