//! Database handle manager.
//!
//! # Responsibility
//! - Own the one SQLite connection for a configured database.
//! - Keep the ordered participant registry for that database.
//! - Dispatch create/upgrade events atomically while opening.
//!
//! # Invariants
//! - Registry is append-only and dispatch follows registration order.
//! - No two participants own the same table.
//! - `user_version` is advanced only after every participant succeeded.
//! - Not thread-safe: one manager is used from one thread at a time.

use super::config::{DbConfig, DbLocation};
use super::participant::SchemaParticipant;
use super::{DbError, DbResult};
use log::{error, info, warn};
use rusqlite::Connection;
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::time::Instant;

/// Owns the connection lifecycle and schema participant registry.
pub struct DbManager {
    config: DbConfig,
    participants: RefCell<Vec<Rc<dyn SchemaParticipant>>>,
    conn: RefCell<Option<Connection>>,
}

impl DbManager {
    /// Creates a closed manager for `config`.
    ///
    /// # Errors
    /// - `InvalidTargetVersion` when `config.version` is `0`, which is
    ///   reserved for "never initialized".
    pub fn new(config: DbConfig) -> DbResult<Self> {
        if config.version == 0 {
            return Err(DbError::InvalidTargetVersion(config.version));
        }

        Ok(Self {
            config,
            participants: RefCell::new(Vec::new()),
            conn: RefCell::new(None),
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Appends a participant to the registry.
    ///
    /// Participants added while the handle is open are not replayed against
    /// the current database; they only take part in later create/upgrade
    /// cycles.
    ///
    /// # Errors
    /// - `DuplicateTable` when any owned table is already claimed.
    pub fn add_participant(&self, participant: Rc<dyn SchemaParticipant>) -> DbResult<()> {
        let tables = participant.owned_tables();
        let mut participants = self.participants.borrow_mut();

        for (index, table) in tables.iter().enumerate() {
            let claimed_by_self = tables[..index].contains(table);
            let claimed_by_other = participants
                .iter()
                .any(|existing| existing.owned_tables().contains(table));
            if claimed_by_self || claimed_by_other {
                return Err(DbError::DuplicateTable(table.clone()));
            }
        }

        participants.push(participant);
        let position = participants.len() - 1;
        drop(participants);

        info!(
            "event=participant_register module=db status=ok position={} tables={}",
            position,
            tables.join(",")
        );
        if self.is_open() {
            warn!(
                "event=participant_register module=db status=deferred tables={} reason=handle_already_open",
                tables.join(",")
            );
        }

        Ok(())
    }

    /// Number of registered participants.
    pub fn participant_count(&self) -> usize {
        self.participants.borrow().len()
    }

    /// Opens the database and runs pending schema events.
    ///
    /// Returns the already-open handle without side effects when called
    /// repeatedly.
    ///
    /// # Errors
    /// - `Sqlite` when the file cannot be opened or configured.
    /// - `UnsupportedSchemaVersion` when the stored version is newer than the
    ///   configured one.
    /// - `Participant` when a create/upgrade hook fails; the manager stays
    ///   closed and the stored version is unchanged.
    pub fn open(&self) -> DbResult<Ref<'_, Connection>> {
        if !self.is_open() {
            let conn = self.connect()?;
            self.conn.replace(Some(conn));
        }

        Ref::filter_map(self.conn.borrow(), Option::as_ref).map_err(|_| DbError::NotOpen)
    }

    /// Releases the connection. No-op when already closed.
    ///
    /// # Errors
    /// - `HandleInUse` while a handle from `open`/`get_handle` is alive; the
    ///   manager stays open.
    /// - `Sqlite` when SQLite refuses to close; the manager stays open.
    pub fn close(&self) -> DbResult<()> {
        let taken = match self.conn.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                warn!(
                    "event=db_close module=db status=error mode={} error_code=handle_in_use",
                    self.config.location.mode()
                );
                return Err(DbError::HandleInUse);
            }
        };
        let Some(conn) = taken else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                info!(
                    "event=db_close module=db status=ok mode={}",
                    self.config.location.mode()
                );
                Ok(())
            }
            Err((conn, err)) => {
                error!(
                    "event=db_close module=db status=error mode={} error={}",
                    self.config.location.mode(),
                    err
                );
                self.conn.replace(Some(conn));
                Err(err.into())
            }
        }
    }

    /// Returns the open handle, or `None` while closed.
    pub fn get_handle(&self) -> Option<Ref<'_, Connection>> {
        Ref::filter_map(self.conn.borrow(), Option::as_ref).ok()
    }

    pub fn is_open(&self) -> bool {
        self.conn.borrow().is_some()
    }

    fn connect(&self) -> DbResult<Connection> {
        let started_at = Instant::now();
        let mode = self.config.location.mode();
        info!("event=db_open module=db status=start mode={mode}");

        let opened = match &self.config.location {
            DbLocation::File(path) => Connection::open(path),
            DbLocation::Memory => Connection::open_in_memory(),
        };
        let mut conn = match opened {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
        };

        match self.bootstrap_connection(&mut conn) {
            Ok(()) => {
                info!(
                    "event=db_open module=db status=ok mode={} duration_ms={}",
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(conn)
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn bootstrap_connection(&self, conn: &mut Connection) -> DbResult<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(self.config.busy_timeout)?;
        self.dispatch_schema_events(conn)
    }

    fn dispatch_schema_events(&self, conn: &mut Connection) -> DbResult<()> {
        let current_version = current_user_version(conn)?;
        let target_version = self.config.version;

        if current_version > target_version {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version: current_version,
                latest_supported: target_version,
            });
        }

        if current_version == target_version {
            return Ok(());
        }

        // Hooks may register participants; iterate a snapshot.
        let participants = self.participants.borrow().clone();
        let tx = conn.transaction()?;

        for (position, participant) in participants.iter().enumerate() {
            let tables = participant.owned_tables().join(",");
            let (event, result) = if current_version == 0 {
                ("schema_create", participant.on_create(&tx))
            } else {
                (
                    "schema_upgrade",
                    participant.on_upgrade(&tx, current_version, target_version),
                )
            };

            if let Err(err) = result {
                error!(
                    "event={} module=db status=error position={} tables={} error={}",
                    event, position, tables, err
                );
                return Err(DbError::Participant {
                    table: tables,
                    source: Box::new(err),
                });
            }

            info!(
                "event={} module=db status=ok position={} tables={} old_version={} new_version={}",
                event, position, tables, current_version, target_version
            );
        }

        tx.execute_batch(&format!("PRAGMA user_version = {target_version};"))?;
        tx.commit()?;

        Ok(())
    }
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
