use eyepiece_core::{
    telescope_store, DbConfig, DbError, DbManager, DbResult, EntityRepository, SchemaParticipant,
    Telescope,
};
use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

type EventLog = Rc<RefCell<Vec<String>>>;

struct RecordingParticipant {
    table: &'static str,
    events: EventLog,
}

impl RecordingParticipant {
    fn register(manager: &DbManager, table: &'static str, events: &EventLog) {
        manager
            .add_participant(Rc::new(Self {
                table,
                events: Rc::clone(events),
            }))
            .unwrap();
    }
}

impl SchemaParticipant for RecordingParticipant {
    fn owned_tables(&self) -> Vec<String> {
        vec![self.table.to_string()]
    }

    fn on_create(&self, conn: &Connection) -> DbResult<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE {} (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);",
            self.table
        ))?;
        self.events
            .borrow_mut()
            .push(format!("create:{}", self.table));
        Ok(())
    }

    fn on_upgrade(&self, _conn: &Connection, old_version: u32, new_version: u32) -> DbResult<()> {
        assert_ne!(old_version, new_version, "version numbers must differ");
        self.events
            .borrow_mut()
            .push(format!("upgrade:{}:{old_version}->{new_version}", self.table));
        Ok(())
    }
}

struct BrokenParticipant;

impl SchemaParticipant for BrokenParticipant {
    fn owned_tables(&self) -> Vec<String> {
        vec!["broken".to_string()]
    }

    fn on_create(&self, conn: &Connection) -> DbResult<()> {
        conn.execute_batch("CREATE TABLE broken (;")?;
        Ok(())
    }

    fn on_upgrade(&self, _conn: &Connection, _old: u32, _new: u32) -> DbResult<()> {
        Ok(())
    }
}

fn new_events() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

fn file_manager(path: &Path, version: u32) -> DbManager {
    DbManager::new(DbConfig::file(path).with_version(version)).unwrap()
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}

#[test]
fn fresh_open_creates_participants_in_registration_order() {
    let dir = tempfile::tempdir().unwrap();
    let events = new_events();
    let manager = file_manager(&dir.path().join("optics.db"), 1);
    RecordingParticipant::register(&manager, "telescopes", &events);
    RecordingParticipant::register(&manager, "eyepieces", &events);

    let conn = manager.open().unwrap();

    assert_eq!(
        *events.borrow(),
        vec!["create:telescopes".to_string(), "create:eyepieces".to_string()]
    );
    assert!(table_exists(&conn, "telescopes"));
    assert!(table_exists(&conn, "eyepieces"));
    assert_eq!(schema_version(&conn), 1);
}

#[test]
fn reopening_at_same_version_dispatches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optics.db");

    let first = file_manager(&path, 1);
    RecordingParticipant::register(&first, "telescopes", &new_events());
    first.open().unwrap();
    first.close().unwrap();

    let events = new_events();
    let second = file_manager(&path, 1);
    RecordingParticipant::register(&second, "telescopes", &events);
    let conn = second.open().unwrap();

    assert!(events.borrow().is_empty());
    assert!(table_exists(&conn, "telescopes"));
}

#[test]
fn version_bump_upgrades_every_participant_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optics.db");

    let v1 = file_manager(&path, 1);
    RecordingParticipant::register(&v1, "telescopes", &new_events());
    RecordingParticipant::register(&v1, "eyepieces", &new_events());
    v1.open().unwrap();
    v1.close().unwrap();

    let events = new_events();
    let v2 = file_manager(&path, 2);
    RecordingParticipant::register(&v2, "telescopes", &events);
    RecordingParticipant::register(&v2, "eyepieces", &events);

    drop(v2.open().unwrap());
    drop(v2.open().unwrap());
    assert_eq!(
        *events.borrow(),
        vec![
            "upgrade:telescopes:1->2".to_string(),
            "upgrade:eyepieces:1->2".to_string(),
        ]
    );
    assert_eq!(schema_version(&v2.get_handle().unwrap()), 2);

    v2.close().unwrap();
    v2.open().unwrap();
    assert_eq!(events.borrow().len(), 2);
}

#[test]
fn opening_database_with_newer_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let manager = file_manager(&path, 1);
    let err = manager.open().map(|_| ()).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!manager.is_open());
}

#[test]
fn failing_participant_aborts_open_and_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.db");
    let events = new_events();

    let manager = file_manager(&path, 1);
    RecordingParticipant::register(&manager, "telescopes", &events);
    manager.add_participant(Rc::new(BrokenParticipant)).unwrap();

    let err = manager.open().map(|_| ()).unwrap_err();
    assert!(matches!(err, DbError::Participant { ref table, .. } if table == "broken"));
    assert!(!manager.is_open());
    assert!(manager.get_handle().is_none());

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn), 0);
    assert!(!table_exists(&conn, "telescopes"));
}

#[test]
fn open_close_follow_state_machine() {
    let manager = DbManager::new(DbConfig::in_memory()).unwrap();
    assert!(manager.get_handle().is_none());

    manager.close().unwrap();
    assert!(manager.get_handle().is_none());

    drop(manager.open().unwrap());
    drop(manager.open().unwrap());
    assert!(manager.get_handle().is_some());

    manager.close().unwrap();
    assert!(manager.get_handle().is_none());
    manager.close().unwrap();
    assert!(!manager.is_open());
}

#[test]
fn close_while_handle_is_held_fails_and_keeps_manager_open() {
    let manager = DbManager::new(DbConfig::in_memory()).unwrap();
    let handle = manager.open().unwrap();

    let err = manager.close().unwrap_err();
    assert!(matches!(err, DbError::HandleInUse));
    assert!(manager.is_open());
    assert_eq!(schema_version(&handle), 1);

    drop(handle);
    manager.close().unwrap();
    assert!(manager.get_handle().is_none());
}

#[test]
fn duplicate_table_owner_is_rejected() {
    let manager = DbManager::new(DbConfig::in_memory()).unwrap();
    RecordingParticipant::register(&manager, "telescopes", &new_events());

    let err = manager
        .add_participant(Rc::new(RecordingParticipant {
            table: "telescopes",
            events: new_events(),
        }))
        .unwrap_err();
    assert!(matches!(err, DbError::DuplicateTable(ref table) if table == "telescopes"));
    assert_eq!(manager.participant_count(), 1);
}

#[test]
fn participant_added_after_open_is_not_created_retroactively() {
    let events = new_events();
    let manager = DbManager::new(DbConfig::in_memory()).unwrap();
    RecordingParticipant::register(&manager, "telescopes", &events);
    drop(manager.open().unwrap());

    RecordingParticipant::register(&manager, "eyepieces", &events);

    assert_eq!(manager.participant_count(), 2);
    assert_eq!(*events.borrow(), vec!["create:telescopes".to_string()]);
    assert!(!table_exists(&manager.get_handle().unwrap(), "eyepieces"));
}

#[test]
fn zero_target_version_is_rejected() {
    let err = DbManager::new(DbConfig::in_memory().with_version(0))
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidTargetVersion(0)));
}

#[test]
fn entity_store_upgrade_drops_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("optics.db");

    {
        let v1 = Rc::new(file_manager(&path, 1));
        let telescopes = telescope_store(&v1).unwrap();
        telescopes
            .insert(&Telescope::new("8in Dob", 1200, 203))
            .unwrap();
        v1.close().unwrap();
    }

    let v2 = Rc::new(file_manager(&path, 2));
    let telescopes = telescope_store(&v2).unwrap();
    assert_eq!(telescopes.upgrade_policy_name(), "destructive");
    assert!(telescopes.get_all_entries().unwrap().is_empty());
    assert_eq!(schema_version(&v2.get_handle().unwrap()), 2);
}
