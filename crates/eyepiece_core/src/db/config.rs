//! Connection settings for a database manager.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name used by the application when no explicit path is configured.
pub const DEFAULT_DB_FILE_NAME: &str = "epDatabase.db";
/// Target schema version shipped with this build.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the physical database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Settings consumed by `DbManager::open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub location: DbLocation,
    /// Schema version the registered participants describe.
    pub version: u32,
    pub busy_timeout: Duration,
}

impl DbConfig {
    /// Targets a database file, created on first open when absent.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::with_location(DbLocation::File(path.as_ref().to_path_buf()))
    }

    /// Targets `DEFAULT_DB_FILE_NAME` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::file(dir.as_ref().join(DEFAULT_DB_FILE_NAME))
    }

    /// Targets a private in-memory database.
    ///
    /// Contents are discarded on `close`; the next `open` starts fresh.
    pub fn in_memory() -> Self {
        Self::with_location(DbLocation::Memory)
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    fn with_location(location: DbLocation) -> Self {
        Self {
            location,
            version: DEFAULT_SCHEMA_VERSION,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}
