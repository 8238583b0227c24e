//! Table declarations for the optics entity types.

use super::entity_store::{EntityStore, RepoResult};
use crate::db::DbManager;
use crate::model::eyepiece::Eyepiece;
use crate::model::telescope::Telescope;
use std::rc::Rc;

pub const TELESCOPE_TABLE: &str = "telescopes";
pub const TELESCOPE_COLUMNS: &[&str] = &["aperture", "focal_length"];

pub const EYEPIECE_TABLE: &str = "eyepieces";
pub const EYEPIECE_COLUMNS: &[&str] = &["apparent_fov", "focal_length"];

pub type TelescopeStore = EntityStore<Telescope>;
pub type EyepieceStore = EntityStore<Eyepiece>;

/// Builds the `telescopes` store and registers it with `manager`.
pub fn telescope_store(manager: &Rc<DbManager>) -> RepoResult<TelescopeStore> {
    EntityStore::new(manager, TELESCOPE_TABLE, TELESCOPE_COLUMNS)
}

/// Builds the `eyepieces` store and registers it with `manager`.
pub fn eyepiece_store(manager: &Rc<DbManager>) -> RepoResult<EyepieceStore> {
    EntityStore::new(manager, EYEPIECE_TABLE, EYEPIECE_COLUMNS)
}

#[cfg(test)]
mod tests {
    use super::{eyepiece_store, telescope_store};
    use crate::db::{DbConfig, DbManager};
    use std::rc::Rc;

    #[test]
    fn optics_stores_bind_every_declared_column() {
        let manager = Rc::new(DbManager::new(DbConfig::in_memory()).unwrap());
        let telescopes = telescope_store(&manager).unwrap();
        let eyepieces = eyepiece_store(&manager).unwrap();

        assert!(telescopes.diagnostics().is_empty());
        assert!(eyepieces.diagnostics().is_empty());
        assert_eq!(
            telescopes.create_table_sql(),
            r#"CREATE TABLE "telescopes" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "name" TEXT NOT NULL, "aperture" INTEGER, "focal_length" INTEGER);"#
        );
        assert_eq!(manager.participant_count(), 2);
    }
}
