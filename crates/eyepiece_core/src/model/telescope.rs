//! Telescope record.

use super::entity::{Entity, EntityId, FieldTable};
use serde::{Deserialize, Serialize};

/// Telescope optical tube as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telescope {
    /// Store-assigned identity; `None` before first insert.
    pub id: Option<EntityId>,
    pub name: String,
    /// Millimeters.
    pub focal_length: i64,
    /// Objective diameter in millimeters.
    pub aperture: i64,
}

impl Telescope {
    pub fn new(name: impl Into<String>, focal_length: i64, aperture: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            focal_length,
            aperture,
        }
    }
}

impl Entity for Telescope {
    fn field_table() -> FieldTable<Self> {
        FieldTable::<Self>::new()
            .integer("id", |scope| scope.id, |scope, value| scope.id = Some(value))
            .text(
                "name",
                |scope| Some(scope.name.clone()),
                |scope, value| scope.name = value,
            )
            .integer(
                "focal_length",
                |scope| Some(scope.focal_length),
                |scope, value| scope.focal_length = value,
            )
            .integer(
                "aperture",
                |scope| Some(scope.aperture),
                |scope, value| scope.aperture = value,
            )
    }
}
