//! Eyepiece record.

use super::entity::{Entity, EntityId, FieldTable};
use serde::{Deserialize, Serialize};

/// Eyepiece as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eyepiece {
    /// Store-assigned identity; `None` before first insert.
    pub id: Option<EntityId>,
    pub name: String,
    /// Millimeters.
    pub focal_length: i64,
    /// Apparent field of view in degrees, fixed by the optical design.
    #[serde(rename = "apparentFOV")]
    pub apparent_fov: i64,
}

impl Eyepiece {
    pub fn new(name: impl Into<String>, focal_length: i64, apparent_fov: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            focal_length,
            apparent_fov,
        }
    }
}

impl Entity for Eyepiece {
    fn field_table() -> FieldTable<Self> {
        FieldTable::<Self>::new()
            .integer("id", |ep| ep.id, |ep, value| ep.id = Some(value))
            .text("name", |ep| Some(ep.name.clone()), |ep, value| ep.name = value)
            .integer(
                "focal_length",
                |ep| Some(ep.focal_length),
                |ep, value| ep.focal_length = value,
            )
            .integer(
                "apparent_fov",
                |ep| Some(ep.apparent_fov),
                |ep, value| ep.apparent_fov = value,
            )
    }
}
