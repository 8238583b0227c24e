//! Entity store engine and per-entity table declarations.
//!
//! # Responsibility
//! - Map entity field tables to SQLite rows generically.
//! - Declare the table and columns each optics entity persists to.
//!
//! # Invariants
//! - Stores register their table with the manager on construction.
//! - Repository APIs distinguish "no row" (`None`/`false`) from transport
//!   and constraint errors.

pub mod entity_store;
pub mod optics;
pub mod schema;
