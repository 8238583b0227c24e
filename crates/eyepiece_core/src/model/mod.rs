//! Entity types and the field tables that describe them to stores.
//!
//! # Responsibility
//! - Define plain data holders for optics records.
//! - Declare each type's persisted fields as typed accessors.
//!
//! # Invariants
//! - Entity types carry no persistence logic.
//! - `id` is `None` until a store assigns one.

pub mod entity;
pub mod eyepiece;
pub mod telescope;
