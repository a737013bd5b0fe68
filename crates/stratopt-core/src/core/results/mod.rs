//! Solver result sets and the readers that load them.
//!
//! A [`set::ResultSet`] is addressed by load case, then by table ([`set::ResponseKind`]),
//! then by entity id, and yields three scalar components per entity. Readers implement
//! [`reader::ResultReader`], which also decides where the result artifact of a given model
//! file lives.

pub mod reader;
pub mod set;
