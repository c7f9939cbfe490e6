//! Entity model shared by repositories, validation and services.
//!
//! # Responsibility
//! - Define canonical data structures used by the persistence core.
//! - Describe entity kinds (schema + capabilities) as static data.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Soft delete is a capability flag on the kind, not a separate type.

pub mod kind;
pub mod record;
