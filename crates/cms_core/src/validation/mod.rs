//! Store validation engine.
//!
//! # Responsibility
//! - Check inbound payloads against live store state before a write.
//! - Keep rule registration declarative: `(kind, field) -> rules`.
//!
//! # Invariants
//! - Checks report failures as outcomes; they never abort the caller.
//! - Validation and the following write share no lock. The store's unique
//!   indexes are the backstop and surface as `ConflictViolation`.

pub mod condition;
pub mod engine;
pub mod registry;

pub use condition::{IgnoreSpec, TreeScope, ValidationCondition};
pub use engine::{PasswordLevel, RuleOutcome, ValidationEngine};
pub use registry::{
    validate_payload, Applies, FieldRule, RegisteredRule, ValidationRegistry, WriteMode,
};
