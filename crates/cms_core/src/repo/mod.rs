//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the data access contract shared by every entity kind.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Record::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `ConflictViolation`)
//!   in addition to store transport errors.

pub mod base_repo;
pub mod error;
pub(crate) mod forest;
pub mod query;

pub use base_repo::{BaseRepository, SqliteRepository};
pub use error::{FieldViolation, RepoError, RepoResult};
pub use query::{BaseQuery, ListQuery, ParentScope, RecordFilter, TrashedMode};
