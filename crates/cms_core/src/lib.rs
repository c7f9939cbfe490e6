//! Persistence and store-validation core for a content-management backend.
//! This crate is the single source of truth for record, tree and trash
//! invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod validation;

pub use config::{ConfigError, CoreConfig, DatabaseConfig, LoggingConfig, PaginationConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::kind::{EntityKind, KindDescriptor};
pub use model::record::{fields, FieldMap, FieldValue, Record, RecordId, TreeNode, TreePosition};
pub use repo::{
    BaseRepository, FieldViolation, ListQuery, ParentScope, RecordFilter, RepoError, RepoResult,
    SqliteRepository, TrashedMode,
};
pub use service::{
    BaseService, CreateInput, PageMeta, PaginateOptions, Paginated, ParentChange, ServiceOptions,
    UpdateInput,
};
pub use validation::{
    validate_payload, ValidationCondition, ValidationEngine, ValidationRegistry, WriteMode,
};

/// Returns the core crate version, printed by `cms_cli` at startup.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
