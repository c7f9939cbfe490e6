//! Error kinds reported by repositories and services.
//!
//! # Responsibility
//! - Translate store-layer failures into domain error kinds.
//! - Give validation failures and write-time constraint conflicts the
//!   same field-level shape.
//!
//! # Invariants
//! - No `rusqlite::Error` escapes a repository untranslated.
//! - `ConflictViolation` and `ValidationFailed` both carry a `FieldViolation`.

use crate::db::DbError;
use crate::model::kind::EntityKind;
use crate::model::record::{RecordId, RecordValidationError};
use rusqlite::ffi;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Field-level failure detail, shared by pre-write checks and write-time
/// constraint violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub kind: EntityKind,
    pub field: String,
    /// Offending value rendered as text, when known.
    pub value: Option<String>,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(
        kind: EntityKind,
        field: impl Into<String>,
        value: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            value,
            reason: reason.into(),
        }
    }
}

impl Display for FieldViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.kind, self.field, self.reason)?;
        if let Some(value) = &self.value {
            write!(f, " (value `{value}`)")?;
        }
        Ok(())
    }
}

/// Error kinds of the persistence core.
#[derive(Debug)]
pub enum RepoError {
    /// Identity or referenced relation is absent or hidden by trash policy.
    NotFound { kind: EntityKind, target: String },
    /// A pre-write check rejected a field value.
    ValidationFailed(FieldViolation),
    /// A store constraint rejected a write that passed the pre-write checks.
    ConflictViolation(FieldViolation),
    /// Operation is not supported for the kind or would break a tree invariant.
    InvalidOperation { kind: EntityKind, reason: String },
    /// The store could not serve the request.
    StoreUnavailable(DbError),
    /// Persisted data cannot be converted into a valid record.
    InvalidData(String),
}

impl RepoError {
    pub fn not_found(kind: EntityKind, id: RecordId) -> Self {
        Self::NotFound {
            kind,
            target: id.to_string(),
        }
    }

    pub fn invalid_operation(kind: EntityKind, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            kind,
            reason: reason.into(),
        }
    }

    /// Field detail for validation-shaped errors.
    pub fn field_violation(&self) -> Option<&FieldViolation> {
        match self {
            Self::ValidationFailed(violation) | Self::ConflictViolation(violation) => {
                Some(violation)
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn from_record_validation(kind: EntityKind, err: RecordValidationError) -> Self {
        match err {
            RecordValidationError::TrashUnsupported(_) => {
                Self::invalid_operation(kind, err.to_string())
            }
            other => Self::ValidationFailed(FieldViolation::new(
                kind,
                other.field().unwrap_or("record"),
                None,
                other.to_string(),
            )),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, target } => write!(f, "{kind} not found: {target}"),
            Self::ValidationFailed(violation) => write!(f, "validation failed: {violation}"),
            Self::ConflictViolation(violation) => write!(f, "conflict: {violation}"),
            Self::InvalidOperation { kind, reason } => {
                write!(f, "invalid operation on {kind}: {reason}")
            }
            Self::StoreUnavailable(err) => write!(f, "store unavailable: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::StoreUnavailable(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StoreUnavailable(DbError::Sqlite(value))
    }
}

/// Classifies a failed write statement.
///
/// Unique and not-null violations become field-shaped errors; foreign-key
/// violations become a conflict on the relation; everything else is a
/// store failure.
pub(crate) fn classify_write_error(
    kind: EntityKind,
    err: rusqlite::Error,
    value_of: impl Fn(&str) -> Option<String>,
) -> RepoError {
    let (extended_code, message) = match &err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            (code.extended_code, message.clone().unwrap_or_default())
        }
        _ => return RepoError::from(err),
    };

    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            let field = constrained_field(kind, &message).unwrap_or_else(|| "id".to_string());
            let value = value_of(&field);
            RepoError::ConflictViolation(FieldViolation::new(
                kind,
                field,
                value,
                "value is already taken",
            ))
        }
        ffi::SQLITE_CONSTRAINT_NOTNULL => {
            let field = constrained_field(kind, &message).unwrap_or_else(|| "record".to_string());
            RepoError::ValidationFailed(FieldViolation::new(
                kind,
                field,
                None,
                "value must not be null",
            ))
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => RepoError::ConflictViolation(FieldViolation::new(
            kind,
            "reference",
            None,
            "referenced record does not exist",
        )),
        _ => RepoError::from(err),
    }
}

/// Extracts the field name from SQLite constraint messages such as
/// `UNIQUE constraint failed: tags.name` or
/// `UNIQUE constraint failed: index 'ux_categories_sibling_name'`.
fn constrained_field(kind: EntityKind, message: &str) -> Option<String> {
    let detail = message.split_once(": ")?.1.trim();
    if let Some(index) = detail.strip_prefix("index '") {
        let index = index.trim_end_matches('\'');
        return kind
            .descriptor()
            .unique_for_index(index)
            .map(|unique| unique.field.to_string());
    }
    let first = detail.split(", ").next()?;
    let (_, column) = first.split_once('.')?;
    Some(column.to_string())
}
