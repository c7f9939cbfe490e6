//! Record domain model.
//!
//! # Responsibility
//! - Define the canonical record shape shared by every entity kind.
//! - Own materialized-path arithmetic for tree records.
//! - Provide lifecycle helpers for soft-delete semantics.
//!
//! # Invariants
//! - `id` is stable, non-nil, and never reused for another record.
//! - A tree record's `path` is its parent's path followed by its own id;
//!   `depth()` is derived from the path and never stored separately.
//! - `deleted_at` is the source of truth for trash state.
//! - Children are never stored on a record; see `TreeNode`.

use crate::model::kind::{EntityKind, FieldType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of every record.
pub type RecordId = Uuid;

/// Named field values of a record or an inbound payload.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Separator between ids inside a materialized path.
pub const PATH_SEPARATOR: char = '.';

/// Dynamically typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns whether this value can be stored in a column of `ty`.
    pub fn fits(&self, ty: FieldType) -> bool {
        matches!(
            (self, ty),
            (Self::Null, _)
                | (Self::Text(_), FieldType::Text)
                | (Self::Integer(_), FieldType::Integer)
                | (Self::Integer(_), FieldType::Real)
                | (Self::Real(_), FieldType::Real)
                | (Self::Bool(_), FieldType::Bool)
        )
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<RecordId> for FieldValue {
    fn from(value: RecordId) -> Self {
        Self::Text(value.to_string())
    }
}

/// Position of a tree record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePosition {
    /// `None` means root.
    pub parent_id: Option<RecordId>,
    /// Materialized path: ancestor ids root-first, then the record's own id.
    pub path: String,
}

impl TreePosition {
    pub fn root(id: RecordId) -> Self {
        Self {
            parent_id: None,
            path: id.to_string(),
        }
    }

    pub fn child_of(parent_id: RecordId, parent_path: &str, id: RecordId) -> Self {
        Self {
            parent_id: Some(parent_id),
            path: format!("{parent_path}{PATH_SEPARATOR}{id}"),
        }
    }

    /// Root is depth 0.
    pub fn depth(&self) -> u32 {
        self.path.matches(PATH_SEPARATOR).count() as u32
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split(PATH_SEPARATOR)
    }

    /// True when `self` lives strictly below the node whose path is `ancestor_path`.
    pub fn is_below(&self, ancestor_path: &str) -> bool {
        self.path.len() > ancestor_path.len()
            && self.path.starts_with(ancestor_path)
            && self.path[ancestor_path.len()..].starts_with(PATH_SEPARATOR)
    }
}

/// Record-level validation failures detected before any store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    NilId,
    UnknownField(String),
    MissingRequiredField(String),
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
    /// Tree position set on a non-tree kind, or missing on a tree kind.
    TreeShapeMismatch(EntityKind),
    /// Trash marker set on a kind without soft-delete support.
    TrashUnsupported(EntityKind),
}

impl RecordValidationError {
    /// Field the failure is attributed to, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnknownField(field) | Self::MissingRequiredField(field) => Some(field),
            Self::TypeMismatch { field, .. } => Some(field),
            Self::NilId => Some("id"),
            Self::TreeShapeMismatch(_) => Some("parent_id"),
            Self::TrashUnsupported(_) => Some("deleted_at"),
        }
    }
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "record id must not be nil"),
            Self::UnknownField(field) => write!(f, "unknown field `{field}`"),
            Self::MissingRequiredField(field) => write!(f, "field `{field}` is required"),
            Self::TypeMismatch { field, expected } => {
                write!(f, "field `{field}` must be {expected}")
            }
            Self::TreeShapeMismatch(kind) => {
                write!(f, "tree position does not match kind `{kind}`")
            }
            Self::TrashUnsupported(kind) => write!(f, "kind `{kind}` does not support trash"),
        }
    }
}

impl Error for RecordValidationError {}

/// Canonical persisted record of any entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub kind: EntityKind,
    pub fields: FieldMap,
    /// Present exactly for tree kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreePosition>,
    /// Epoch ms soft-delete marker.
    #[serde(default)]
    pub deleted_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    /// Computed on read (e.g. `child_count`); ignored on write.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregates: BTreeMap<String, i64>,
}

impl Record {
    /// Creates an unsaved record with a generated id. Tree kinds start as roots.
    pub fn new(kind: EntityKind, fields: FieldMap) -> Self {
        Self::build(Uuid::new_v4(), kind, fields)
    }

    /// Creates an unsaved record with a caller-provided id.
    pub fn with_id(
        id: RecordId,
        kind: EntityKind,
        fields: FieldMap,
    ) -> Result<Self, RecordValidationError> {
        if id.is_nil() {
            return Err(RecordValidationError::NilId);
        }
        Ok(Self::build(id, kind, fields))
    }

    fn build(id: RecordId, kind: EntityKind, fields: FieldMap) -> Self {
        let tree = kind.descriptor().is_tree.then(|| TreePosition::root(id));
        Self {
            id,
            kind,
            fields,
            tree,
            deleted_at: None,
            created_at: 0,
            updated_at: 0,
            aggregates: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn parent_id(&self) -> Option<RecordId> {
        self.tree.as_ref().and_then(|tree| tree.parent_id)
    }

    /// Points the record at a new parent. The path is recomputed on save.
    pub fn set_parent(&mut self, parent_id: Option<RecordId>) {
        if let Some(tree) = self.tree.as_mut() {
            tree.parent_id = parent_id;
        }
    }

    pub fn path(&self) -> Option<&str> {
        self.tree.as_ref().map(|tree| tree.path.as_str())
    }

    pub fn depth(&self) -> Option<u32> {
        self.tree.as_ref().map(TreePosition::depth)
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        !self.is_trashed()
    }

    pub fn aggregate(&self, name: &str) -> Option<i64> {
        self.aggregates.get(name).copied()
    }

    /// Checks the record against its kind's descriptor.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.is_nil() {
            return Err(RecordValidationError::NilId);
        }

        let descriptor = self.kind.descriptor();
        for (name, value) in &self.fields {
            let spec = descriptor
                .field(name)
                .ok_or_else(|| RecordValidationError::UnknownField(name.clone()))?;
            if !value.fits(spec.ty) {
                return Err(RecordValidationError::TypeMismatch {
                    field: name.clone(),
                    expected: spec.ty.as_str(),
                });
            }
        }

        for spec in descriptor.fields.iter().filter(|spec| spec.required) {
            match self.fields.get(spec.name) {
                Some(value) if !value.is_null() => {}
                _ => {
                    return Err(RecordValidationError::MissingRequiredField(
                        spec.name.to_string(),
                    ))
                }
            }
        }

        if descriptor.is_tree != self.tree.is_some() {
            return Err(RecordValidationError::TreeShapeMismatch(self.kind));
        }
        if self.deleted_at.is_some() && !descriptor.supports_trash {
            return Err(RecordValidationError::TrashUnsupported(self.kind));
        }
        Ok(())
    }
}

/// Query-time view of a tree record with its subtree attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub record: Record,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(record: Record) -> Self {
        Self {
            record,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

/// Builds a field map from `(name, value)` pairs.
pub fn fields<I, K, V>(pairs: I) -> FieldMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}
