//! Declarative conditions consumed by store-backed checks.

use crate::model::kind::EntityKind;
use serde::{Deserialize, Serialize};

/// How a check recognises the record being updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreSpec {
    /// Column compared against the self value.
    pub column: String,
    /// Payload field that carries the self value.
    pub value_field: String,
}

impl Default for IgnoreSpec {
    fn default() -> Self {
        Self {
            column: "id".to_string(),
            value_field: "id".to_string(),
        }
    }
}

/// Narrows a uniqueness check to one sibling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeScope {
    /// Payload field that carries the parent id; absent means root level.
    pub parent_field: String,
}

impl Default for TreeScope {
    fn default() -> Self {
        Self {
            parent_field: "parent_id".to_string(),
        }
    }
}

/// Target of a store check: which kind and which column to look at.
///
/// Stateless; built once when rules are registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCondition {
    /// Kind name, singular or table form.
    pub entity: String,
    pub field: String,
    #[serde(default)]
    pub ignore: IgnoreSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_scope: Option<TreeScope>,
}

impl ValidationCondition {
    pub fn new(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            ignore: IgnoreSpec::default(),
            tree_scope: None,
        }
    }

    pub fn for_kind(kind: EntityKind, field: impl Into<String>) -> Self {
        Self::new(kind.as_str(), field)
    }

    pub fn with_ignore(mut self, column: impl Into<String>, value_field: impl Into<String>) -> Self {
        self.ignore = IgnoreSpec {
            column: column.into(),
            value_field: value_field.into(),
        };
        self
    }

    /// Scopes uniqueness to siblings; `parent_field` names the payload field.
    pub fn within_siblings(mut self, parent_field: impl Into<String>) -> Self {
        self.tree_scope = Some(TreeScope {
            parent_field: parent_field.into(),
        });
        self
    }

    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::parse(&self.entity)
    }
}
