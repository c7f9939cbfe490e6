//! Query shapes shared by every repository.
//!
//! # Responsibility
//! - Describe filters, list options and the per-kind base query.
//! - Render them into parameterized SQL fragments.
//!
//! # Invariants
//! - Only columns accepted by `KindDescriptor::is_filterable` reach SQL
//!   text; every value is bound, never interpolated.
//! - All reads select from the kind's table under the alias `t`.

use crate::model::kind::{AggregateSpec, EntityKind, KindDescriptor, OrderKey};
use crate::model::record::{FieldValue, RecordId, PATH_SEPARATOR};
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Which records a read sees with respect to trash state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrashedMode {
    /// Active records only.
    #[default]
    None,
    /// Trashed records only.
    Only,
    /// Active and trashed records.
    All,
}

impl TrashedMode {
    pub fn from_include(include_trashed: bool) -> Self {
        if include_trashed {
            Self::All
        } else {
            Self::None
        }
    }
}

/// Restricts a tree-kind query to one sibling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentScope {
    Root,
    Under(RecordId),
}

impl From<Option<RecordId>> for ParentScope {
    fn from(value: Option<RecordId>) -> Self {
        match value {
            Some(id) => Self::Under(id),
            None => Self::Root,
        }
    }
}

/// Conjunction of equality and inequality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub equals: Vec<(String, FieldValue)>,
    pub not_equals: Vec<(String, FieldValue)>,
    pub parent: Option<ParentScope>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.equals.push((column.into(), value.into()));
        self
    }

    pub fn ne(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.not_equals.push((column.into(), value.into()));
        self
    }

    /// Excludes the record with `id`.
    pub fn excluding(self, id: RecordId) -> Self {
        self.ne("id", id)
    }

    pub fn within_parent(mut self, parent: impl Into<ParentScope>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// List options accepted by `find_many` / `count`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub trashed: TrashedMode,
    pub filter: RecordFilter,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Kind-specific default select: columns, aggregates and ordering every
/// read builds upon.
#[derive(Debug, Clone)]
pub struct BaseQuery {
    pub kind: EntityKind,
    pub table: &'static str,
    pub columns: Vec<&'static str>,
    pub aggregates: &'static [AggregateSpec],
    pub order: &'static [OrderKey],
}

impl BaseQuery {
    pub fn for_kind(kind: EntityKind) -> Self {
        let descriptor = kind.descriptor();
        let mut columns = vec!["id"];
        columns.extend(descriptor.fields.iter().map(|spec| spec.name));
        if descriptor.is_tree {
            columns.extend(["parent_id", "mpath"]);
        }
        if descriptor.supports_trash {
            columns.push("deleted_at");
        }
        columns.extend(["created_at", "updated_at"]);

        Self {
            kind,
            table: descriptor.table,
            columns,
            aggregates: descriptor.aggregates,
            order: descriptor.order,
        }
    }

    pub fn descriptor(&self) -> &'static KindDescriptor {
        self.kind.descriptor()
    }

    /// `SELECT <columns>, <aggregates> FROM <table> t`
    pub fn select_sql(&self) -> String {
        let mut items: Vec<String> = self
            .columns
            .iter()
            .map(|column| format!("t.{column} AS {column}"))
            .collect();
        items.extend(
            self.aggregates
                .iter()
                .map(|aggregate| format!("{} AS {}", aggregate.sql, aggregate.name)),
        );
        format!("SELECT {} FROM {} t", items.join(", "), self.table)
    }

    pub fn order_sql(&self) -> String {
        let keys: Vec<String> = self
            .order
            .iter()
            .map(|key| format!("t.{} {}", key.column, key.direction.as_sql()))
            .collect();
        if keys.is_empty() {
            return String::new();
        }
        format!(" ORDER BY {}", keys.join(", "))
    }
}

/// Accumulates `WHERE` conditions with their bound values.
#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    conditions: Vec<String>,
    pub(crate) binds: Vec<Value>,
}

impl WhereClause {
    pub(crate) fn push(&mut self, condition: impl Into<String>) {
        self.conditions.push(condition.into());
    }

    pub(crate) fn push_bound(&mut self, condition: impl Into<String>, value: Value) {
        self.conditions.push(condition.into());
        self.binds.push(value);
    }

    pub(crate) fn trashed(&mut self, descriptor: &KindDescriptor, mode: TrashedMode) {
        match (descriptor.supports_trash, mode) {
            (_, TrashedMode::All) => {}
            (true, TrashedMode::None) => self.push("t.deleted_at IS NULL"),
            (true, TrashedMode::Only) => self.push("t.deleted_at IS NOT NULL"),
            (false, TrashedMode::None) => {}
            (false, TrashedMode::Only) => self.push("1 = 0"),
        }
    }

    pub(crate) fn filter(
        &mut self,
        descriptor: &KindDescriptor,
        kind: EntityKind,
        filter: &RecordFilter,
    ) -> RepoResult<()> {
        for (column, value) in &filter.equals {
            ensure_filterable(descriptor, kind, column)?;
            if value.is_null() {
                self.push(format!("t.{column} IS NULL"));
            } else {
                self.push_bound(format!("t.{column} = ?"), to_sql_value(value));
            }
        }

        for (column, value) in &filter.not_equals {
            ensure_filterable(descriptor, kind, column)?;
            if value.is_null() {
                self.push(format!("t.{column} IS NOT NULL"));
            } else {
                // NULL columns count as different from any value.
                self.push_bound(
                    format!("(t.{column} IS NULL OR t.{column} <> ?)"),
                    to_sql_value(value),
                );
            }
        }

        match filter.parent {
            None => {}
            Some(_) if !descriptor.is_tree => {
                return Err(RepoError::invalid_operation(
                    kind,
                    "parent scope requires a tree kind",
                ));
            }
            Some(ParentScope::Root) => self.push("t.parent_id IS NULL"),
            Some(ParentScope::Under(parent_id)) => {
                self.push_bound("t.parent_id = ?", Value::Text(parent_id.to_string()))
            }
        }
        Ok(())
    }

    /// Restricts to strict descendants of the node at `path`.
    pub(crate) fn below_path(&mut self, path: &str) {
        let prefix = format!("{path}{PATH_SEPARATOR}");
        let length = prefix.len() as i64;
        self.conditions.push("substr(t.mpath, 1, ?) = ?".to_string());
        self.binds.push(Value::Integer(length));
        self.binds.push(Value::Text(prefix));
    }

    pub(crate) fn sql(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        format!(" WHERE {}", self.conditions.join(" AND "))
    }
}

fn ensure_filterable(descriptor: &KindDescriptor, kind: EntityKind, column: &str) -> RepoResult<()> {
    if descriptor.is_filterable(column) {
        return Ok(());
    }
    Err(RepoError::invalid_operation(
        kind,
        format!("cannot filter on unknown column `{column}`"),
    ))
}

pub(crate) fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(value) => Value::Integer(i64::from(*value)),
        FieldValue::Integer(value) => Value::Integer(*value),
        FieldValue::Real(value) => Value::Real(*value),
        FieldValue::Text(value) => Value::Text(value.clone()),
    }
}
