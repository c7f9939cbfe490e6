//! Entity-kind descriptors.
//!
//! # Responsibility
//! - Declare, per entity kind, its table, fields, capabilities (tree,
//!   trash), default ordering, unique backstops and computed aggregates.
//! - Resolve kind names coming from validation conditions.
//!
//! # Invariants
//! - Descriptors are `'static` and immutable; repositories and services
//!   read capabilities from them instead of branching on the kind.
//! - Every `UniqueIndex` names an index created by the schema migrations.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Entity kinds managed by the persistence core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Comment,
    Tag,
    Post,
    Permission,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Category,
        EntityKind::Comment,
        EntityKind::Tag,
        EntityKind::Post,
        EntityKind::Permission,
    ];

    pub fn as_str(self) -> &'static str {
        self.descriptor().name
    }

    /// Resolves a kind by its singular name or its table name.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| {
            let descriptor = kind.descriptor();
            descriptor.name == normalized || descriptor.table == normalized
        })
    }

    pub fn descriptor(self) -> &'static KindDescriptor {
        match self {
            Self::Category => &CATEGORY,
            Self::Comment => &COMMENT,
            Self::Tag => &TAG,
            Self::Post => &POST,
            Self::Permission => &PERMISSION,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Bool,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Bool => "bool",
        }
    }
}

/// One user-writable column of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One key of a kind's default ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderKey {
    pub column: &'static str,
    pub direction: SortDirection,
}

/// Store-level uniqueness constraint that backs a validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueIndex {
    pub index: &'static str,
    pub field: &'static str,
    /// Unique among siblings (same parent) instead of table-wide.
    pub sibling_scoped: bool,
}

/// Computed value attached to every read. `sql` is a scalar sub-select
/// correlated on the outer row alias `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateSpec {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Static schema and capability flags of one entity kind.
#[derive(Debug)]
pub struct KindDescriptor {
    pub name: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
    pub is_tree: bool,
    pub supports_trash: bool,
    pub order: &'static [OrderKey],
    pub unique: &'static [UniqueIndex],
    pub aggregates: &'static [AggregateSpec],
}

impl KindDescriptor {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Returns whether `column` may appear in filters for this kind.
    ///
    /// Covers declared fields plus the system columns the kind carries.
    pub fn is_filterable(&self, column: &str) -> bool {
        if self.field(column).is_some() {
            return true;
        }
        match column {
            "id" | "created_at" | "updated_at" => true,
            "parent_id" | "mpath" => self.is_tree,
            "deleted_at" => self.supports_trash,
            _ => false,
        }
    }

    pub fn unique_for_index(&self, index: &str) -> Option<&'static UniqueIndex> {
        self.unique.iter().find(|unique| unique.index == index)
    }
}

const fn field(name: &'static str, ty: FieldType, required: bool) -> FieldSpec {
    FieldSpec { name, ty, required }
}

const fn asc(column: &'static str) -> OrderKey {
    OrderKey {
        column,
        direction: SortDirection::Asc,
    }
}

const fn desc(column: &'static str) -> OrderKey {
    OrderKey {
        column,
        direction: SortDirection::Desc,
    }
}

static CATEGORY: KindDescriptor = KindDescriptor {
    name: "category",
    table: "categories",
    fields: &[
        field("name", FieldType::Text, true),
        field("custom_order", FieldType::Integer, false),
    ],
    is_tree: true,
    supports_trash: true,
    order: &[asc("custom_order"), asc("id")],
    unique: &[UniqueIndex {
        index: "ux_categories_sibling_name",
        field: "name",
        sibling_scoped: true,
    }],
    aggregates: &[AggregateSpec {
        name: "child_count",
        sql: "(SELECT COUNT(*) FROM categories c WHERE c.parent_id = t.id AND c.deleted_at IS NULL)",
    }],
};

static COMMENT: KindDescriptor = KindDescriptor {
    name: "comment",
    table: "comments",
    fields: &[
        field("body", FieldType::Text, true),
        field("post_id", FieldType::Text, false),
    ],
    is_tree: true,
    supports_trash: false,
    order: &[asc("created_at"), asc("id")],
    unique: &[],
    aggregates: &[AggregateSpec {
        name: "child_count",
        sql: "(SELECT COUNT(*) FROM comments c WHERE c.parent_id = t.id)",
    }],
};

static TAG: KindDescriptor = KindDescriptor {
    name: "tag",
    table: "tags",
    fields: &[
        field("name", FieldType::Text, true),
        field("description", FieldType::Text, false),
    ],
    is_tree: false,
    supports_trash: false,
    order: &[asc("name"), asc("id")],
    unique: &[UniqueIndex {
        index: "ux_tags_name",
        field: "name",
        sibling_scoped: false,
    }],
    aggregates: &[],
};

static POST: KindDescriptor = KindDescriptor {
    name: "post",
    table: "posts",
    fields: &[
        field("title", FieldType::Text, true),
        field("body", FieldType::Text, false),
        field("slug", FieldType::Text, true),
        field("custom_order", FieldType::Integer, false),
    ],
    is_tree: false,
    supports_trash: true,
    order: &[desc("updated_at"), asc("id")],
    unique: &[UniqueIndex {
        index: "ux_posts_slug",
        field: "slug",
        sibling_scoped: false,
    }],
    aggregates: &[AggregateSpec {
        name: "comment_count",
        sql: "(SELECT COUNT(*) FROM comments c WHERE c.post_id = t.id)",
    }],
};

static PERMISSION: KindDescriptor = KindDescriptor {
    name: "permission",
    table: "permissions",
    fields: &[
        field("name", FieldType::Text, true),
        field("label", FieldType::Text, false),
        field("description", FieldType::Text, false),
    ],
    is_tree: false,
    supports_trash: false,
    order: &[asc("name"), asc("id")],
    unique: &[UniqueIndex {
        index: "ux_permissions_name",
        field: "name",
        sibling_scoped: false,
    }],
    aggregates: &[],
};

#[cfg(test)]
mod tests {
    use super::EntityKind;

    #[test]
    fn parse_accepts_singular_and_table_names() {
        assert_eq!(EntityKind::parse("category"), Some(EntityKind::Category));
        assert_eq!(EntityKind::parse(" Posts "), Some(EntityKind::Post));
        assert_eq!(EntityKind::parse("users"), None);
    }

    #[test]
    fn tree_kinds_expose_parent_columns_only() {
        let category = EntityKind::Category.descriptor();
        let tag = EntityKind::Tag.descriptor();
        assert!(category.is_filterable("parent_id"));
        assert!(category.is_filterable("deleted_at"));
        assert!(!tag.is_filterable("parent_id"));
        assert!(!tag.is_filterable("deleted_at"));
        assert!(!tag.is_filterable("name; DROP TABLE tags"));
    }
}
