//! Base repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide typed CRUD, trash and tree APIs over one entity kind's table.
//! - Keep SQL details and ordering behavior inside the repository boundary.
//!
//! # Invariants
//! - Trashed rows are excluded from reads unless the caller asks for them.
//! - Every multi-statement write runs in one IMMEDIATE transaction: a
//!   reparent rewrites the node and all descendant paths atomically, and a
//!   cascade either trashes/removes the whole subtree or nothing.
//! - Sibling order is deterministic: the kind's order keys, then `id`.
//! - Store failures are translated into `RepoError` kinds before returning.

use crate::db::migrations::latest_version;
use crate::model::kind::{EntityKind, FieldType, KindDescriptor};
use crate::model::record::{FieldMap, FieldValue, Record, RecordId, TreeNode, TreePosition};
use crate::repo::error::{classify_write_error, RepoError, RepoResult};
use crate::repo::forest;
use crate::repo::query::{
    to_sql_value, BaseQuery, ListQuery, ParentScope, RecordFilter, TrashedMode, WhereClause,
};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, HashSet};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Repository interface shared by every entity kind.
pub trait BaseRepository {
    /// Entity kind served by this repository.
    fn kind(&self) -> EntityKind;

    /// Static schema and capabilities of the served kind.
    fn descriptor(&self) -> &'static KindDescriptor {
        self.kind().descriptor()
    }

    /// Default select every read builds upon.
    fn build_base_query(&self) -> BaseQuery {
        BaseQuery::for_kind(self.kind())
    }

    /// Loads one record; `NotFound` when absent or hidden by trash policy.
    fn find_by_id(&self, id: RecordId, include_trashed: bool) -> RepoResult<Record>;
    /// Loads the first record matching `filter` in default order.
    fn find_one(&self, filter: &RecordFilter, include_trashed: bool) -> RepoResult<Record>;
    /// Lists records in default order.
    fn find_many(&self, query: &ListQuery) -> RepoResult<Vec<Record>>;
    /// Counts records matching `query`, ignoring limit/offset.
    fn count(&self, query: &ListQuery) -> RepoResult<u64>;
    /// Counts records matching `filter`.
    fn count_matching(&self, filter: &RecordFilter, include_trashed: bool) -> RepoResult<u64>;
    /// Inserts or updates by id and returns the stored record.
    fn save(&self, record: &Record) -> RepoResult<Record>;
    /// Trashes (`soft`) or removes records; tree kinds cascade to descendants.
    fn delete(&self, ids: &[RecordId], soft: bool) -> RepoResult<usize>;
    /// Clears the trash marker of every id; fails if any id is not trashed.
    fn restore(&self, ids: &[RecordId]) -> RepoResult<usize>;
    /// All roots with children attached recursively.
    fn find_trees(&self, include_trashed: bool) -> RepoResult<Vec<TreeNode>>;
    /// Root-level records only.
    fn find_roots(&self, include_trashed: bool) -> RepoResult<Vec<Record>>;
    /// Every transitive descendant of `node`, flat.
    fn find_descendants(&self, node: &Record, include_trashed: bool) -> RepoResult<Vec<Record>>;
    /// `node` with its descendants attached.
    fn find_descendants_tree(&self, node: &Record, include_trashed: bool) -> RepoResult<TreeNode>;
    /// Number of transitive descendants of `node`.
    fn count_descendants(&self, node: &Record, include_trashed: bool) -> RepoResult<u64>;
    /// Ancestors of `node`, root-first, resolved through parent ids.
    fn flat_ancestors_tree(&self, node: &Record) -> RepoResult<Vec<Record>>;
}

/// SQLite-backed repository for one entity kind.
pub struct SqliteRepository<'conn> {
    conn: &'conn Connection,
    kind: EntityKind,
}

impl<'conn> SqliteRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection, kind: EntityKind) -> RepoResult<Self> {
        ensure_connection_ready(conn, kind)?;
        Ok(Self { conn, kind })
    }

    fn ensure_tree(&self, operation: &str) -> RepoResult<()> {
        if self.descriptor().is_tree {
            return Ok(());
        }
        Err(RepoError::invalid_operation(
            self.kind,
            format!("{operation} requires a tree kind"),
        ))
    }

    fn clause_for(&self, query: &ListQuery) -> RepoResult<WhereClause> {
        let mut clause = WhereClause::default();
        clause.trashed(self.descriptor(), query.trashed);
        clause.filter(self.descriptor(), self.kind, &query.filter)?;
        Ok(clause)
    }

    fn count_where(&self, clause: &WhereClause) -> RepoResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} t{};",
            self.descriptor().table,
            clause.sql()
        );
        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(clause.binds.iter()), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn insert_row(
        &self,
        conn: &Connection,
        record: &Record,
        position: Option<&TreePosition>,
        now: i64,
    ) -> RepoResult<()> {
        let descriptor = self.descriptor();
        let mut columns: Vec<&str> = vec!["id"];
        let mut values: Vec<Value> = vec![Value::Text(record.id.to_string())];

        for (name, value) in &record.fields {
            if let Some(spec) = descriptor.field(name) {
                columns.push(spec.name);
                values.push(to_sql_value(value));
            }
        }
        if let Some(position) = position {
            columns.extend(["parent_id", "mpath"]);
            values.push(optional_id(position.parent_id));
            values.push(Value::Text(position.path.clone()));
        }
        if descriptor.supports_trash {
            columns.push("deleted_at");
            values.push(record.deleted_at.map_or(Value::Null, Value::Integer));
        }
        let created_at = if record.created_at > 0 {
            record.created_at
        } else {
            now
        };
        columns.extend(["created_at", "updated_at"]);
        values.push(Value::Integer(created_at));
        values.push(Value::Integer(now));

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            descriptor.table,
            columns.join(", "),
            placeholders
        );
        conn.execute(&sql, params_from_iter(values))
            .map_err(|err| self.write_error(err, record))?;
        Ok(())
    }

    fn update_row(
        &self,
        conn: &Connection,
        record: &Record,
        position: Option<&TreePosition>,
        now: i64,
    ) -> RepoResult<()> {
        let descriptor = self.descriptor();
        let mut assignments: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        for (name, value) in &record.fields {
            if let Some(spec) = descriptor.field(name) {
                assignments.push(format!("{} = ?", spec.name));
                values.push(to_sql_value(value));
            }
        }
        if let Some(position) = position {
            assignments.push("parent_id = ?".to_string());
            values.push(optional_id(position.parent_id));
            assignments.push("mpath = ?".to_string());
            values.push(Value::Text(position.path.clone()));
        }
        if descriptor.supports_trash {
            assignments.push("deleted_at = ?".to_string());
            values.push(record.deleted_at.map_or(Value::Null, Value::Integer));
        }
        assignments.push("updated_at = ?".to_string());
        values.push(Value::Integer(now));
        values.push(Value::Text(record.id.to_string()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?;",
            descriptor.table,
            assignments.join(", ")
        );
        conn.execute(&sql, params_from_iter(values))
            .map_err(|err| self.write_error(err, record))?;
        Ok(())
    }

    fn write_error(&self, err: rusqlite::Error, record: &Record) -> RepoError {
        classify_write_error(self.kind, err, |field| {
            record.field(field).map(ToString::to_string)
        })
    }
}

impl BaseRepository for SqliteRepository<'_> {
    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn find_by_id(&self, id: RecordId, include_trashed: bool) -> RepoResult<Record> {
        load_row(
            self.conn,
            &self.build_base_query(),
            id,
            TrashedMode::from_include(include_trashed),
        )?
        .ok_or_else(|| RepoError::not_found(self.kind, id))
    }

    fn find_one(&self, filter: &RecordFilter, include_trashed: bool) -> RepoResult<Record> {
        let query = ListQuery {
            trashed: TrashedMode::from_include(include_trashed),
            filter: filter.clone(),
            limit: Some(1),
            offset: 0,
        };
        self.find_many(&query)?
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound {
                kind: self.kind,
                target: describe_filter(filter),
            })
    }

    fn find_many(&self, query: &ListQuery) -> RepoResult<Vec<Record>> {
        let clause = self.clause_for(query)?;
        let tail = match query.limit {
            Some(limit) => format!(" LIMIT {limit} OFFSET {}", query.offset),
            None if query.offset > 0 => format!(" LIMIT -1 OFFSET {}", query.offset),
            None => String::new(),
        };
        query_records(self.conn, &self.build_base_query(), &clause, &tail)
    }

    fn count(&self, query: &ListQuery) -> RepoResult<u64> {
        let clause = self.clause_for(query)?;
        self.count_where(&clause)
    }

    fn count_matching(&self, filter: &RecordFilter, include_trashed: bool) -> RepoResult<u64> {
        self.count(&ListQuery {
            trashed: TrashedMode::from_include(include_trashed),
            filter: filter.clone(),
            limit: None,
            offset: 0,
        })
    }

    fn save(&self, record: &Record) -> RepoResult<Record> {
        let started_at = Instant::now();
        if record.kind != self.kind {
            return Err(RepoError::invalid_operation(
                self.kind,
                format!("cannot save a `{}` record", record.kind),
            ));
        }
        record
            .validate()
            .map_err(|err| RepoError::from_record_validation(self.kind, err))?;

        let base = self.build_base_query();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let existing = load_row(&tx, &base, record.id, TrashedMode::All)?;
        let position = match existing.as_ref() {
            _ if !self.descriptor().is_tree => None,
            // Same parent: keep the stored position, even under a trashed parent.
            Some(current) if current.tree.is_some() && current.parent_id() == record.parent_id() => {
                current.tree.clone()
            }
            _ => Some(resolve_position(&tx, &base, record)?),
        };

        let now = now_ms();
        let mut rewritten = 0;
        match existing.as_ref() {
            None => self.insert_row(&tx, record, position.as_ref(), now)?,
            Some(current) => {
                self.update_row(&tx, record, position.as_ref(), now)?;
                if let (Some(old), Some(new)) = (current.tree.as_ref(), position.as_ref()) {
                    if old.path != new.path {
                        rewritten = rewrite_descendant_paths(
                            &tx,
                            self.descriptor().table,
                            &old.path,
                            &new.path,
                            now,
                        )?;
                    }
                }
            }
        }
        tx.commit()?;

        debug!(
            "event=record_save module=repo status=ok kind={} id={} mode={} descendants_rewritten={} duration_ms={}",
            self.kind,
            record.id,
            if existing.is_some() { "update" } else { "insert" },
            rewritten,
            started_at.elapsed().as_millis()
        );
        self.find_by_id(record.id, true)
    }

    fn delete(&self, ids: &[RecordId], soft: bool) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let descriptor = self.descriptor();
        if soft && !descriptor.supports_trash {
            return Err(RepoError::invalid_operation(
                self.kind,
                "soft delete requires trash support",
            ));
        }

        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let now = now_ms();
        let mut affected = 0;
        for id in ids {
            let targets = if descriptor.is_tree {
                subtree_ids(&tx, descriptor.table, *id)?
            } else {
                existing_ids(&tx, descriptor.table, *id)?
            };
            if targets.is_empty() {
                continue;
            }

            let placeholders = vec!["?"; targets.len()].join(", ");
            if soft {
                let sql = format!(
                    "UPDATE {} SET deleted_at = ?, updated_at = ? WHERE deleted_at IS NULL AND id IN ({placeholders});",
                    descriptor.table
                );
                let mut values = vec![Value::Integer(now), Value::Integer(now)];
                values.extend(targets.into_iter().map(Value::Text));
                affected += tx.execute(&sql, params_from_iter(values))?;
            } else {
                // Rows removed by ON DELETE CASCADE are not reported by
                // `changes()`, so the subtree size is the affected count.
                let sql = format!(
                    "DELETE FROM {} WHERE id IN ({placeholders});",
                    descriptor.table
                );
                affected += targets.len();
                tx.execute(&sql, params_from_iter(targets))?;
            }
        }
        tx.commit()?;

        info!(
            "event=record_delete module=repo status=ok kind={} soft={} requested={} affected={} duration_ms={}",
            self.kind,
            soft,
            ids.len(),
            affected,
            started_at.elapsed().as_millis()
        );
        Ok(affected)
    }

    fn restore(&self, ids: &[RecordId]) -> RepoResult<usize> {
        let descriptor = self.descriptor();
        if !descriptor.supports_trash {
            return Err(RepoError::invalid_operation(
                self.kind,
                "restore requires trash support",
            ));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let now = now_ms();
        let sql = format!(
            "UPDATE {} SET deleted_at = NULL, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NOT NULL;",
            descriptor.table
        );
        let mut affected = 0;
        for id in ids {
            let changed = tx
                .execute(&sql, params![id.to_string(), now])
                .map_err(|err| classify_write_error(self.kind, err, |_| None))?;
            if changed == 0 {
                // Dropping `tx` rolls back restores already applied in this call.
                return Err(RepoError::NotFound {
                    kind: self.kind,
                    target: format!("trashed {id}"),
                });
            }
            affected += changed;
        }
        tx.commit()?;

        info!(
            "event=record_restore module=repo status=ok kind={} affected={}",
            self.kind, affected
        );
        Ok(affected)
    }

    fn find_trees(&self, include_trashed: bool) -> RepoResult<Vec<TreeNode>> {
        self.ensure_tree("find_trees")?;
        let records = self.find_many(&ListQuery {
            trashed: TrashedMode::from_include(include_trashed),
            ..ListQuery::default()
        })?;
        Ok(forest::assemble(records, None))
    }

    fn find_roots(&self, include_trashed: bool) -> RepoResult<Vec<Record>> {
        self.ensure_tree("find_roots")?;
        self.find_many(&ListQuery {
            trashed: TrashedMode::from_include(include_trashed),
            filter: RecordFilter::new().within_parent(ParentScope::Root),
            ..ListQuery::default()
        })
    }

    fn find_descendants(&self, node: &Record, include_trashed: bool) -> RepoResult<Vec<Record>> {
        self.ensure_tree("find_descendants")?;
        let path = node_path(node)?;
        let mut clause = WhereClause::default();
        clause.trashed(self.descriptor(), TrashedMode::from_include(include_trashed));
        clause.below_path(path);
        query_records(self.conn, &self.build_base_query(), &clause, "")
    }

    fn find_descendants_tree(&self, node: &Record, include_trashed: bool) -> RepoResult<TreeNode> {
        let descendants = self.find_descendants(node, include_trashed)?;
        Ok(TreeNode {
            record: node.clone(),
            children: forest::assemble(descendants, Some(node.id)),
        })
    }

    fn count_descendants(&self, node: &Record, include_trashed: bool) -> RepoResult<u64> {
        self.ensure_tree("count_descendants")?;
        let path = node_path(node)?;
        let mut clause = WhereClause::default();
        clause.trashed(self.descriptor(), TrashedMode::from_include(include_trashed));
        clause.below_path(path);
        self.count_where(&clause)
    }

    fn flat_ancestors_tree(&self, node: &Record) -> RepoResult<Vec<Record>> {
        self.ensure_tree("flat_ancestors_tree")?;
        let base = self.build_base_query();
        // The whole walk sees one snapshot: the caller's open transaction,
        // or a deferred read transaction of our own.
        let mut ancestors = if self.conn.is_autocommit() {
            let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
            let chain = walk_parent_chain(&tx, &base, node.id, node.parent_id())?;
            tx.commit()?;
            chain
        } else {
            walk_parent_chain(self.conn, &base, node.id, node.parent_id())?
        };
        ancestors.reverse();
        Ok(ancestors)
    }
}

fn query_records(
    conn: &Connection,
    base: &BaseQuery,
    clause: &WhereClause,
    tail: &str,
) -> RepoResult<Vec<Record>> {
    let sql = format!(
        "{}{}{}{};",
        base.select_sql(),
        clause.sql(),
        base.order_sql(),
        tail
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(clause.binds.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_record_row(base, row)?);
    }
    Ok(records)
}

fn load_row(
    conn: &Connection,
    base: &BaseQuery,
    id: RecordId,
    trashed: TrashedMode,
) -> RepoResult<Option<Record>> {
    let mut clause = WhereClause::default();
    clause.push_bound("t.id = ?", Value::Text(id.to_string()));
    clause.trashed(base.descriptor(), trashed);
    Ok(query_records(conn, base, &clause, "")?.into_iter().next())
}

/// Computes the position `record` will have once saved.
///
/// The parent must exist and be active. Moving a node below itself is
/// rejected by walking the parent chain of the candidate parent.
fn resolve_position(conn: &Connection, base: &BaseQuery, record: &Record) -> RepoResult<TreePosition> {
    let Some(parent_id) = record.parent_id() else {
        return Ok(TreePosition::root(record.id));
    };
    if parent_id == record.id {
        return Err(RepoError::invalid_operation(
            base.kind,
            format!("record {} cannot be its own parent", record.id),
        ));
    }

    let parent = load_row(conn, base, parent_id, TrashedMode::None)?
        .ok_or_else(|| RepoError::not_found(base.kind, parent_id))?;
    walk_parent_chain(conn, base, record.id, Some(parent_id))?;
    let parent_path = node_path(&parent)?;
    Ok(TreePosition::child_of(parent_id, parent_path, record.id))
}

/// Walks parent ids upward starting at `start`, returning leaf-first.
///
/// Reaching `origin` again means the chain loops back into the node.
fn walk_parent_chain(
    conn: &Connection,
    base: &BaseQuery,
    origin: RecordId,
    start: Option<RecordId>,
) -> RepoResult<Vec<Record>> {
    let mut visited = HashSet::from([origin]);
    let mut chain = Vec::new();
    let mut cursor = start;
    while let Some(current) = cursor {
        if !visited.insert(current) {
            return Err(RepoError::invalid_operation(
                base.kind,
                format!("record {origin} would become its own ancestor via {current}"),
            ));
        }
        let record = load_row(conn, base, current, TrashedMode::All)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "parent {current} referenced from {} chain is missing",
                base.table
            ))
        })?;
        cursor = record.parent_id();
        chain.push(record);
    }
    Ok(chain)
}

fn rewrite_descendant_paths(
    conn: &Connection,
    table: &str,
    old_path: &str,
    new_path: &str,
    now: i64,
) -> RepoResult<usize> {
    let old_prefix = format!("{old_path}.");
    let sql = format!(
        "UPDATE {table}
         SET mpath = ?1 || substr(mpath, ?2),
             updated_at = ?3
         WHERE substr(mpath, 1, ?4) = ?5;"
    );
    let changed = conn.execute(
        &sql,
        params![
            new_path,
            old_path.len() as i64 + 1,
            now,
            old_prefix.len() as i64,
            old_prefix,
        ],
    )?;
    Ok(changed)
}

fn subtree_ids(conn: &Connection, table: &str, root: RecordId) -> RepoResult<Vec<String>> {
    let sql = format!(
        "WITH RECURSIVE subtree(id) AS (
            SELECT id FROM {table} WHERE id = ?1
            UNION
            SELECT child.id
            FROM {table} child
            INNER JOIN subtree parent ON child.parent_id = parent.id
        )
        SELECT id FROM subtree;"
    );
    collect_ids(conn, &sql, root)
}

fn existing_ids(conn: &Connection, table: &str, id: RecordId) -> RepoResult<Vec<String>> {
    collect_ids(conn, &format!("SELECT id FROM {table} WHERE id = ?1;"), id)
}

fn collect_ids(conn: &Connection, sql: &str, id: RecordId) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn parse_record_row(base: &BaseQuery, row: &Row<'_>) -> RepoResult<Record> {
    let descriptor = base.descriptor();
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, descriptor.table, "id")?;

    let mut fields = FieldMap::new();
    for spec in descriptor.fields {
        let value = match spec.ty {
            FieldType::Text => row.get::<_, Option<String>>(spec.name)?.map(FieldValue::Text),
            FieldType::Integer => row.get::<_, Option<i64>>(spec.name)?.map(FieldValue::Integer),
            FieldType::Real => row.get::<_, Option<f64>>(spec.name)?.map(FieldValue::Real),
            FieldType::Bool => row.get::<_, Option<bool>>(spec.name)?.map(FieldValue::Bool),
        };
        fields.insert(spec.name.to_string(), value.unwrap_or(FieldValue::Null));
    }

    let tree = if descriptor.is_tree {
        let parent_id = row
            .get::<_, Option<String>>("parent_id")?
            .map(|value| parse_uuid(&value, descriptor.table, "parent_id"))
            .transpose()?;
        Some(TreePosition {
            parent_id,
            path: row.get("mpath")?,
        })
    } else {
        None
    };

    let deleted_at = if descriptor.supports_trash {
        row.get("deleted_at")?
    } else {
        None
    };

    let mut aggregates = BTreeMap::new();
    for aggregate in base.aggregates {
        aggregates.insert(aggregate.name.to_string(), row.get::<_, i64>(aggregate.name)?);
    }

    Ok(Record {
        id,
        kind: base.kind,
        fields,
        tree,
        deleted_at,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        aggregates,
    })
}

fn parse_uuid(value: &str, table: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {table}.{column}")))
}

fn node_path(node: &Record) -> RepoResult<&str> {
    node.path().ok_or_else(|| {
        RepoError::invalid_operation(node.kind, format!("record {} has no tree position", node.id))
    })
}

fn optional_id(id: Option<RecordId>) -> Value {
    id.map_or(Value::Null, |id| Value::Text(id.to_string()))
}

fn describe_filter(filter: &RecordFilter) -> String {
    let mut parts: Vec<String> = filter
        .equals
        .iter()
        .map(|(column, value)| format!("{column}={value}"))
        .collect();
    parts.extend(
        filter
            .not_equals
            .iter()
            .map(|(column, value)| format!("{column}!={value}")),
    );
    match filter.parent {
        Some(ParentScope::Root) => parts.push("parent=root".to_string()),
        Some(ParentScope::Under(id)) => parts.push(format!("parent={id}")),
        None => {}
    }
    parts.join(" ")
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

fn ensure_connection_ready(conn: &Connection, kind: EntityKind) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::invalid_operation(
            kind,
            format!(
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
        ));
    }

    let table = kind.descriptor().table;
    for column in BaseQuery::for_kind(kind).columns {
        if !table_has_column(conn, table, column)? {
            return Err(RepoError::invalid_operation(
                kind,
                format!("repository requires column `{column}` in table `{table}`"),
            ));
        }
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
