use cms_core::db::open_db_in_memory;
use cms_core::{
    fields, BaseRepository, EntityKind, FieldValue, Record, RepoError, SqliteRepository, TreeNode,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn category(
    repo: &SqliteRepository<'_>,
    name: &str,
    order: i64,
    parent: Option<&Record>,
) -> Record {
    let mut record = Record::new(
        EntityKind::Category,
        fields([
            ("name", FieldValue::from(name)),
            ("custom_order", FieldValue::from(order)),
        ]),
    );
    record.set_parent(parent.map(|parent| parent.id));
    repo.save(&record).unwrap()
}

fn move_under(repo: &SqliteRepository<'_>, node: &Record, parent: Option<&Record>) -> Record {
    let mut current = repo.find_by_id(node.id, true).unwrap();
    current.set_parent(parent.map(|parent| parent.id));
    repo.save(&current).unwrap()
}

fn names(nodes: &[TreeNode]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| node.record.field("name").unwrap().to_string())
        .collect()
}

fn assert_path_consistent(repo: &SqliteRepository<'_>, record: &Record) {
    let path = record.path().unwrap();
    assert!(path.ends_with(&record.id.to_string()));
    match record.parent_id() {
        None => {
            assert_eq!(path, record.id.to_string());
            assert_eq!(record.depth(), Some(0));
        }
        Some(parent_id) => {
            let parent = repo.find_by_id(parent_id, true).unwrap();
            assert_eq!(path, format!("{}.{}", parent.path().unwrap(), record.id));
            assert_eq!(record.depth(), parent.depth().map(|depth| depth + 1));
        }
    }
}

#[test]
fn saved_children_extend_parent_path() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let root = category(&repo, "root", 0, None);
    let child = category(&repo, "child", 0, Some(&root));
    let grandchild = category(&repo, "grandchild", 0, Some(&child));

    assert_eq!(root.depth(), Some(0));
    assert_eq!(child.depth(), Some(1));
    assert_eq!(grandchild.depth(), Some(2));
    assert_eq!(
        grandchild.path().unwrap(),
        format!("{}.{}.{}", root.id, child.id, grandchild.id)
    );
    for record in [&root, &child, &grandchild] {
        assert_path_consistent(&repo, record);
    }
}

#[test]
fn reparent_rewrites_every_descendant_path() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let left = category(&repo, "left", 0, None);
    let right = category(&repo, "right", 1, None);
    let moved = category(&repo, "moved", 0, Some(&left));
    let child = category(&repo, "child", 0, Some(&moved));
    let leaf = category(&repo, "leaf", 0, Some(&child));

    let moved = move_under(&repo, &moved, Some(&right));
    assert_eq!(moved.path().unwrap(), format!("{}.{}", right.id, moved.id));

    let leaf = repo.find_by_id(leaf.id, false).unwrap();
    assert_eq!(
        leaf.path().unwrap(),
        format!("{}.{}.{}.{}", right.id, moved.id, child.id, leaf.id)
    );
    assert_eq!(leaf.depth(), Some(3));
    for record in repo.find_descendants(&right, false).unwrap() {
        assert_path_consistent(&repo, &record);
    }
    assert_eq!(repo.count_descendants(&left, false).unwrap(), 0);

    let promoted = move_under(&repo, &moved, None);
    assert_eq!(promoted.depth(), Some(0));
    let leaf = repo.find_by_id(leaf.id, false).unwrap();
    assert_eq!(leaf.depth(), Some(2));
    assert_path_consistent(&repo, &leaf);
}

#[test]
fn reparent_rejects_cycles() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let root = category(&repo, "root", 0, None);
    let child = category(&repo, "child", 0, Some(&root));
    let grandchild = category(&repo, "grandchild", 0, Some(&child));

    let mut looped = repo.find_by_id(root.id, false).unwrap();
    looped.set_parent(Some(grandchild.id));
    assert!(matches!(
        repo.save(&looped),
        Err(RepoError::InvalidOperation { .. })
    ));

    let mut own_parent = repo.find_by_id(child.id, false).unwrap();
    own_parent.set_parent(Some(child.id));
    assert!(matches!(
        repo.save(&own_parent),
        Err(RepoError::InvalidOperation { .. })
    ));

    let unchanged = repo.find_by_id(root.id, false).unwrap();
    assert_eq!(unchanged.parent_id(), None);
    assert_eq!(unchanged.path().unwrap(), root.id.to_string());
}

#[test]
fn missing_or_trashed_parent_is_not_found() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let mut orphan = Record::new(EntityKind::Category, fields([("name", "orphan")]));
    orphan.set_parent(Some(Uuid::new_v4()));
    assert!(repo.save(&orphan).unwrap_err().is_not_found());

    let binned = category(&repo, "binned", 0, None);
    repo.delete(&[binned.id], true).unwrap();
    let mut child = Record::new(EntityKind::Category, fields([("name", "child")]));
    child.set_parent(Some(binned.id));
    assert!(repo.save(&child).unwrap_err().is_not_found());
}

#[test]
fn field_only_save_keeps_position_under_trashed_parent() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let parent = category(&repo, "parent", 0, None);
    let child = category(&repo, "child", 0, Some(&parent));
    repo.delete(&[parent.id], true).unwrap();

    let mut edited = repo.find_by_id(child.id, true).unwrap();
    edited.set_field("name", "renamed in trash");
    let saved = repo.save(&edited).unwrap();
    assert_eq!(saved.path(), child.path());
    assert!(saved.is_trashed());

    repo.restore(&[child.id]).unwrap();
    let mut restored = repo.find_by_id(child.id, false).unwrap();
    restored.set_field("name", "renamed after restore");
    let saved = repo.save(&restored).unwrap();
    assert_eq!(saved.parent_id(), Some(parent.id));
    assert_eq!(saved.path(), child.path());
    assert_eq!(saved.field("name"), Some(&FieldValue::from("renamed after restore")));
}

#[test]
fn ancestors_join_an_open_transaction() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();
    let root = category(&repo, "root", 0, None);
    let child = category(&repo, "child", 0, Some(&root));

    conn.execute_batch("BEGIN;").unwrap();
    let ancestors = repo.flat_ancestors_tree(&child).unwrap();
    conn.execute_batch("COMMIT;").unwrap();
    assert_eq!(ancestors.len(), 1);
    assert_eq!(ancestors[0].id, root.id);
}

#[test]
fn ancestors_are_root_first_and_match_depth() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let root = category(&repo, "root", 0, None);
    let child = category(&repo, "child", 0, Some(&root));
    let grandchild = category(&repo, "grandchild", 0, Some(&child));

    let ancestors = repo.flat_ancestors_tree(&grandchild).unwrap();
    let ids: Vec<_> = ancestors.iter().map(|record| record.id).collect();
    assert_eq!(ids, vec![root.id, child.id]);
    assert_eq!(ancestors.len() as u32, grandchild.depth().unwrap());
    assert!(repo.flat_ancestors_tree(&root).unwrap().is_empty());
}

#[test]
fn find_trees_orders_siblings_and_nests_children() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let second = category(&repo, "second", 2, None);
    let first = category(&repo, "first", 1, None);
    category(&repo, "b", 2, Some(&first));
    let a = category(&repo, "a", 1, Some(&first));
    category(&repo, "a1", 0, Some(&a));
    category(&repo, "only", 0, Some(&second));

    let forest = repo.find_trees(false).unwrap();
    assert_eq!(names(&forest), vec!["first", "second"]);
    assert_eq!(names(&forest[0].children), vec!["a", "b"]);
    assert_eq!(names(&forest[0].children[0].children), vec!["a1"]);
    assert_eq!(forest[0].size(), 4);
    assert_eq!(forest[0].record.aggregate("child_count"), Some(2));

    let roots = repo.find_roots(false).unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!(roots[0].id, first.id);
}

#[test]
fn find_trees_omits_nodes_below_hidden_parents() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let root = category(&repo, "root", 0, None);
    let hidden = category(&repo, "hidden", 0, Some(&root));
    category(&repo, "below", 0, Some(&hidden));
    repo.delete(&[hidden.id], true).unwrap();

    let forest = repo.find_trees(false).unwrap();
    assert_eq!(forest.len(), 1);
    assert!(forest[0].children.is_empty());

    let with_trash = repo.find_trees(true).unwrap();
    assert_eq!(with_trash[0].size(), 3);
}

#[test]
fn descendants_tree_hangs_below_the_node() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let root = category(&repo, "root", 0, None);
    let child = category(&repo, "child", 0, Some(&root));
    category(&repo, "leaf", 0, Some(&child));
    category(&repo, "other", 1, None);

    let subtree = repo.find_descendants_tree(&root, false).unwrap();
    assert_eq!(subtree.record.id, root.id);
    assert_eq!(subtree.size(), 3);
    assert_eq!(repo.find_descendants(&root, false).unwrap().len(), 2);
    assert_eq!(repo.count_descendants(&root, false).unwrap(), 2);
}

#[test]
fn tree_operations_require_a_tree_kind() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Tag).unwrap();
    assert!(matches!(
        repo.find_trees(false),
        Err(RepoError::InvalidOperation { .. })
    ));
}

#[test]
fn forest_serializes_with_nested_children() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();
    let root = category(&repo, "root", 0, None);
    category(&repo, "child", 0, Some(&root));

    let json = serde_json::to_value(repo.find_trees(false).unwrap()).unwrap();
    assert_eq!(json[0]["fields"]["name"], "root");
    assert_eq!(json[0]["children"][0]["fields"]["name"], "child");
    assert_eq!(json[0]["tree"]["path"], root.id.to_string());
}
