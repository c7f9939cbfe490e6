use cms_core::db::open_db_in_memory;
use cms_core::{
    fields, BaseService, CoreConfig, CreateInput, EntityKind, FieldValue, PaginateOptions,
    ParentChange, Record, RepoError, ServiceOptions, SqliteRepository, TrashedMode, UpdateInput,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection, kind: EntityKind) -> BaseService<SqliteRepository<'_>> {
    let repo = SqliteRepository::try_new(conn, kind).unwrap();
    BaseService::new(repo, ServiceOptions::from_config(kind, &CoreConfig::default()))
}

fn create_category(
    service: &BaseService<SqliteRepository<'_>>,
    name: &str,
    order: i64,
    parent: Option<&Record>,
) -> Record {
    service
        .create(CreateInput {
            fields: fields([
                ("name", FieldValue::from(name)),
                ("custom_order", FieldValue::from(order)),
            ]),
            parent_id: parent.map(|parent| parent.id),
        })
        .unwrap()
}

#[test]
fn child_category_scenario() {
    let conn = setup();
    let categories = service(&conn, EntityKind::Category);

    let a = create_category(&categories, "A", 0, None);
    let b = create_category(&categories, "B", 0, Some(&a));
    assert_eq!(b.depth(), Some(1));
    assert_eq!(b.path().unwrap(), format!("{}.{}", a.id, b.id));

    assert_eq!(categories.delete(&[a.id], true).unwrap(), 2);
    assert!(categories.detail(b.id).unwrap().is_trashed());
    assert!(categories.trees().unwrap().is_empty());
}

#[test]
fn paginate_corrects_out_of_range_values() {
    let conn = setup();
    let tags = service(&conn, EntityKind::Tag);
    for index in 0..12 {
        tags.create(CreateInput {
            fields: fields([("name", format!("tag-{index:02}"))]),
            parent_id: None,
        })
        .unwrap();
    }

    let first = tags
        .paginate(PaginateOptions {
            page: 0,
            limit: -5,
            trashed: TrashedMode::None,
        })
        .unwrap();
    assert_eq!(first.meta.current_page, 1);
    assert_eq!(first.meta.per_page, 10);
    assert_eq!(first.meta.total_items, 12);
    assert_eq!(first.meta.total_pages, 2);
    assert_eq!(first.meta.item_count, 10);

    let second = tags
        .paginate(PaginateOptions {
            page: 2,
            limit: 10,
            trashed: TrashedMode::None,
        })
        .unwrap();
    assert_eq!(second.meta.item_count, 2);
    assert_eq!(second.items[0].field("name"), Some(&FieldValue::from("tag-10")));

    let clamped = tags
        .paginate(PaginateOptions {
            page: 1,
            limit: 10_000,
            trashed: TrashedMode::None,
        })
        .unwrap();
    assert_eq!(clamped.meta.per_page, 100);

    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json["meta"]["total_pages"], 2);
}

#[test]
fn paginate_lists_trash_only_when_enabled() {
    let conn = setup();
    let posts = service(&conn, EntityKind::Post);
    let binned = posts
        .create(CreateInput {
            fields: fields([("title", "Old"), ("slug", "old")]),
            parent_id: None,
        })
        .unwrap();
    posts.delete(&[binned.id], true).unwrap();

    let trash = posts
        .paginate(PaginateOptions {
            trashed: TrashedMode::Only,
            ..PaginateOptions::default()
        })
        .unwrap();
    assert_eq!(trash.meta.total_items, 1);

    let no_trash = BaseService::new(
        SqliteRepository::try_new(&conn, EntityKind::Post).unwrap(),
        ServiceOptions::from_config(EntityKind::Post, &CoreConfig::default()).with_trash(false),
    );
    let hidden = no_trash
        .paginate(PaginateOptions {
            trashed: TrashedMode::Only,
            ..PaginateOptions::default()
        })
        .unwrap();
    assert_eq!(hidden.meta.total_items, 0);
    assert!(no_trash.detail(binned.id).unwrap_err().is_not_found());
}

#[test]
fn create_rejects_missing_parent_and_parent_on_flat_kinds() {
    let conn = setup();
    let categories = service(&conn, EntityKind::Category);
    let err = categories
        .create(CreateInput {
            fields: fields([("name", "x")]),
            parent_id: Some(Uuid::new_v4()),
        })
        .unwrap_err();
    assert!(err.is_not_found());

    let tags = service(&conn, EntityKind::Tag);
    let err = tags
        .create(CreateInput {
            fields: fields([("name", "x")]),
            parent_id: Some(Uuid::new_v4()),
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidOperation { .. }));

    let err = tags
        .create(CreateInput {
            fields: fields([("description", "no name")]),
            parent_id: None,
        })
        .unwrap_err();
    assert_eq!(err.field_violation().unwrap().field, "name");
}

#[test]
fn update_merges_fields_and_reparents_only_on_change() {
    let conn = setup();
    let categories = service(&conn, EntityKind::Category);
    let left = create_category(&categories, "left", 0, None);
    let right = create_category(&categories, "right", 1, None);
    let node = create_category(&categories, "node", 0, Some(&left));
    let leaf = create_category(&categories, "leaf", 0, Some(&node));

    let renamed = categories
        .update(UpdateInput::fields(node.id, fields([("name", "renamed")])))
        .unwrap();
    assert_eq!(renamed.field("name"), Some(&FieldValue::from("renamed")));
    assert_eq!(renamed.field("custom_order"), Some(&FieldValue::from(0_i64)));
    assert_eq!(renamed.path(), node.path());

    let same_parent = categories
        .update(UpdateInput {
            id: node.id,
            fields: Default::default(),
            parent: ParentChange::To(left.id),
        })
        .unwrap();
    assert_eq!(same_parent.path(), node.path());

    let moved = categories
        .update(UpdateInput {
            id: node.id,
            fields: Default::default(),
            parent: ParentChange::To(right.id),
        })
        .unwrap();
    assert_eq!(moved.parent_id(), Some(right.id));
    let leaf = categories.detail(leaf.id).unwrap();
    assert_eq!(
        leaf.path().unwrap(),
        format!("{}.{}.{}", right.id, node.id, leaf.id)
    );

    let root = categories
        .update(UpdateInput {
            id: node.id,
            fields: Default::default(),
            parent: ParentChange::Root,
        })
        .unwrap();
    assert_eq!(root.depth(), Some(0));

    let err = categories
        .update(UpdateInput {
            id: node.id,
            fields: Default::default(),
            parent: ParentChange::To(Uuid::new_v4()),
        })
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn update_edits_children_of_trashed_parents() {
    let conn = setup();
    let categories = service(&conn, EntityKind::Category);
    let a = create_category(&categories, "A", 0, None);
    let b = create_category(&categories, "B", 0, Some(&a));
    categories.delete(&[a.id], true).unwrap();

    let in_trash = categories
        .update(UpdateInput::fields(b.id, fields([("name", "B2")])))
        .unwrap();
    assert_eq!(in_trash.field("name"), Some(&FieldValue::from("B2")));
    assert_eq!(in_trash.path(), b.path());

    categories.restore(&[b.id]).unwrap();
    let restored = categories
        .update(UpdateInput::fields(b.id, fields([("name", "B3")])))
        .unwrap();
    assert_eq!(restored.parent_id(), Some(a.id));
    assert!(restored.is_active());

    let same_parent = categories
        .update(UpdateInput {
            id: b.id,
            fields: Default::default(),
            parent: ParentChange::To(a.id),
        })
        .unwrap();
    assert_eq!(same_parent.path(), b.path());

    let moved = categories
        .update(UpdateInput {
            id: b.id,
            fields: Default::default(),
            parent: ParentChange::Root,
        })
        .unwrap();
    assert_eq!(moved.depth(), Some(0));
}

#[test]
fn update_rejects_parent_on_flat_kinds() {
    let conn = setup();
    let tags = service(&conn, EntityKind::Tag);
    let tag = tags
        .create(CreateInput {
            fields: fields([("name", "news")]),
            parent_id: None,
        })
        .unwrap();
    let err = tags
        .update(UpdateInput {
            id: tag.id,
            fields: Default::default(),
            parent: ParentChange::Root,
        })
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidOperation { .. }));
}

#[test]
fn deleting_trashed_records_removes_them() {
    let conn = setup();
    let posts = service(&conn, EntityKind::Post);
    let post = posts
        .create(CreateInput {
            fields: fields([("title", "Hello"), ("slug", "hello")]),
            parent_id: None,
        })
        .unwrap();

    assert_eq!(posts.delete(&[post.id], true).unwrap(), 1);
    assert!(posts.detail(post.id).unwrap().is_trashed());
    assert_eq!(posts.delete(&[post.id], true).unwrap(), 1);
    assert!(posts.detail(post.id).unwrap_err().is_not_found());
    assert_eq!(posts.delete(&[post.id], true).unwrap(), 0);
}

#[test]
fn restore_requires_trash() {
    let conn = setup();
    let tags = service(&conn, EntityKind::Tag);
    assert!(!tags.options().enable_trash);
    assert!(matches!(
        tags.restore(&[Uuid::new_v4()]),
        Err(RepoError::InvalidOperation { .. })
    ));

    let categories = service(&conn, EntityKind::Category);
    let a = create_category(&categories, "A", 0, None);
    categories.delete(&[a.id], true).unwrap();
    assert_eq!(categories.restore(&[a.id]).unwrap(), 1);
    assert!(categories.detail(a.id).unwrap().is_active());
}

#[test]
fn tree_helpers_resolve_by_id() {
    let conn = setup();
    let categories = service(&conn, EntityKind::Category);
    let root = create_category(&categories, "root", 0, None);
    let child = create_category(&categories, "child", 0, Some(&root));
    let leaf = create_category(&categories, "leaf", 0, Some(&child));

    let ancestors: Vec<_> = categories
        .ancestors(leaf.id)
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(ancestors, vec![root.id, child.id]);

    assert_eq!(categories.descendants(root.id).unwrap().len(), 2);
    assert_eq!(categories.subtree(child.id).unwrap().size(), 2);
    assert_eq!(categories.trees().unwrap().len(), 1);
}
