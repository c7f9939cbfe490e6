use cms_core::db::open_db_in_memory;
use cms_core::{
    fields, BaseRepository, EntityKind, ListQuery, Record, RepoError, SqliteRepository,
    TrashedMode,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn category(repo: &SqliteRepository<'_>, name: &str, parent: Option<&Record>) -> Record {
    let mut record = Record::new(EntityKind::Category, fields([("name", name)]));
    record.set_parent(parent.map(|parent| parent.id));
    repo.save(&record).unwrap()
}

#[test]
fn soft_delete_cascades_to_descendants() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let root = category(&repo, "root", None);
    let child = category(&repo, "child", Some(&root));
    let leaf = category(&repo, "leaf", Some(&child));
    let sibling = category(&repo, "sibling", None);

    assert_eq!(repo.delete(&[root.id], true).unwrap(), 3);
    for id in [root.id, child.id, leaf.id] {
        assert!(repo.find_by_id(id, true).unwrap().is_trashed());
        assert!(repo.find_by_id(id, false).unwrap_err().is_not_found());
    }
    assert!(repo.find_by_id(sibling.id, false).unwrap().is_active());
}

#[test]
fn restore_does_not_cascade() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let root = category(&repo, "root", None);
    let child = category(&repo, "child", Some(&root));
    repo.delete(&[root.id], true).unwrap();

    assert_eq!(repo.restore(&[root.id]).unwrap(), 1);
    assert!(repo.find_by_id(root.id, false).unwrap().is_active());
    assert!(repo.find_by_id(child.id, true).unwrap().is_trashed());

    // A trashed child may be restored under an active or trashed parent.
    assert_eq!(repo.restore(&[child.id]).unwrap(), 1);
    assert_eq!(repo.find_trees(false).unwrap()[0].size(), 2);
}

#[test]
fn restore_is_all_or_nothing() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let trashed = category(&repo, "trashed", None);
    let active = category(&repo, "active", None);
    repo.delete(&[trashed.id], true).unwrap();

    let err = repo.restore(&[trashed.id, active.id]).unwrap_err();
    assert!(err.is_not_found());
    assert!(repo.find_by_id(trashed.id, true).unwrap().is_trashed());
}

#[test]
fn hard_delete_removes_whole_subtree() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let root = category(&repo, "root", None);
    let child = category(&repo, "child", Some(&root));
    category(&repo, "leaf", Some(&child));
    category(&repo, "other", None);

    assert_eq!(repo.delete(&[root.id, child.id], false).unwrap(), 3);
    let remaining = repo
        .find_many(&ListQuery {
            trashed: TrashedMode::All,
            ..ListQuery::default()
        })
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(repo.delete(&[root.id], false).unwrap(), 0);
}

#[test]
fn soft_delete_requires_trash_support() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Tag).unwrap();
    let tag = repo
        .save(&Record::new(EntityKind::Tag, fields([("name", "news")])))
        .unwrap();

    assert!(matches!(
        repo.delete(&[tag.id], true),
        Err(RepoError::InvalidOperation { .. })
    ));
    assert!(matches!(
        repo.restore(&[tag.id]),
        Err(RepoError::InvalidOperation { .. })
    ));
    assert_eq!(repo.delete(&[tag.id], false).unwrap(), 1);
}

#[test]
fn trashed_rows_do_not_block_uniqueness_until_restored() {
    let conn = setup();
    let repo = SqliteRepository::try_new(&conn, EntityKind::Category).unwrap();

    let old = category(&repo, "news", None);
    repo.delete(&[old.id], true).unwrap();
    category(&repo, "news", None);

    match repo.restore(&[old.id]).unwrap_err() {
        RepoError::ConflictViolation(violation) => assert_eq!(violation.field, "name"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(repo.find_by_id(old.id, true).unwrap().is_trashed());
}
