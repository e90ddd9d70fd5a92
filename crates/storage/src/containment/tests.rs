use super::*;
use std::time::Duration;
use time::macros::datetime;

fn index() -> ContainmentIndex {
    ContainmentIndex::open_in_memory(&IndexConfig::default()).expect("open index")
}

fn long_running(id: &str) -> Transaction {
    Transaction::new(
        id.to_string(),
        false,
        Duration::from_secs(60),
        Arc::from(Vec::new()),
    )
}

fn rid(path: &str) -> ResourceId {
    ResourceId::parse(path).expect("valid id")
}

fn children(index: &ContainmentIndex, tx: &Transaction, parent: &str) -> Vec<String> {
    index
        .get_contains(tx, &rid(parent))
        .collect::<Result<_, _>>()
        .expect("children")
}

fn staged_rows(index: &ContainmentIndex) -> u64 {
    index.staged_operation_count().expect("count")
}

#[test]
fn short_lived_add_writes_through() {
    let index = index();
    let tx = Transaction::implicit();
    index.add_contained_by(&tx, &rid("/a"), &rid("/a/b")).unwrap();

    assert_eq!(children(&index, &tx, "/a"), vec!["info:fedora/a/b"]);
    assert_eq!(
        index.get_contained_by(&tx, &rid("/a/b")).unwrap().as_deref(),
        Some("info:fedora/a")
    );
    assert_eq!(staged_rows(&index), 0);
    assert!(index.containment_last_updated(&tx, &rid("/a")).unwrap().is_none());
}

#[test]
fn acl_children_are_never_contained() {
    let index = index();
    let tx = Transaction::implicit();
    index.add_contained_by(&tx, &rid("/a"), &rid("/a/fcr:acl")).unwrap();
    assert!(children(&index, &tx, "/a").is_empty());

    let index = index.with_exclusion(Arc::new(|id: &ResourceId| id.full_id().ends_with("/skip")));
    index.add_contained_by(&tx, &rid("/a"), &rid("/a/skip")).unwrap();
    index.add_contained_by(&tx, &rid("/a"), &rid("/a/keep")).unwrap();
    assert_eq!(children(&index, &tx, "/a"), vec!["info:fedora/a/keep"]);
}

#[test]
fn staged_add_then_remove_leaves_nothing_behind() {
    let index = index();
    let tx = long_running("tx-undo");
    index.add_contained_by(&tx, &rid("/p"), &rid("/p/c")).unwrap();
    assert_eq!(staged_rows(&index), 1);
    assert_eq!(tx.state(), crate::TransactionState::Dirty);

    index.remove_resource(&tx, &rid("/p/c")).unwrap();
    assert_eq!(staged_rows(&index), 0);
    assert!(children(&index, &tx, "/p").is_empty());
    assert!(!index.resource_exists(&tx, &rid("/p/c"), true).unwrap());
}

#[test]
fn removing_a_committed_child_stages_a_delete() {
    let index = index();
    let direct = Transaction::implicit();
    index.add_contained_by(&direct, &rid("/p"), &rid("/p/c")).unwrap();

    let tx = long_running("tx-del");
    index.remove_contained_by(&tx, &rid("/p"), &rid("/p/c")).unwrap();
    assert!(children(&index, &tx, "/p").is_empty());
    let deleted: Vec<String> = index
        .get_contains_deleted(&tx, &rid("/p"))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(deleted, vec!["info:fedora/p/c"]);
    assert_eq!(children(&index, &direct, "/p"), vec!["info:fedora/p/c"]);
    assert!(index.get_contained_by(&tx, &rid("/p/c")).unwrap().is_none());
}

#[test]
fn purge_requires_a_tombstone() {
    let index = index();
    let tx = Transaction::implicit();
    index.add_contained_by(&tx, &rid("/p"), &rid("/p/c")).unwrap();
    index.purge_resource(&tx, &rid("/p/c")).unwrap();
    assert!(index.resource_exists(&tx, &rid("/p/c"), false).unwrap());

    index.remove_resource(&tx, &rid("/p/c")).unwrap();
    assert!(!index.resource_exists(&tx, &rid("/p/c"), false).unwrap());
    assert!(index.resource_exists(&tx, &rid("/p/c"), true).unwrap());

    index.purge_resource(&tx, &rid("/p/c")).unwrap();
    assert!(!index.resource_exists(&tx, &rid("/p/c"), true).unwrap());
}

#[test]
fn existence_cache_remembers_only_hits() {
    let index = index();
    let tx = Transaction::implicit();
    assert!(!index.resource_exists(&tx, &rid("/x"), false).unwrap());
    assert!(!index.resource_exists(&tx, &rid("/x"), false).unwrap());
    assert_eq!(index.cache_stats().exists.entries, 0);

    index.add_contained_by(&tx, &rid("/"), &rid("/x")).unwrap();
    assert!(index.resource_exists(&tx, &rid("/x"), false).unwrap());
    assert!(index.resource_exists(&tx, &rid("/x"), false).unwrap());
    let stats = index.cache_stats().exists;
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);

    index.remove_resource(&tx, &rid("/x")).unwrap();
    assert!(!index.resource_exists(&tx, &rid("/x"), false).unwrap());
}

#[test]
fn root_always_exists() {
    let index = index();
    let tx = Transaction::implicit();
    assert!(index.resource_exists(&tx, &ResourceId::root(), false).unwrap());
    assert_eq!(
        index
            .get_container_id_by_path(&tx, &ResourceId::root(), false)
            .unwrap(),
        ResourceId::root()
    );
}

#[test]
fn container_by_path_walks_to_the_nearest_existing_ancestor() {
    let index = index();
    let tx = Transaction::implicit();
    index.add_contained_by(&tx, &ResourceId::root(), &rid("/a")).unwrap();
    index.add_contained_by(&tx, &rid("/a"), &rid("/a/b")).unwrap();

    let ghost = rid("/a/b/c/d");
    assert_eq!(
        index.get_container_id_by_path(&tx, &ghost, false).unwrap(),
        rid("/a/b")
    );
    assert_eq!(
        index.get_container_id_by_path(&tx, &rid("/a/b"), false).unwrap(),
        rid("/a")
    );
    assert_eq!(
        index
            .get_container_id_by_path(&tx, &rid("/z/y"), false)
            .unwrap(),
        ResourceId::root()
    );

    index.remove_resource(&tx, &rid("/a/b")).unwrap();
    assert_eq!(
        index.get_container_id_by_path(&tx, &rid("/a/b"), true).unwrap(),
        rid("/a")
    );
    assert_eq!(
        index.get_container_id_by_path(&tx, &ghost, false).unwrap(),
        rid("/a")
    );
    assert_eq!(
        index.get_container_id_by_path(&tx, &ghost, true).unwrap(),
        rid("/a/b")
    );
}

#[test]
fn last_updated_moves_forward_only() {
    let index = index();
    let tx = Transaction::implicit();
    let parent = rid("/p");
    index.add_contained_by(&tx, &ResourceId::root(), &parent).unwrap();
    index
        .add_contained_by_at(
            &tx,
            &parent,
            &rid("/p/new"),
            Some(datetime!(2022-01-01 00:00:00 UTC)),
            None,
        )
        .unwrap();
    index
        .add_contained_by_at(
            &tx,
            &parent,
            &rid("/p/old"),
            Some(datetime!(2021-01-01 00:00:00 UTC)),
            None,
        )
        .unwrap();

    let updated = index.containment_last_updated(&tx, &parent).unwrap();
    assert!(updated.is_some_and(|at| at >= datetime!(2022-01-01 00:00:00 UTC)));
}

#[test]
fn last_updated_in_a_transaction_includes_staged_work() {
    let index = index();
    let direct = Transaction::implicit();
    let parent = rid("/p");
    index.add_contained_by(&direct, &ResourceId::root(), &parent).unwrap();
    assert!(index.containment_last_updated(&direct, &parent).unwrap().is_none());

    let tx = long_running("tx-updated");
    index
        .add_contained_by_at(
            &tx,
            &parent,
            &rid("/p/c"),
            Some(datetime!(2023-05-06 07:08:09 UTC)),
            None,
        )
        .unwrap();
    assert_eq!(
        index.containment_last_updated(&tx, &parent).unwrap(),
        Some(datetime!(2023-05-06 07:08:09 UTC))
    );
    assert!(index.containment_last_updated(&direct, &parent).unwrap().is_none());

    index.commit_transaction(&tx).unwrap();
    assert_eq!(
        index.containment_last_updated(&direct, &parent).unwrap(),
        Some(datetime!(2023-05-06 07:08:09 UTC))
    );
}

#[test]
fn re_adding_a_live_child_keeps_its_start() {
    let index = index();
    let tx = Transaction::implicit();
    let start = datetime!(2020-02-02 02:02:02 UTC);
    index
        .add_contained_by_at(&tx, &rid("/p"), &rid("/p/c"), Some(start), None)
        .unwrap();
    index.add_contained_by(&tx, &rid("/q"), &rid("/p/c")).unwrap();

    let memento = rid("/p/c").as_memento(datetime!(2020-06-01 00:00:00 UTC)).unwrap();
    assert_eq!(
        index.get_contained_by(&tx, &memento).unwrap().as_deref(),
        Some("info:fedora/q")
    );
}

#[test]
fn has_resources_starting_with_matches_descendants_only() {
    let index = index();
    let tx = Transaction::implicit();
    index.add_contained_by(&tx, &rid("/a"), &rid("/a/b")).unwrap();
    assert!(index.has_resources_starting_with(&tx, &rid("/a")).unwrap());
    assert!(!index.has_resources_starting_with(&tx, &rid("/a/b")).unwrap());
    assert!(!index.has_resources_starting_with(&tx, &rid("/ab")).unwrap());
    assert!(index.has_resources_starting_with(&tx, &ResourceId::root()).unwrap());
}

#[test]
fn writes_through_a_closed_long_running_transaction_fail() {
    let index = index();
    let tx = long_running("tx-closed");
    tx.rollback().unwrap();
    let err = index
        .add_contained_by(&tx, &rid("/p"), &rid("/p/c"))
        .unwrap_err();
    assert_eq!(err.closed_reason(), Some(crate::ClosedReason::RolledBack));
    assert_eq!(staged_rows(&index), 0);
    assert!(children(&index, &Transaction::implicit(), "/p").is_empty());
}

#[test]
fn reset_and_clear_empty_the_tables() {
    let index = index();
    let direct = Transaction::implicit();
    index.add_contained_by(&direct, &rid("/p"), &rid("/p/a")).unwrap();
    let tx = long_running("tx-clear");
    index.add_contained_by(&tx, &rid("/p"), &rid("/p/b")).unwrap();

    index.clear_all_transactions().unwrap();
    assert_eq!(staged_rows(&index), 0);
    assert_eq!(children(&index, &direct, "/p"), vec!["info:fedora/p/a"]);

    assert!(index.resource_exists(&direct, &rid("/p/a"), false).unwrap());
    index.reset().unwrap();
    assert!(children(&index, &direct, "/p").is_empty());
    assert!(!index.resource_exists(&direct, &rid("/p/a"), false).unwrap());
    assert!(index.get_contained_by(&direct, &rid("/p/a")).unwrap().is_none());
}

#[test]
fn reads_through_an_expired_transaction_fail_until_rolled_back() {
    let index = index();
    let tx = long_running("tx-expired");
    index.add_contained_by(&tx, &rid("/p"), &rid("/p/c")).unwrap();
    tx.expire();

    let mut cursor = index.get_contains(&tx, &rid("/p"));
    let err = cursor.next().unwrap().unwrap_err();
    assert_eq!(err.closed_reason(), Some(crate::ClosedReason::Expired));
    assert!(cursor.next().is_none());
    let err = index.resource_exists(&tx, &rid("/p/c"), false).unwrap_err();
    assert_eq!(err.closed_reason(), Some(crate::ClosedReason::Expired));
    assert!(index.get_contained_by(&tx, &rid("/p/c")).is_err());
    assert!(index.containment_last_updated(&tx, &rid("/p")).is_err());

    tx.rollback().unwrap();
    assert!(children(&index, &tx, "/p").is_empty());
    assert!(!index.resource_exists(&tx, &rid("/p/c"), false).unwrap());
}
