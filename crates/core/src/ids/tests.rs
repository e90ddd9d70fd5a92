use super::*;
use time::macros::datetime;

#[test]
fn parses_prefixed_and_bare_paths_to_the_same_id() {
    let a = ResourceId::parse("info:fedora/a/b").unwrap();
    let b = ResourceId::parse("/a/b/").unwrap();
    let c = ResourceId::parse("a/b").unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(a.full_path(), "/a/b");
    assert!(!a.is_memento());
}

#[test]
fn root_forms() {
    for raw in ["info:fedora", "info:fedora/", "/", ""] {
        let id = ResourceId::parse(raw).unwrap();
        assert!(id.is_repository_root(), "{raw} should be the root");
        assert_eq!(id, ResourceId::root());
    }
}

#[test]
fn memento_id_strips_to_base_and_carries_instant() {
    let id = ResourceId::parse("/a/b/fcr:versions/20200102030405").unwrap();
    assert!(id.is_memento());
    assert_eq!(id.base_id(), "info:fedora/a/b");
    assert_eq!(
        id.memento_instant(),
        Some(datetime!(2020-01-02 03:04:05 UTC))
    );
    assert_eq!(id.as_base(), ResourceId::parse("/a/b").unwrap());

    let timemap = ResourceId::parse("/a/b/fcr:versions").unwrap();
    assert!(timemap.is_timemap());
    assert!(!timemap.is_memento());
}

#[test]
fn rejects_malformed_identifiers() {
    assert_eq!(
        ResourceId::parse("/a//b").unwrap_err(),
        ResourceIdError::EmptySegment
    );
    assert_eq!(
        ResourceId::parse("/a#x#y").unwrap_err(),
        ResourceIdError::MultipleHash
    );
    assert_eq!(
        ResourceId::parse("/a/fcr:acl/fcr:versions").unwrap_err(),
        ResourceIdError::InvalidPath
    );
    assert_eq!(
        ResourceId::parse("/a/fcr:versions/2020").unwrap_err(),
        ResourceIdError::InvalidMemento
    );
    assert!(matches!(
        ResourceId::parse("/a/.fcrepo").unwrap_err(),
        ResourceIdError::ForbiddenName(_)
    ));
}

#[test]
fn extensions_are_recognised() {
    let acl = ResourceId::parse("/a/fcr:acl").unwrap();
    assert!(acl.is_acl());
    assert_eq!(acl.base_id(), "info:fedora/a");

    let desc = ResourceId::parse("/a/fcr:metadata").unwrap();
    assert!(desc.is_description());

    let hashed = ResourceId::parse("/a#frag").unwrap();
    assert_eq!(hashed.hash_uri(), Some("frag"));
    assert_eq!(hashed.base_id(), "info:fedora/a");
}

#[test]
fn parent_path_walks_up_to_root() {
    let id = ResourceId::parse("/a/b/c").unwrap();
    let parent = id.parent_path().unwrap();
    assert_eq!(parent.full_id(), "info:fedora/a/b");
    let grand = parent.parent_path().unwrap();
    assert_eq!(grand.full_id(), "info:fedora/a");
    assert!(grand.parent_path().unwrap().is_repository_root());
    assert!(ResourceId::root().parent_path().is_none());
}

#[test]
fn resolve_and_as_memento_use_the_base_id() {
    let memento = ResourceId::parse("/a/fcr:versions/20200102030405").unwrap();
    let child = memento.resolve("child").unwrap();
    assert_eq!(child.full_id(), "info:fedora/a/child");

    let base = ResourceId::parse("/a").unwrap();
    let again = base.as_memento(datetime!(2020-01-02 03:04:05 UTC)).unwrap();
    assert_eq!(again, memento);
    assert!(base.resolve("  ").is_err());
}

#[test]
fn serde_uses_the_full_id_string() {
    let id = ResourceId::parse("/a/b").unwrap();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"info:fedora/a/b\"");
    let back: ResourceId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
