//! Wrapper identity guarantees of the pool.

use witness::doc::{ContainerId, ContainerKind, Doc};
use witness::observe::{ObservableValue, Pool};

#[test]
fn repeated_resolution_returns_the_same_wrapper() {
    let doc = Doc::new();
    let pool = Pool::new(&doc);

    let first = pool.get(doc.map("profile"));
    let second = pool.get(doc.map("profile"));
    assert_eq!(first, second);

    // Resolution through a value hits the same registry entry
    let list = pool.get(doc.list("entries"));
    let via_value = list.push_container(ContainerKind::Map);
    let again = list.get(0).expect("element present");
    assert_eq!(via_value, again);
}

#[test]
fn map_and_tree_sharing_a_name_are_distinct() {
    let doc = Doc::new();
    let pool = Pool::new(&doc);

    let map = pool.get(doc.map("workspace"));
    let tree = pool.get(doc.tree("workspace"));

    assert_eq!(map.id().name, tree.id().name);
    assert_ne!(map.id(), tree.id());
    assert_eq!(pool.size(), 2);
}

#[test]
fn every_kind_gets_its_own_registry_slot() {
    let doc = Doc::new();
    let pool = Pool::new(&doc);

    pool.get(doc.map("x"));
    pool.get(doc.list("x"));
    pool.get(doc.movable_list("x"));
    pool.get(doc.text("x"));
    pool.get(doc.tree("x"));

    assert_eq!(pool.size(), 5);
    assert_eq!(pool.size_of(ContainerKind::Map), 1);
    assert_eq!(pool.size_of(ContainerKind::Tree), 1);
    for kind in [
        ContainerKind::Map,
        ContainerKind::List,
        ContainerKind::MovableList,
        ContainerKind::Text,
        ContainerKind::Tree,
    ] {
        assert!(pool.has(&ContainerId::root(kind, "x")));
    }
}

#[test]
fn nested_wrapper_identity_survives_re_reads() {
    let doc = Doc::new();
    let pool = Pool::new(&doc);
    let list = pool.get(doc.movable_list("blocks"));

    let pushed = list.push_container(ContainerKind::Text);
    let text = pushed.as_text().expect("pushed a text").clone();
    text.insert(0, "hello").expect("in bounds");

    // Reading the element back resolves to the identical wrapper
    match list.get(0).expect("element present") {
        ObservableValue::Text(found) => assert_eq!(found, text),
        other => panic!("expected a text wrapper, got {:?}", other),
    }
    let from_vec = list.to_vec().remove(0);
    assert_eq!(from_vec.as_text(), Some(&text));
}

#[test]
fn deeply_nested_containers_resolve_through_the_pool() {
    let doc = Doc::new();
    let pool = Pool::new(&doc);
    let root = pool.get(doc.map("root"));

    let inner_map = root
        .insert_container("child", ContainerKind::Map)
        .as_map()
        .expect("nested map")
        .clone();
    let inner_list = inner_map
        .insert_container("items", ContainerKind::List)
        .as_list()
        .expect("nested list")
        .clone();
    inner_list.push(1);

    let resolved = root
        .get("child")
        .and_then(|v| v.as_map().cloned())
        .and_then(|m| m.get("items"))
        .and_then(|v| v.as_list().cloned())
        .expect("nested chain resolves");
    assert_eq!(resolved, inner_list);
    assert_eq!(resolved.len(), 1);
}

#[test]
fn clear_instance_affects_only_that_identity() {
    let doc = Doc::new();
    let pool = Pool::new(&doc);

    let a = pool.get(doc.map("a"));
    let b = pool.get(doc.map("b"));

    pool.clear_instance(a.id());
    assert!(!pool.has(a.id()));
    assert!(pool.has(b.id()));

    let fresh = pool.get(doc.map("a"));
    assert_ne!(fresh, a);
    assert_eq!(pool.get(doc.map("b")), b);
}

#[test]
fn dispose_twice_is_harmless() {
    let doc = Doc::new();
    let pool = Pool::new(&doc);
    pool.get(doc.map("a"));
    pool.get(doc.tree("b"));

    pool.dispose();
    pool.dispose();
    assert_eq!(pool.size(), 0);
    assert!(pool.is_disposed());
}

#[test]
fn independent_pools_do_not_share_wrappers() {
    let doc = Doc::new();
    let pool_a = Pool::new(&doc);
    let pool_b = Pool::new(&doc);

    let from_a = pool_a.get(doc.map("shared"));
    let from_b = pool_b.get(doc.map("shared"));

    // Same container, different pools: distinct wrappers
    assert_ne!(from_a, from_b);
    assert!(!pool_a.same_pool(&pool_b));

    // But both read the same underlying state
    from_a.insert("x", 1);
    assert!(from_b.contains_key("x"));
}
