//! Versioned tree integration tests.
//!
//! These tests build histories of snapshots through the public API and
//! check that old snapshots stay intact while new ones share structure.

use std::sync::Arc;

use canopy_common::types::{InstancePath, Version};
use canopy_test::utils::{device_config, ingest, init_tracing};
use canopy_tree::{modify, DataTree, RawNode, TreeNode};
use proptest::prelude::*;

fn check_versions(node: &TreeNode<RawNode>) {
    assert!(node.subtree_version() >= node.node_version());
    for (id, child) in node.children() {
        assert_eq!(id, child.identifier());
        assert!(node.subtree_version() >= child.subtree_version());
        check_versions(child);
    }
}

#[test]
fn test_history_of_snapshots() {
    init_tracing();

    let v1 = ingest(&device_config(), 1);
    let v2 = modify::write_subtree(
        &v1,
        &InstancePath::parse("/interfaces/eth0"),
        &RawNode::leaf("mtu", "9000"),
        Version::new(2),
    )
    .unwrap();
    let v3 = modify::delete_subtree(&v2, &InstancePath::parse("/interfaces/lo"), Version::new(3))
        .unwrap();
    let v4 = modify::write_subtree(
        &v3,
        &InstancePath::parse("/system"),
        &RawNode::leaf("domain", "example.net"),
        Version::new(4),
    )
    .unwrap();

    let mtu = InstancePath::parse("/interfaces/eth0/mtu");
    let lo = InstancePath::parse("/interfaces/lo");

    assert_eq!(v1.find(mtu.as_slice()).unwrap().data().value().as_ref(), b"1500");
    assert_eq!(v4.find(mtu.as_slice()).unwrap().data().value().as_ref(), b"9000");
    assert!(v2.find(lo.as_slice()).is_some());
    assert!(v3.find(lo.as_slice()).is_none());

    // The interfaces subtree did not change between v3 and v4
    assert!(Arc::ptr_eq(
        v3.child("interfaces").unwrap(),
        v4.child("interfaces").unwrap()
    ));
    // Nor did eth0 between v2 and v3
    let eth0 = InstancePath::parse("/interfaces/eth0");
    assert!(Arc::ptr_eq(
        &v2.find(eth0.as_slice()).unwrap(),
        &v3.find(eth0.as_slice()).unwrap()
    ));

    assert_eq!(v4.subtree_version(), Version::new(4));
    assert_eq!(v4.child("interfaces").unwrap().subtree_version(), Version::new(3));
    for snapshot in [&v1, &v2, &v3, &v4] {
        check_versions(snapshot);
    }
}

#[test]
fn test_data_tree_readers_keep_their_snapshot() {
    init_tracing();

    let tree = DataTree::new(ingest(&device_config(), 1));
    let reader = tree.snapshot();

    let next = modify::write_subtree(
        &reader,
        &InstancePath::root(),
        &RawNode::leaf("ntp", "pool.ntp.org"),
        Version::new(2),
    )
    .unwrap();
    assert!(tree.compare_and_install(&reader, Arc::clone(&next)).is_ok());

    assert_eq!(reader.child_count(), 2);
    assert_eq!(tree.snapshot().child_count(), 3);
    assert_eq!(tree.version(), Version::new(2));

    // A writer still holding the old root loses
    let stale = modify::write_subtree(
        &reader,
        &InstancePath::root(),
        &RawNode::leaf("dns", "1.1.1.1"),
        Version::new(2),
    )
    .unwrap();
    assert!(tree.compare_and_install(&reader, stale).is_err());
    assert!(tree.is_current(&next));
}

#[test]
fn test_builder_reused_across_versions() {
    let v1 = ingest(&device_config(), 1);

    let mut builder = TreeNode::builder_from(&v1);
    builder
        .set_data(v1.data().clone())
        .set_subtree_version(Version::new(1));
    let same = builder.build().unwrap();
    assert!(same.shares_children_with(&v1));

    builder
        .remove_child("system")
        .set_subtree_version(Version::new(2));
    let trimmed = builder.build().unwrap();

    builder.add_child(ingest(&RawNode::leaf("motd", "hello"), 2));
    let extended = builder.build().unwrap();

    assert_eq!(v1.child_count(), 2);
    assert_eq!(same.child_count(), 2);
    assert_eq!(trimmed.child_count(), 1);
    assert_eq!(extended.child_count(), 2);
    assert!(extended.child("motd").is_some());
    assert!(trimmed.child("motd").is_none());
}

/// Every node's path and value, sorted.
fn flatten(node: &TreeNode<RawNode>, prefix: &InstancePath, out: &mut Vec<(String, Vec<u8>)>) {
    out.push((prefix.to_string(), node.data().value().to_vec()));
    for (id, child) in node.children() {
        flatten(child, &prefix.child(id.clone()), out);
    }
}

fn contents(node: &TreeNode<RawNode>) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    flatten(node, &InstancePath::root(), &mut out);
    out.sort();
    out
}

fn arb_edit() -> impl Strategy<Value = (bool, u8, u8)> {
    (any::<bool>(), 0u8..4, 0u8..4)
}

proptest! {
    #[test]
    fn prop_random_edits_keep_history_and_invariants(edits in prop::collection::vec(arb_edit(), 1..30)) {
        let mut history = vec![ingest(&device_config(), 0)];
        let mut shapes = vec![contents(&history[0])];

        for (index, (delete, group, leaf)) in edits.into_iter().enumerate() {
            let current = Arc::clone(&history[history.len() - 1]);
            let version = Version::new(index as u64 + 1);
            let group_path = InstancePath::root().child(format!("g{group}"));

            let next = if delete {
                match modify::delete_subtree(&current, &group_path.child(format!("l{leaf}")), version) {
                    Ok(next) => next,
                    Err(_) => continue,
                }
            } else {
                let with_group = if current.child(format!("g{group}").as_str()).is_some() {
                    current
                } else {
                    modify::write_subtree(&current, &InstancePath::root(), &RawNode::container(format!("g{group}"), vec![]), version).unwrap()
                };
                modify::write_subtree(&with_group, &group_path, &RawNode::leaf(format!("l{leaf}"), format!("{index}")), version).unwrap()
            };

            check_versions(&next);
            prop_assert_eq!(next.subtree_version(), version);
            shapes.push(contents(&next));
            history.push(next);
        }

        // Older snapshots keep their contents and their invariants
        for (snapshot, shape) in history.iter().zip(&shapes) {
            prop_assert_eq!(&contents(snapshot), shape);
            check_versions(snapshot);
        }
    }
}
