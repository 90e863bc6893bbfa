//! Immutable, versioned tree nodes.
//!
//! A [`TreeNode`] is one node of a snapshot. It carries the opaque data
//! supplied by the schema layer, two version stamps and a map of children.
//! Nodes are never mutated once built: an update produces a new node that
//! shares every unchanged child with its predecessor, and the same is done
//! for each ancestor up to the root.
//!
//! ```text
//!        v1 root                  v2 root'
//!        /     \                  /     \
//!       a       b      ──▶       a      b'      (a shared, b rebuilt)
//!              / \                     /  \
//!             c   d                   c    d'   (c shared, d written)
//! ```
//!
//! # Versions
//!
//! - `node_version`: the version at which the node's own data was written.
//! - `subtree_version`: the version of the latest write anywhere below and
//!   including the node. Comparing it against a remembered version answers
//!   "did anything here change since X" without walking the subtree.
//!
//! Every node satisfies `subtree_version >= node_version` and
//! `subtree_version >= child.subtree_version` for all its children.

mod builder;

pub use builder::TreeNodeBuilder;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use canopy_common::constants::MAX_INGEST_DEPTH;
use canopy_common::types::{PathArgument, Version};

use crate::error::{TreeError, TreeResult};

/// Children of a node, keyed by each child's identifier.
pub type ChildMap<D> = HashMap<PathArgument, Arc<TreeNode<D>>>;

/// Data carried by a tree node.
///
/// The tree never interprets the data beyond asking for its identifier.
/// Container data may also expose its child data nodes, which is what
/// [`TreeNode::create_recursively`] walks when ingesting a whole subtree.
pub trait DataNode: Clone + fmt::Debug + Send + Sync + 'static {
    /// Identifier of this data node among its siblings.
    fn identifier(&self) -> &PathArgument;

    /// Direct child data nodes. Leaves return an empty slice.
    fn child_nodes(&self) -> &[Self] {
        &[]
    }
}

/// One node of an immutable snapshot.
pub struct TreeNode<D> {
    data: D,
    node_version: Version,
    subtree_version: Version,
    children: Arc<ChildMap<D>>,
}

impl<D: DataNode> TreeNode<D> {
    /// Creates a childless base node at version zero.
    #[must_use]
    pub fn create_empty(data: D) -> Arc<Self> {
        Arc::new(Self {
            data,
            node_version: Version::ZERO,
            subtree_version: Version::ZERO,
            children: Arc::new(ChildMap::new()),
        })
    }

    /// Starts an empty builder targeting `version`.
    #[must_use]
    pub fn builder(version: Version) -> TreeNodeBuilder<D> {
        TreeNodeBuilder::new(version)
    }

    /// Starts a builder seeded with `node`'s version and children.
    ///
    /// Data and subtree version are not carried over and must be set
    /// again before the builder can be finalized.
    #[must_use]
    pub fn builder_from(node: &TreeNode<D>) -> TreeNodeBuilder<D> {
        TreeNodeBuilder::from_node(node)
    }

    /// Builds a versioned tree from raw data, stamping every node with the
    /// same pair of versions.
    ///
    /// Fails with `InvalidState` if `subtree_version < node_version`, or
    /// with `DepthExceeded` if the input nests deeper than
    /// [`MAX_INGEST_DEPTH`].
    pub fn create_recursively(
        data: &D,
        node_version: Version,
        subtree_version: Version,
    ) -> TreeResult<Arc<Self>> {
        Self::create_recursively_at_depth(data, node_version, subtree_version, 0)
    }

    /// Builds a versioned tree from raw data with both stamps set to
    /// `version`.
    pub fn create_recursively_at(data: &D, version: Version) -> TreeResult<Arc<Self>> {
        Self::create_recursively(data, version, version)
    }

    fn create_recursively_at_depth(
        data: &D,
        node_version: Version,
        subtree_version: Version,
        depth: usize,
    ) -> TreeResult<Arc<Self>> {
        if depth >= MAX_INGEST_DEPTH {
            return Err(TreeError::DepthExceeded {
                max_depth: MAX_INGEST_DEPTH,
            });
        }

        let mut builder = Self::builder(node_version);
        builder
            .set_data(data.clone())
            .set_subtree_version(subtree_version);
        for child in data.child_nodes() {
            builder.add_child(Self::create_recursively_at_depth(
                child,
                node_version,
                subtree_version,
                depth + 1,
            )?);
        }
        builder.build()
    }

    /// Returns the node's identifier, taken from its data.
    #[inline]
    pub fn identifier(&self) -> &PathArgument {
        self.data.identifier()
    }

    /// Resolves a relative path of identifiers below this node.
    ///
    /// The empty path resolves to the node itself.
    pub fn find(self: &Arc<Self>, path: &[PathArgument]) -> Option<Arc<Self>> {
        let mut current = self;
        for arg in path {
            current = current.children.get(arg)?;
        }
        Some(Arc::clone(current))
    }
}

impl<D> TreeNode<D> {
    pub(crate) fn from_parts(
        data: D,
        node_version: Version,
        subtree_version: Version,
        children: Arc<ChildMap<D>>,
    ) -> Self {
        Self {
            data,
            node_version,
            subtree_version,
            children,
        }
    }

    /// Returns the node's data.
    #[inline]
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Returns the version at which this node's data was written.
    #[inline]
    pub fn node_version(&self) -> Version {
        self.node_version
    }

    /// Returns the version of the latest write within this subtree.
    #[inline]
    pub fn subtree_version(&self) -> Version {
        self.subtree_version
    }

    /// Returns the child with the given identifier.
    pub fn child<Q>(&self, id: &Q) -> Option<&Arc<TreeNode<D>>>
    where
        PathArgument: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.children.get(id)
    }

    /// Iterates over the children in no particular order.
    pub fn children(&self) -> impl Iterator<Item = (&PathArgument, &Arc<TreeNode<D>>)> {
        self.children.iter()
    }

    /// Returns the number of children.
    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns true if the node has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true if both nodes hold the very same children map.
    pub fn shares_children_with(&self, other: &TreeNode<D>) -> bool {
        Arc::ptr_eq(&self.children, &other.children)
    }

    pub(crate) fn children_map(&self) -> &Arc<ChildMap<D>> {
        &self.children
    }
}

impl<D: DataNode> fmt::Display for TreeNode<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TreeNode [identifier={}, nodeVersion={}]",
            self.identifier(),
            self.node_version
        )
    }
}

impl<D: fmt::Debug> fmt::Debug for TreeNode<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("data", &self.data)
            .field("node_version", &self.node_version)
            .field("subtree_version", &self.subtree_version)
            .field("children", &self.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawNode;
    use proptest::prelude::*;

    fn v(n: u64) -> Version {
        Version::new(n)
    }

    fn leaf(id: &str) -> RawNode {
        RawNode::leaf(id, id.to_uppercase())
    }

    /// Node "a" at version 1 with a single child "x".
    fn node_with_child_x() -> Arc<TreeNode<RawNode>> {
        let x = TreeNode::create_recursively_at(&leaf("x"), v(1)).unwrap();
        let mut builder = TreeNode::builder(v(1));
        builder
            .set_data(RawNode::leaf("a", "A"))
            .set_subtree_version(v(1))
            .add_child(x);
        builder.build().unwrap()
    }

    fn assert_invariants(node: &TreeNode<RawNode>) {
        assert!(node.subtree_version() >= node.node_version());
        for (key, child) in node.children() {
            assert_eq!(key, child.identifier());
            assert!(node.subtree_version() >= child.subtree_version());
            assert_invariants(child);
        }
    }

    #[test]
    fn test_create_empty() {
        let node = TreeNode::create_empty(leaf("root"));
        assert_eq!(node.node_version(), Version::ZERO);
        assert_eq!(node.subtree_version(), Version::ZERO);
        assert!(node.is_leaf());
        assert_eq!(node.identifier().as_str(), "root");
    }

    #[test]
    fn test_build_leaf_at_version_five() {
        let mut builder = TreeNode::builder(v(5));
        builder
            .set_data(RawNode::leaf("root", "root"))
            .set_subtree_version(v(5));
        let node = builder.build().unwrap();

        assert_eq!(node.node_version(), v(5));
        assert_eq!(node.subtree_version(), v(5));
        assert_eq!(node.child_count(), 0);
    }

    #[test]
    fn test_build_without_data_fails() {
        let mut builder = TreeNode::<RawNode>::builder(v(1));
        builder.set_subtree_version(v(1));
        assert!(matches!(
            builder.build(),
            Err(TreeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_build_without_subtree_version_fails() {
        let mut builder = TreeNode::builder(v(1));
        builder.set_data(leaf("a"));
        assert!(matches!(
            builder.build(),
            Err(TreeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_build_with_subtree_below_node_version_fails() {
        let mut builder = TreeNode::builder(v(3));
        builder.set_data(leaf("a")).set_subtree_version(v(2));
        assert!(matches!(
            builder.build(),
            Err(TreeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_build_with_newer_child_fails() {
        let child = TreeNode::create_recursively_at(&leaf("c"), v(7)).unwrap();
        let mut builder = TreeNode::builder(v(2));
        builder
            .set_data(leaf("p"))
            .set_subtree_version(v(4))
            .add_child(child);
        assert!(matches!(
            builder.build(),
            Err(TreeError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_remove_child_keeps_original() {
        let a = node_with_child_x();

        let mut builder = TreeNode::builder_from(&a);
        builder
            .remove_child("x")
            .set_data(a.data().clone())
            .set_subtree_version(v(2));
        let updated = builder.build().unwrap();

        assert!(updated.is_leaf());
        assert_eq!(updated.subtree_version(), v(2));
        assert_eq!(updated.node_version(), v(1));
        assert!(a.child("x").is_some());
        assert_eq!(a.child_count(), 1);
    }

    #[test]
    fn test_seeded_builder_shares_children_until_mutated() {
        let a = node_with_child_x();

        let mut builder = TreeNode::builder_from(&a);
        builder.set_data(a.data().clone()).set_subtree_version(v(1));
        let copy = builder.build().unwrap();
        assert!(copy.shares_children_with(&a));

        builder.add_child(TreeNode::create_recursively_at(&leaf("y"), v(1)).unwrap());
        let extended = builder.build().unwrap();
        assert!(!extended.shares_children_with(&a));
        assert_eq!(extended.child_count(), 2);
        assert_eq!(copy.child_count(), 1);
        assert_eq!(a.child_count(), 1);
    }

    #[test]
    fn test_builder_reuse_does_not_leak_into_published_node() {
        let mut builder = TreeNode::builder(v(1));
        builder
            .set_data(leaf("p"))
            .set_subtree_version(v(1))
            .add_child(TreeNode::create_recursively_at(&leaf("a"), v(1)).unwrap());
        let first = builder.build().unwrap();

        builder.remove_child("a");
        builder.add_child(TreeNode::create_recursively_at(&leaf("b"), v(1)).unwrap());
        let second = builder.build().unwrap();

        assert!(first.child("a").is_some());
        assert!(first.child("b").is_none());
        assert!(second.child("a").is_none());
        assert!(second.child("b").is_some());
    }

    #[test]
    fn test_remove_absent_child_is_noop() {
        let a = node_with_child_x();
        let mut builder = TreeNode::builder_from(&a);
        builder
            .remove_child("missing")
            .set_data(a.data().clone())
            .set_subtree_version(v(1));
        let node = builder.build().unwrap();
        assert_eq!(node.child_count(), 1);
    }

    #[test]
    fn test_add_child_replaces_same_identifier() {
        let mut builder = TreeNode::builder(v(2));
        builder
            .set_data(leaf("p"))
            .set_subtree_version(v(2))
            .add_child(TreeNode::create_recursively_at(&RawNode::leaf("x", "old"), v(1)).unwrap())
            .add_child(TreeNode::create_recursively_at(&RawNode::leaf("x", "new"), v(2)).unwrap());
        let node = builder.build().unwrap();

        assert_eq!(node.child_count(), 1);
        let x = node.child("x").unwrap();
        assert_eq!(x.data().value().as_ref(), b"new");
        assert_eq!(x.node_version(), v(2));
    }

    #[test]
    fn test_create_recursively_depth_three() {
        let raw = RawNode::container(
            "root",
            vec![
                RawNode::container("a", vec![leaf("a1"), leaf("a2")]),
                RawNode::container("b", vec![RawNode::container("b1", vec![leaf("b11")])]),
            ],
        );
        let tree = TreeNode::create_recursively_at(&raw, v(9)).unwrap();

        fn check(node: &TreeNode<RawNode>, raw: &RawNode) {
            assert_eq!(node.node_version(), Version::new(9));
            assert_eq!(node.subtree_version(), Version::new(9));
            assert_eq!(node.identifier(), raw.identifier());
            assert_eq!(node.child_count(), raw.child_nodes().len());
            for raw_child in raw.child_nodes() {
                check(node.child(raw_child.identifier()).unwrap(), raw_child);
            }
        }
        check(&tree, &raw);
    }

    #[test]
    fn test_create_recursively_rejects_inverted_versions() {
        let result = TreeNode::create_recursively(&leaf("a"), v(4), v(3));
        assert!(matches!(result, Err(TreeError::InvalidState { .. })));
    }

    #[test]
    fn test_create_recursively_rejects_deep_input() {
        let mut raw = leaf("bottom");
        for i in 0..MAX_INGEST_DEPTH {
            raw = RawNode::container(format!("n{i}"), vec![raw]);
        }
        let result = TreeNode::create_recursively_at(&raw, v(1));
        assert!(matches!(result, Err(TreeError::DepthExceeded { .. })));
    }

    #[test]
    fn test_find() {
        let raw = RawNode::container("root", vec![RawNode::container("a", vec![leaf("b")])]);
        let tree = TreeNode::create_recursively_at(&raw, v(1)).unwrap();

        let path = [PathArgument::new("a"), PathArgument::new("b")];
        assert_eq!(tree.find(&path).unwrap().identifier().as_str(), "b");
        assert!(Arc::ptr_eq(&tree.find(&[]).unwrap(), &tree));
        assert!(tree.find(&[PathArgument::new("zz")]).is_none());
    }

    #[test]
    fn test_display() {
        let node = TreeNode::create_recursively_at(&leaf("eth0"), v(3)).unwrap();
        assert_eq!(node.to_string(), "TreeNode [identifier=eth0, nodeVersion=3]");
    }

    /// Builder operations applied in property tests.
    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Remove(u8),
        Build,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..6).prop_map(Op::Add),
            (0u8..6).prop_map(Op::Remove),
            Just(Op::Build),
        ]
    }

    fn arb_raw(depth: u32) -> impl Strategy<Value = RawNode> {
        let leaf = "[a-e]{1,2}".prop_map(|id| RawNode::leaf(id.as_str(), id.clone()));
        leaf.prop_recursive(depth, 32, 4, |inner| {
            ("[a-e]{1,2}", prop::collection::vec(inner, 0..4)).prop_map(|(id, children)| {
                RawNode::container(id, children)
            })
        })
    }

    proptest! {
        #[test]
        fn prop_published_nodes_never_change(ops in prop::collection::vec(arb_op(), 1..40)) {
            let base = node_with_child_x();
            let base_keys: Vec<_> = base.children().map(|(k, _)| k.clone()).collect();

            let mut builder = TreeNode::builder_from(&base);
            builder.set_data(base.data().clone()).set_subtree_version(v(1));

            // Every published node paired with the keys it had when built.
            let mut published: Vec<(Arc<TreeNode<RawNode>>, Vec<PathArgument>)> = Vec::new();
            let mut mutated_since_seed = false;

            for op in ops {
                match op {
                    Op::Add(n) => {
                        let id = format!("c{n}");
                        builder.add_child(TreeNode::create_recursively_at(&leaf(&id), v(1)).unwrap());
                        mutated_since_seed = true;
                    }
                    Op::Remove(n) => {
                        builder.remove_child(format!("c{n}").as_str());
                        mutated_since_seed = true;
                    }
                    Op::Build => {
                        let node = builder.build().unwrap();
                        if !mutated_since_seed {
                            prop_assert!(node.shares_children_with(&base));
                        }
                        let mut keys: Vec<_> = node.children().map(|(k, _)| k.clone()).collect();
                        keys.sort();
                        published.push((node, keys));
                    }
                }
            }

            for (node, keys) in &published {
                let mut now: Vec<_> = node.children().map(|(k, _)| k.clone()).collect();
                now.sort();
                prop_assert_eq!(&now, keys);
            }
            let mut base_now: Vec<_> = base.children().map(|(k, _)| k.clone()).collect();
            base_now.sort();
            let mut base_keys = base_keys;
            base_keys.sort();
            prop_assert_eq!(base_now, base_keys);
        }

        #[test]
        fn prop_ingested_trees_hold_invariants(raw in arb_raw(3), version in 0u64..1000) {
            let tree = TreeNode::create_recursively_at(&raw, Version::new(version)).unwrap();
            assert_invariants(&tree);
        }
    }
}
