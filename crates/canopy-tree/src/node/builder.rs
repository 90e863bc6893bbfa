//! Copy-on-write builder for [`TreeNode`].

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use canopy_common::types::{PathArgument, Version};

use super::{ChildMap, DataNode, TreeNode};
use crate::error::{TreeError, TreeResult};

/// Ownership state of the builder's children map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildrenState {
    /// The map may be referenced by a published node and must be copied
    /// before the next mutation.
    SharingPublished,
    /// The map is private to this builder.
    PrivateCopy,
}

/// Mutable accumulator that produces immutable [`TreeNode`]s.
///
/// A builder may be finalized any number of times. Each call to
/// [`build`](Self::build) publishes the current children map to the new
/// node; the next mutation copies the map first, so nothing done to the
/// builder afterwards is ever visible through a node it produced.
///
/// ```
/// use canopy_common::types::Version;
/// use canopy_tree::{RawNode, TreeNode};
///
/// let mut builder = TreeNode::builder(Version::new(1));
/// builder
///     .set_data(RawNode::leaf("root", "r"))
///     .set_subtree_version(Version::new(1));
/// let node = builder.build().unwrap();
/// assert!(node.is_leaf());
/// ```
#[derive(Debug)]
pub struct TreeNodeBuilder<D> {
    data: Option<D>,
    node_version: Version,
    subtree_version: Option<Version>,
    children: Arc<ChildMap<D>>,
    state: ChildrenState,
}

impl<D: DataNode> TreeNodeBuilder<D> {
    pub(super) fn new(version: Version) -> Self {
        Self {
            data: None,
            node_version: version,
            subtree_version: None,
            children: Arc::new(ChildMap::new()),
            state: ChildrenState::PrivateCopy,
        }
    }

    pub(super) fn from_node(node: &TreeNode<D>) -> Self {
        Self {
            data: None,
            node_version: node.node_version(),
            subtree_version: None,
            children: Arc::clone(node.children_map()),
            state: ChildrenState::SharingPublished,
        }
    }

    /// Sets the data of the node being built.
    pub fn set_data(&mut self, data: D) -> &mut Self {
        self.data = Some(data);
        self
    }

    /// Sets the subtree version of the node being built.
    pub fn set_subtree_version(&mut self, version: Version) -> &mut Self {
        self.subtree_version = Some(version);
        self
    }

    /// Inserts `child` under its identifier, replacing any previous child
    /// with the same identifier.
    pub fn add_child(&mut self, child: Arc<TreeNode<D>>) -> &mut Self {
        let key = child.identifier().clone();
        self.children_mut().insert(key, child);
        self
    }

    /// Removes the child with the given identifier, if present.
    pub fn remove_child<Q>(&mut self, id: &Q) -> &mut Self
    where
        PathArgument: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.children.contains_key(id) {
            self.children_mut().remove(id);
        }
        self
    }

    /// Returns the version the built node will carry.
    pub fn node_version(&self) -> Version {
        self.node_version
    }

    /// Returns the child currently held under `id`.
    pub fn child<Q>(&self, id: &Q) -> Option<&Arc<TreeNode<D>>>
    where
        PathArgument: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.children.get(id)
    }

    /// Produces an immutable node from the current state.
    ///
    /// Fails with `InvalidState` if the data or subtree version is unset,
    /// or if the subtree version is older than the node version or than
    /// any child's subtree version.
    pub fn build(&mut self) -> TreeResult<Arc<TreeNode<D>>> {
        let Some(data) = self.data.clone() else {
            return Err(TreeError::invalid_state("node data has not been set"));
        };
        let Some(subtree_version) = self.subtree_version else {
            return Err(TreeError::invalid_state("subtree version has not been set"));
        };
        if subtree_version < self.node_version {
            return Err(TreeError::invalid_state(format!(
                "subtree version {subtree_version} is older than node version {}",
                self.node_version
            )));
        }
        if let Some(child) = self
            .children
            .values()
            .find(|child| child.subtree_version() > subtree_version)
        {
            return Err(TreeError::invalid_state(format!(
                "child {} at subtree version {} is newer than parent subtree version {subtree_version}",
                child.identifier(),
                child.subtree_version()
            )));
        }

        self.state = ChildrenState::SharingPublished;
        Ok(Arc::new(TreeNode::from_parts(
            data,
            self.node_version,
            subtree_version,
            Arc::clone(&self.children),
        )))
    }

    /// Single entry point for mutating the children map.
    fn children_mut(&mut self) -> &mut ChildMap<D> {
        if self.state == ChildrenState::SharingPublished {
            self.children = Arc::new(ChildMap::clone(&self.children));
            self.state = ChildrenState::PrivateCopy;
        }
        Arc::make_mut(&mut self.children)
    }
}
