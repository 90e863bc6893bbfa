//! Current-root holder.

use std::sync::Arc;

use canopy_common::types::Version;
use parking_lot::RwLock;
use tracing::debug;

use crate::node::{DataNode, TreeNode};

/// Holds the current root of one store replica.
///
/// Readers take an `Arc` snapshot and keep reading it for as long as they
/// like; writers replace the root with a single pointer swap. Nothing is
/// ever copied on read.
pub struct DataTree<D> {
    root: RwLock<Arc<TreeNode<D>>>,
}

impl<D: DataNode> DataTree<D> {
    /// Creates a tree rooted at `root`.
    pub fn new(root: Arc<TreeNode<D>>) -> Self {
        Self {
            root: RwLock::new(root),
        }
    }

    /// Creates a tree holding an empty root.
    pub fn empty(data: D) -> Self {
        Self::new(TreeNode::create_empty(data))
    }

    /// Returns the current root.
    pub fn snapshot(&self) -> Arc<TreeNode<D>> {
        Arc::clone(&*self.root.read())
    }

    /// Returns the subtree version of the current root.
    pub fn version(&self) -> Version {
        self.root.read().subtree_version()
    }

    /// Unconditionally replaces the root, returning the previous one.
    pub fn install(&self, root: Arc<TreeNode<D>>) -> Arc<TreeNode<D>> {
        let version = root.subtree_version();
        let previous = std::mem::replace(&mut *self.root.write(), root);
        debug!(from = %previous.subtree_version(), to = %version, "installed root");
        previous
    }

    /// Replaces the root only if it is still `expected`.
    ///
    /// Returns the current root on mismatch.
    pub fn compare_and_install(
        &self,
        expected: &Arc<TreeNode<D>>,
        root: Arc<TreeNode<D>>,
    ) -> Result<(), Arc<TreeNode<D>>> {
        let mut guard = self.root.write();
        if !Arc::ptr_eq(&*guard, expected) {
            return Err(Arc::clone(&*guard));
        }
        debug!(from = %guard.subtree_version(), to = %root.subtree_version(), "installed root");
        *guard = root;
        Ok(())
    }

    /// Returns true if the current root is `root`.
    pub fn is_current(&self, root: &Arc<TreeNode<D>>) -> bool {
        Arc::ptr_eq(&*self.root.read(), root)
    }
}

impl<D: DataNode> std::fmt::Debug for DataTree<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataTree")
            .field("root", &*self.root.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawNode;

    #[test]
    fn test_snapshot_survives_install() {
        let tree = DataTree::empty(RawNode::leaf("root", ""));
        let before = tree.snapshot();

        let next = TreeNode::create_recursively_at(
            &RawNode::container("root", vec![RawNode::leaf("a", "1")]),
            Version::new(1),
        )
        .unwrap();
        let previous = tree.install(Arc::clone(&next));

        assert!(Arc::ptr_eq(&previous, &before));
        assert!(before.is_leaf());
        assert!(tree.is_current(&next));
        assert_eq!(tree.version(), Version::new(1));
    }

    #[test]
    fn test_compare_and_install() {
        let tree = DataTree::empty(RawNode::leaf("root", ""));
        let base = tree.snapshot();
        let first = TreeNode::create_recursively_at(&RawNode::leaf("root", "a"), Version::new(1)).unwrap();
        let second = TreeNode::create_recursively_at(&RawNode::leaf("root", "b"), Version::new(1)).unwrap();

        assert!(tree.compare_and_install(&base, Arc::clone(&first)).is_ok());
        let current = tree.compare_and_install(&base, second).unwrap_err();
        assert!(Arc::ptr_eq(&current, &first));
        assert!(tree.is_current(&first));
    }
}
