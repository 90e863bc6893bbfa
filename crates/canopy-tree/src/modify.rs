//! Path-copying edits.
//!
//! Each edit returns a new root. Only the nodes on the edited path are
//! rebuilt; every other child is shared with the old root. Rebuilt
//! ancestors keep their data and node version and take `version` as their
//! subtree version.

use std::sync::Arc;

use canopy_common::types::{InstancePath, PathArgument, Version};
use tracing::trace;

use crate::error::{TreeError, TreeResult};
use crate::node::{DataNode, TreeNode, TreeNodeBuilder};

/// Ingests `data` as a child of the node at `parent`, replacing any child
/// with the same identifier.
///
/// Every node of the ingested subtree is stamped with `version`.
pub fn write_subtree<D: DataNode>(
    root: &Arc<TreeNode<D>>,
    parent: &InstancePath,
    data: &D,
    version: Version,
) -> TreeResult<Arc<TreeNode<D>>> {
    let subtree = TreeNode::create_recursively_at(data, version)?;
    trace!(%parent, id = %data.identifier(), %version, "writing subtree");
    rebuild_path(root, parent.as_slice(), version, |builder| {
        builder.add_child(subtree);
        Ok(())
    })
}

/// Removes the node at `path`.
///
/// Fails with `EmptyPath` for the root itself and with `NodeNotFound` if
/// nothing exists at `path`.
pub fn delete_subtree<D: DataNode>(
    root: &Arc<TreeNode<D>>,
    path: &InstancePath,
    version: Version,
) -> TreeResult<Arc<TreeNode<D>>> {
    let Some((last, parent)) = path.as_slice().split_last() else {
        return Err(TreeError::EmptyPath);
    };
    trace!(%path, %version, "deleting subtree");
    rebuild_path(root, parent, version, |builder| {
        if builder.child(last).is_none() {
            return Err(TreeError::NodeNotFound { path: path.clone() });
        }
        builder.remove_child(last);
        Ok(())
    })
}

/// Applies `edit` to the node at `parent` and rebuilds every ancestor.
fn rebuild_path<D, F>(
    root: &Arc<TreeNode<D>>,
    parent: &[PathArgument],
    version: Version,
    edit: F,
) -> TreeResult<Arc<TreeNode<D>>>
where
    D: DataNode,
    F: FnOnce(&mut TreeNodeBuilder<D>) -> TreeResult<()>,
{
    let mut current = Arc::clone(root);
    let mut ancestors = Vec::with_capacity(parent.len());
    for (depth, arg) in parent.iter().enumerate() {
        let next = current
            .child(arg)
            .cloned()
            .ok_or_else(|| TreeError::NodeNotFound {
                path: InstancePath::from(&parent[..=depth]),
            })?;
        ancestors.push(std::mem::replace(&mut current, next));
    }

    let mut builder = TreeNode::builder_from(&current);
    edit(&mut builder)?;
    let mut rebuilt = restamp(builder, &current, version)?;

    for ancestor in ancestors.into_iter().rev() {
        let mut builder = TreeNode::builder_from(&ancestor);
        builder.add_child(rebuilt);
        rebuilt = restamp(builder, &ancestor, version)?;
    }
    Ok(rebuilt)
}

fn restamp<D: DataNode>(
    mut builder: TreeNodeBuilder<D>,
    original: &TreeNode<D>,
    version: Version,
) -> TreeResult<Arc<TreeNode<D>>> {
    builder
        .set_data(original.data().clone())
        .set_subtree_version(version);
    builder.build()
}
