//! # canopy-tree
//!
//! Immutable, versioned tree snapshots for Canopy.
//!
//! This crate implements:
//! - Versioned tree nodes with structural sharing
//! - Copy-on-write node builders
//! - Path-copying subtree edits
//! - A current-root holder with atomic install
//!
//! ## Example
//!
//! ```rust
//! use canopy_common::types::{InstancePath, Version};
//! use canopy_tree::{modify, RawNode, TreeNode};
//!
//! let raw = RawNode::container("root", vec![RawNode::leaf("a", "1")]);
//! let v1 = TreeNode::create_recursively_at(&raw, Version::new(1)).unwrap();
//! let v2 = modify::write_subtree(
//!     &v1,
//!     &InstancePath::root(),
//!     &RawNode::leaf("b", "2"),
//!     Version::new(2),
//! )
//! .unwrap();
//!
//! assert_eq!(v1.child_count(), 1);
//! assert_eq!(v2.child_count(), 2);
//! assert_eq!(v2.subtree_version(), Version::new(2));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Current-root holder
pub mod data_tree;

/// Tree errors
pub mod error;

/// Path-copying edits
pub mod modify;

/// Versioned nodes and builders
pub mod node;

/// Schema-less data nodes
pub mod raw;

pub use data_tree::DataTree;
pub use error::{TreeError, TreeResult};
pub use node::{ChildMap, DataNode, TreeNode, TreeNodeBuilder};
pub use raw::RawNode;
