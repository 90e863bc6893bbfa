//! Schema-less data nodes.
//!
//! [`RawNode`] is the simplest [`DataNode`]: an identifier, an opaque byte
//! value and an ordered list of children. It is what tests and the
//! in-memory cohorts store in their trees.

use std::sync::Arc;

use bytes::Bytes;
use canopy_common::types::PathArgument;

use crate::node::DataNode;

/// A schema-less data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNode {
    identifier: PathArgument,
    value: Bytes,
    children: Arc<[RawNode]>,
}

impl RawNode {
    /// Creates a leaf with a value.
    pub fn leaf(identifier: impl Into<PathArgument>, value: impl Into<Bytes>) -> Self {
        Self {
            identifier: identifier.into(),
            value: value.into(),
            children: Arc::from(Vec::new()),
        }
    }

    /// Creates a container with no value of its own.
    pub fn container(identifier: impl Into<PathArgument>, children: Vec<RawNode>) -> Self {
        Self {
            identifier: identifier.into(),
            value: Bytes::new(),
            children: Arc::from(children),
        }
    }

    /// Returns the value bytes.
    #[inline]
    pub fn value(&self) -> &Bytes {
        &self.value
    }
}

impl DataNode for RawNode {
    fn identifier(&self) -> &PathArgument {
        &self.identifier
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}
