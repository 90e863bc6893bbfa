//! Node identifiers and paths.
//!
//! A [`PathArgument`] names a node among its siblings; an [`InstancePath`]
//! is the sequence of arguments leading from some root to a node.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifier of a tree node among its siblings.
///
/// Cheap to clone: the name is shared behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use canopy_common::types::PathArgument;
///
/// let arg = PathArgument::new("interfaces");
/// assert_eq!(arg.as_str(), "interfaces");
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathArgument(Arc<str>);

impl PathArgument {
    /// Creates a new path argument.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the name as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PathArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathArgument({:?})", &*self.0)
    }
}

impl fmt::Display for PathArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PathArgument {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PathArgument {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PathArgument {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// A path from a root node to one of its descendants.
///
/// The empty path designates the root itself.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct InstancePath(Vec<PathArgument>);

impl InstancePath {
    /// Creates the empty (root) path.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Parses a slash separated path such as `/a/b/c`.
    ///
    /// Empty segments are skipped, so `"/"` and `""` both yield the root.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|segment| !segment.is_empty())
                .map(PathArgument::new)
                .collect(),
        )
    }

    /// Returns a new path with `arg` appended.
    #[must_use]
    pub fn child(&self, arg: impl Into<PathArgument>) -> Self {
        let mut args = self.0.clone();
        args.push(arg.into());
        Self(args)
    }

    /// Returns the parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .split_last()
            .map(|(_, parent)| Self(parent.to_vec()))
    }

    /// Returns the last path argument, or `None` for the root.
    #[must_use]
    pub fn last(&self) -> Option<&PathArgument> {
        self.0.last()
    }

    /// Returns the arguments as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[PathArgument] {
        &self.0
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if this is the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstancePath({})", self)
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for arg in &self.0 {
            write!(f, "/{}", arg)?;
        }
        Ok(())
    }
}

impl From<Vec<PathArgument>> for InstancePath {
    fn from(args: Vec<PathArgument>) -> Self {
        Self(args)
    }
}

impl From<&[PathArgument]> for InstancePath {
    fn from(args: &[PathArgument]) -> Self {
        Self(args.to_vec())
    }
}

impl FromIterator<PathArgument> for InstancePath {
    fn from_iter<I: IntoIterator<Item = PathArgument>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_path_argument_borrow_lookup() {
        let mut map = HashMap::new();
        map.insert(PathArgument::new("x"), 1);
        assert_eq!(map.get("x"), Some(&1));
        assert_eq!(map.get("y"), None);
    }

    #[test]
    fn test_parse_and_display() {
        let path = InstancePath::parse("/a/b//c/");
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "/a/b/c");
        assert_eq!(InstancePath::parse("/").to_string(), "/");
        assert!(InstancePath::parse("").is_empty());
    }

    #[test]
    fn test_parent_and_child() {
        let path = InstancePath::parse("/a/b");
        assert_eq!(path.last().map(PathArgument::as_str), Some("b"));
        assert_eq!(path.parent(), Some(InstancePath::parse("/a")));
        assert_eq!(InstancePath::root().parent(), None);
        assert_eq!(path.child("c"), InstancePath::parse("/a/b/c"));
    }
}
