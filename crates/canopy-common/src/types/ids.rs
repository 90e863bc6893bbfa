//! Core identifier types for Canopy.
//!
//! These types provide type-safe wrappers around numeric identifiers,
//! preventing accidental misuse of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical version of a tree node or subtree.
///
/// Versions are monotonically increasing counters assigned by the store
/// when a transaction writes. A node records both the version at which its
/// own payload was written and the version of the latest write anywhere
/// below it, so "did anything change since X" is a single comparison.
///
/// # Example
///
/// ```rust
/// use canopy_common::types::Version;
///
/// let v = Version::new(5);
/// assert!(v > Version::ZERO);
/// assert_eq!(v.next().as_u64(), 6);
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Version(u64);

impl Version {
    /// Version of base nodes that were never written.
    pub const ZERO: Self = Self(0);

    /// Largest representable version.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a new `Version` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next version.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the larger of two versions.
    #[inline]
    #[must_use]
    pub const fn max(self, other: Self) -> Self {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    #[inline]
    fn from(version: u64) -> Self {
        Self::new(version)
    }
}

impl From<Version> for u64 {
    #[inline]
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Transaction identifier - uniquely identifies a commit transaction.
///
/// Transaction IDs are assigned by the commit coordinator and are only
/// used for tracking and logging.
///
/// # Example
///
/// ```rust
/// use canopy_common::types::TxnId;
///
/// let txn = TxnId::new(1);
/// assert!(txn.is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TxnId(u64);

impl TxnId {
    /// Invalid transaction ID, used as a sentinel value.
    pub const INVALID: Self = Self(0);

    /// Minimum valid transaction ID.
    pub const MIN: Self = Self(1);

    /// Creates a new `TxnId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next transaction ID.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Checks if this is a valid transaction ID.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "TxnId(INVALID)")
        } else {
            write!(f, "TxnId({})", self.0)
        }
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TxnId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<TxnId> for u64 {
    #[inline]
    fn from(id: TxnId) -> Self {
        id.0
    }
}

/// Position of a participant in a transaction's ordered participant list.
///
/// The coordinator never inspects the participant handle itself; outcomes
/// refer to participants by this index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ParticipantId(usize);

impl ParticipantId {
    /// Creates a participant ID from its position.
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the position in the participant list.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for ParticipantId {
    #[inline]
    fn from(index: usize) -> Self {
        Self::new(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let v = Version::new(7);
        assert_eq!(v.as_u64(), 7);
        assert_eq!(v.next(), Version::new(8));
        assert_eq!(Version::MAX.next(), Version::MAX);
        assert_eq!(Version::default(), Version::ZERO);
    }

    #[test]
    fn test_version_max() {
        assert_eq!(Version::new(3).max(Version::new(9)), Version::new(9));
        assert_eq!(Version::new(9).max(Version::new(3)), Version::new(9));
    }

    #[test]
    fn test_txn_id() {
        let txn = TxnId::new(100);
        assert_eq!(txn.as_u64(), 100);
        assert!(txn.is_valid());
        assert!(!TxnId::INVALID.is_valid());
        assert_eq!(txn.next().as_u64(), 101);
    }

    #[test]
    fn test_participant_id_display() {
        let id = ParticipantId::new(2);
        assert_eq!(id.index(), 2);
        assert_eq!(id.to_string(), "#2");
        assert_eq!(format!("{:?}", id), "ParticipantId(2)");
    }

    #[test]
    fn test_ordering() {
        assert!(Version::new(1) < Version::new(2));
        assert!(TxnId::new(1) < TxnId::new(2));
        assert!(ParticipantId::new(0) < ParticipantId::new(1));
    }
}
