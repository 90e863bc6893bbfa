//! Tree error types.

use canopy_common::error::{CanopyError, ErrorCode};
use canopy_common::types::InstancePath;
use thiserror::Error;

/// Errors raised while building or editing tree nodes.
///
/// `InvalidState` signals a programming error in the caller (a builder was
/// finalized without satisfying its invariants) and is returned
/// synchronously from the offending call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A builder invariant was violated.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the violated invariant.
        message: String,
    },

    /// No node exists at the requested path.
    #[error("node not found at {path}")]
    NodeNotFound {
        /// The path that could not be resolved.
        path: InstancePath,
    },

    /// The operation needs at least one path argument.
    #[error("operation requires a non-empty path")]
    EmptyPath,

    /// A raw input tree nests deeper than supported.
    #[error("input tree exceeds maximum depth {max_depth}")]
    DepthExceeded {
        /// The enforced limit.
        max_depth: usize,
    },
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

impl TreeError {
    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            Self::EmptyPath => ErrorCode::InvalidArgument,
            Self::DepthExceeded { .. } => ErrorCode::DepthExceeded,
        }
    }
}

impl From<TreeError> for CanopyError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::InvalidState { message } => CanopyError::InvalidState { message },
            TreeError::NodeNotFound { path } => CanopyError::NodeNotFound {
                path: path.to_string(),
            },
            TreeError::EmptyPath => CanopyError::invalid_argument("empty path"),
            TreeError::DepthExceeded { max_depth } => CanopyError::DepthExceeded { max_depth },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TreeError::NodeNotFound {
            path: InstancePath::parse("/a/b"),
        };
        assert_eq!(err.to_string(), "node not found at /a/b");
        assert_eq!(err.code(), ErrorCode::NodeNotFound);
    }

    #[test]
    fn test_into_canopy_error() {
        let err: CanopyError = TreeError::invalid_state("payload missing").into();
        assert_eq!(err.code(), ErrorCode::InvalidState);
        assert_eq!(err.to_string(), "invalid state: payload missing");

        let err: CanopyError = TreeError::EmptyPath.into();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_codes_survive_conversion() {
        let errors = [
            TreeError::invalid_state("x"),
            TreeError::NodeNotFound {
                path: InstancePath::parse("/a"),
            },
            TreeError::EmptyPath,
            TreeError::DepthExceeded { max_depth: 512 },
        ];
        for err in errors {
            let code = err.code();
            let converted: CanopyError = err.into();
            assert_eq!(converted.code(), code);
        }

        let err: CanopyError = TreeError::DepthExceeded { max_depth: 512 }.into();
        assert_eq!(err.to_string(), "input tree exceeds maximum depth 512");
    }
}
