//! Error handling for Canopy.
//!
//! This module provides a unified error type and result alias used
//! across all Canopy components.

mod store;

pub use store::{CanopyError, ErrorCode};

/// Result type alias for Canopy operations.
pub type CanopyResult<T> = std::result::Result<T, CanopyError>;
