//! # canopy-common
//!
//! Common types, errors, and configuration for Canopy.
//!
//! This crate provides the foundational types shared by the versioned tree
//! and the commit coordinator. It includes:
//!
//! - **Types**: Identifiers (`Version`, `TxnId`, `ParticipantId`) and node
//!   paths (`PathArgument`, `InstancePath`)
//! - **Errors**: Unified error handling with `CanopyError`
//! - **Config**: Commit coordinator configuration, loadable from TOML
//! - **Constants**: Defaults and limits
//!
//! ## Example
//!
//! ```rust
//! use canopy_common::types::{InstancePath, Version};
//! use canopy_common::error::CanopyResult;
//!
//! fn example() -> CanopyResult<()> {
//!     let version = Version::new(1);
//!     let path = InstancePath::parse("/interfaces/eth0");
//!     assert_eq!(path.len(), 2);
//!     assert!(version > Version::ZERO);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{CanopyError, CanopyResult, ErrorCode};
pub use types::{InstancePath, ParticipantId, PathArgument, TxnId, Version};
