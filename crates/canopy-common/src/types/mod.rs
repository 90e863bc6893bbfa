//! Type definitions for Canopy.
//!
//! This module contains the identifier types shared by the tree and the
//! commit coordinator.

mod ids;
mod path;

pub use ids::{ParticipantId, TxnId, Version};
pub use path::{InstancePath, PathArgument};
