//! # canopy-commit
//!
//! Three-phase commit coordination for Canopy.
//!
//! This crate provides:
//! - The participant interface (`CommitCohort`) and two implementations
//! - The per-transaction 3PC state machine (`ThreePhaseCommit`)
//! - A coordinator service that runs transactions in the background
//!   (`CommitCoordinator`, `CommitHandle`)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use canopy_common::config::CommitConfig;
//! use canopy_common::types::{InstancePath, Version};
//! use canopy_commit::{CommitCoordinator, CommitOutcome, Participant, TreeCohort};
//! use canopy_tree::{modify, DataTree, RawNode};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let tree = Arc::new(DataTree::empty(RawNode::leaf("root", "")));
//! let base = tree.snapshot();
//! let candidate = modify::write_subtree(
//!     &base,
//!     &InstancePath::root(),
//!     &RawNode::leaf("hostname", "edge-1"),
//!     Version::new(1),
//! )
//! .unwrap();
//!
//! let coordinator = CommitCoordinator::with_config(CommitConfig::default()).unwrap();
//! let cohort: Participant<RawNode> = Arc::new(TreeCohort::new(Arc::clone(&tree), base));
//! let handle = coordinator.begin_commit(candidate, vec![cohort]).unwrap();
//!
//! assert_eq!(handle.outcome().await, CommitOutcome::Committed);
//! assert_eq!(tree.version(), Version::new(1));
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Cancellation tokens
pub mod cancel;

/// Commit participants
pub mod cohort;

/// Coordinator service
pub mod coordinator;

/// Commit errors
pub mod error;

/// Phases and outcomes
pub mod phase;

/// Per-transaction state machine
pub mod three_phase;

pub use cancel::CancelToken;
pub use cohort::{
    CohortCall, CohortError, CohortFuture, CohortResult, CommitCohort, MemoryCohort, Reply,
    TreeCohort,
};
pub use coordinator::{CommitCoordinator, CommitHandle, CommitStats};
pub use error::{CommitError, CommitResult};
pub use phase::{AbortReason, CommitOutcome, CommitPhase, Step};
pub use three_phase::{FinishHook, Participant, ThreePhaseCommit};
