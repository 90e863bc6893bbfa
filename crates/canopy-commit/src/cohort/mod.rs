//! Commit participants.
//!
//! A cohort is one participant of a three-phase commit. The coordinator
//! only ever talks to it through the [`CommitCohort`] trait; how the
//! requests reach the participant (in process, over the network, through an
//! actor system) is the implementation's business.
//!
//! - `TreeCohort`: participant owning a shared [`DataTree`](canopy_tree::DataTree)
//! - `MemoryCohort`: scripted participant for simulations and tests
//!
//! # Contract
//!
//! - Each request resolves in bounded time, with an error if the
//!   participant cannot be reached.
//! - `commit` is idempotent: repeating it after success succeeds again.
//! - `abort` is always safe, including for a transaction the participant
//!   has never heard of.
//! - The coordinator never has two requests for the same transaction
//!   outstanding at one participant.

mod memory;
mod tree;

pub use memory::{CohortCall, MemoryCohort, Reply};
pub use tree::TreeCohort;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use canopy_common::types::TxnId;
use canopy_tree::TreeNode;
use thiserror::Error;

/// Errors a participant request can resolve with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CohortError {
    /// The participant could not be reached.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The request did not resolve in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The participant answered with a failure.
    #[error("failed: {0}")]
    Failed(String),

    /// The request was withdrawn before it resolved.
    #[error("cancelled")]
    Cancelled,
}

/// Result type for participant requests.
pub type CohortResult<T> = Result<T, CohortError>;

/// Future returned by participant requests.
pub type CohortFuture<'a, T> = Pin<Box<dyn Future<Output = CohortResult<T>> + Send + 'a>>;

/// A participant in a three-phase commit over tree snapshots of `D`.
pub trait CommitCohort<D>: Send + Sync {
    /// First vote: can the participant apply `candidate`?
    fn can_commit(&self, txn_id: TxnId, candidate: Arc<TreeNode<D>>) -> CohortFuture<'_, bool>;

    /// Second vote: the participant prepares `candidate` for installation.
    fn pre_commit(&self, txn_id: TxnId, candidate: Arc<TreeNode<D>>) -> CohortFuture<'_, bool>;

    /// Installs the prepared candidate as the participant's current root.
    fn commit(&self, txn_id: TxnId) -> CohortFuture<'_, ()>;

    /// Discards anything staged for the transaction.
    fn abort(&self, txn_id: TxnId) -> CohortFuture<'_, ()>;
}
