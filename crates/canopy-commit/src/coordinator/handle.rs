//! Caller-side view of a running transaction.

use std::fmt;
use std::sync::Arc;

use canopy_common::types::TxnId;
use canopy_tree::TreeNode;
use tokio::sync::watch;

use crate::error::CommitResult;
use crate::phase::{CommitOutcome, CommitPhase};
use crate::three_phase::ThreePhaseCommit;

/// Handle to a transaction started by
/// [`CommitCoordinator::begin_commit`](super::CommitCoordinator::begin_commit).
///
/// Dropping the handle does not stop the transaction.
pub struct CommitHandle<D> {
    txn: Arc<ThreePhaseCommit<D>>,
}

impl<D: Send + Sync + 'static> CommitHandle<D> {
    pub(super) fn new(txn: Arc<ThreePhaseCommit<D>>) -> Self {
        Self { txn }
    }

    /// Returns the transaction id.
    pub fn txn_id(&self) -> TxnId {
        self.txn.txn_id()
    }

    /// Returns the current phase.
    pub fn phase(&self) -> CommitPhase {
        self.txn.phase()
    }

    /// Subscribes to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<CommitPhase> {
        self.txn.subscribe()
    }

    /// Returns the candidate being committed.
    pub fn candidate(&self) -> &Arc<TreeNode<D>> {
        self.txn.candidate()
    }

    /// Aborts the transaction. See [`ThreePhaseCommit::abort`].
    pub async fn abort(&self) -> CommitResult<()> {
        self.txn.abort().await
    }

    /// Returns the outcome if the transaction is already terminal.
    pub fn try_outcome(&self) -> Option<CommitOutcome> {
        self.txn.outcome()
    }

    /// Waits for the terminal outcome.
    pub async fn outcome(&self) -> CommitOutcome {
        self.txn.wait_outcome().await
    }

    /// Waits for the terminal outcome and maps it onto a result.
    pub async fn wait(&self) -> CommitResult<()> {
        self.outcome().await.into_result(self.txn_id())
    }
}

impl<D> Clone for CommitHandle<D> {
    fn clone(&self) -> Self {
        Self {
            txn: Arc::clone(&self.txn),
        }
    }
}

impl<D> fmt::Debug for CommitHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitHandle").field("txn", &self.txn).finish()
    }
}
