//! Participant backed by a shared [`DataTree`].

use std::fmt;
use std::sync::Arc;

use canopy_common::types::TxnId;
use canopy_tree::{DataNode, DataTree, TreeNode};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{CohortError, CohortFuture, CommitCohort};

/// Where a tree cohort stands in its transaction.
enum State<D> {
    /// Waiting for the votes.
    Open,
    /// The candidate passed preCommit and waits for installation.
    Staged(Arc<TreeNode<D>>),
    /// The candidate is installed.
    Committed(Arc<TreeNode<D>>),
    /// The transaction was abandoned.
    Aborted,
}

/// A participant that installs candidates into a [`DataTree`].
///
/// The cohort is bound to the base snapshot the transaction computed its
/// candidate from. It votes no as soon as the tree's root has moved away
/// from that base, and installs with a compare-and-install so a concurrent
/// writer can never be overwritten.
pub struct TreeCohort<D> {
    tree: Arc<DataTree<D>>,
    base: Arc<TreeNode<D>>,
    state: Mutex<State<D>>,
}

impl<D: DataNode> TreeCohort<D> {
    /// Creates a cohort whose transaction read `base`.
    pub fn new(tree: Arc<DataTree<D>>, base: Arc<TreeNode<D>>) -> Self {
        Self {
            tree,
            base,
            state: Mutex::new(State::Open),
        }
    }

    /// Creates a cohort bound to the tree's current root.
    pub fn at_current(tree: Arc<DataTree<D>>) -> Self {
        let base = tree.snapshot();
        Self::new(tree, base)
    }

    /// Returns the base snapshot.
    pub fn base(&self) -> &Arc<TreeNode<D>> {
        &self.base
    }

    /// Returns the underlying tree.
    pub fn tree(&self) -> &Arc<DataTree<D>> {
        &self.tree
    }

    fn vote(&self, txn_id: TxnId, candidate: Arc<TreeNode<D>>, stage: bool) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, State::Open | State::Staged(_)) {
            return false;
        }
        if !self.tree.is_current(&self.base) {
            warn!(%txn_id, base = %self.base.subtree_version(), current = %self.tree.version(), "root moved since base, voting no");
            return false;
        }
        if stage {
            *state = State::Staged(candidate);
        }
        true
    }

    fn install(&self, txn_id: TxnId) -> Result<(), CohortError> {
        let mut state = self.state.lock();
        let candidate = match &*state {
            State::Staged(candidate) => Arc::clone(candidate),
            State::Committed(_) => return Ok(()),
            State::Open => return Err(CohortError::Failed("no candidate staged".into())),
            State::Aborted => return Err(CohortError::Failed("transaction aborted".into())),
        };

        match self.tree.compare_and_install(&self.base, Arc::clone(&candidate)) {
            Ok(()) => {}
            Err(current) if Arc::ptr_eq(&current, &candidate) => {}
            Err(current) => {
                warn!(%txn_id, current = %current.subtree_version(), "root moved before install");
                return Err(CohortError::Failed(
                    "root moved since the transaction started".into(),
                ));
            }
        }
        debug!(%txn_id, version = %candidate.subtree_version(), "candidate installed");
        *state = State::Committed(candidate);
        Ok(())
    }
}

impl<D: DataNode> CommitCohort<D> for TreeCohort<D> {
    fn can_commit(&self, txn_id: TxnId, candidate: Arc<TreeNode<D>>) -> CohortFuture<'_, bool> {
        Box::pin(async move { Ok(self.vote(txn_id, candidate, false)) })
    }

    fn pre_commit(&self, txn_id: TxnId, candidate: Arc<TreeNode<D>>) -> CohortFuture<'_, bool> {
        Box::pin(async move { Ok(self.vote(txn_id, candidate, true)) })
    }

    fn commit(&self, txn_id: TxnId) -> CohortFuture<'_, ()> {
        Box::pin(async move { self.install(txn_id) })
    }

    fn abort(&self, txn_id: TxnId) -> CohortFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock();
            if !matches!(*state, State::Committed(_)) {
                debug!(%txn_id, "discarding staged candidate");
                *state = State::Aborted;
            }
            Ok(())
        })
    }
}

impl<D: DataNode> fmt::Debug for TreeCohort<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            State::Open => "Open",
            State::Staged(_) => "Staged",
            State::Committed(_) => "Committed",
            State::Aborted => "Aborted",
        };
        f.debug_struct("TreeCohort")
            .field("base_version", &self.base.subtree_version())
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_common::types::{InstancePath, Version};
    use canopy_tree::{modify, RawNode};

    fn tree() -> Arc<DataTree<RawNode>> {
        Arc::new(DataTree::empty(RawNode::leaf("root", "")))
    }

    fn candidate_from(base: &Arc<TreeNode<RawNode>>, id: &str) -> Arc<TreeNode<RawNode>> {
        let version = base.subtree_version().next();
        modify::write_subtree(base, &InstancePath::root(), &RawNode::leaf(id, "v"), version)
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_installs_candidate() {
        let tree = tree();
        let cohort = TreeCohort::at_current(Arc::clone(&tree));
        let candidate = candidate_from(cohort.base(), "a");
        let txn = TxnId::new(1);

        assert!(cohort.can_commit(txn, Arc::clone(&candidate)).await.unwrap());
        assert!(cohort.pre_commit(txn, Arc::clone(&candidate)).await.unwrap());
        cohort.commit(txn).await.unwrap();

        assert!(tree.is_current(&candidate));
        assert_eq!(tree.version(), Version::new(1));

        // Repeating commit is harmless
        cohort.commit(txn).await.unwrap();
        assert!(tree.is_current(&candidate));
    }

    #[tokio::test]
    async fn test_votes_no_after_concurrent_write() {
        let tree = tree();
        let cohort = TreeCohort::at_current(Arc::clone(&tree));
        let candidate = candidate_from(cohort.base(), "a");

        tree.install(candidate_from(cohort.base(), "other"));

        let txn = TxnId::new(1);
        assert!(!cohort.can_commit(txn, candidate).await.unwrap());
    }

    #[tokio::test]
    async fn test_commit_fails_if_root_moved_after_pre_commit() {
        let tree = tree();
        let cohort = TreeCohort::at_current(Arc::clone(&tree));
        let candidate = candidate_from(cohort.base(), "a");
        let txn = TxnId::new(1);

        assert!(cohort.pre_commit(txn, Arc::clone(&candidate)).await.unwrap());
        let other = candidate_from(cohort.base(), "other");
        tree.install(Arc::clone(&other));

        assert!(matches!(
            cohort.commit(txn).await,
            Err(CohortError::Failed(_))
        ));
        assert!(tree.is_current(&other));
    }

    #[tokio::test]
    async fn test_abort_leaves_tree_untouched() {
        let tree = tree();
        let cohort = TreeCohort::at_current(Arc::clone(&tree));
        let base = Arc::clone(cohort.base());
        let candidate = candidate_from(&base, "a");
        let txn = TxnId::new(1);

        assert!(cohort.pre_commit(txn, candidate).await.unwrap());
        cohort.abort(txn).await.unwrap();
        cohort.abort(txn).await.unwrap();

        assert!(tree.is_current(&base));
        assert!(cohort.commit(txn).await.is_err());
    }

    #[tokio::test]
    async fn test_commit_without_staging_fails() {
        let cohort = TreeCohort::at_current(tree());
        assert!(cohort.commit(TxnId::new(1)).await.is_err());
    }
}
