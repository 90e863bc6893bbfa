//! Scripted in-memory participant.
//!
//! [`MemoryCohort`] answers every request from a per-step script, which
//! makes it the building block for simulations and protocol tests:
//!
//! ```ignore
//! let cohort = MemoryCohort::new("replica-2", root)
//!     .with_reply(Step::CanCommit, Reply::No)
//!     .with_delay(Duration::from_millis(5));
//! ```
//!
//! It keeps its own [`DataTree`] so tests can check whether a candidate was
//! installed, records every request it receives, and notices if the
//! coordinator ever sends it two requests at once.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use canopy_common::types::TxnId;
use canopy_tree::{DataNode, DataTree, TreeNode};
use parking_lot::Mutex;
use tracing::trace;

use super::{CohortError, CohortFuture, CohortResult, CommitCohort};
use crate::phase::Step;

/// Scripted answer to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Vote yes, or succeed.
    Yes,
    /// Vote no. For commit and abort this is a failure.
    No,
    /// Resolve with [`CohortError::Unreachable`].
    Unreachable,
    /// Resolve with [`CohortError::Failed`].
    Fail,
    /// Never resolve.
    Hang,
}

/// A request received by a [`MemoryCohort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortCall {
    /// The step requested.
    pub step: Step,
    /// The transaction it was requested for.
    pub txn_id: TxnId,
}

/// Decrements the in-flight counter when a request finishes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory participant driven by a script.
pub struct MemoryCohort<D> {
    name: String,
    tree: DataTree<D>,
    replies: HashMap<Step, Reply>,
    delay: Option<Duration>,
    staged: Mutex<HashMap<TxnId, Arc<TreeNode<D>>>>,
    calls: Mutex<Vec<CohortCall>>,
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
}

impl<D: DataNode> MemoryCohort<D> {
    /// Creates a cohort answering yes to everything, holding `root`.
    pub fn new(name: impl Into<String>, root: Arc<TreeNode<D>>) -> Self {
        Self {
            name: name.into(),
            tree: DataTree::new(root),
            replies: HashMap::new(),
            delay: None,
            staged: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
        }
    }

    /// Scripts the reply for `step`.
    #[must_use]
    pub fn with_reply(mut self, step: Step, reply: Reply) -> Self {
        self.replies.insert(step, reply);
        self
    }

    /// Delays every answer by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the cohort's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cohort's current root.
    pub fn current(&self) -> Arc<TreeNode<D>> {
        self.tree.snapshot()
    }

    /// Returns every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<CohortCall> {
        self.calls.lock().clone()
    }

    /// Returns the steps received for `txn_id`, in arrival order.
    pub fn steps(&self, txn_id: TxnId) -> Vec<Step> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.txn_id == txn_id)
            .map(|call| call.step)
            .collect()
    }

    /// Returns true if `step` was requested for `txn_id`.
    pub fn received(&self, txn_id: TxnId, step: Step) -> bool {
        self.steps(txn_id).contains(&step)
    }

    /// Returns true if two requests were ever outstanding at once.
    pub fn saw_concurrent_requests(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    /// Returns true if a candidate is staged for `txn_id`.
    pub fn has_staged(&self, txn_id: TxnId) -> bool {
        self.staged.lock().contains_key(&txn_id)
    }

    fn reply_for(&self, step: Step) -> Reply {
        self.replies.get(&step).copied().unwrap_or(Reply::Yes)
    }

    /// Records the request and waits out the scripted delay.
    async fn answer(&self, step: Step, txn_id: TxnId) -> Reply {
        self.calls.lock().push(CohortCall { step, txn_id });
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let _in_flight = InFlight(&self.in_flight);

        let reply = self.reply_for(step);
        trace!(cohort = %self.name, %txn_id, %step, ?reply, "request received");
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if reply == Reply::Hang {
            futures::future::pending::<()>().await;
        }
        reply
    }

    fn vote(&self, step: Step, reply: Reply) -> CohortResult<bool> {
        match reply {
            Reply::Yes => Ok(true),
            Reply::No => Ok(false),
            Reply::Unreachable => Err(CohortError::Unreachable(format!(
                "{} dropped {step}",
                self.name
            ))),
            Reply::Fail | Reply::Hang => Err(CohortError::Failed(format!(
                "{} failed {step}",
                self.name
            ))),
        }
    }

    fn ack(&self, step: Step, reply: Reply) -> CohortResult<()> {
        match self.vote(step, reply)? {
            true => Ok(()),
            false => Err(CohortError::Failed(format!("{} refused {step}", self.name))),
        }
    }
}

impl<D: DataNode> CommitCohort<D> for MemoryCohort<D> {
    fn can_commit(&self, txn_id: TxnId, _candidate: Arc<TreeNode<D>>) -> CohortFuture<'_, bool> {
        Box::pin(async move {
            let reply = self.answer(Step::CanCommit, txn_id).await;
            self.vote(Step::CanCommit, reply)
        })
    }

    fn pre_commit(&self, txn_id: TxnId, candidate: Arc<TreeNode<D>>) -> CohortFuture<'_, bool> {
        Box::pin(async move {
            let reply = self.answer(Step::PreCommit, txn_id).await;
            let vote = self.vote(Step::PreCommit, reply)?;
            if vote {
                self.staged.lock().insert(txn_id, candidate);
            }
            Ok(vote)
        })
    }

    fn commit(&self, txn_id: TxnId) -> CohortFuture<'_, ()> {
        Box::pin(async move {
            let reply = self.answer(Step::Commit, txn_id).await;
            self.ack(Step::Commit, reply)?;
            if let Some(candidate) = self.staged.lock().remove(&txn_id) {
                self.tree.install(candidate);
            }
            Ok(())
        })
    }

    fn abort(&self, txn_id: TxnId) -> CohortFuture<'_, ()> {
        Box::pin(async move {
            let reply = self.answer(Step::Abort, txn_id).await;
            self.staged.lock().remove(&txn_id);
            self.ack(Step::Abort, reply)
        })
    }
}

impl<D: DataNode> fmt::Debug for MemoryCohort<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCohort")
            .field("name", &self.name)
            .field("replies", &self.replies)
            .field("delay", &self.delay)
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_common::types::Version;
    use canopy_tree::RawNode;

    fn root() -> Arc<TreeNode<RawNode>> {
        TreeNode::create_empty(RawNode::leaf("root", ""))
    }

    fn candidate() -> Arc<TreeNode<RawNode>> {
        TreeNode::create_recursively_at(
            &RawNode::container("root", vec![RawNode::leaf("a", "1")]),
            Version::new(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_default_script_commits() {
        let cohort = MemoryCohort::new("c1", root());
        let txn = TxnId::new(1);
        let candidate = candidate();

        assert!(cohort.can_commit(txn, Arc::clone(&candidate)).await.unwrap());
        assert!(cohort.pre_commit(txn, Arc::clone(&candidate)).await.unwrap());
        assert!(cohort.has_staged(txn));
        cohort.commit(txn).await.unwrap();

        assert!(Arc::ptr_eq(&cohort.current(), &candidate));
        assert_eq!(
            cohort.steps(txn),
            vec![Step::CanCommit, Step::PreCommit, Step::Commit]
        );
        assert!(!cohort.saw_concurrent_requests());
    }

    #[tokio::test]
    async fn test_scripted_replies() {
        let cohort = MemoryCohort::new("c2", root())
            .with_reply(Step::CanCommit, Reply::No)
            .with_reply(Step::PreCommit, Reply::Unreachable)
            .with_reply(Step::Commit, Reply::Fail);
        let txn = TxnId::new(1);

        assert!(!cohort.can_commit(txn, candidate()).await.unwrap());
        assert!(matches!(
            cohort.pre_commit(txn, candidate()).await,
            Err(CohortError::Unreachable(_))
        ));
        assert!(matches!(
            cohort.commit(txn).await,
            Err(CohortError::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_abort_discards_staged() {
        let cohort = MemoryCohort::new("c3", root());
        let txn = TxnId::new(4);
        let before = cohort.current();

        assert!(cohort.pre_commit(txn, candidate()).await.unwrap());
        cohort.abort(txn).await.unwrap();

        assert!(!cohort.has_staged(txn));
        assert!(Arc::ptr_eq(&cohort.current(), &before));
        assert!(cohort.received(txn, Step::Abort));
    }

    #[tokio::test]
    async fn test_detects_overlapping_requests() {
        let cohort = MemoryCohort::new("c4", root()).with_delay(Duration::from_millis(20));
        let txn = TxnId::new(1);

        let (a, b) = tokio::join!(
            cohort.can_commit(txn, candidate()),
            cohort.can_commit(txn, candidate())
        );
        assert!(a.unwrap() && b.unwrap());
        assert!(cohort.saw_concurrent_requests());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_resolves() {
        let cohort = MemoryCohort::new("c5", root()).with_reply(Step::CanCommit, Reply::Hang);
        let result = tokio::time::timeout(
            Duration::from_secs(60),
            cohort.can_commit(TxnId::new(1), candidate()),
        )
        .await;
        assert!(result.is_err());
    }
}
