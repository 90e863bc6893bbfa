//! Simulated replica cluster.
//!
//! A [`Cluster`] keeps one [`DataTree`] per replica and applies every write
//! to all of them through the commit coordinator, with one [`TreeCohort`]
//! per replica. Writes are sequenced: a transaction is only started once
//! the previous one is terminal, the way a shard leader queues ready
//! transactions.

use std::sync::Arc;

use canopy_common::config::CommitConfig;
use canopy_common::error::{CanopyError, CanopyResult};
use canopy_common::types::{InstancePath, Version};
use canopy_commit::{CommitCoordinator, CommitOutcome, Participant, TreeCohort};
use canopy_tree::{modify, DataTree, RawNode, TreeNode};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

/// A group of tree replicas kept in sync through three-phase commit.
pub struct Cluster {
    replicas: Vec<Arc<DataTree<RawNode>>>,
    coordinator: CommitCoordinator<RawNode>,
    sequencer: AsyncMutex<()>,
}

impl Cluster {
    /// Creates `replicas` replicas all holding `root`.
    ///
    /// Fails with `InvalidArgument` if `replicas` is zero, or with
    /// `InvalidConfig` if `config` does not validate.
    pub fn new(
        replicas: usize,
        root: Arc<TreeNode<RawNode>>,
        config: CommitConfig,
    ) -> CanopyResult<Self> {
        if replicas == 0 {
            return Err(CanopyError::invalid_argument("a cluster needs at least one replica"));
        }
        Ok(Self {
            replicas: (0..replicas)
                .map(|_| Arc::new(DataTree::new(Arc::clone(&root))))
                .collect(),
            coordinator: CommitCoordinator::with_config(config)?,
            sequencer: AsyncMutex::new(()),
        })
    }

    /// Returns the replicas.
    pub fn replicas(&self) -> &[Arc<DataTree<RawNode>>] {
        &self.replicas
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &CommitCoordinator<RawNode> {
        &self.coordinator
    }

    /// Returns the first replica's current root.
    pub fn snapshot(&self) -> Arc<TreeNode<RawNode>> {
        self.replicas[0].snapshot()
    }

    /// Returns true if every replica holds the very same root.
    pub fn is_consistent(&self) -> bool {
        let root = self.snapshot();
        self.replicas.iter().all(|replica| replica.is_current(&root))
    }

    /// Writes `data` under `parent`, reading the current root.
    pub async fn write(&self, parent: &InstancePath, data: &RawNode) -> CanopyResult<CommitOutcome> {
        let base = self.snapshot();
        self.write_from(base, parent, data).await
    }

    /// Writes `data` under `parent` as a transaction that read `base`.
    ///
    /// Replicas vote no if `base` is no longer their current root.
    pub async fn write_from(
        &self,
        base: Arc<TreeNode<RawNode>>,
        parent: &InstancePath,
        data: &RawNode,
    ) -> CanopyResult<CommitOutcome> {
        let version = base.subtree_version().next();
        let candidate = modify::write_subtree(&base, parent, data, version)?;
        self.commit(base, candidate).await
    }

    /// Deletes the node at `path`, reading the current root.
    pub async fn delete(&self, path: &InstancePath) -> CanopyResult<CommitOutcome> {
        let base = self.snapshot();
        let version = base.subtree_version().next();
        let candidate = modify::delete_subtree(&base, path, version)?;
        self.commit(base, candidate).await
    }

    /// Returns the version of the first replica.
    pub fn version(&self) -> Version {
        self.replicas[0].version()
    }

    async fn commit(
        &self,
        base: Arc<TreeNode<RawNode>>,
        candidate: Arc<TreeNode<RawNode>>,
    ) -> CanopyResult<CommitOutcome> {
        let _sequenced = self.sequencer.lock().await;
        let participants: Vec<Participant<RawNode>> = self
            .replicas
            .iter()
            .map(|replica| {
                Arc::new(TreeCohort::new(Arc::clone(replica), Arc::clone(&base)))
                    as Participant<RawNode>
            })
            .collect();

        let handle = self.coordinator.begin_commit(candidate, participants)?;
        let outcome = handle.outcome().await;
        debug!(txn_id = %handle.txn_id(), %outcome, "cluster write finished");
        Ok(outcome)
    }
}
