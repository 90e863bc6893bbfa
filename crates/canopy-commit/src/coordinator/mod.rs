//! Commit coordinator service.
//!
//! The coordinator accepts candidate snapshots, assigns each a transaction
//! id and drives it through [`ThreePhaseCommit`] on a background task.
//! Callers follow the transaction through the returned [`CommitHandle`].
//!
//! # Transaction lifecycle
//!
//! ```text
//!                begin_commit()
//!                      │
//!                      ▼
//!              ┌───────────────┐   abort()   ┌─────────┐
//!              │    active     │────────────▶│ Aborted │
//!              │ (3PC running) │             └─────────┘
//!              └───────────────┘
//!                 │         │
//!          all ok │         │ commit failed somewhere
//!                 ▼         ▼
//!        ┌───────────┐  ┌────────────────────┐
//!        │ Committed │  │ PartiallyCommitted │
//!        └───────────┘  └────────────────────┘
//! ```
//!
//! Terminal transactions are forgotten; their outcome stays reachable
//! through any handle still held.

mod handle;

pub use handle::CommitHandle;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use canopy_common::config::{CommitConfig, StoreConfig};
use canopy_common::error::CanopyResult;
use canopy_common::types::TxnId;
use canopy_tree::TreeNode;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{CommitError, CommitResult};
use crate::phase::{CommitOutcome, CommitPhase};
use crate::three_phase::{Participant, ThreePhaseCommit};

type TxnMap<D> = RwLock<HashMap<TxnId, Arc<ThreePhaseCommit<D>>>>;

/// Statistics about the commit coordinator.
#[derive(Debug, Default)]
pub struct CommitStats {
    /// Total transactions started.
    pub started: AtomicU64,
    /// Total transactions committed everywhere.
    pub committed: AtomicU64,
    /// Total transactions aborted.
    pub aborted: AtomicU64,
    /// Total transactions that committed only on some participants.
    pub partially_committed: AtomicU64,
    /// Currently active transactions.
    pub active: AtomicU64,
}

impl CommitStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, outcome: &CommitOutcome) {
        let counter = match outcome {
            CommitOutcome::Committed => &self.committed,
            CommitOutcome::Aborted(_) => &self.aborted,
            CommitOutcome::PartiallyCommitted { .. } => &self.partially_committed,
        };
        counter.fetch_add(1, AtomicOrdering::Relaxed);
        self.active.fetch_sub(1, AtomicOrdering::Relaxed);
    }
}

/// Runs three-phase commits over tree snapshots of `D`.
pub struct CommitCoordinator<D> {
    /// Active transactions.
    transactions: Arc<TxnMap<D>>,
    /// Configuration.
    config: CommitConfig,
    /// Statistics.
    stats: Arc<CommitStats>,
    /// Next transaction ID.
    next_txn_id: AtomicU64,
}

impl<D: Send + Sync + 'static> CommitCoordinator<D> {
    /// Creates a coordinator with the default configuration.
    pub fn new() -> Self {
        Self::from_validated(CommitConfig::default())
    }

    /// Creates a coordinator with a custom configuration.
    ///
    /// Fails with `InvalidConfig` if `config` does not validate.
    pub fn with_config(config: CommitConfig) -> CanopyResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Creates a coordinator from the commit section of a store
    /// configuration.
    pub fn from_store_config(config: &StoreConfig) -> CanopyResult<Self> {
        Self::with_config(config.commit.clone())
    }

    fn from_validated(config: CommitConfig) -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
            config,
            stats: Arc::new(CommitStats::new()),
            next_txn_id: AtomicU64::new(TxnId::MIN.as_u64()),
        }
    }

    /// Starts committing `candidate` across `participants`.
    ///
    /// The protocol runs on a background task, so this must be called from
    /// within a Tokio runtime. Participant positions in `participants`
    /// become their [`ParticipantId`](canopy_common::types::ParticipantId)s
    /// in outcomes.
    pub fn begin_commit(
        &self,
        candidate: Arc<TreeNode<D>>,
        participants: Vec<Participant<D>>,
    ) -> CommitResult<CommitHandle<D>> {
        if participants.is_empty() {
            return Err(CommitError::NoParticipants);
        }

        let txn = {
            let mut txns = self.transactions.write();
            let limit = self.config.max_active_transactions;
            if limit > 0 && txns.len() >= limit {
                return Err(CommitError::TooManyTransactions { limit });
            }

            let txn_id = TxnId::new(self.next_txn_id.fetch_add(1, AtomicOrdering::SeqCst));
            let txn = Arc::new(
                ThreePhaseCommit::new(
                    txn_id,
                    candidate,
                    participants,
                    self.config.clone(),
                )
                .with_finish_hook(self.finish_hook()),
            );
            txns.insert(txn_id, Arc::clone(&txn));
            txn
        };

        self.stats.started.fetch_add(1, AtomicOrdering::Relaxed);
        self.stats.active.fetch_add(1, AtomicOrdering::Relaxed);
        info!(
            txn_id = %txn.txn_id(),
            participants = txn.participant_count(),
            version = %txn.candidate().subtree_version(),
            "commit started"
        );

        let running = Arc::clone(&txn);
        tokio::spawn(async move {
            running.run().await;
        });

        Ok(CommitHandle::new(txn))
    }

    /// Aborts an active transaction.
    pub async fn abort(&self, txn_id: TxnId) -> CommitResult<()> {
        let txn = self
            .transactions
            .read()
            .get(&txn_id)
            .cloned()
            .ok_or(CommitError::TransactionNotFound { txn_id })?;
        txn.abort().await
    }

    /// Returns a handle to an active transaction.
    pub fn handle(&self, txn_id: TxnId) -> Option<CommitHandle<D>> {
        self.transactions
            .read()
            .get(&txn_id)
            .map(|txn| CommitHandle::new(Arc::clone(txn)))
    }

    /// Returns the phase of an active transaction.
    pub fn phase_of(&self, txn_id: TxnId) -> Option<CommitPhase> {
        self.transactions.read().get(&txn_id).map(|txn| txn.phase())
    }

    /// Returns the number of active transactions.
    pub fn active_count(&self) -> usize {
        self.transactions.read().len()
    }

    /// Returns statistics.
    pub fn stats(&self) -> &CommitStats {
        &self.stats
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    fn finish_hook(&self) -> Box<dyn Fn(TxnId, &CommitOutcome) + Send + Sync> {
        let transactions: Weak<TxnMap<D>> = Arc::downgrade(&self.transactions);
        let stats = Arc::clone(&self.stats);
        Box::new(move |txn_id, outcome| {
            if let Some(transactions) = transactions.upgrade() {
                transactions.write().remove(&txn_id);
            }
            stats.record(outcome);
            debug!(%txn_id, %outcome, "transaction finished");
        })
    }
}

impl<D: Send + Sync + 'static> Default for CommitCoordinator<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for CommitCoordinator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitCoordinator")
            .field("active_count", &self.transactions.read().len())
            .field("config", &self.config)
            .finish()
    }
}
