//! Three-phase commit state machine for a single transaction.
//!
//! [`ThreePhaseCommit`] drives an ordered list of participants through
//! canCommit, preCommit and commit. Each step fans the request out to every
//! participant concurrently and waits for every answer before deciding.
//!
//! # Decisions
//!
//! - canCommit and preCommit succeed only on a unanimous yes. A no, a
//!   transport failure or a timeout aborts the transaction and sends abort
//!   to every participant, including those that never got the vote.
//! - commit succeeds only if every participant installs the candidate.
//!   Otherwise the transaction ends `PartiallyCommitted`, naming who
//!   committed and who failed. Failed commits are never retried.
//!
//! # Cancellation
//!
//! Every request races a transaction-wide [`CancelToken`] fired by
//! [`abort`](ThreePhaseCommit::abort), and during votes a per-step token
//! fired on the first negative answer when short-circuiting is enabled.
//! Cancelled requests are dropped before any abort request is sent, so a
//! participant never sees two requests for one transaction at once.
//! The commit step is never cancelled.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use canopy_common::config::CommitConfig;
use canopy_common::types::{ParticipantId, TxnId};
use canopy_tree::TreeNode;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::cohort::{CohortError, CohortFuture, CohortResult, CommitCohort};
use crate::error::{CommitError, CommitResult};
use crate::phase::{AbortReason, CommitOutcome, CommitPhase, Step};

/// A participant handle as held by the coordinator.
pub type Participant<D> = Arc<dyn CommitCohort<D>>;

/// Callback run with the outcome before it becomes observable.
pub type FinishHook = Box<dyn Fn(TxnId, &CommitOutcome) + Send + Sync>;

/// Result of collecting one round of votes.
enum Tally {
    Unanimous,
    Rejected(AbortReason),
    Cancelled,
}

/// One transaction's three-phase commit.
pub struct ThreePhaseCommit<D> {
    txn_id: TxnId,
    candidate: Arc<TreeNode<D>>,
    participants: Vec<Participant<D>>,
    config: CommitConfig,
    /// Current phase, observable through `subscribe`.
    phase: watch::Sender<CommitPhase>,
    /// Set exactly once, right before the phase turns terminal.
    outcome: watch::Sender<Option<CommitOutcome>>,
    /// Serializes steps and aborts.
    step_lock: AsyncMutex<()>,
    /// Fired by `abort` to withdraw in-flight votes.
    cancel: CancelToken,
    on_finish: Option<FinishHook>,
}

impl<D: Send + Sync + 'static> ThreePhaseCommit<D> {
    /// Creates a transaction in the `Idle` phase.
    pub fn new(
        txn_id: TxnId,
        candidate: Arc<TreeNode<D>>,
        participants: Vec<Participant<D>>,
        config: CommitConfig,
    ) -> Self {
        let (phase, _) = watch::channel(CommitPhase::Idle);
        let (outcome, _) = watch::channel(None);
        Self {
            txn_id,
            candidate,
            participants,
            config,
            phase,
            outcome,
            step_lock: AsyncMutex::new(()),
            cancel: CancelToken::new(),
            on_finish: None,
        }
    }

    /// Registers a callback run once with the terminal outcome, before
    /// waiters are woken.
    #[must_use]
    pub fn with_finish_hook(mut self, hook: FinishHook) -> Self {
        self.on_finish = Some(hook);
        self
    }

    /// Returns the transaction id.
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Returns the candidate snapshot.
    pub fn candidate(&self) -> &Arc<TreeNode<D>> {
        &self.candidate
    }

    /// Returns the number of participants.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Returns the current phase.
    pub fn phase(&self) -> CommitPhase {
        *self.phase.borrow()
    }

    /// Subscribes to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<CommitPhase> {
        self.phase.subscribe()
    }

    /// Returns the outcome once the transaction is terminal.
    pub fn outcome(&self) -> Option<CommitOutcome> {
        self.outcome.borrow().clone()
    }

    /// Waits for the transaction to become terminal.
    pub async fn wait_outcome(&self) -> CommitOutcome {
        let mut rx = self.outcome.subscribe();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            // The sender is owned by `self`, so the channel outlives this call.
            if rx.changed().await.is_err() {
                return CommitOutcome::Aborted(AbortReason::Requested);
            }
        }
    }

    /// Runs canCommit, preCommit and commit in order and returns the
    /// outcome.
    ///
    /// If an abort interrupts the run, this waits for the abort to finish.
    pub async fn run(&self) -> CommitOutcome {
        let result = async {
            self.can_commit().await?;
            self.pre_commit().await?;
            self.commit().await
        }
        .await;
        if let Err(err) = result {
            debug!(txn_id = %self.txn_id, error = %err, "run stopped early");
        }
        self.wait_outcome().await
    }

    /// Asks every participant whether it can commit the candidate.
    ///
    /// Moves `Idle → CanCommitPending → CanCommitDone`, or to `Aborted` on
    /// any negative or failed vote.
    pub async fn can_commit(&self) -> CommitResult<()> {
        self.vote_step(
            Step::CanCommit,
            CommitPhase::Idle,
            "Idle",
            CommitPhase::CanCommitPending,
            CommitPhase::CanCommitDone,
        )
        .await
    }

    /// Asks every participant to prepare the candidate.
    ///
    /// Moves `CanCommitDone → PreCommitPending → PreCommitDone`, or to
    /// `Aborted` on any negative or failed vote.
    pub async fn pre_commit(&self) -> CommitResult<()> {
        self.vote_step(
            Step::PreCommit,
            CommitPhase::CanCommitDone,
            "CanCommitDone",
            CommitPhase::PreCommitPending,
            CommitPhase::PreCommitDone,
        )
        .await
    }

    /// Tells every participant to install the candidate.
    ///
    /// Moves `PreCommitDone → CommitPending → Committed`, or to
    /// `PartiallyCommitted` if any participant fails. Fails with
    /// `Cancelled` if an abort was requested before commit began.
    pub async fn commit(&self) -> CommitResult<()> {
        let _step = self.step_lock.lock().await;
        if self.cancel.is_cancelled() && !self.phase().is_terminal() {
            return Err(CommitError::Cancelled {
                txn_id: self.txn_id,
            });
        }
        self.expect_phase(CommitPhase::PreCommitDone, "PreCommitDone")?;
        self.phase.send_replace(CommitPhase::CommitPending);
        debug!(txn_id = %self.txn_id, participants = self.participants.len(), "sending commit");

        let timeout = self.config.phase_timeout;
        let mut pending: FuturesUnordered<_> = self
            .participants
            .iter()
            .enumerate()
            .map(|(index, participant)| {
                let request = participant.commit(self.txn_id);
                async move { (ParticipantId::new(index), with_timeout(request, timeout).await) }
            })
            .collect();

        let mut committed = Vec::with_capacity(self.participants.len());
        let mut failed = Vec::new();
        while let Some((participant, result)) = pending.next().await {
            match result {
                Ok(()) => committed.push(participant),
                Err(err) => {
                    warn!(txn_id = %self.txn_id, %participant, error = %err, "commit failed");
                    failed.push(participant);
                }
            }
        }
        committed.sort_unstable();
        failed.sort_unstable();

        if failed.is_empty() {
            info!(txn_id = %self.txn_id, "transaction committed");
            self.finish(CommitOutcome::Committed);
            return Ok(());
        }

        error!(
            txn_id = %self.txn_id,
            committed = ?committed,
            failed = ?failed,
            "transaction partially committed"
        );
        self.finish(CommitOutcome::PartiallyCommitted {
            committed: committed.clone(),
            failed: failed.clone(),
        });
        Err(CommitError::PartialCommitFailure {
            txn_id: self.txn_id,
            committed,
            failed,
        })
    }

    /// Aborts the transaction.
    ///
    /// Withdraws any in-flight votes, waits for the running step to settle,
    /// then sends abort to every participant and moves to `Aborted`.
    /// Aborting an aborted transaction does nothing. Once commit has
    /// started the transaction can no longer be aborted.
    pub async fn abort(&self) -> CommitResult<()> {
        if self.phase().is_abortable() {
            self.cancel.cancel();
        }
        let _step = self.step_lock.lock().await;
        match self.phase() {
            CommitPhase::Aborted => Ok(()),
            current if !current.is_abortable() => Err(CommitError::InvalidPhase {
                txn_id: self.txn_id,
                current,
                expected: "a phase before CommitPending",
            }),
            _ => {
                self.abort_participants(AbortReason::Requested).await;
                Ok(())
            }
        }
    }

    async fn vote_step(
        &self,
        step: Step,
        from: CommitPhase,
        expected: &'static str,
        pending: CommitPhase,
        done: CommitPhase,
    ) -> CommitResult<()> {
        let _step = self.step_lock.lock().await;
        if self.cancel.is_cancelled() && !self.phase().is_terminal() {
            return Err(CommitError::Cancelled {
                txn_id: self.txn_id,
            });
        }
        self.expect_phase(from, expected)?;
        self.phase.send_replace(pending);

        match self.collect_votes(step).await {
            Tally::Unanimous => {
                debug!(txn_id = %self.txn_id, %step, "vote unanimous");
                self.phase.send_replace(done);
                Ok(())
            }
            Tally::Rejected(reason) => {
                self.abort_participants(reason.clone()).await;
                Err(reason.into_error(self.txn_id))
            }
            // `abort` is waiting on the step lock and finishes the job.
            Tally::Cancelled => Err(CommitError::Cancelled {
                txn_id: self.txn_id,
            }),
        }
    }

    async fn collect_votes(&self, step: Step) -> Tally {
        let step_cancel = CancelToken::new();
        let timeout = self.config.phase_timeout;
        debug!(txn_id = %self.txn_id, %step, participants = self.participants.len(), "requesting votes");

        let mut pending: FuturesUnordered<_> = self
            .participants
            .iter()
            .enumerate()
            .map(|(index, participant)| {
                let request = match step {
                    Step::PreCommit => {
                        participant.pre_commit(self.txn_id, Arc::clone(&self.candidate))
                    }
                    _ => participant.can_commit(self.txn_id, Arc::clone(&self.candidate)),
                };
                let step_cancel = &step_cancel;
                async move {
                    let result = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => Err(CohortError::Cancelled),
                        () = step_cancel.cancelled() => Err(CohortError::Cancelled),
                        result = with_timeout(request, timeout) => result,
                    };
                    (ParticipantId::new(index), result)
                }
            })
            .collect();

        let mut rejection = None;
        while let Some((participant, result)) = pending.next().await {
            match result {
                Ok(true) => debug!(txn_id = %self.txn_id, %participant, %step, "voted yes"),
                Ok(false) => {
                    warn!(txn_id = %self.txn_id, %participant, %step, "voted no");
                    rejection.get_or_insert(AbortReason::VoteRejected { participant, step });
                    if self.config.short_circuit_votes {
                        step_cancel.cancel();
                    }
                }
                Err(CohortError::Cancelled)
                    if self.cancel.is_cancelled() || step_cancel.is_cancelled() => {}
                Err(error) => {
                    warn!(txn_id = %self.txn_id, %participant, %step, %error, "vote failed");
                    rejection.get_or_insert(AbortReason::Unreachable {
                        participant,
                        step,
                        error,
                    });
                    if self.config.short_circuit_votes {
                        step_cancel.cancel();
                    }
                }
            }
        }

        match rejection {
            Some(reason) => Tally::Rejected(reason),
            None if self.cancel.is_cancelled() => Tally::Cancelled,
            None => Tally::Unanimous,
        }
    }

    /// Sends abort to every participant, then records the outcome.
    async fn abort_participants(&self, reason: AbortReason) {
        debug!(txn_id = %self.txn_id, %reason, "aborting participants");
        let timeout = self.config.abort_timeout;
        let mut pending: FuturesUnordered<_> = self
            .participants
            .iter()
            .enumerate()
            .map(|(index, participant)| {
                let request = participant.abort(self.txn_id);
                async move { (ParticipantId::new(index), with_timeout(request, timeout).await) }
            })
            .collect();

        while let Some((participant, result)) = pending.next().await {
            if let Err(error) = result {
                warn!(txn_id = %self.txn_id, %participant, %error, "abort failed");
            }
        }

        info!(txn_id = %self.txn_id, %reason, "transaction aborted");
        self.finish(CommitOutcome::Aborted(reason));
    }

    fn expect_phase(&self, expected: CommitPhase, name: &'static str) -> CommitResult<()> {
        let current = self.phase();
        if current == expected {
            Ok(())
        } else {
            Err(CommitError::InvalidPhase {
                txn_id: self.txn_id,
                current,
                expected: name,
            })
        }
    }

    fn finish(&self, outcome: CommitOutcome) {
        if let Some(hook) = &self.on_finish {
            hook(self.txn_id, &outcome);
        }
        let phase = outcome.phase();
        self.outcome.send_replace(Some(outcome));
        self.phase.send_replace(phase);
    }
}

impl<D> fmt::Debug for ThreePhaseCommit<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreePhaseCommit")
            .field("txn_id", &self.txn_id)
            .field("phase", &*self.phase.borrow())
            .field("participants", &self.participants.len())
            .finish()
    }
}

/// Bounds a participant request by `timeout`.
async fn with_timeout<T>(request: CohortFuture<'_, T>, timeout: Option<Duration>) -> CohortResult<T> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, request)
            .await
            .unwrap_or(Err(CohortError::Timeout(limit))),
        None => request.await,
    }
}
