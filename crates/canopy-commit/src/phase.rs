//! Transaction phases and outcomes.
//!
//! # Phase transitions
//!
//! ```text
//! ┌──────┐  canCommit   ┌──────────────────┐   yes   ┌───────────────┐
//! │ Idle │─────────────▶│ CanCommitPending │────────▶│ CanCommitDone │
//! └──────┘              └──────────────────┘         └───────────────┘
//!                                                            │ preCommit
//!                                                            ▼
//! ┌───────────────┐      yes       ┌──────────────────┐
//! │ PreCommitDone │◀───────────────│ PreCommitPending │
//! └───────────────┘                └──────────────────┘
//!         │ commit
//!         ▼
//! ┌───────────────┐  all ok   ┌───────────┐
//! │ CommitPending │──────────▶│ Committed │
//! └───────────────┘           └───────────┘
//!         │ any failed        ┌────────────────────┐
//!         └──────────────────▶│ PartiallyCommitted │
//!                             └────────────────────┘
//! ```
//!
//! `Aborted` is reachable from every phase before `CommitPending`, either
//! through a negative or failed vote or through an explicit abort.

use std::fmt;

use canopy_common::types::{ParticipantId, TxnId};

use crate::cohort::CohortError;
use crate::error::{CommitError, CommitResult};

/// Phase of a three-phase commit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitPhase {
    /// No participant has been contacted yet.
    Idle,
    /// canCommit votes are outstanding.
    CanCommitPending,
    /// Every participant voted yes on canCommit.
    CanCommitDone,
    /// preCommit votes are outstanding.
    PreCommitPending,
    /// Every participant voted yes on preCommit.
    PreCommitDone,
    /// commit requests are outstanding.
    CommitPending,
    /// Every participant installed the candidate.
    Committed,
    /// The transaction was abandoned; no participant installed it.
    Aborted,
    /// Some participants installed the candidate and some failed to.
    PartiallyCommitted,
}

impl CommitPhase {
    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommitPhase::Committed | CommitPhase::Aborted | CommitPhase::PartiallyCommitted
        )
    }

    /// Returns true if participant requests are outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            CommitPhase::CanCommitPending
                | CommitPhase::PreCommitPending
                | CommitPhase::CommitPending
        )
    }

    /// Returns true if the transaction may still be aborted.
    pub fn is_abortable(&self) -> bool {
        !self.is_terminal() && *self != CommitPhase::CommitPending
    }
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitPhase::Idle => write!(f, "Idle"),
            CommitPhase::CanCommitPending => write!(f, "CanCommitPending"),
            CommitPhase::CanCommitDone => write!(f, "CanCommitDone"),
            CommitPhase::PreCommitPending => write!(f, "PreCommitPending"),
            CommitPhase::PreCommitDone => write!(f, "PreCommitDone"),
            CommitPhase::CommitPending => write!(f, "CommitPending"),
            CommitPhase::Committed => write!(f, "Committed"),
            CommitPhase::Aborted => write!(f, "Aborted"),
            CommitPhase::PartiallyCommitted => write!(f, "PartiallyCommitted"),
        }
    }
}

/// A round of participant requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// First vote.
    CanCommit,
    /// Second vote.
    PreCommit,
    /// Installation of the candidate.
    Commit,
    /// Discarding of the candidate.
    Abort,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::CanCommit => write!(f, "canCommit"),
            Step::PreCommit => write!(f, "preCommit"),
            Step::Commit => write!(f, "commit"),
            Step::Abort => write!(f, "abort"),
        }
    }
}

/// Why a transaction was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A participant voted no.
    VoteRejected {
        /// The first participant observed voting no.
        participant: ParticipantId,
        /// The vote in which it did so.
        step: Step,
    },
    /// A participant failed to answer a vote.
    Unreachable {
        /// The first participant observed failing.
        participant: ParticipantId,
        /// The vote it failed to answer.
        step: Step,
        /// The transport failure.
        error: CohortError,
    },
    /// The caller asked for the abort.
    Requested,
}

impl AbortReason {
    /// Converts the reason into the error reported to the caller.
    pub fn into_error(self, txn_id: TxnId) -> CommitError {
        match self {
            AbortReason::VoteRejected { participant, step } => CommitError::VoteRejected {
                txn_id,
                participant,
                step,
            },
            AbortReason::Unreachable {
                participant,
                step,
                error,
            } => CommitError::ParticipantUnreachable {
                txn_id,
                participant,
                step,
                source: error,
            },
            AbortReason::Requested => CommitError::Cancelled { txn_id },
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::VoteRejected { participant, step } => {
                write!(f, "participant {participant} voted no on {step}")
            }
            AbortReason::Unreachable {
                participant,
                step,
                error,
            } => write!(f, "participant {participant} failed {step}: {error}"),
            AbortReason::Requested => write!(f, "abort requested"),
        }
    }
}

/// Terminal result of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Every participant installed the candidate.
    Committed,
    /// No participant installed the candidate.
    Aborted(AbortReason),
    /// The commit step failed on some participants. Never retried.
    PartiallyCommitted {
        /// Participants that installed the candidate, in ascending order.
        committed: Vec<ParticipantId>,
        /// Participants that failed, in ascending order.
        failed: Vec<ParticipantId>,
    },
}

impl CommitOutcome {
    /// Returns the terminal phase matching this outcome.
    pub fn phase(&self) -> CommitPhase {
        match self {
            CommitOutcome::Committed => CommitPhase::Committed,
            CommitOutcome::Aborted(_) => CommitPhase::Aborted,
            CommitOutcome::PartiallyCommitted { .. } => CommitPhase::PartiallyCommitted,
        }
    }

    /// Returns true if every participant installed the candidate.
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }

    /// Maps the outcome onto a result: `Ok` only when fully committed.
    pub fn into_result(self, txn_id: TxnId) -> CommitResult<()> {
        match self {
            CommitOutcome::Committed => Ok(()),
            CommitOutcome::Aborted(reason) => Err(reason.into_error(txn_id)),
            CommitOutcome::PartiallyCommitted { committed, failed } => {
                Err(CommitError::PartialCommitFailure {
                    txn_id,
                    committed,
                    failed,
                })
            }
        }
    }
}

impl fmt::Display for CommitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitOutcome::Committed => write!(f, "committed"),
            CommitOutcome::Aborted(reason) => write!(f, "aborted ({reason})"),
            CommitOutcome::PartiallyCommitted { committed, failed } => write!(
                f,
                "partially committed ({} committed, {} failed)",
                committed.len(),
                failed.len()
            ),
        }
    }
}
