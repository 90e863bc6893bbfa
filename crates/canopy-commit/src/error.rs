//! Commit error types.

use canopy_common::error::{CanopyError, ErrorCode};
use canopy_common::types::{ParticipantId, TxnId};
use thiserror::Error;

use crate::cohort::CohortError;
use crate::phase::{CommitPhase, Step};

/// Errors reported by the commit protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// A participant voted no; the transaction was aborted.
    #[error("transaction {txn_id}: participant {participant} rejected {step}")]
    VoteRejected {
        /// The transaction.
        txn_id: TxnId,
        /// The rejecting participant.
        participant: ParticipantId,
        /// The vote in which it rejected.
        step: Step,
    },

    /// A participant failed to answer a vote; the transaction was aborted.
    #[error("transaction {txn_id}: participant {participant} failed {step}: {source}")]
    ParticipantUnreachable {
        /// The transaction.
        txn_id: TxnId,
        /// The failing participant.
        participant: ParticipantId,
        /// The vote it failed to answer.
        step: Step,
        /// The transport failure.
        source: CohortError,
    },

    /// The commit step failed on some participants.
    #[error("transaction {txn_id} partially committed: {committed:?} committed, {failed:?} failed")]
    PartialCommitFailure {
        /// The transaction.
        txn_id: TxnId,
        /// Participants that installed the candidate.
        committed: Vec<ParticipantId>,
        /// Participants that failed to install it.
        failed: Vec<ParticipantId>,
    },

    /// The operation is not allowed in the transaction's current phase.
    #[error("transaction {txn_id} is {current}, expected {expected}")]
    InvalidPhase {
        /// The transaction.
        txn_id: TxnId,
        /// The phase the transaction was in.
        current: CommitPhase,
        /// The phase(s) the operation requires.
        expected: &'static str,
    },

    /// The transaction was aborted on request before the step completed.
    #[error("transaction {txn_id} was cancelled")]
    Cancelled {
        /// The transaction.
        txn_id: TxnId,
    },

    /// No active transaction has this id.
    #[error("transaction {txn_id} not found")]
    TransactionNotFound {
        /// The unknown transaction.
        txn_id: TxnId,
    },

    /// The coordinator is at its admission limit.
    #[error("too many active transactions (limit {limit})")]
    TooManyTransactions {
        /// The configured limit.
        limit: usize,
    },

    /// A transaction needs at least one participant.
    #[error("transaction has no participants")]
    NoParticipants,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for commit operations.
pub type CommitResult<T> = Result<T, CommitError>;

impl CommitError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CommitError::VoteRejected { .. } => ErrorCode::VoteRejected,
            CommitError::ParticipantUnreachable { .. } => ErrorCode::ParticipantUnreachable,
            CommitError::PartialCommitFailure { .. } => ErrorCode::PartialCommitFailure,
            CommitError::InvalidPhase { .. } => ErrorCode::InvalidPhase,
            CommitError::Cancelled { .. } => ErrorCode::Cancelled,
            CommitError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            CommitError::TooManyTransactions { .. } => ErrorCode::TooManyTransactions,
            CommitError::NoParticipants => ErrorCode::InvalidArgument,
            CommitError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Returns the transaction this error belongs to, if any.
    pub fn txn_id(&self) -> Option<TxnId> {
        match self {
            CommitError::VoteRejected { txn_id, .. }
            | CommitError::ParticipantUnreachable { txn_id, .. }
            | CommitError::PartialCommitFailure { txn_id, .. }
            | CommitError::InvalidPhase { txn_id, .. }
            | CommitError::Cancelled { txn_id }
            | CommitError::TransactionNotFound { txn_id } => Some(*txn_id),
            CommitError::TooManyTransactions { .. }
            | CommitError::NoParticipants
            | CommitError::Internal(_) => None,
        }
    }
}

impl From<CommitError> for CanopyError {
    fn from(err: CommitError) -> Self {
        match err {
            CommitError::VoteRejected {
                txn_id,
                participant,
                step,
            } => CanopyError::VoteRejected {
                txn_id,
                participant,
                phase: step.to_string(),
            },
            CommitError::ParticipantUnreachable {
                txn_id,
                participant,
                step,
                source,
            } => CanopyError::ParticipantUnreachable {
                txn_id,
                participant,
                phase: step.to_string(),
                reason: source.to_string(),
            },
            CommitError::PartialCommitFailure {
                txn_id,
                committed,
                failed,
            } => CanopyError::PartialCommitFailure {
                txn_id,
                committed,
                failed,
            },
            CommitError::InvalidPhase {
                txn_id,
                current,
                expected,
            } => CanopyError::InvalidPhase {
                txn_id,
                current: current.to_string(),
                expected,
            },
            CommitError::Cancelled { .. } => CanopyError::Cancelled,
            CommitError::TransactionNotFound { txn_id } => {
                CanopyError::TransactionNotFound { txn_id }
            }
            CommitError::TooManyTransactions { limit } => {
                CanopyError::TooManyTransactions { limit }
            }
            CommitError::NoParticipants => {
                CanopyError::invalid_argument("transaction has no participants")
            }
            CommitError::Internal(message) => CanopyError::Internal { message },
        }
    }
}
