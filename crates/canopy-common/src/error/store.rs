//! Store error types.
//!
//! Provides the unified error type every Canopy crate converts into.

use std::fmt;
use thiserror::Error;

use crate::types::{ParticipantId, TxnId};

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,
    /// Operation timed out.
    Timeout = 0x0004,
    /// Operation was cancelled.
    Cancelled = 0x0005,
    /// General I/O error.
    Io = 0x0100,

    // Tree errors (0x0200 - 0x02FF)
    /// A builder invariant was violated.
    InvalidState = 0x0200,
    /// No node exists at the requested path.
    NodeNotFound = 0x0201,
    /// Input tree exceeds the supported depth.
    DepthExceeded = 0x0202,

    // Commit errors (0x0300 - 0x03FF)
    /// A participant declined canCommit or preCommit.
    VoteRejected = 0x0300,
    /// A participant could not be reached or timed out.
    ParticipantUnreachable = 0x0301,
    /// One or more participants failed during the commit phase.
    PartialCommitFailure = 0x0302,
    /// Operation not allowed in the transaction's current phase.
    InvalidPhase = 0x0303,
    /// Transaction not found.
    TransactionNotFound = 0x0304,
    /// Too many transactions in flight.
    TooManyTransactions = 0x0305,

    // Configuration errors (0x0400 - 0x04FF)
    /// Invalid configuration.
    InvalidConfig = 0x0400,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "I/O",
            0x02 => "Tree",
            0x03 => "Commit",
            0x04 => "Config",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The main error type for Canopy.
///
/// Crate-local errors (`TreeError`, `CommitError`) convert into this type
/// when they cross a crate boundary that only speaks `CanopyResult`.
#[derive(Debug, Error)]
pub enum CanopyError {
    // ==========================================================================
    // General Errors
    // ==========================================================================
    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// Operation was cancelled.
    #[error("operation was cancelled")]
    Cancelled,

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    // ==========================================================================
    // Tree Errors
    // ==========================================================================
    /// A tree builder invariant was violated.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the violated invariant.
        message: String,
    },

    /// No node at the requested path.
    #[error("node not found at {path}")]
    NodeNotFound {
        /// The path that was looked up.
        path: String,
    },

    /// An input tree nests deeper than supported.
    #[error("input tree exceeds maximum depth {max_depth}")]
    DepthExceeded {
        /// The enforced limit.
        max_depth: usize,
    },

    // ==========================================================================
    // Commit Errors
    // ==========================================================================
    /// A participant voted no.
    #[error("transaction {txn_id}: participant {participant} rejected {phase}")]
    VoteRejected {
        /// The transaction.
        txn_id: TxnId,
        /// The rejecting participant.
        participant: ParticipantId,
        /// The phase in which the vote was cast.
        phase: String,
    },

    /// A participant could not be reached.
    #[error("transaction {txn_id}: participant {participant} unreachable during {phase}: {reason}")]
    ParticipantUnreachable {
        /// The transaction.
        txn_id: TxnId,
        /// The unreachable participant.
        participant: ParticipantId,
        /// The phase in which the failure occurred.
        phase: String,
        /// Transport level reason.
        reason: String,
    },

    /// Commit phase failed on some participants.
    #[error("transaction {txn_id} partially committed: {committed:?} committed, {failed:?} failed")]
    PartialCommitFailure {
        /// The transaction.
        txn_id: TxnId,
        /// Participants that installed the candidate.
        committed: Vec<ParticipantId>,
        /// Participants that failed to install it.
        failed: Vec<ParticipantId>,
    },

    /// Operation not allowed in the current phase.
    #[error("transaction {txn_id} is {current}, expected {expected}")]
    InvalidPhase {
        /// The transaction.
        txn_id: TxnId,
        /// The current phase.
        current: String,
        /// The phase(s) the operation requires.
        expected: &'static str,
    },

    /// Transaction not found.
    #[error("transaction {txn_id} not found")]
    TransactionNotFound {
        /// The missing transaction.
        txn_id: TxnId,
    },

    /// Admission limit reached.
    #[error("too many active transactions (limit {limit})")]
    TooManyTransactions {
        /// The configured limit.
        limit: usize,
    },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl CanopyError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Internal { .. } => ErrorCode::Internal,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Io { .. } => ErrorCode::Io,
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            Self::DepthExceeded { .. } => ErrorCode::DepthExceeded,
            Self::VoteRejected { .. } => ErrorCode::VoteRejected,
            Self::ParticipantUnreachable { .. } => ErrorCode::ParticipantUnreachable,
            Self::PartialCommitFailure { .. } => ErrorCode::PartialCommitFailure,
            Self::InvalidPhase { .. } => ErrorCode::InvalidPhase,
            Self::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            Self::TooManyTransactions { .. } => ErrorCode::TooManyTransactions,
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
        }
    }

    /// Returns true if the caller may retry the whole transaction.
    ///
    /// A partial commit is never retryable: some participants already
    /// installed the candidate.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::VoteRejected { .. }
                | Self::ParticipantUnreachable { .. }
                | Self::TooManyTransactions { .. }
        )
    }

    /// Returns true if participants may now disagree about the current
    /// snapshot and need manual reconciliation.
    #[must_use]
    pub const fn is_inconsistent(&self) -> bool {
        matches!(self, Self::PartialCommitFailure { .. })
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for CanopyError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}

impl From<toml::ser::Error> for CanopyError {
    fn from(err: toml::ser::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}
