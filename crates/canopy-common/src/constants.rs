//! System-wide constants for Canopy.

// =============================================================================
// Commit Protocol Defaults
// =============================================================================

/// Default bound on a single participant request during canCommit,
/// preCommit and commit (30 seconds).
pub const DEFAULT_PHASE_TIMEOUT_MS: u64 = 30_000;

/// Default bound on a single participant abort request (5 seconds).
pub const DEFAULT_ABORT_TIMEOUT_MS: u64 = 5_000;

/// Default limit on concurrently tracked commit transactions.
pub const DEFAULT_MAX_ACTIVE_TRANSACTIONS: usize = 1024;

// =============================================================================
// Tree Limits
// =============================================================================

/// Maximum depth accepted when ingesting a raw subtree recursively.
///
/// Deeper inputs are rejected rather than risking stack exhaustion.
pub const MAX_INGEST_DEPTH: usize = 512;
