//! # canopy-test
//!
//! Integration tests for Canopy.
//!
//! This crate contains:
//! - Fixtures shared by the integration tests
//! - A small simulated cluster of tree replicas committing through 3PC

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;

/// Simulated replica cluster
pub mod cluster;
