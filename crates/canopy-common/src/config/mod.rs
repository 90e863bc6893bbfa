//! Configuration for Canopy.
//!
//! This module provides configuration structures for the commit
//! coordinator and the store that hosts it.

mod store;

pub use store::{CommitConfig, StoreConfig, StoreConfigBuilder};
