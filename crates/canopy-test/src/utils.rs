//! Fixtures shared by the integration tests.

use std::sync::{Arc, Once};

use canopy_common::types::Version;
use canopy_commit::{MemoryCohort, Participant};
use canopy_tree::{RawNode, TreeNode};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per process.
///
/// `RUST_LOG` overrides the default `warn` level for the canopy crates.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("canopy_tree=warn,canopy_commit=warn,canopy_test=warn")
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .try_init();
    });
}

/// A network-device shaped configuration tree.
///
/// ```text
/// root
/// ├── interfaces
/// │   ├── eth0 ── mtu = 1500
/// │   └── lo
/// └── system
///     └── hostname = edge-1
/// ```
pub fn device_config() -> RawNode {
    RawNode::container(
        "root",
        vec![
            RawNode::container(
                "interfaces",
                vec![
                    RawNode::container("eth0", vec![RawNode::leaf("mtu", "1500")]),
                    RawNode::leaf("lo", ""),
                ],
            ),
            RawNode::container("system", vec![RawNode::leaf("hostname", "edge-1")]),
        ],
    )
}

/// Ingests `raw` with both versions set to `version`.
pub fn ingest(raw: &RawNode, version: u64) -> Arc<TreeNode<RawNode>> {
    match TreeNode::create_recursively_at(raw, Version::new(version)) {
        Ok(node) => node,
        Err(err) => panic!("fixture tree is invalid: {err}"),
    }
}

/// Creates `n` agreeable in-memory cohorts all holding `root`.
pub fn memory_cohorts(n: usize, root: &Arc<TreeNode<RawNode>>) -> Vec<Arc<MemoryCohort<RawNode>>> {
    (0..n)
        .map(|i| Arc::new(MemoryCohort::new(format!("replica-{i}"), Arc::clone(root))))
        .collect()
}

/// Erases concrete cohorts into coordinator participants.
pub fn participants(cohorts: &[Arc<MemoryCohort<RawNode>>]) -> Vec<Participant<RawNode>> {
    cohorts
        .iter()
        .map(|cohort| Arc::clone(cohort) as Participant<RawNode>)
        .collect()
}
