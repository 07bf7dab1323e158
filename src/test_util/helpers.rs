use std::sync::Arc;

use crate::config::ClusterCapacityConfig;
use crate::core::cluster_client::InMemoryCluster;
use crate::core::node::Node;
use crate::core::pod::Pod;
use crate::core::scheduler::plugin::PluginRegistry;
use crate::simulator::ClusterCapacity;
use crate::snapshot::ClusterSnapshot;

pub const TEMPLATE_POD_NAME: &str = "small-pod";

/// Cluster of `count` equal nodes named `node_<idx>` in the `default` namespace.
pub fn cluster_with_nodes(count: usize, cpu: u64, ram: u64) -> InMemoryCluster {
    let snapshot = ClusterSnapshot {
        nodes: (0..count)
            .map(|idx| Node::new(&format!("node_{}", idx), cpu, ram))
            .collect(),
        ..Default::default()
    };
    InMemoryCluster::from_snapshot(snapshot).unwrap()
}

pub fn default_test_cluster_capacity_config(cpu: u64, ram: u64, max_limit: usize) -> ClusterCapacityConfig {
    ClusterCapacityConfig::new(Pod::new(TEMPLATE_POD_NAME, "default", cpu, ram), max_limit).unwrap()
}

/// Engine simulating copies of a `cpu`/`ram` template pod, not synced yet.
pub fn create_cluster_capacity(
    cluster: InMemoryCluster,
    cpu: u64,
    ram: u64,
    max_limit: usize,
) -> ClusterCapacity {
    ClusterCapacity::new(
        default_test_cluster_capacity_config(cpu, ram, max_limit),
        Arc::new(cluster),
        &PluginRegistry::default(),
    )
    .unwrap()
}

/// Syncs and runs the engine, panics on simulation errors.
pub fn run_to_completion(mut cc: ClusterCapacity) -> ClusterCapacity {
    let _ = env_logger::try_init();
    cc.sync_with_client().unwrap();
    cc.run().unwrap();
    cc
}
