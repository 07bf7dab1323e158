//! Type definitions for node specification and state used in resource store and snapshot formats

use serde::{Deserialize, Serialize};

use cluster_capacity_derive::KubeObject;

use crate::core::common::{ObjectMeta, RuntimeResources};

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NodeSpec {
    /// Cordoned node, new pods are not placed on it.
    #[serde(default)]
    pub unschedulable: bool,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NodeStatus {
    // Resources available for pods, defaults to capacity when not set.
    #[serde(default)]
    pub allocatable: RuntimeResources,
    // Total amount of resources
    pub capacity: RuntimeResources,
    /// Maximum number of pods on the node, 0 means the kubelet default.
    #[serde(default)]
    pub max_pods: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, KubeObject)]
pub struct Node {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: NodeSpec,
    pub status: NodeStatus,
}

impl Node {
    pub fn new(name: &str, cpu: u64, ram: u64) -> Self {
        let resources = RuntimeResources { cpu, ram };
        Self {
            metadata: ObjectMeta::new(name, ""),
            spec: Default::default(),
            status: NodeStatus {
                allocatable: resources,
                capacity: resources,
                max_pods: 0,
            },
        }
    }

    pub fn allocatable(&self) -> RuntimeResources {
        if self.status.allocatable.is_zero() {
            self.status.capacity
        } else {
            self.status.allocatable
        }
    }
}
