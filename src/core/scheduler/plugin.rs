use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::pod::Pod;
use crate::core::scheduler::cache::{NodeInfo, SchedulerCache};

#[derive(Clone)]
pub enum PluginType {
    FilterPlugin(Arc<dyn FilterPlugin>),
    ScorePlugin(Arc<dyn ScorePlugin>),
}

pub trait FilterPlugin: Send + Sync {
    // Err holds the reason why the node does not fit the pod.
    fn filter(&self, pod: &Pod, node: &NodeInfo, cache: &SchedulerCache) -> Result<(), String>;
}

pub trait ScorePlugin: Send + Sync {
    // Score in [0, 100], higher is better.
    fn score(&self, pod: &Pod, node: &NodeInfo) -> f64;
}

// Plugin specifies a plugin name and its weight when applicable.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Plugin {
    pub name: String,
    // Weight is used only for Score plugins.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Plugin {
    pub fn new(name: &str, weight: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Plugins {
    // Each extension point is a list of enabled plugins which are registered in plugin registry.
    #[serde(default)]
    pub filter: Vec<Plugin>,
    #[serde(default)]
    pub score: Vec<Plugin>,
}

pub const DEFAULT_PROVIDER: &str = "DefaultProvider";
pub const CLUSTER_AUTOSCALER_PROVIDER: &str = "ClusterAutoscalerProvider";

/// Registry of scheduling plugins and algorithm providers (named plugin sets). Built once at
/// startup and passed to whoever constructs schedulers.
#[derive(Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, PluginType>,
    providers: HashMap<String, Plugins>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("NodeUnschedulable", PluginType::FilterPlugin(Arc::new(NodeUnschedulable {})));
        registry.register("NodeSelector", PluginType::FilterPlugin(Arc::new(NodeSelector {})));
        registry.register("NodeResourcesFit", PluginType::FilterPlugin(Arc::new(NodeResourcesFit {})));
        registry.register("VolumeBinding", PluginType::FilterPlugin(Arc::new(VolumeBinding {})));
        registry.register("LeastAllocated", PluginType::ScorePlugin(Arc::new(LeastAllocated {})));
        registry.register("MostAllocated", PluginType::ScorePlugin(Arc::new(MostAllocated {})));

        let filter = vec![
            Plugin::new("NodeUnschedulable", None),
            Plugin::new("NodeSelector", None),
            Plugin::new("NodeResourcesFit", None),
            Plugin::new("VolumeBinding", None),
        ];
        registry.register_provider(
            DEFAULT_PROVIDER,
            Plugins {
                filter: filter.clone(),
                score: vec![Plugin::new("LeastAllocated", Some(1.0))],
            },
        );
        // Packs pods onto as few nodes as possible.
        registry.register_provider(
            CLUSTER_AUTOSCALER_PROVIDER,
            Plugins {
                filter,
                score: vec![Plugin::new("MostAllocated", Some(1.0))],
            },
        );
        registry
    }
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self {
            plugins: Default::default(),
            providers: Default::default(),
        }
    }

    pub fn register(&mut self, name: &str, plugin: PluginType) {
        self.plugins.insert(name.to_string(), plugin);
    }

    pub fn register_provider(&mut self, name: &str, plugins: Plugins) {
        self.providers.insert(name.to_string(), plugins);
    }

    pub fn get(&self, name: &str) -> Option<&PluginType> {
        self.plugins.get(name)
    }

    pub fn provider(&self, name: &str) -> Option<&Plugins> {
        self.providers.get(name)
    }
}

// NodeUnschedulable filters out cordoned nodes.
pub struct NodeUnschedulable {}
impl FilterPlugin for NodeUnschedulable {
    fn filter(&self, _pod: &Pod, node: &NodeInfo, _cache: &SchedulerCache) -> Result<(), String> {
        match &node.node {
            Some(node) if node.spec.unschedulable => Err("node(s) were unschedulable".to_string()),
            _ => Ok(()),
        }
    }
}

// NodeSelector requires every label of the pod's node selector to be set on the node.
pub struct NodeSelector {}
impl FilterPlugin for NodeSelector {
    fn filter(&self, pod: &Pod, node: &NodeInfo, _cache: &SchedulerCache) -> Result<(), String> {
        let Some(node) = &node.node else {
            return Err("node(s) not found".to_string());
        };
        let matches = pod
            .spec
            .node_selector
            .iter()
            .all(|(key, value)| node.metadata.labels.get(key) == Some(value));
        if matches {
            Ok(())
        } else {
            Err("node(s) didn't match Pod's node affinity/selector".to_string())
        }
    }
}

// NodeResourcesFit is a plugin that checks if a node has sufficient resources and pod slots.
pub struct NodeResourcesFit {}
impl FilterPlugin for NodeResourcesFit {
    fn filter(&self, pod: &Pod, node: &NodeInfo, _cache: &SchedulerCache) -> Result<(), String> {
        if node.pods.len() as u64 + 1 > node.max_pods() {
            return Err("Too many pods".to_string());
        }
        let requests = pod.spec.resources.requests;
        let free = node.free();
        if requests.cpu > free.cpu {
            return Err("Insufficient cpu".to_string());
        }
        if requests.ram > free.ram {
            return Err("Insufficient memory".to_string());
        }
        Ok(())
    }
}

// VolumeBinding requires every claim the pod mounts to exist and to be bound to a volume.
pub struct VolumeBinding {}
impl FilterPlugin for VolumeBinding {
    fn filter(&self, pod: &Pod, _node: &NodeInfo, cache: &SchedulerCache) -> Result<(), String> {
        for volume in pod.spec.volumes.iter() {
            match cache.get_claim(&pod.metadata.namespace, &volume.claim_name) {
                None => {
                    return Err(format!(
                        "persistentvolumeclaim {:?} not found",
                        volume.claim_name
                    ))
                }
                Some(claim) if !claim.is_bound() => {
                    return Err("pod has unbound immediate PersistentVolumeClaims".to_string())
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

// Share of the node's allocatable resources left free after placing the pod, averaged over cpu
// and memory, in percents.
fn free_share_after_placement(pod: &Pod, node: &NodeInfo) -> f64 {
    let allocatable = node.allocatable();
    let free = node.free().saturating_sub(pod.spec.resources.requests);
    let share = |free: u64, allocatable: u64| {
        if allocatable == 0 {
            0.0
        } else {
            free as f64 * 100.0 / allocatable as f64
        }
    };
    (share(free.cpu, allocatable.cpu) + share(free.ram, allocatable.ram)) / 2.0
}

// Least allocated resources plugin is a score plugin. Its score means that after subtracting pod's
// requested resources from node's free resources, the node with the highest
// percentage (relatively to allocatable) is prioritized for scheduling.
//
// Weights for cpu and memory are equal by default.
pub struct LeastAllocated {}
impl ScorePlugin for LeastAllocated {
    fn score(&self, pod: &Pod, node: &NodeInfo) -> f64 {
        free_share_after_placement(pod, node)
    }
}

// Most allocated is the opposite of least allocated: it favors nodes which are already busy.
pub struct MostAllocated {}
impl ScorePlugin for MostAllocated {
    fn score(&self, pod: &Pod, node: &NodeInfo) -> f64 {
        100.0 - free_share_after_placement(pod, node)
    }
}
