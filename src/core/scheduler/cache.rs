//! Scheduler view on the cluster: nodes with the resources requested by the pods placed on them
//! and persistent volume claims. Updated from the initial listing and watch events.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, warn};

use crate::core::common::RuntimeResources;
use crate::core::events::{WatchEvent, WatchEventType};
use crate::core::node::Node;
use crate::core::object::{KubeObject, Object, ResourceKind};
use crate::core::objects::PersistentVolumeClaim;
use crate::core::pod::{Pod, PodPhase};

/// Kubelet default for nodes which do not set a pod limit.
pub const DEFAULT_MAX_PODS: u64 = 110;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeInfo {
    /// None while pods reference a node which was not observed yet.
    pub node: Option<Node>,
    /// Sum of requests of pods placed on the node
    pub requested: RuntimeResources,
    pub pods: BTreeSet<String>,
}

impl NodeInfo {
    pub fn allocatable(&self) -> RuntimeResources {
        self.node
            .as_ref()
            .map(|node| node.allocatable())
            .unwrap_or_default()
    }

    pub fn free(&self) -> RuntimeResources {
        self.allocatable().saturating_sub(self.requested)
    }

    pub fn max_pods(&self) -> u64 {
        match self.node.as_ref().map(|node| node.status.max_pods) {
            Some(0) | None => DEFAULT_MAX_PODS,
            Some(max_pods) => max_pods,
        }
    }
}

#[derive(Debug, Default)]
pub struct SchedulerCache {
    nodes: BTreeMap<String, NodeInfo>,
    // Pod key -> (node name, requests) for every pod accounted on a node
    placements: HashMap<String, (String, RuntimeResources)>,
    // Claim key -> claim
    claims: HashMap<String, PersistentVolumeClaim>,
}

impl SchedulerCache {
    pub fn new() -> Self {
        Default::default()
    }

    /// Nodes which can be considered for scheduling, ordered by name.
    pub fn nodes(&self) -> impl Iterator<Item = (&String, &NodeInfo)> {
        self.nodes.iter().filter(|(_, info)| info.node.is_some())
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn get_node(&self, node_name: &str) -> Option<&NodeInfo> {
        self.nodes.get(node_name)
    }

    pub fn get_claim(&self, namespace: &str, name: &str) -> Option<&PersistentVolumeClaim> {
        self.claims.get(&format!("{}/{}", namespace, name))
    }

    pub fn is_accounted(&self, pod: &Pod) -> bool {
        self.placements.contains_key(&pod.key())
    }

    pub fn add_node(&mut self, node: Node) {
        let node_name = node.metadata.name.clone();
        self.nodes.entry(node_name).or_default().node = Some(node);
    }

    pub fn remove_node(&mut self, node_name: &str) {
        let Some(info) = self.nodes.get_mut(node_name) else {
            return;
        };
        if info.pods.is_empty() {
            self.nodes.remove(node_name);
        } else {
            // Keep accounting of pods still referencing the node.
            info.node = None;
        }
    }

    /// Accounts a pod scheduled to `node_name` before the binding is observed.
    pub fn assume_pod(&mut self, pod: &Pod, node_name: &str) {
        self.account(pod.key(), node_name, pod.spec.resources.requests);
    }

    pub fn forget_pod(&mut self, pod: &Pod) {
        self.unaccount(&pod.key());
    }

    /// Applies an observed pod: bound running pods are accounted, finished or unbound ones are not.
    pub fn set_pod(&mut self, pod: &Pod) {
        let key = pod.key();
        let occupies_node = pod.is_bound()
            && !matches!(pod.status.phase, PodPhase::Succeeded | PodPhase::Failed);
        if !occupies_node {
            self.unaccount(&key);
            return;
        }
        if let Some((node_name, _)) = self.placements.get(&key) {
            if *node_name == pod.spec.node_name {
                return;
            }
            warn!(
                "Pod {:?} moved from node {:?} to {:?}",
                key, node_name, pod.spec.node_name
            );
            self.unaccount(&key);
        }
        self.account(key, &pod.spec.node_name, pod.spec.resources.requests);
    }

    pub fn remove_pod(&mut self, pod: &Pod) {
        self.unaccount(&pod.key());
    }

    pub fn set_claim(&mut self, claim: PersistentVolumeClaim) {
        self.claims.insert(claim.key(), claim);
    }

    pub fn remove_claim(&mut self, claim: &PersistentVolumeClaim) {
        self.claims.remove(&claim.key());
    }

    /// Applies a listed object as if it was added.
    pub fn add_object(&mut self, obj: &Object) {
        match obj {
            Object::Node(node) => self.add_node(node.clone()),
            Object::Pod(pod) => self.set_pod(pod),
            Object::PersistentVolumeClaim(claim) => self.set_claim(claim.clone()),
            _ => {}
        }
    }

    pub fn handle_event(&mut self, event: &WatchEvent) {
        match (event.kind, event.event_type) {
            (ResourceKind::Nodes, WatchEventType::Deleted) => {
                self.remove_node(&event.object.metadata().name)
            }
            (ResourceKind::Pods, WatchEventType::Deleted) => {
                if let Some(pod) = event.object.as_pod() {
                    self.remove_pod(pod);
                }
            }
            (ResourceKind::PersistentVolumeClaims, WatchEventType::Deleted) => {
                if let Some(claim) = event.object.as_persistent_volume_claim() {
                    self.remove_claim(claim);
                }
            }
            _ => self.add_object(&event.object),
        }
    }

    fn account(&mut self, key: String, node_name: &str, requests: RuntimeResources) {
        if self.placements.contains_key(&key) {
            return;
        }
        let info = self.nodes.entry(node_name.to_string()).or_default();
        info.requested = info.requested + requests;
        info.pods.insert(key.clone());
        debug!("Accounted pod {:?} on node {:?}", key, node_name);
        self.placements.insert(key, (node_name.to_string(), requests));
    }

    fn unaccount(&mut self, key: &str) {
        let Some((node_name, requests)) = self.placements.remove(key) else {
            return;
        };
        if let Some(info) = self.nodes.get_mut(&node_name) {
            info.requested = info.requested.saturating_sub(requests);
            info.pods.remove(key);
            if info.node.is_none() && info.pods.is_empty() {
                self.nodes.remove(&node_name);
            }
        }
    }
}
