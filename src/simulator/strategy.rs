//! Emulation strategies decide how a bound simulated pod changes the simulated cluster.

use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::core::common::ObjectMeta;
use crate::core::object::{KubeObject, ResourceKind};
use crate::core::pod::Pod;
use crate::core::resource_store::{ResourceStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StrategyError {
    #[error("pod {pod:?} is bound to unknown node {node:?}")]
    UnknownNode { pod: String, node: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub trait EmulationStrategy: Send + Sync {
    /// Applies a pod which was just bound to a node.
    fn add(&self, pod: &Pod) -> Result<(), StrategyError>;
}

/// Writes bound pods into the resource store so that schedulers observe them as running.
pub struct PredictiveStrategy {
    store: Arc<ResourceStore>,
}

impl PredictiveStrategy {
    pub fn new(store: Arc<ResourceStore>) -> Self {
        Self { store }
    }
}

impl EmulationStrategy for PredictiveStrategy {
    fn add(&self, pod: &Pod) -> Result<(), StrategyError> {
        let node = ObjectMeta::new(&pod.spec.node_name, "");
        if self.store.get(ResourceKind::Nodes, &node)?.is_none() {
            return Err(StrategyError::UnknownNode {
                pod: pod.key(),
                node: pod.spec.node_name.clone(),
            });
        }
        debug!("Pod {:?} placed on node {:?}", pod.key(), pod.spec.node_name);
        self.store.update(ResourceKind::Pods, pod.clone().into())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::common::ObjectMeta;
    use crate::core::node::Node;
    use crate::core::object::ResourceKind;
    use crate::core::pod::Pod;
    use crate::core::resource_store::ResourceStore;
    use crate::simulator::strategy::{EmulationStrategy, PredictiveStrategy, StrategyError};

    #[test]
    fn test_bound_pod_is_written_to_store() {
        let store = Arc::new(ResourceStore::new());
        store
            .add(ResourceKind::Nodes, Node::new("node_1", 1000, 1000).into())
            .unwrap();
        let mut pod = Pod::new("pod_1", "default", 100, 100);
        store.add(ResourceKind::Pods, pod.clone().into()).unwrap();

        let strategy = PredictiveStrategy::new(store.clone());
        pod.spec.node_name = "node_2".to_string();
        assert!(matches!(
            strategy.add(&pod),
            Err(StrategyError::UnknownNode { .. })
        ));

        pod.spec.node_name = "node_1".to_string();
        strategy.add(&pod).unwrap();
        let stored = store
            .get(ResourceKind::Pods, &ObjectMeta::new("pod_1", "default"))
            .unwrap()
            .unwrap();
        assert_eq!("node_1", stored.into_pod().unwrap().spec.node_name);
    }
}
