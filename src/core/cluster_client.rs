//! Source of the initial cluster state. The simulation lists every tracked kind through a
//! `ClusterClient` once before it starts and asks it whether the namespace of the simulated pod
//! still exists before every pod injection.

use std::collections::BTreeSet;

use log::info;

use crate::core::common::{ObjectMeta, DEFAULT_NAMESPACE};
use crate::core::object::{KubeObject, Object, ResourceKind};
use crate::core::objects::Namespace;
use crate::core::resource_store::ResourceStore;
use crate::core::rest_client::RestError;
use crate::snapshot::ClusterSnapshot;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectList {
    pub items: Vec<Object>,
    pub resource_version: String,
}

pub trait ClusterClient: Send + Sync {
    fn list(&self, kind: ResourceKind) -> Result<ObjectList, RestError>;

    fn namespace_exists(&self, namespace: &str) -> Result<bool, RestError>;
}

/// Cluster living in memory, loaded from a snapshot. Stands in for a live cluster in the CLI and
/// in tests.
pub struct InMemoryCluster {
    store: ResourceStore,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self {
            store: ResourceStore::with_kinds(&ResourceKind::ALL),
        }
    }

    /// Loads all objects of the snapshot. When the snapshot names no namespaces, `default` and the
    /// namespaces of the listed pods are assumed to exist.
    pub fn from_snapshot(snapshot: ClusterSnapshot) -> Result<Self, RestError> {
        let cluster = Self::new();

        let mut namespaces = snapshot.namespaces.clone();
        if namespaces.is_empty() {
            let mut implied: BTreeSet<String> = BTreeSet::from([DEFAULT_NAMESPACE.to_string()]);
            implied.extend(snapshot.pods.iter().map(|pod| pod.namespace().to_string()));
            namespaces = implied.into_iter().filter(|ns| !ns.is_empty()).collect();
        }

        let namespaces: Vec<Object> = namespaces
            .iter()
            .map(|name| Namespace::new(name).into())
            .collect();
        cluster
            .store
            .replace(ResourceKind::Namespaces, namespaces, "1")?;
        for (kind, items) in snapshot.into_objects() {
            cluster.store.replace(kind, items, "1")?;
        }
        info!(
            "Loaded cluster snapshot with {} nodes and {} pods",
            cluster.store.count(ResourceKind::Nodes),
            cluster.store.count(ResourceKind::Pods)
        );
        Ok(cluster)
    }

    pub fn add(&self, obj: Object) -> Result<(), RestError> {
        Ok(self.store.add(obj.kind(), obj)?)
    }

    pub fn create_namespace(&self, name: &str) -> Result<(), RestError> {
        self.add(Namespace::new(name).into())
    }

    pub fn delete_namespace(&self, name: &str) -> Result<(), RestError> {
        self.store
            .delete(ResourceKind::Namespaces, &ObjectMeta::new(name, ""))?;
        Ok(())
    }
}

impl ClusterClient for InMemoryCluster {
    fn list(&self, kind: ResourceKind) -> Result<ObjectList, RestError> {
        Ok(ObjectList {
            items: self.store.list(kind)?,
            resource_version: self.store.resource_version(kind)?,
        })
    }

    fn namespace_exists(&self, namespace: &str) -> Result<bool, RestError> {
        Ok(self
            .store
            .get(ResourceKind::Namespaces, &ObjectMeta::new(namespace, ""))?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::cluster_client::{ClusterClient, InMemoryCluster};
    use crate::core::node::Node;
    use crate::core::object::ResourceKind;
    use crate::core::pod::Pod;
    use crate::snapshot::ClusterSnapshot;

    #[test]
    fn test_namespaces_implied_by_snapshot() {
        let cluster = InMemoryCluster::from_snapshot(ClusterSnapshot {
            nodes: vec![Node::new("node_1", 1000, 1000)],
            pods: vec![Pod::new("pod_1", "team-a", 100, 100)],
            ..Default::default()
        })
        .unwrap();

        assert!(cluster.namespace_exists("default").unwrap());
        assert!(cluster.namespace_exists("team-a").unwrap());
        assert!(!cluster.namespace_exists("team-b").unwrap());
        assert_eq!(1, cluster.list(ResourceKind::Nodes).unwrap().items.len());
        assert_eq!("1", cluster.list(ResourceKind::Pods).unwrap().resource_version);
    }

    #[test]
    fn test_explicit_namespaces_and_deletion() {
        let cluster = InMemoryCluster::from_snapshot(ClusterSnapshot {
            namespaces: vec!["prod".to_string()],
            ..Default::default()
        })
        .unwrap();
        assert!(!cluster.namespace_exists("default").unwrap());
        assert!(cluster.namespace_exists("prod").unwrap());

        cluster.delete_namespace("prod").unwrap();
        assert!(!cluster.namespace_exists("prod").unwrap());
        assert!(cluster.delete_namespace("prod").unwrap_err().is_not_found());
    }
}
