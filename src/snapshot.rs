//! Represents the YAML format of a cluster snapshot which is used as the initial state of the
//! simulated cluster instead of a live cluster listing.

use serde::{Deserialize, Serialize};

use crate::core::node::Node;
use crate::core::object::{Object, ResourceKind};
use crate::core::objects::{
    PersistentVolume, PersistentVolumeClaim, ReplicaSet, ReplicationController, Service,
    StatefulSet,
};
use crate::core::pod::Pod;

#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Clone)]
pub struct ClusterSnapshot {
    /// Names of existing namespaces
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub pods: Vec<Pod>,
    #[serde(default)]
    pub persistent_volumes: Vec<PersistentVolume>,
    #[serde(default)]
    pub persistent_volume_claims: Vec<PersistentVolumeClaim>,
    #[serde(default)]
    pub replication_controllers: Vec<ReplicationController>,
    #[serde(default)]
    pub replica_sets: Vec<ReplicaSet>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub stateful_sets: Vec<StatefulSet>,
}

fn objects<T: Into<Object>>(items: Vec<T>) -> Vec<Object> {
    items.into_iter().map(Into::into).collect()
}

impl ClusterSnapshot {
    /// Objects grouped by the tracked kinds, namespaces excluded.
    pub fn into_objects(self) -> Vec<(ResourceKind, Vec<Object>)> {
        vec![
            (ResourceKind::Pods, objects(self.pods)),
            (ResourceKind::Nodes, objects(self.nodes)),
            (ResourceKind::PersistentVolumes, objects(self.persistent_volumes)),
            (
                ResourceKind::PersistentVolumeClaims,
                objects(self.persistent_volume_claims),
            ),
            (
                ResourceKind::ReplicationControllers,
                objects(self.replication_controllers),
            ),
            (ResourceKind::ReplicaSets, objects(self.replica_sets)),
            (ResourceKind::Services, objects(self.services)),
            (ResourceKind::StatefulSets, objects(self.stateful_sets)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use crate::core::object::ResourceKind;
    use crate::snapshot::ClusterSnapshot;

    #[test]
    fn test_parse_snapshot() {
        let snapshot: ClusterSnapshot = serde_yaml::from_str(
            &r#"
        namespaces: [default, storage]
        nodes:
        - metadata:
            name: node_1
            labels:
              zone: a
          status:
            capacity:
              cpu: 4000
              ram: 8589934592
        pods:
        - metadata:
            name: running_pod
            namespace: default
          spec:
            node_name: node_1
            resources:
              requests:
                cpu: 1000
                ram: 1073741824
        persistent_volume_claims:
        - metadata:
            name: data
            namespace: storage
          spec:
            storage: 1073741824
            volume_name: pv_1
        "#,
        )
        .unwrap();

        assert_eq!(2, snapshot.namespaces.len());
        assert_eq!("a", snapshot.nodes[0].metadata.labels["zone"]);
        assert_eq!("node_1", snapshot.pods[0].spec.node_name);
        assert!(snapshot.persistent_volume_claims[0].is_bound());

        let grouped = snapshot.into_objects();
        assert_eq!(8, grouped.len());
        assert!(grouped
            .iter()
            .all(|(kind, items)| items.iter().all(|obj| obj.kind() == *kind)));
    }
}
