//! Kind-erased view on the cluster objects kept in the resource store and passed through the
//! fake REST layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::common::ObjectMeta;
use crate::core::node::Node;
use crate::core::objects::{
    Namespace, PersistentVolume, PersistentVolumeClaim, ReplicaSet, ReplicationController,
    Service, StatefulSet,
};
use crate::core::pod::Pod;

/// Implemented by every object type via `#[derive(KubeObject)]`.
pub trait KubeObject {
    fn metadata(&self) -> &ObjectMeta;
    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn namespace(&self) -> &str {
        &self.metadata().namespace
    }

    fn key(&self) -> String {
        self.metadata().key()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Pods,
    Nodes,
    PersistentVolumes,
    PersistentVolumeClaims,
    ReplicationControllers,
    ReplicaSets,
    Services,
    StatefulSets,
    Namespaces,
}

impl ResourceKind {
    /// Kinds the scheduler watches and the simulation resource store tracks.
    pub const TRACKED: [ResourceKind; 8] = [
        ResourceKind::Pods,
        ResourceKind::Nodes,
        ResourceKind::PersistentVolumes,
        ResourceKind::PersistentVolumeClaims,
        ResourceKind::ReplicationControllers,
        ResourceKind::ReplicaSets,
        ResourceKind::Services,
        ResourceKind::StatefulSets,
    ];

    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Pods,
        ResourceKind::Nodes,
        ResourceKind::PersistentVolumes,
        ResourceKind::PersistentVolumeClaims,
        ResourceKind::ReplicationControllers,
        ResourceKind::ReplicaSets,
        ResourceKind::Services,
        ResourceKind::StatefulSets,
        ResourceKind::Namespaces,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pods => "pods",
            ResourceKind::Nodes => "nodes",
            ResourceKind::PersistentVolumes => "persistentvolumes",
            ResourceKind::PersistentVolumeClaims => "persistentvolumeclaims",
            ResourceKind::ReplicationControllers => "replicationcontrollers",
            ResourceKind::ReplicaSets => "replicasets",
            ResourceKind::Services => "services",
            ResourceKind::StatefulSets => "statefulsets",
            ResourceKind::Namespaces => "namespaces",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown resource kind {0:?}")]
pub struct UnknownResourceKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownResourceKind(s.to_string()))
    }
}

macro_rules! objects {
    ( $( $variant:ident => $kind:ident, $as_ref:ident, $into:ident; )+ ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum Object {
            $( $variant($variant), )+
        }

        impl Object {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $( Object::$variant(_) => ResourceKind::$kind, )+
                }
            }

            pub fn metadata(&self) -> &ObjectMeta {
                match self {
                    $( Object::$variant(object) => object.metadata(), )+
                }
            }

            pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
                match self {
                    $( Object::$variant(object) => object.metadata_mut(), )+
                }
            }

            $(
                pub fn $as_ref(&self) -> Option<&$variant> {
                    match self {
                        Object::$variant(object) => Some(object),
                        _ => None,
                    }
                }

                pub fn $into(self) -> Option<$variant> {
                    match self {
                        Object::$variant(object) => Some(object),
                        _ => None,
                    }
                }
            )+
        }

        $(
            impl From<$variant> for Object {
                fn from(object: $variant) -> Self {
                    Object::$variant(object)
                }
            }
        )+
    };
}

objects! {
    Pod => Pods, as_pod, into_pod;
    Node => Nodes, as_node, into_node;
    PersistentVolume => PersistentVolumes, as_persistent_volume, into_persistent_volume;
    PersistentVolumeClaim => PersistentVolumeClaims, as_persistent_volume_claim, into_persistent_volume_claim;
    ReplicationController => ReplicationControllers, as_replication_controller, into_replication_controller;
    ReplicaSet => ReplicaSets, as_replica_set, into_replica_set;
    Service => Services, as_service, into_service;
    StatefulSet => StatefulSets, as_stateful_set, into_stateful_set;
    Namespace => Namespaces, as_namespace, into_namespace;
}

impl Object {
    pub fn key(&self) -> String {
        self.metadata().key()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::core::node::Node;
    use crate::core::object::{Object, ResourceKind, UnknownResourceKind};
    use crate::core::pod::Pod;

    #[test]
    fn test_resource_kind_parsing() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind, ResourceKind::from_str(kind.as_str()).unwrap());
        }
        assert_eq!(
            UnknownResourceKind("deployments".to_string()),
            ResourceKind::from_str("deployments").unwrap_err()
        );
    }

    #[test]
    fn test_object_kind_and_downcast() {
        let object = Object::from(Pod::new("pod_1", "default", 100, 100));
        assert_eq!(ResourceKind::Pods, object.kind());
        assert_eq!("default/pod_1", object.key());
        assert!(object.as_node().is_none());
        assert_eq!("pod_1", object.into_pod().unwrap().metadata.name);

        let object = Object::from(Node::new("node_1", 1000, 1000));
        assert_eq!(ResourceKind::Nodes, object.kind());
        assert_eq!("node_1", object.key());
    }
}
