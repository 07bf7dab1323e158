//! Type definitions for the cluster objects which the scheduler watches besides pods and nodes.
//! Only the fields the simulation reads are modeled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cluster_capacity_derive::KubeObject;

use crate::core::common::ObjectMeta;

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PersistentVolumeSpec {
    /// Storage capacity in bytes
    #[serde(default)]
    pub capacity: u64,
    /// `<namespace>/<name>` of the claim the volume is bound to
    #[serde(default)]
    pub claim_ref: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, KubeObject)]
pub struct PersistentVolume {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PersistentVolumeSpec,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PersistentVolumeClaimSpec {
    /// Requested storage in bytes
    #[serde(default)]
    pub storage: u64,
    /// Name of the bound volume, empty while the claim is pending.
    #[serde(default)]
    pub volume_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, KubeObject)]
pub struct PersistentVolumeClaim {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PersistentVolumeClaimSpec,
}

impl PersistentVolumeClaim {
    pub fn is_bound(&self) -> bool {
        !self.spec.volume_name.is_empty()
    }
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ControllerSpec {
    #[serde(default)]
    pub replicas: u32,
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, KubeObject)]
pub struct ReplicationController {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ControllerSpec,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, KubeObject)]
pub struct ReplicaSet {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ControllerSpec,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, KubeObject)]
pub struct StatefulSet {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ControllerSpec,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServiceSpec {
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, KubeObject)]
pub struct Service {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, KubeObject)]
pub struct Namespace {
    pub metadata: ObjectMeta,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            metadata: ObjectMeta::new(name, ""),
        }
    }
}
