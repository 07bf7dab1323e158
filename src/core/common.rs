use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ObjectMeta {
    pub name: String,
    /// Empty for cluster-scoped objects (nodes, persistent volumes, namespaces).
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Set by the resource store on every write.
    #[serde(default)]
    pub resource_version: String,
}

impl ObjectMeta {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    /// Store key in the `<namespace>/<name>` form, just `<name>` for cluster-scoped objects.
    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.contains_key(annotation)
    }
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub struct RuntimeResources {
    #[serde(default)]
    pub cpu: u64, // in millicores
    #[serde(default)]
    pub ram: u64, // in bytes
}

impl RuntimeResources {
    pub fn is_zero(&self) -> bool {
        self.cpu == 0 && self.ram == 0
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            cpu: self.cpu.saturating_sub(other.cpu),
            ram: self.ram.saturating_sub(other.ram),
        }
    }
}

impl Add for RuntimeResources {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            cpu: self.cpu + other.cpu,
            ram: self.ram + other.ram,
        }
    }
}

impl Sub for RuntimeResources {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            cpu: self.cpu - other.cpu,
            ram: self.ram - other.ram,
        }
    }
}
