//! Type definition for Pod primitive in k8s cluster

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cluster_capacity_derive::KubeObject;

use crate::core::common::{ObjectMeta, RuntimeResources};

pub const DEFAULT_SCHEDULER_NAME: &str = "default-scheduler";

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct Resources {
    #[serde(default)]
    pub limits: RuntimeResources,
    #[serde(default)]
    pub requests: RuntimeResources,
}

/// Simplified volume source: only persistent volume claims matter for scheduling.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PodVolume {
    pub name: String,
    pub claim_name: String,
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PodSpec {
    /// Simplified: instead of vector of containers - one container with resources
    #[serde(default)]
    pub resources: Resources,
    /// Name of the node the pod is bound to, empty while pending.
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub scheduler_name: String,
    #[serde(default)]
    pub volumes: Vec<PodVolume>,
}

#[derive(Default, Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum PodConditionType {
    // Pod is scheduled to a node, False while the scheduler can not find a node for it
    PodScheduled,
    // Pod is able to serve requests
    Ready,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PodCondition {
    pub condition_type: PodConditionType,
    // True, False or Unknown
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Default, Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: PodPhase,
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, KubeObject)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

impl Pod {
    pub fn new(name: &str, namespace: &str, cpu: u64, ram: u64) -> Self {
        Self {
            metadata: ObjectMeta::new(name, namespace),
            spec: PodSpec {
                resources: Resources {
                    limits: RuntimeResources { cpu, ram },
                    requests: RuntimeResources { cpu, ram },
                },
                ..Default::default()
            },
            status: Default::default(),
        }
    }

    pub fn is_bound(&self) -> bool {
        !self.spec.node_name.is_empty()
    }

    pub fn scheduler_name(&self) -> &str {
        if self.spec.scheduler_name.is_empty() {
            DEFAULT_SCHEDULER_NAME
        } else {
            &self.spec.scheduler_name
        }
    }

    pub fn update_condition(&mut self, new_condition: PodCondition) {
        let conditions = &mut self.status.conditions;
        match conditions
            .iter_mut()
            .find(|elem| elem.condition_type == new_condition.condition_type)
        {
            Some(condition) => *condition = new_condition,
            None => conditions.push(new_condition),
        }
    }

    // Ref to condition if it exists else None.
    pub fn get_condition(&self, condition_type: PodConditionType) -> Option<&PodCondition> {
        self.status
            .conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

#[cfg(test)]
mod tests {
    use super::{Pod, PodCondition, PodConditionType, DEFAULT_SCHEDULER_NAME};

    #[test]
    fn test_update_condition_replaces_existing_condition() {
        let mut pod = Pod::new("pod_1", "default", 100, 100);
        pod.update_condition(PodCondition {
            condition_type: PodConditionType::PodScheduled,
            status: "False".to_string(),
            reason: "Unschedulable".to_string(),
            message: "no nodes".to_string(),
        });
        pod.update_condition(PodCondition {
            condition_type: PodConditionType::PodScheduled,
            status: "True".to_string(),
            reason: String::new(),
            message: String::new(),
        });

        assert_eq!(1, pod.status.conditions.len());
        assert_eq!(
            "True",
            pod.get_condition(PodConditionType::PodScheduled).unwrap().status
        );
        assert!(pod.get_condition(PodConditionType::Ready).is_none());
    }

    #[test]
    fn test_default_scheduler_name() {
        let mut pod = Pod::new("pod_1", "default", 100, 100);
        assert_eq!(DEFAULT_SCHEDULER_NAME, pod.scheduler_name());
        pod.spec.scheduler_name = "custom".to_string();
        assert_eq!("custom", pod.scheduler_name());
    }
}
