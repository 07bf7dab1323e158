//! Review of a finished simulation: what was simulated, how many copies fit, where they landed and
//! why the simulation stopped.

pub mod printer;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::pod::Pod;
use crate::metrics::collector::MetricsCollector;
use crate::simulator::Status;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterCapacityReview {
    pub spec: ClusterCapacityReviewSpec,
    pub status: ClusterCapacityReviewStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterCapacityReviewSpec {
    /// Pods the simulation was asked to place copies of
    pub templates: Vec<Pod>,
    /// Requested maximum number of copies, 0 if unlimited
    pub replicas: usize,
    pub pod_requirements: Vec<Requirements>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Requirements {
    pub pod_name: String,
    pub resources: PodResources,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selectors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PodResources {
    pub cpu: u64,    // in millicores
    pub memory: u64, // in bytes
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterCapacityReviewStatus {
    pub creation_timestamp: DateTime<Utc>,
    /// Number of copies which were scheduled
    pub replicas: usize,
    pub fail_reason: Option<ClusterCapacityReviewScheduleFailReason>,
    pub pods: Vec<ClusterCapacityReviewResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_latency: Option<SchedulingLatency>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterCapacityReviewScheduleFailReason {
    pub fail_type: String,
    pub fail_message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterCapacityReviewResult {
    pub pod_name: String,
    pub replicas_on_nodes: Vec<ReplicasOnNode>,
}

impl ClusterCapacityReviewResult {
    pub fn instances(&self) -> usize {
        self.replicas_on_nodes.iter().map(|r| r.replicas).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReplicasOnNode {
    pub node_name: String,
    pub replicas: usize,
}

/// Time (secs) from queueing a pod to binding it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SchedulingLatency {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
}

fn pod_requirements(template: &Pod) -> Requirements {
    let requests = template.spec.resources.requests;
    Requirements {
        pod_name: template.metadata.name.clone(),
        resources: PodResources {
            cpu: requests.cpu,
            memory: requests.ram,
        },
        node_selectors: template.spec.node_selector.clone(),
    }
}

fn fail_reason(stop_reason: &str) -> Option<ClusterCapacityReviewScheduleFailReason> {
    if stop_reason.is_empty() {
        return None;
    }
    let (fail_type, fail_message) = stop_reason.split_once(": ").unwrap_or((stop_reason, ""));
    Some(ClusterCapacityReviewScheduleFailReason {
        fail_type: fail_type.to_string(),
        fail_message: fail_message.to_string(),
    })
}

// Copies of the template are named `<template>-<index>`.
fn is_copy_of(pod: &Pod, template: &Pod) -> bool {
    pod.metadata
        .name
        .strip_prefix(template.metadata.name.as_str())
        .and_then(|suffix| suffix.strip_prefix('-'))
        .is_some_and(|index| index.parse::<usize>().is_ok())
}

fn pod_review(template: &Pod, pods: &[Pod]) -> ClusterCapacityReviewResult {
    let mut replicas: BTreeMap<&str, usize> = BTreeMap::new();
    for pod in pods.iter().filter(|pod| is_copy_of(pod, template)) {
        *replicas.entry(pod.spec.node_name.as_str()).or_default() += 1;
    }
    ClusterCapacityReviewResult {
        pod_name: template.metadata.name.clone(),
        replicas_on_nodes: replicas
            .into_iter()
            .map(|(node_name, replicas)| ReplicasOnNode {
                node_name: node_name.to_string(),
                replicas,
            })
            .collect(),
    }
}

impl ClusterCapacityReview {
    pub fn new(
        templates: &[Pod],
        max_limit: usize,
        status: &Status,
        metrics: &MetricsCollector,
    ) -> Self {
        let latency = &metrics.pod_scheduling_latency_stats;
        let scheduling_latency = if latency.is_empty() {
            None
        } else {
            Some(SchedulingLatency {
                min: latency.min(),
                max: latency.max(),
                mean: latency.mean(),
                variance: latency.population_variance(),
            })
        };

        Self {
            spec: ClusterCapacityReviewSpec {
                templates: templates.to_vec(),
                replicas: max_limit,
                pod_requirements: templates.iter().map(pod_requirements).collect(),
            },
            status: ClusterCapacityReviewStatus {
                creation_timestamp: Utc::now(),
                replicas: status.pods.len(),
                fail_reason: fail_reason(&status.stop_reason),
                pods: templates
                    .iter()
                    .map(|template| pod_review(template, &status.pods))
                    .collect(),
                scheduling_latency,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::pod::Pod;
    use crate::metrics::collector::MetricsCollector;
    use crate::report::{ClusterCapacityReview, ReplicasOnNode};
    use crate::simulator::Status;

    fn bound_copy(index: usize, node_name: &str) -> Pod {
        let mut pod = Pod::new(&format!("small-pod-{}", index), "default", 100, 200);
        pod.spec.node_name = node_name.to_string();
        pod
    }

    #[test]
    fn test_review_contents() {
        let template = Pod::new("small-pod", "default", 100, 200);
        let status = Status {
            pods: vec![
                bound_copy(0, "node_2"),
                bound_copy(1, "node_1"),
                bound_copy(2, "node_2"),
            ],
            stop_reason: "LimitReached: Maximum number of pods simulated: 3".to_string(),
        };

        let review = ClusterCapacityReview::new(&[template], 3, &status, &MetricsCollector::new());
        assert_eq!(3, review.spec.replicas);
        assert_eq!(100, review.spec.pod_requirements[0].resources.cpu);
        assert_eq!(200, review.spec.pod_requirements[0].resources.memory);
        assert_eq!(3, review.status.replicas);
        assert!(review.status.scheduling_latency.is_none());

        let fail_reason = review.status.fail_reason.as_ref().unwrap();
        assert_eq!("LimitReached", fail_reason.fail_type);
        assert_eq!("Maximum number of pods simulated: 3", fail_reason.fail_message);

        let pods = &review.status.pods[0];
        assert_eq!(3, pods.instances());
        assert_eq!(
            vec![
                ReplicasOnNode {
                    node_name: "node_1".to_string(),
                    replicas: 1
                },
                ReplicasOnNode {
                    node_name: "node_2".to_string(),
                    replicas: 2
                },
            ],
            pods.replicas_on_nodes
        );
    }

    #[test]
    fn test_review_of_empty_run() {
        let template = Pod::new("small-pod", "nonexistent", 100, 200);
        let status = Status {
            pods: vec![],
            stop_reason: "NamespaceNotFound: namespace nonexistent not found".to_string(),
        };
        let review = ClusterCapacityReview::new(&[template], 0, &status, &MetricsCollector::new());
        assert_eq!(0, review.status.replicas);
        assert_eq!(0, review.status.pods[0].instances());
        assert_eq!(
            "NamespaceNotFound",
            review.status.fail_reason.unwrap().fail_type
        );
    }
}
