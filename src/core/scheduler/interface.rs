use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use thiserror::Error;

use crate::core::pod::{Pod, PodCondition};
use crate::core::scheduler::cache::SchedulerCache;

/// Reasons why no node fits the pod: node name -> reason of the first filter which rejected it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitError {
    pub num_all_nodes: usize,
    pub failed_nodes: BTreeMap<String, String>,
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut histogram: BTreeMap<&str, usize> = BTreeMap::new();
        for reason in self.failed_nodes.values() {
            *histogram.entry(reason).or_default() += 1;
        }
        let reasons: Vec<String> = histogram
            .into_iter()
            .map(|(reason, count)| format!("{} {}", count, reason))
            .collect();
        write!(
            f,
            "0/{} nodes are available: {}.",
            self.num_all_nodes,
            reasons.join(", ")
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("no nodes available to schedule pods")]
    NoNodesInCluster,
    #[error("{0}")]
    Unschedulable(FitError),
}

impl ScheduleError {
    /// Fit errors are expected outcomes of a scheduling attempt rather than failures.
    pub fn is_fit_error(&self) -> bool {
        matches!(self, ScheduleError::Unschedulable(_))
    }
}

// Trait which should implement any scheduler in cluster-capacity framework.
pub trait PodSchedulingAlgorithm: Send {
    // A method to assign a node on which the pod will be placed.
    // Returns Result consisting of name of assigned node or scheduling error.
    fn schedule_one(&self, pod: &Pod, cache: &SchedulerCache) -> Result<String, ScheduleError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub pod_name: String,
    pub pod_namespace: String,
    pub target_node: String,
}

pub type CallbackResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Commits the scheduling decision for a pod.
pub trait Binder: Send + Sync {
    fn bind(&self, binding: &Binding) -> CallbackResult;
}

/// Reports pod condition changes, e.g. that the pod is unschedulable.
pub trait PodConditionUpdater: Send + Sync {
    fn update(&self, pod: &Pod, condition: &PodCondition) -> CallbackResult;
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::FitError;

    #[test]
    fn test_fit_error_message() {
        let fit_error = FitError {
            num_all_nodes: 4,
            failed_nodes: BTreeMap::from([
                ("node_1".to_string(), "Insufficient cpu".to_string()),
                ("node_2".to_string(), "node(s) were unschedulable".to_string()),
                ("node_3".to_string(), "Insufficient cpu".to_string()),
                ("node_4".to_string(), "Insufficient memory".to_string()),
            ]),
        };
        assert_eq!(
            "0/4 nodes are available: 2 Insufficient cpu, 1 Insufficient memory, 1 node(s) were unschedulable.",
            fit_error.to_string()
        );
    }
}
