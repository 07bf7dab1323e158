//! Errors of the simulation engine. Terminal outcomes of a simulation (limit reached, pod
//! unschedulable, namespace missing) are not errors, they end up in the stop reason.

use thiserror::Error;

use crate::core::object::ResourceKind;
use crate::core::resource_store::StoreError;
use crate::core::rest_client::RestError;
use crate::core::scheduler::kube_scheduler::SchedulerConfigError;
use crate::simulator::strategy::StrategyError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to sync {kind}: {source}")]
    SyncFailed {
        kind: ResourceKind,
        #[source]
        source: RestError,
    },
    #[error("operation {operation:?} is not allowed in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },
    #[error("scheduler {0:?} is not configured")]
    UnknownScheduler(String),
    #[error("invalid scheduler profile: {0}")]
    SchedulerConfig(#[from] SchedulerConfigError),
    #[error("namespace {0} not found")]
    NamespaceNotFound(String),
    #[error("unable to check namespace: {0}")]
    Cluster(RestError),
    #[error("pod {0:?} not found")]
    PodNotFound(String),
    #[error("unable to add pod to the cluster: {0}")]
    Strategy(#[from] StrategyError),
    #[error("unable to create next pod to schedule: {0}")]
    NextPod(Box<SimulationError>),
    #[error("scheduler {0:?} exited unexpectedly")]
    SchedulerExited(String),
}

impl SimulationError {
    pub fn is_namespace_not_found(&self) -> bool {
        matches!(self, SimulationError::NamespaceNotFound(_))
    }
}
