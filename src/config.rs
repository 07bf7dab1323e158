//! Config of a cluster-capacity simulation and loading of its input documents.

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::core::common::DEFAULT_NAMESPACE;
use crate::core::pod::{Pod, DEFAULT_SCHEDULER_NAME};
use crate::core::scheduler::kube_scheduler::{
    default_kube_scheduler_config, KubeSchedulerConfig, SchedulerConfigError,
};
use crate::core::scheduler::plugin::PluginRegistry;
use crate::snapshot::ClusterSnapshot;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid pod: {0}")]
    InvalidPod(String),
    #[error("invalid scheduler config: {0}")]
    Scheduler(#[from] SchedulerConfigError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterCapacityConfig {
    /// Template of the simulated pods
    pub pod: Pod,
    /// Maximum number of pods to simulate, 0 means no limit.
    pub max_limit: usize,
    pub scheduler_config: KubeSchedulerConfig,
}

impl ClusterCapacityConfig {
    /// Config with the default scheduler profile. The pod is defaulted and validated.
    pub fn new(pod: Pod, max_limit: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            pod: default_and_validate_pod(pod)?,
            max_limit,
            scheduler_config: default_kube_scheduler_config(),
        })
    }

    pub fn with_scheduler_config(mut self, scheduler_config: KubeSchedulerConfig) -> Self {
        self.scheduler_config = scheduler_config;
        self
    }

    pub fn validate(&self, registry: &PluginRegistry) -> Result<(), ConfigError> {
        self.scheduler_config.validate(registry)?;
        Ok(())
    }
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Fills the defaults kube-apiserver would set and rejects pods which can never be created.
pub fn default_and_validate_pod(mut pod: Pod) -> Result<Pod, ConfigError> {
    if pod.metadata.name.is_empty() {
        return Err(ConfigError::InvalidPod("metadata.name is required".to_string()));
    }
    if pod.metadata.namespace.is_empty() {
        pod.metadata.namespace = DEFAULT_NAMESPACE.to_string();
    }
    if pod.spec.scheduler_name.is_empty() {
        pod.spec.scheduler_name = DEFAULT_SCHEDULER_NAME.to_string();
    }

    let resources = &pod.spec.resources;
    if resources.limits.cpu != 0 && resources.requests.cpu > resources.limits.cpu {
        return Err(ConfigError::InvalidPod(format!(
            "cpu request {} is greater than limit {}",
            resources.requests.cpu, resources.limits.cpu
        )));
    }
    if resources.limits.ram != 0 && resources.requests.ram > resources.limits.ram {
        return Err(ConfigError::InvalidPod(format!(
            "memory request {} is greater than limit {}",
            resources.requests.ram, resources.limits.ram
        )));
    }
    // Simulated pods are always pending new pods.
    pod.spec.node_name.clear();
    pod.status = Default::default();
    Ok(pod)
}

pub fn load_pod_spec(path: &Path) -> Result<Pod, ConfigError> {
    let pod: Pod = read_yaml(path)?;
    info!("Loaded pod template {:?} from {:?}", pod.metadata.name, path);
    default_and_validate_pod(pod)
}

/// Scheduler config from the file, the default one when no file is given.
pub fn load_scheduler_config(path: Option<&Path>) -> Result<KubeSchedulerConfig, ConfigError> {
    match path {
        Some(path) => {
            let config: KubeSchedulerConfig = read_yaml(path)?;
            info!(
                "Loaded scheduler config with {} profile(s) from {:?}",
                config.profiles.len(),
                path
            );
            Ok(config)
        }
        None => Ok(default_kube_scheduler_config()),
    }
}

pub fn load_snapshot(path: &Path) -> Result<ClusterSnapshot, ConfigError> {
    read_yaml(path)
}
