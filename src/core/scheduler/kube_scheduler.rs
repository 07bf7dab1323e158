//! Implementation of the kube-scheduler scheduling algorithm: every node is run through the filter
//! plugins of a profile, feasible nodes are scored by the weighted score plugins and the best one
//! is chosen.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::pod::{Pod, DEFAULT_SCHEDULER_NAME};
use crate::core::scheduler::cache::SchedulerCache;
use crate::core::scheduler::interface::{FitError, PodSchedulingAlgorithm, ScheduleError};
use crate::core::scheduler::plugin::{
    FilterPlugin, PluginRegistry, PluginType, Plugins, ScorePlugin, DEFAULT_PROVIDER,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerConfigError {
    #[error("plugin {0:?} is not registered")]
    UnknownPlugin(String),
    #[error("{0:?} plugin is not a filter plugin")]
    NotAFilterPlugin(String),
    #[error("{0:?} plugin is not a score plugin")]
    NotAScorePlugin(String),
    #[error("algorithm provider {0:?} is not registered")]
    UnknownProvider(String),
    #[error("scheduler profile {0:?} is defined more than once")]
    DuplicateProfile(String),
    #[error("no scheduler profiles configured")]
    NoProfiles,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KubeSchedulerConfig {
    // Profiles are scheduling profiles that kube-scheduler supports. Pods can
    // choose to be scheduled under a particular profile by setting its associated
    // scheduler name in spec. Pods that don't specify any scheduler name are scheduled
    // with the "default-scheduler" profile, if present here.
    pub profiles: Vec<KubeSchedulerProfile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KubeSchedulerProfile {
    pub scheduler_name: String,
    /// Named plugin set used when `plugins` is not given, `DefaultProvider` if neither is set.
    #[serde(default)]
    pub algorithm_provider: Option<String>,
    #[serde(default)]
    pub plugins: Option<Plugins>,
}

pub fn default_kube_scheduler_config() -> KubeSchedulerConfig {
    KubeSchedulerConfig {
        profiles: vec![KubeSchedulerProfile {
            scheduler_name: DEFAULT_SCHEDULER_NAME.to_string(),
            algorithm_provider: Some(DEFAULT_PROVIDER.to_string()),
            plugins: None,
        }],
    }
}

impl KubeSchedulerConfig {
    pub fn validate(&self, registry: &PluginRegistry) -> Result<(), SchedulerConfigError> {
        if self.profiles.is_empty() {
            return Err(SchedulerConfigError::NoProfiles);
        }
        let mut seen = std::collections::HashSet::new();
        for profile in self.profiles.iter() {
            if !seen.insert(profile.scheduler_name.as_str()) {
                return Err(SchedulerConfigError::DuplicateProfile(
                    profile.scheduler_name.clone(),
                ));
            }
            KubeScheduler::from_profile(profile, registry)?;
        }
        Ok(())
    }
}

impl KubeSchedulerProfile {
    pub fn resolve_plugins(&self, registry: &PluginRegistry) -> Result<Plugins, SchedulerConfigError> {
        if let Some(plugins) = &self.plugins {
            return Ok(plugins.clone());
        }
        let provider = self
            .algorithm_provider
            .as_deref()
            .unwrap_or(DEFAULT_PROVIDER);
        registry
            .provider(provider)
            .cloned()
            .ok_or_else(|| SchedulerConfigError::UnknownProvider(provider.to_string()))
    }
}

pub struct KubeScheduler {
    filters: Vec<(String, Arc<dyn FilterPlugin>)>,
    // Score plugins with their weights
    scores: Vec<(String, Arc<dyn ScorePlugin>, f64)>,
}

impl KubeScheduler {
    pub fn from_profile(
        profile: &KubeSchedulerProfile,
        registry: &PluginRegistry,
    ) -> Result<Self, SchedulerConfigError> {
        let plugins = profile.resolve_plugins(registry)?;

        let mut filters = vec![];
        for filter in plugins.filter.iter() {
            match registry.get(&filter.name) {
                Some(PluginType::FilterPlugin(plugin)) => {
                    filters.push((filter.name.clone(), plugin.clone()))
                }
                Some(_) => return Err(SchedulerConfigError::NotAFilterPlugin(filter.name.clone())),
                None => return Err(SchedulerConfigError::UnknownPlugin(filter.name.clone())),
            }
        }

        let mut scores = vec![];
        for scorer in plugins.score.iter() {
            match registry.get(&scorer.name) {
                Some(PluginType::ScorePlugin(plugin)) => scores.push((
                    scorer.name.clone(),
                    plugin.clone(),
                    scorer.weight.unwrap_or(1.0),
                )),
                Some(_) => return Err(SchedulerConfigError::NotAScorePlugin(scorer.name.clone())),
                None => return Err(SchedulerConfigError::UnknownPlugin(scorer.name.clone())),
            }
        }

        Ok(Self { filters, scores })
    }

    fn schedule_one(&self, pod: &Pod, cache: &SchedulerCache) -> Result<String, ScheduleError> {
        let num_all_nodes = cache.node_count();
        if num_all_nodes == 0 {
            return Err(ScheduleError::NoNodesInCluster);
        }

        let mut failed_nodes: BTreeMap<String, String> = Default::default();
        let mut feasible_nodes = vec![];
        'nodes: for (node_name, node_info) in cache.nodes() {
            for (_, filter) in self.filters.iter() {
                if let Err(reason) = filter.filter(pod, node_info, cache) {
                    failed_nodes.insert(node_name.clone(), reason);
                    continue 'nodes;
                }
            }
            feasible_nodes.push((node_name, node_info));
        }

        if feasible_nodes.is_empty() {
            return Err(ScheduleError::Unschedulable(FitError {
                num_all_nodes,
                failed_nodes,
            }));
        }

        // Nodes are ordered by name, the first one wins among equally scored nodes.
        let mut assigned_node = feasible_nodes[0].0;
        let mut max_score = f64::MIN;
        for (node_name, node_info) in feasible_nodes {
            let score: f64 = self
                .scores
                .iter()
                .map(|(_, scorer, weight)| scorer.score(pod, node_info) * weight)
                .sum();
            if score > max_score {
                assigned_node = node_name;
                max_score = score;
            }
        }

        Ok(assigned_node.to_string())
    }
}

impl PodSchedulingAlgorithm for KubeScheduler {
    fn schedule_one(&self, pod: &Pod, cache: &SchedulerCache) -> Result<String, ScheduleError> {
        KubeScheduler::schedule_one(self, pod, cache)
    }
}
