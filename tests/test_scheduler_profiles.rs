use std::sync::Arc;

use cluster_capacity::config::ClusterCapacityConfig;
use cluster_capacity::core::cluster_client::InMemoryCluster;
use cluster_capacity::core::pod::Pod;
use cluster_capacity::core::scheduler::kube_scheduler::{
    KubeSchedulerConfig, KubeSchedulerProfile, SchedulerConfigError,
};
use cluster_capacity::core::scheduler::plugin::{PluginRegistry, CLUSTER_AUTOSCALER_PROVIDER};
use cluster_capacity::error::SimulationError;
use cluster_capacity::simulator::ClusterCapacity;
use cluster_capacity::snapshot::ClusterSnapshot;
use cluster_capacity::test_util::helpers::{cluster_with_nodes, TEMPLATE_POD_NAME};

fn snapshot_with_busy_node() -> InMemoryCluster {
    let snapshot: ClusterSnapshot = serde_yaml::from_str(
        &r#"
    nodes:
    - metadata:
        name: node_0
      status:
        capacity:
          cpu: 1000
          ram: 1000
    - metadata:
        name: node_1
      status:
        capacity:
          cpu: 1000
          ram: 1000
    pods:
    - metadata:
        name: running
        namespace: default
      spec:
        node_name: node_1
        resources:
          requests:
            cpu: 500
            ram: 500
      status:
        phase: Running
    "#,
    )
    .unwrap();
    InMemoryCluster::from_snapshot(snapshot).unwrap()
}

fn scheduler_config() -> KubeSchedulerConfig {
    serde_yaml::from_str(
        &r#"
    profiles:
    - scheduler_name: default-scheduler
    - scheduler_name: bin-packing
      algorithm_provider: ClusterAutoscalerProvider
    "#,
    )
    .unwrap()
}

fn template(scheduler_name: &str) -> Pod {
    let mut pod = Pod::new(TEMPLATE_POD_NAME, "default", 100, 100);
    pod.spec.scheduler_name = scheduler_name.to_string();
    pod
}

fn run(scheduler_name: &str, max_limit: usize) -> ClusterCapacity {
    let _ = env_logger::try_init();
    let config = ClusterCapacityConfig::new(template(scheduler_name), max_limit)
        .unwrap()
        .with_scheduler_config(scheduler_config());
    let mut cc = ClusterCapacity::new(
        config,
        Arc::new(snapshot_with_busy_node()),
        &PluginRegistry::default(),
    )
    .unwrap();
    assert_eq!(vec!["bin-packing", "default-scheduler"], cc.scheduler_names());
    cc.sync_with_client().unwrap();
    cc.run().unwrap();
    cc
}

#[test]
fn test_most_allocated_profile_packs_pods() {
    let cc = run("bin-packing", 3);
    let status = cc.status();
    assert_eq!(3, status.pods.len());
    assert!(status.pods.iter().all(|pod| pod.spec.node_name == "node_1"));
    assert!(status
        .pods
        .iter()
        .all(|pod| pod.metadata.annotations["cc.kubernetes.io/provisioned-by"] == "bin-packing"));
}

#[test]
fn test_least_allocated_profile_spreads_pods() {
    let cc = run("default-scheduler", 3);
    let status = cc.status();
    assert_eq!(3, status.pods.len());
    assert!(status.pods.iter().all(|pod| pod.spec.node_name == "node_0"));
}

#[test]
fn test_explicit_plugins_with_weights() {
    let config: KubeSchedulerConfig = serde_yaml::from_str(
        &r#"
    profiles:
    - scheduler_name: default-scheduler
      plugins:
        filter:
        - name: NodeResourcesFit
        score:
        - name: LeastAllocated
          weight: 1
        - name: MostAllocated
          weight: 3
    "#,
    )
    .unwrap();
    let config = ClusterCapacityConfig::new(template("default-scheduler"), 1)
        .unwrap()
        .with_scheduler_config(config);
    let mut cc = ClusterCapacity::new(
        config,
        Arc::new(snapshot_with_busy_node()),
        &PluginRegistry::default(),
    )
    .unwrap();
    cc.sync_with_client().unwrap();
    cc.run().unwrap();

    // MostAllocated outweighs LeastAllocated
    assert_eq!("node_1", cc.status().pods[0].spec.node_name);
}

#[test]
fn test_invalid_profiles_rejected() {
    let registry = PluginRegistry::default();
    let config = ClusterCapacityConfig::new(template("default-scheduler"), 0).unwrap();

    let mut unknown_plugin = config.clone();
    unknown_plugin.scheduler_config = serde_yaml::from_str(
        &r#"
    profiles:
    - scheduler_name: default-scheduler
      plugins:
        filter:
        - name: PodTopologySpread
    "#,
    )
    .unwrap();
    assert!(matches!(
        ClusterCapacity::new(unknown_plugin, Arc::new(cluster_with_nodes(1, 1, 1)), &registry),
        Err(SimulationError::SchedulerConfig(SchedulerConfigError::UnknownPlugin(_)))
    ));

    let mut cc =
        ClusterCapacity::new(config, Arc::new(cluster_with_nodes(1, 1, 1)), &registry).unwrap();
    let duplicate = KubeSchedulerProfile {
        scheduler_name: "default-scheduler".to_string(),
        algorithm_provider: Some(CLUSTER_AUTOSCALER_PROVIDER.to_string()),
        plugins: None,
    };
    assert_eq!(
        Err(SimulationError::SchedulerConfig(
            SchedulerConfigError::DuplicateProfile("default-scheduler".to_string())
        )),
        cc.add_scheduler(&duplicate, &registry)
    );
}
