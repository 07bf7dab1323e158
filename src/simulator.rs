//! Represents entry point for the cluster-capacity simulation.
//!
//! The simulation copies the state of a cluster into a resource store, starts schedulers against
//! a fake REST client served from that store and keeps injecting copies of a template pod, one at a
//! time, until the schedulers can not place the next copy, the configured limit is reached or the
//! namespace of the template disappears.

pub mod binder;
pub mod stop;
pub mod strategy;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::config::ClusterCapacityConfig;
use crate::core::cluster_client::ClusterClient;
use crate::core::common::ObjectMeta;
use crate::core::events::RecordedEvent;
use crate::core::object::{KubeObject, Object, ResourceKind};
use crate::core::pod::{Pod, PodCondition, PodConditionType, PodPhase};
use crate::core::resource_store::ResourceStore;
use crate::core::rest_client::FakeRestClient;
use crate::core::scheduler::interface::Binding;
use crate::core::scheduler::kube_scheduler::{
    KubeScheduler, KubeSchedulerProfile, SchedulerConfigError,
};
use crate::core::scheduler::plugin::PluginRegistry;
use crate::core::scheduler::recorder::{EventRecorder, DEFAULT_RECORDER_BUFFER};
use crate::core::scheduler::scheduler::{Scheduler, SchedulerHandle};
use crate::error::SimulationError;
use crate::metrics::collector::MetricsCollector;
use crate::report::ClusterCapacityReview;
use crate::simulator::binder::LocalBinder;
use crate::simulator::stop::{RunOutcome, StopSignal};
use crate::simulator::strategy::{EmulationStrategy, PredictiveStrategy};

/// Annotation marking pods created by the simulation, holds the name of the scheduler they
/// were provisioned for.
pub const POD_PROVISIONER: &str = "cc.kubernetes.io/provisioned-by";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    /// Simulated pods in the order they were bound
    pub pods: Vec<Pod>,
    /// `<Type>: <message>`, empty while running
    pub stop_reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationPhase {
    Initialized,
    /// Initial cluster state is copied, ready to run.
    Syncing,
    Running,
    Stopped,
}

impl SimulationPhase {
    fn as_str(&self) -> &'static str {
        match self {
            SimulationPhase::Initialized => "Initialized",
            SimulationPhase::Syncing => "Syncing",
            SimulationPhase::Running => "Running",
            SimulationPhase::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct Progress {
    // Number of simulated pods created so far
    simulated: usize,
    status: Status,
}

/// State shared by the engine and the binders of its schedulers.
pub struct SimulationCore {
    store: Arc<ResourceStore>,
    rest_client: Arc<FakeRestClient>,
    cluster_client: Arc<dyn ClusterClient>,
    strategy: Box<dyn EmulationStrategy>,

    template: Pod,
    // 0 means no limit
    max_simulated: usize,

    progress: Mutex<Progress>,
    closed: Mutex<bool>,
    scheduler_stops: Mutex<Vec<Arc<AtomicBool>>>,
    recorder_events: Mutex<HashMap<String, Arc<Mutex<Receiver<RecordedEvent>>>>>,
    stop: StopSignal,
}

impl SimulationCore {
    pub fn status(&self) -> Status {
        self.progress.lock().status.clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    fn register_scheduler(
        &self,
        name: &str,
        stop: Arc<AtomicBool>,
        events: Receiver<RecordedEvent>,
    ) {
        self.scheduler_stops.lock().push(stop);
        self.recorder_events
            .lock()
            .insert(name.to_string(), Arc::new(Mutex::new(events)));
    }

    /// Stop reasons are final, only the first one is kept.
    fn set_stop_reason(&self, reason: String) {
        let mut progress = self.progress.lock();
        if progress.status.stop_reason.is_empty() {
            info!("Simulation stops: {}", reason);
            progress.status.stop_reason = reason;
        }
    }

    /// Delivers the outcome of the run to `run()` and shuts the simulation down.
    pub fn terminate(&self, outcome: RunOutcome) {
        self.stop.signal(outcome);
        self.close();
    }

    /// Stops every scheduler and the fake REST client. Idempotent.
    pub fn close(&self) {
        let mut closed = self.closed.lock();
        if *closed {
            return;
        }
        *closed = true;
        for stop in self.scheduler_stops.lock().iter() {
            stop.store(true, Ordering::SeqCst);
        }
        self.rest_client.close();
        debug!("Simulation closed");
    }

    /// Injects the next copy of the template pod into the simulated cluster.
    pub fn next_pod(&self) -> Result<(), SimulationError> {
        let mut pod = self.template.clone();
        pod.spec.node_name.clear();
        pod.status = Default::default();
        pod.metadata.resource_version.clear();

        let namespace = pod.metadata.namespace.clone();
        let exists = self
            .cluster_client
            .namespace_exists(&namespace)
            .map_err(SimulationError::Cluster)?;
        if !exists {
            self.set_stop_reason(format!(
                "NamespaceNotFound: namespace {} not found",
                namespace
            ));
            return Err(SimulationError::NamespaceNotFound(namespace));
        }

        let index = {
            let mut progress = self.progress.lock();
            let index = progress.simulated;
            progress.simulated += 1;
            index
        };
        pod.metadata.name = format!("{}-{}", self.template.metadata.name, index);
        let provisioner = pod.scheduler_name().to_string();
        pod.metadata
            .annotations
            .insert(POD_PROVISIONER.to_string(), provisioner);

        debug!("Creating simulated pod {:?}", pod.key());
        self.store.add(ResourceKind::Pods, pod.into())?;
        Ok(())
    }

    /// Commits a scheduling decision. Fails only when the simulation can not go on.
    pub fn bind(&self, binding: &Binding, scheduler_name: &str) -> Result<(), SimulationError> {
        if self.is_closed() || self.stop.is_signaled() {
            debug!("Ignoring binding of {:?} after shutdown", binding.pod_name);
            return Ok(());
        }

        let key = ObjectMeta::new(&binding.pod_name, &binding.pod_namespace);
        let Some(mut pod) = self
            .store
            .get(ResourceKind::Pods, &key)?
            .and_then(Object::into_pod)
        else {
            return Err(SimulationError::PodNotFound(key.key()));
        };

        pod.spec.node_name = binding.target_node.clone();
        pod.status.phase = PodPhase::Running;
        self.strategy.add(&pod)?;

        if !pod.metadata.has_annotation(POD_PROVISIONER) {
            // Pending pod of the cluster itself, it only takes resources.
            debug!("Bound existing pod {:?} to {:?}", key.key(), binding.target_node);
            return Ok(());
        }

        let limit_reached = {
            let mut progress = self.progress.lock();
            progress.status.pods.push(pod);
            self.max_simulated > 0 && progress.status.pods.len() >= self.max_simulated
        };
        self.drain_recorder_event(scheduler_name);

        if limit_reached {
            self.set_stop_reason(format!(
                "LimitReached: Maximum number of pods simulated: {}",
                self.max_simulated
            ));
            self.terminate(Ok(()));
            return Ok(());
        }

        match self.next_pod() {
            Ok(()) => Ok(()),
            Err(err) if err.is_namespace_not_found() => {
                self.terminate(Ok(()));
                Ok(())
            }
            Err(err) => Err(SimulationError::NextPod(Box::new(err))),
        }
    }

    /// Stops the simulation once a simulated pod is reported unschedulable.
    pub fn update_condition(&self, pod: &Pod, condition: &PodCondition) {
        if self.is_closed() {
            return;
        }
        let unschedulable = condition.condition_type == PodConditionType::PodScheduled
            && condition.status == "False"
            && condition.reason == "Unschedulable";
        if !unschedulable || !pod.metadata.has_annotation(POD_PROVISIONER) {
            return;
        }
        self.set_stop_reason(format!("{}: {}", condition.reason, condition.message));
        self.terminate(Ok(()));
    }

    // Consumes one event of the scheduler's recorder so that its buffer never fills up.
    fn drain_recorder_event(&self, scheduler_name: &str) {
        let Some(events) = self.recorder_events.lock().get(scheduler_name).cloned() else {
            return;
        };
        let spawned = thread::Builder::new()
            .name("recorder-drain".to_string())
            .spawn(move || {
                if let Ok(event) = events.lock().recv() {
                    debug!("{} {}", event.involved_object, event.format());
                }
            });
        if let Err(err) = spawned {
            warn!("Unable to drain recorded event: {}", err);
        }
    }
}

pub struct ClusterCapacity {
    core: Arc<SimulationCore>,
    phase: SimulationPhase,

    schedulers: BTreeMap<String, Scheduler>,
    scheduler_configs: BTreeMap<String, KubeSchedulerProfile>,
    handles: Vec<SchedulerHandle>,

    metrics_collector: Arc<Mutex<MetricsCollector>>,
    report: OnceLock<ClusterCapacityReview>,
}

impl ClusterCapacity {
    pub fn new(
        config: ClusterCapacityConfig,
        cluster_client: Arc<dyn ClusterClient>,
        registry: &PluginRegistry,
    ) -> Result<Self, SimulationError> {
        let store = Arc::new(ResourceStore::new());
        let rest_client = FakeRestClient::new(store.clone())?;
        let core = Arc::new(SimulationCore {
            store: store.clone(),
            rest_client,
            cluster_client,
            strategy: Box::new(PredictiveStrategy::new(store)),
            template: config.pod,
            max_simulated: config.max_limit,
            progress: Default::default(),
            closed: Mutex::new(false),
            scheduler_stops: Default::default(),
            recorder_events: Default::default(),
            stop: StopSignal::new(),
        });

        let mut cc = Self {
            core,
            phase: SimulationPhase::Initialized,
            schedulers: Default::default(),
            scheduler_configs: Default::default(),
            handles: vec![],
            metrics_collector: Arc::new(Mutex::new(MetricsCollector::new())),
            report: OnceLock::new(),
        };
        for profile in config.scheduler_config.profiles.iter() {
            cc.add_scheduler(profile, registry)?;
        }
        Ok(cc)
    }

    fn check_phase(
        &self,
        operation: &'static str,
        expected: SimulationPhase,
    ) -> Result<(), SimulationError> {
        if self.phase != expected {
            return Err(SimulationError::InvalidPhase {
                operation,
                phase: self.phase.as_str(),
            });
        }
        Ok(())
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.core.store
    }

    pub fn rest_client(&self) -> &Arc<FakeRestClient> {
        &self.core.rest_client
    }

    pub fn metrics_collector(&self) -> &Arc<Mutex<MetricsCollector>> {
        &self.metrics_collector
    }

    pub fn scheduler_names(&self) -> Vec<String> {
        self.scheduler_configs.keys().cloned().collect()
    }

    /// Adds one more scheduler built from the profile, schedulers are keyed by name.
    pub fn add_scheduler(
        &mut self,
        profile: &KubeSchedulerProfile,
        registry: &PluginRegistry,
    ) -> Result<(), SimulationError> {
        if matches!(
            self.phase,
            SimulationPhase::Running | SimulationPhase::Stopped
        ) {
            return Err(SimulationError::InvalidPhase {
                operation: "add_scheduler",
                phase: self.phase.as_str(),
            });
        }
        let name = profile.scheduler_name.clone();
        if self.scheduler_configs.contains_key(&name) {
            return Err(SchedulerConfigError::DuplicateProfile(name).into());
        }
        let algorithm = KubeScheduler::from_profile(profile, registry)?;

        let (recorder, events) = EventRecorder::new(DEFAULT_RECORDER_BUFFER);
        let binder = Arc::new(LocalBinder::new(self.core.clone(), &name));
        let scheduler = Scheduler::new(
            &name,
            Box::new(algorithm),
            self.core.rest_client.clone(),
            binder.clone(),
            binder,
            recorder,
            self.metrics_collector.clone(),
        );
        self.core
            .register_scheduler(&name, scheduler.stop_flag(), events);

        info!("Added scheduler {:?}", name);
        self.schedulers.insert(name.clone(), scheduler);
        self.scheduler_configs.insert(name, profile.clone());
        Ok(())
    }

    /// Copies every tracked kind from the cluster into the simulated store.
    pub fn sync_with_client(&mut self) -> Result<(), SimulationError> {
        self.check_phase("sync_with_client", SimulationPhase::Initialized)?;
        for kind in self.core.store.resources() {
            let list = self
                .core
                .cluster_client
                .list(kind)
                .map_err(|source| SimulationError::SyncFailed { kind, source })?;
            debug!("Synced {} {} from the cluster", list.items.len(), kind);
            self.core
                .store
                .replace(kind, list.items, &list.resource_version)?;
        }
        self.phase = SimulationPhase::Syncing;
        Ok(())
    }

    /// Copies every tracked kind from another resource store.
    pub fn sync_with_store(&mut self, source: &ResourceStore) -> Result<(), SimulationError> {
        self.check_phase("sync_with_store", SimulationPhase::Initialized)?;
        for kind in self.core.store.resources() {
            let items = source.list(kind)?;
            let resource_version = source.resource_version(kind)?;
            self.core.store.replace(kind, items, &resource_version)?;
        }
        self.phase = SimulationPhase::Syncing;
        Ok(())
    }

    /// Runs the simulation until it stops. Terminal outcomes (limit reached, unschedulable pod,
    /// missing namespace) return Ok, see `status()` for the reason.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        self.check_phase("run", SimulationPhase::Syncing)?;
        let template_scheduler = self.core.template.scheduler_name().to_string();
        if !self.schedulers.contains_key(&template_scheduler) {
            return Err(SimulationError::UnknownScheduler(template_scheduler));
        }

        self.phase = SimulationPhase::Running;
        let start_time = Instant::now();
        info!(
            "Simulating pod {:?} with {} scheduler(s)",
            self.core.template.key(),
            self.schedulers.len()
        );

        if let Err(err) = self.start_schedulers() {
            self.shutdown();
            return Err(err);
        }

        match self.core.next_pod() {
            Ok(()) => {}
            Err(err) if err.is_namespace_not_found() => self.core.terminate(Ok(())),
            Err(err) => self.core.terminate(Err(err)),
        }

        let outcome = self.core.stop.wait().unwrap_or(Ok(()));
        self.shutdown();
        info!(
            "Simulation finished in {:.3}s, {} pod(s) scheduled",
            start_time.elapsed().as_secs_f64(),
            self.core.progress.lock().status.pods.len()
        );
        outcome
    }

    fn start_schedulers(&mut self) -> Result<(), SimulationError> {
        let schedulers = std::mem::take(&mut self.schedulers);
        for (name, mut scheduler) in schedulers.into_iter() {
            // Cache is populated before the first pod is injected.
            scheduler.sync()?;
            let core = self.core.clone();
            let exited = name.clone();
            let handle = scheduler.start(move || {
                core.terminate(Err(SimulationError::SchedulerExited(exited)));
            })?;
            self.handles.push(handle);
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.core.close();
        for handle in std::mem::take(&mut self.handles) {
            handle.stop();
            handle.join();
        }
        self.phase = SimulationPhase::Stopped;
    }

    /// Stops the simulation. Idempotent, safe to call from any thread holding the engine.
    pub fn close(&self) {
        self.core.close();
    }

    pub fn status(&self) -> Status {
        self.core.status()
    }

    /// Review of the simulation, built on the first call.
    pub fn report(&self) -> &ClusterCapacityReview {
        self.report.get_or_init(|| {
            if self.phase != SimulationPhase::Stopped {
                error!("Building review of a simulation in phase {}", self.phase);
            }
            ClusterCapacityReview::new(
                &[self.core.template.clone()],
                self.core.max_simulated,
                &self.core.status(),
                &self.metrics_collector.lock(),
            )
        })
    }
}

impl Drop for ClusterCapacity {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::core::pod::{Pod, PodCondition, PodConditionType};
    use crate::simulator::POD_PROVISIONER;
    use crate::test_util::helpers::{cluster_with_nodes, create_cluster_capacity};

    fn unschedulable(message: &str) -> PodCondition {
        PodCondition {
            condition_type: PodConditionType::PodScheduled,
            status: "False".to_string(),
            reason: "Unschedulable".to_string(),
            message: message.to_string(),
        }
    }

    fn provisioned_pod() -> Pod {
        let mut pod = Pod::new("small-pod-0", "default", 1, 1);
        pod.metadata
            .annotations
            .insert(POD_PROVISIONER.to_string(), "default-scheduler".to_string());
        pod
    }

    #[test]
    fn test_first_stop_reason_wins() {
        let cc = create_cluster_capacity(cluster_with_nodes(1, 1000, 1000), 100, 100, 0);
        let core = cc.core.clone();
        let pod = provisioned_pod();

        let updaters: Vec<_> = ["first", "second"]
            .into_iter()
            .map(|message| {
                let core = core.clone();
                let pod = pod.clone();
                std::thread::spawn(move || core.update_condition(&pod, &unschedulable(message)))
            })
            .collect();
        for updater in updaters {
            updater.join().unwrap();
        }
        let stop_reason = cc.status().stop_reason;
        assert!(
            stop_reason == "Unschedulable: first" || stop_reason == "Unschedulable: second",
            "{}",
            stop_reason
        );
        assert!(core.is_closed());

        // Late updates change nothing
        core.update_condition(&pod, &unschedulable("third"));
        core.close();
        assert_eq!(stop_reason, cc.status().stop_reason);
        assert!(core.stop.wait().unwrap().is_ok());
    }

    #[test]
    fn test_only_provisioned_unschedulable_pods_stop() {
        let cc = create_cluster_capacity(cluster_with_nodes(1, 1000, 1000), 100, 100, 0);
        let core = Arc::clone(&cc.core);

        core.update_condition(&Pod::new("foreign", "default", 1, 1), &unschedulable("no"));
        let mut scheduled = unschedulable("no");
        scheduled.status = "True".to_string();
        core.update_condition(&provisioned_pod(), &scheduled);

        assert!(cc.status().stop_reason.is_empty());
        assert!(!core.is_closed());
    }
}
