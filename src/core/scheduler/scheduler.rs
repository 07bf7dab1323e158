//! Implementation of scheduler component which is responsible for scheduling pods for nodes.
//! Every scheduler runs on its own thread: it keeps a cache of the cluster fed by watch events
//! of the fake REST client and schedules pending pods which name it as their scheduler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::TryRecvError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, error, info, trace};
use parking_lot::Mutex;

use crate::core::events::{RecordedEventType, WatchEvent, WatchEventType};
use crate::core::object::{KubeObject, ResourceKind};
use crate::core::pod::{Pod, PodCondition, PodConditionType, PodPhase};
use crate::core::rest_client::{FakeRestClient, RestError, WatchReceiver};
use crate::core::scheduler::cache::SchedulerCache;
use crate::core::scheduler::interface::{
    Binder, Binding, PodConditionUpdater, PodSchedulingAlgorithm, ScheduleError,
};
use crate::core::scheduler::queue::{QueuedPodInfo, SchedulingQueue};
use crate::core::scheduler::recorder::EventRecorder;
use crate::metrics::collector::MetricsCollector;

/// Kinds a scheduler has to observe to make its decisions.
pub const WATCHED_RESOURCES: [ResourceKind; 3] = [
    ResourceKind::Nodes,
    ResourceKind::Pods,
    ResourceKind::PersistentVolumeClaims,
];

pub struct Scheduler {
    name: String,
    scheduler_algorithm: Box<dyn PodSchedulingAlgorithm>,

    rest_client: Arc<FakeRestClient>,
    binder: Arc<dyn Binder>,
    updater: Arc<dyn PodConditionUpdater>,
    recorder: EventRecorder,

    /// Cache which is updated based on watch events from the fake REST client
    cache: SchedulerCache,
    queue: SchedulingQueue,
    /// Pending pods of this scheduler by key, referenced from the queue
    pods: HashMap<String, Pod>,

    watch: Option<WatchReceiver>,
    stop: Arc<AtomicBool>,

    metrics_collector: Arc<Mutex<MetricsCollector>>,
}

/// Handle of a started scheduler thread.
pub struct SchedulerHandle {
    pub name: String,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            error!("Scheduler {:?} thread panicked", self.name);
        }
    }
}

impl Scheduler {
    pub fn new(
        name: &str,
        scheduler_algorithm: Box<dyn PodSchedulingAlgorithm>,
        rest_client: Arc<FakeRestClient>,
        binder: Arc<dyn Binder>,
        updater: Arc<dyn PodConditionUpdater>,
        recorder: EventRecorder,
        metrics_collector: Arc<Mutex<MetricsCollector>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            scheduler_algorithm,
            rest_client,
            binder,
            updater,
            recorder,
            cache: SchedulerCache::new(),
            queue: SchedulingQueue::new(),
            pods: Default::default(),
            watch: None,
            stop: Arc::new(AtomicBool::new(false)),
            metrics_collector,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flag which makes the scheduler thread exit once set.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn cache(&self) -> &SchedulerCache {
        &self.cache
    }

    pub fn queue(&self) -> &SchedulingQueue {
        &self.queue
    }

    pub fn is_synced(&self) -> bool {
        self.watch.is_some()
    }

    /// Starts watching the cluster and fills the cache with the current state. Everything
    /// which happens afterwards arrives through the watch.
    pub fn sync(&mut self) -> Result<(), RestError> {
        // Watch first so that nothing created between the listing and the watch is missed.
        // Objects seen twice are applied idempotently.
        let watch = self.rest_client.watch_all(&WATCHED_RESOURCES)?;
        for kind in WATCHED_RESOURCES {
            for obj in self.rest_client.list(kind)? {
                self.handle_event(WatchEvent {
                    event_type: WatchEventType::Added,
                    kind,
                    object: obj,
                });
            }
        }
        self.watch = Some(watch);
        debug!(
            "Scheduler {:?} synced: {} nodes, {} pods to schedule",
            self.name,
            self.cache.node_count(),
            self.queue.active_len()
        );
        Ok(())
    }

    /// Runs the scheduling loop on a new thread. `on_exit` is invoked when the loop exits,
    /// whatever the reason.
    pub fn start<F>(mut self, on_exit: F) -> Result<SchedulerHandle, RestError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_synced() {
            self.sync()?;
        }
        let name = self.name.clone();
        let stop = self.stop.clone();
        let thread = thread::Builder::new()
            .name(format!("scheduler-{}", name))
            .spawn(move || {
                self.run();
                on_exit();
            })
            .map_err(|err| RestError::Invalid(format!("failed to spawn scheduler: {}", err)))?;
        Ok(SchedulerHandle { name, stop, thread })
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn run(&mut self) {
        let Some(watch) = self.watch.take() else {
            error!("Scheduler {:?} started without watch", self.name);
            return;
        };
        info!("Scheduler {:?} started", self.name);

        loop {
            if self.is_stopped() {
                break;
            }
            // Apply everything observed so far before taking the next decision.
            loop {
                match watch.try_recv() {
                    Ok(event) => self.handle_event(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("Scheduler {:?} watch closed", self.name);
                        return;
                    }
                }
            }
            if self.is_stopped() {
                break;
            }
            if let Some(queued_pod) = self.queue.pop() {
                self.schedule_queued_pod(queued_pod);
                continue;
            }
            match watch.recv() {
                Ok(event) => self.handle_event(event),
                Err(_) => {
                    info!("Scheduler {:?} watch closed", self.name);
                    return;
                }
            }
        }
        info!("Scheduler {:?} stopped", self.name);
    }

    fn is_responsible_for(&self, pod: &Pod) -> bool {
        !pod.is_bound() && pod.status.phase == PodPhase::Pending && pod.scheduler_name() == self.name
    }

    fn handle_event(&mut self, event: WatchEvent) {
        trace!(
            "Scheduler {:?} got {:?} {} {:?}",
            self.name,
            event.event_type,
            event.kind,
            event.object.key()
        );
        self.cache.handle_event(&event);

        match event.kind {
            ResourceKind::Pods => {
                let Some(pod) = event.object.into_pod() else {
                    return;
                };
                let key = pod.key();
                if event.event_type == WatchEventType::Deleted {
                    self.pods.remove(&key);
                    self.queue.remove(&key);
                    // Freed resources may let waiting pods fit.
                    self.queue.move_all_to_active();
                } else if self.is_responsible_for(&pod) {
                    self.pods.insert(key.clone(), pod);
                    self.queue.add(&key);
                } else if self.pods.remove(&key).is_some() {
                    self.queue.remove(&key);
                }
            }
            ResourceKind::Nodes | ResourceKind::PersistentVolumeClaims => {
                self.queue.move_all_to_active();
            }
            _ => {}
        }
    }

    fn schedule_queued_pod(&mut self, queued_pod: QueuedPodInfo) {
        let Some(pod) = self.pods.get(queued_pod.pod_name.as_str()).cloned() else {
            return;
        };

        let algorithm_start = Instant::now();
        let result = self.scheduler_algorithm.schedule_one(&pod, &self.cache);
        self.metrics_collector
            .lock()
            .increment_pod_scheduling_algorithm_latency(algorithm_start.elapsed().as_secs_f64());

        match result {
            Ok(assigned_node) => self.bind_pod(pod, queued_pod, assigned_node),
            Err(err) => self.handle_schedule_error(pod, queued_pod, err),
        }
    }

    fn bind_pod(&mut self, pod: Pod, queued_pod: QueuedPodInfo, assigned_node: String) {
        let key = pod.key();
        // Accounted right away, the binding is observed through the watch later.
        self.cache.assume_pod(&pod, &assigned_node);

        let binding = Binding {
            pod_name: pod.metadata.name.clone(),
            pod_namespace: pod.metadata.namespace.clone(),
            target_node: assigned_node.clone(),
        };
        if let Err(err) = self.binder.bind(&binding) {
            error!("Failed to bind pod {:?} to node {:?}: {}", key, assigned_node, err);
            self.cache.forget_pod(&pod);
            self.metrics_collector.lock().increment_failed_bindings();
            self.queue.add_unschedulable(queued_pod);
            return;
        }

        debug!(
            "Pod {:?} has been assigned a Node {:?} after {} attempt(s)",
            key, assigned_node, queued_pod.attempts
        );
        self.recorder.event(
            &pod,
            RecordedEventType::Normal,
            "Scheduled",
            format!("Successfully assigned {} to {}", key, assigned_node),
        );
        self.pods.remove(&key);
        self.metrics_collector
            .lock()
            .increment_pod_scheduling_latency(queued_pod.latency().as_secs_f64());
    }

    fn handle_schedule_error(&mut self, pod: Pod, queued_pod: QueuedPodInfo, err: ScheduleError) {
        let key = pod.key();
        if err.is_fit_error() {
            debug!("Unable to schedule pod {:?}: {}", key, err);
        } else {
            error!("Error scheduling pod {:?}: {}", key, err);
        }

        let message = err.to_string();
        self.recorder.event(
            &pod,
            RecordedEventType::Warning,
            "FailedScheduling",
            message.clone(),
        );
        let condition = PodCondition {
            condition_type: PodConditionType::PodScheduled,
            status: "False".to_string(),
            reason: "Unschedulable".to_string(),
            message,
        };
        if let Err(err) = self.updater.update(&pod, &condition) {
            error!("Failed to update condition of pod {:?}: {}", key, err);
        }

        self.metrics_collector.lock().increment_pods_unschedulable();
        self.queue.add_unschedulable(queued_pod);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{channel, Receiver, Sender};
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::core::node::Node;
    use crate::core::object::ResourceKind;
    use crate::core::pod::{Pod, PodCondition};
    use crate::core::resource_store::ResourceStore;
    use crate::core::rest_client::FakeRestClient;
    use crate::core::scheduler::interface::{
        Binder, Binding, CallbackResult, PodConditionUpdater,
    };
    use crate::core::scheduler::kube_scheduler::{default_kube_scheduler_config, KubeScheduler};
    use crate::core::scheduler::plugin::PluginRegistry;
    use crate::core::scheduler::recorder::EventRecorder;
    use crate::core::scheduler::scheduler::Scheduler;
    use crate::metrics::collector::MetricsCollector;

    struct ChannelBinder {
        bindings: Mutex<Sender<Binding>>,
    }

    impl Binder for ChannelBinder {
        fn bind(&self, binding: &Binding) -> CallbackResult {
            self.bindings.lock().send(binding.clone())?;
            Ok(())
        }
    }

    struct ChannelUpdater {
        conditions: Mutex<Sender<(String, PodCondition)>>,
    }

    impl PodConditionUpdater for ChannelUpdater {
        fn update(&self, pod: &Pod, condition: &PodCondition) -> CallbackResult {
            self.conditions
                .lock()
                .send((pod.metadata.name.clone(), condition.clone()))?;
            Ok(())
        }
    }

    fn create_scheduler(
        client: Arc<FakeRestClient>,
    ) -> (Scheduler, Receiver<Binding>, Receiver<(String, PodCondition)>) {
        let (bindings_sender, bindings) = channel();
        let (conditions_sender, conditions) = channel();
        let (recorder, _) = EventRecorder::new(10);
        let profile = &default_kube_scheduler_config().profiles[0];
        let scheduler = Scheduler::new(
            &profile.scheduler_name,
            Box::new(KubeScheduler::from_profile(profile, &PluginRegistry::default()).unwrap()),
            client,
            Arc::new(ChannelBinder {
                bindings: Mutex::new(bindings_sender),
            }),
            Arc::new(ChannelUpdater {
                conditions: Mutex::new(conditions_sender),
            }),
            recorder,
            Arc::new(Mutex::new(MetricsCollector::new())),
        );
        (scheduler, bindings, conditions)
    }

    #[test]
    fn test_sync_fills_cache_and_queue() {
        let store = Arc::new(ResourceStore::new());
        store
            .add(ResourceKind::Nodes, Node::new("node_1", 1000, 1000).into())
            .unwrap();
        store
            .add(ResourceKind::Pods, Pod::new("pod_1", "default", 100, 100).into())
            .unwrap();
        let mut other = Pod::new("pod_2", "default", 100, 100);
        other.spec.scheduler_name = "other-scheduler".to_string();
        store.add(ResourceKind::Pods, other.into()).unwrap();

        let (mut scheduler, _, _) = create_scheduler(FakeRestClient::new(store).unwrap());
        scheduler.sync().unwrap();

        assert!(scheduler.is_synced());
        assert_eq!(1, scheduler.cache().node_count());
        // Pods of other schedulers are not queued
        assert_eq!(1, scheduler.queue().active_len());
    }

    #[test]
    fn test_scheduler_thread_binds_and_reports_failures() {
        let _ = env_logger::try_init();

        let store = Arc::new(ResourceStore::new());
        let client = FakeRestClient::new(store.clone()).unwrap();
        store
            .add(ResourceKind::Nodes, Node::new("node_1", 1000, 1000).into())
            .unwrap();

        let (scheduler, bindings, conditions) = create_scheduler(client.clone());
        let (exited_sender, exited) = channel();
        let handle = scheduler
            .start(move || {
                let _ = exited_sender.send(());
            })
            .unwrap();

        store
            .add(ResourceKind::Pods, Pod::new("fits", "default", 600, 600).into())
            .unwrap();
        let binding = bindings.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!("fits", binding.pod_name);
        assert_eq!("node_1", binding.target_node);

        // The first pod is accounted by the scheduler although its binding was never stored.
        store
            .add(ResourceKind::Pods, Pod::new("too_big", "default", 600, 600).into())
            .unwrap();
        let (pod_name, condition) = conditions.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!("too_big", pod_name);
        assert_eq!("Unschedulable", condition.reason);
        assert_eq!(
            "0/1 nodes are available: 1 Insufficient cpu.",
            condition.message
        );

        client.close();
        exited.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join();
    }
}
