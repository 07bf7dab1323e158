//! Scheduling queue of the scheduler: an active queue ordered by insertion and a set of pods
//! which were found unschedulable and wait for a cluster change.

use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use std::{cmp::Ordering, time::Duration};

#[derive(Clone, Debug)]
pub struct QueuedPodInfo {
    /// Sequence number of the insertion into the queue.
    pub timestamp: u64,
    /// Number of schedule attempts before successfully scheduled.
    pub attempts: usize,
    /// The time when the pod is added to the queue for the first time. The pod may be added
    /// back to the queue multiple times before it's successfully scheduled.
    /// It shouldn't be updated once initialized. It's used to record the e2e scheduling
    /// latency for a pod.
    pub initial_attempt_timestamp: Instant,
    /// Key ("namespace/name") of the pod which object is stored in the scheduler's pod map
    pub pod_name: Arc<String>,
}

impl QueuedPodInfo {
    pub fn latency(&self) -> Duration {
        self.initial_attempt_timestamp.elapsed()
    }
}

impl Ord for QueuedPodInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.timestamp.cmp(&self.timestamp)
    }
}

impl PartialOrd for QueuedPodInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedPodInfo {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.pod_name == other.pod_name
    }
}

impl Eq for QueuedPodInfo {}

#[derive(Clone, Debug)]
pub struct UnschedulablePodKey {
    pub pod_name: Arc<String>,
    pub insert_timestamp: u64,
}

impl Ord for UnschedulablePodKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.insert_timestamp
            .cmp(&other.insert_timestamp)
            .then(self.pod_name.cmp(&other.pod_name))
    }
}

impl PartialOrd for UnschedulablePodKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for UnschedulablePodKey {
    fn eq(&self, other: &Self) -> bool {
        self.pod_name == other.pod_name && self.insert_timestamp == other.insert_timestamp
    }
}

impl Eq for UnschedulablePodKey {}

/// Pods waiting to be scheduled. Every pod is either in the active queue or in the
/// unschedulable set, never in both.
#[derive(Default)]
pub struct SchedulingQueue {
    active: BinaryHeap<QueuedPodInfo>,
    unschedulable: BTreeMap<UnschedulablePodKey, QueuedPodInfo>,
    // Pod key -> insertion timestamp of the entry it currently has in either queue
    queued: HashMap<Arc<String>, u64>,
    next_timestamp: u64,
}

impl SchedulingQueue {
    pub fn new() -> Self {
        Default::default()
    }

    fn next_timestamp(&mut self) -> u64 {
        self.next_timestamp += 1;
        self.next_timestamp
    }

    pub fn contains(&self, pod_key: &str) -> bool {
        self.queued.contains_key(&pod_key.to_string())
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn unschedulable_len(&self) -> usize {
        self.unschedulable.len()
    }

    /// Adds a new pod to the active queue. Already queued pods are left in place.
    pub fn add(&mut self, pod_key: &str) {
        let pod_name = Arc::new(pod_key.to_string());
        if self.queued.contains_key(&pod_name) {
            return;
        }
        let timestamp = self.next_timestamp();
        self.queued.insert(pod_name.clone(), timestamp);
        self.active.push(QueuedPodInfo {
            timestamp,
            attempts: 0,
            initial_attempt_timestamp: Instant::now(),
            pod_name,
        });
    }

    /// Takes the oldest pod of the active queue. Entries of removed pods are skipped.
    pub fn pop(&mut self) -> Option<QueuedPodInfo> {
        while let Some(mut info) = self.active.pop() {
            if self.queued.get(&info.pod_name) != Some(&info.timestamp) {
                continue;
            }
            self.queued.remove(&info.pod_name);
            info.attempts += 1;
            return Some(info);
        }
        None
    }

    pub fn add_unschedulable(&mut self, mut info: QueuedPodInfo) {
        let timestamp = self.next_timestamp();
        info.timestamp = timestamp;
        self.queued.insert(info.pod_name.clone(), timestamp);
        self.unschedulable.insert(
            UnschedulablePodKey {
                pod_name: info.pod_name.clone(),
                insert_timestamp: timestamp,
            },
            info,
        );
    }

    /// Moves all unschedulable pods back to the active queue after a cluster change.
    pub fn move_all_to_active(&mut self) {
        let unschedulable = std::mem::take(&mut self.unschedulable);
        for (_, mut info) in unschedulable.into_iter() {
            let timestamp = self.next_timestamp();
            info.timestamp = timestamp;
            self.queued.insert(info.pod_name.clone(), timestamp);
            self.active.push(info);
        }
    }

    pub fn remove(&mut self, pod_key: &str) {
        let pod_name = Arc::new(pod_key.to_string());
        if let Some(timestamp) = self.queued.remove(&pod_name) {
            self.unschedulable.remove(&UnschedulablePodKey {
                pod_name,
                insert_timestamp: timestamp,
            });
        }
    }
}
