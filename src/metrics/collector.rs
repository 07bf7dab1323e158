//! Implements centralized storage for metrics. Schedulers report here about every scheduling
//! attempt and the engine reads the collected values when building the review.

use average::{concatenate, Estimate, Max, Mean, Min, Variance};

concatenate!(
    Estimator,
    [Min, min],
    [Max, max],
    [Mean, mean],
    [Variance, population_variance]
);

#[derive(Debug, Default)]
pub struct EstimatorWrapper {
    estimator: Estimator,
    count: u64,
}

impl std::fmt::Debug for Estimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Estimator")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("mean", &self.mean)
            .field("population_variance", &self.population_variance)
            .finish()
    }
}

impl EstimatorWrapper {
    pub fn new() -> Self {
        Self {
            estimator: Estimator::new(),
            count: 0,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.estimator.add(value);
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> f64 {
        self.estimator.min()
    }

    pub fn max(&self) -> f64 {
        self.estimator.max()
    }

    pub fn mean(&self) -> f64 {
        self.estimator.mean()
    }

    pub fn population_variance(&self) -> f64 {
        self.estimator.population_variance()
    }
}

impl PartialEq for EstimatorWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && self.min() == other.min()
            && self.max() == other.max()
            && self.mean() == other.mean()
            && self.population_variance() == other.population_variance()
    }
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// The number of pods which were bound to a node by the schedulers.
    pub pods_scheduled: u64,
    /// The number of failed scheduling attempts, a pod may fail several times.
    pub pods_unschedulable: u64,
    /// The number of pods the binder could not commit.
    pub failed_bindings: u64,

    /// Estimations for the time (secs) a pod spent between it was firstly pushed to the
    /// scheduling queue and bound to a node, thus considering repushes after failed attempts.
    pub pod_scheduling_latency_stats: EstimatorWrapper,

    /// Estimations for the time (secs) a single run of the scheduling algorithm took.
    pub pod_scheduling_algorithm_latency_stats: EstimatorWrapper,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            pods_scheduled: 0,
            pods_unschedulable: 0,
            failed_bindings: 0,
            pod_scheduling_latency_stats: EstimatorWrapper::new(),
            pod_scheduling_algorithm_latency_stats: EstimatorWrapper::new(),
        }
    }

    pub fn increment_pod_scheduling_latency(&mut self, value: f64) {
        self.pods_scheduled += 1;
        self.pod_scheduling_latency_stats.add(value);
    }

    pub fn increment_pod_scheduling_algorithm_latency(&mut self, value: f64) {
        self.pod_scheduling_algorithm_latency_stats.add(value);
    }

    pub fn increment_pods_unschedulable(&mut self) {
        self.pods_unschedulable += 1;
    }

    pub fn increment_failed_bindings(&mut self) {
        self.failed_bindings += 1;
    }
}
