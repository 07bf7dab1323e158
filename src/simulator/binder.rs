//! Binder and pod condition updater given to every scheduler. Both forward the calls to the
//! simulation core on behalf of the scheduler they were created for.

use std::sync::Arc;

use log::error;

use crate::core::pod::{Pod, PodCondition};
use crate::core::scheduler::interface::{Binder, Binding, CallbackResult, PodConditionUpdater};
use crate::simulator::SimulationCore;

pub struct LocalBinder {
    core: Arc<SimulationCore>,
    scheduler_name: String,
}

impl LocalBinder {
    pub fn new(core: Arc<SimulationCore>, scheduler_name: &str) -> Self {
        Self {
            core,
            scheduler_name: scheduler_name.to_string(),
        }
    }
}

impl Binder for LocalBinder {
    fn bind(&self, binding: &Binding) -> CallbackResult {
        match self.core.bind(binding, &self.scheduler_name) {
            Ok(()) => Ok(()),
            Err(err) => {
                error!(
                    "Binding of pod {:?} by {:?} failed, stopping simulation: {}",
                    binding.pod_name, self.scheduler_name, err
                );
                self.core.terminate(Err(err.clone()));
                Err(Box::new(err))
            }
        }
    }
}

impl PodConditionUpdater for LocalBinder {
    fn update(&self, pod: &Pod, condition: &PodCondition) -> CallbackResult {
        self.core.update_condition(pod, condition);
        Ok(())
    }
}
