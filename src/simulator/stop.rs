//! One-shot stop signal of a simulation run.

use parking_lot::{Condvar, Mutex};

use crate::error::SimulationError;

pub type RunOutcome = Result<(), SimulationError>;

#[derive(Debug)]
enum StopState {
    Running,
    // Outcome delivered but not taken by the waiter yet
    Stopping(RunOutcome),
    Stopped,
}

/// Carries the outcome of a run from whoever terminates it to the thread blocked in `wait`.
/// Only the first outcome is delivered, later ones are dropped.
#[derive(Debug)]
pub struct StopSignal {
    state: Mutex<StopState>,
    condvar: Condvar,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StopState::Running),
            condvar: Condvar::new(),
        }
    }

    /// Returns false if the signal was already delivered.
    pub fn signal(&self, outcome: RunOutcome) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, StopState::Running) {
            return false;
        }
        *state = StopState::Stopping(outcome);
        self.condvar.notify_all();
        true
    }

    pub fn is_signaled(&self) -> bool {
        !matches!(*self.state.lock(), StopState::Running)
    }

    /// Blocks until the signal is delivered and takes the outcome. A second waiter gets `None`.
    pub fn wait(&self) -> Option<RunOutcome> {
        let mut state = self.state.lock();
        while matches!(*state, StopState::Running) {
            self.condvar.wait(&mut state);
        }
        match std::mem::replace(&mut *state, StopState::Stopped) {
            StopState::Stopping(outcome) => Some(outcome),
            _ => None,
        }
    }
}
