//! Events flowing between simulation components: watch events emitted by the fake REST layer to
//! the scheduler and recorded scheduling events which the scheduler reports about pods.

use serde::Serialize;

use crate::core::object::{Object, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
}

/// Event from the fake REST layer to a watcher telling that an object of the watched kind has
/// changed in the resource store.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub event_type: WatchEventType,
    pub kind: ResourceKind,
    pub object: Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordedEventType {
    Normal,
    Warning,
}

/// Event recorded by a scheduler about a pod, e.g. `Scheduled` or `FailedScheduling`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    pub event_type: RecordedEventType,
    /// `<namespace>/<name>` of the pod the event is about
    pub involved_object: String,
    pub reason: String,
    pub message: String,
}

impl RecordedEvent {
    /// Same layout as the events of the kubernetes fake recorder.
    pub fn format(&self) -> String {
        let event_type = match self.event_type {
            RecordedEventType::Normal => "Normal",
            RecordedEventType::Warning => "Warning",
        };
        format!("{} {} {}", event_type, self.reason, self.message)
    }
}
