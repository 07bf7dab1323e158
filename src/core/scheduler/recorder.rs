//! Buffered recorder of scheduling events. Events which do not fit into the buffer are dropped
//! the same way the kubernetes fake recorder drops them.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use log::trace;

use crate::core::events::{RecordedEvent, RecordedEventType};
use crate::core::pod::Pod;

pub const DEFAULT_RECORDER_BUFFER: usize = 100;

#[derive(Clone)]
pub struct EventRecorder {
    sender: SyncSender<RecordedEvent>,
}

impl EventRecorder {
    pub fn new(buffer: usize) -> (Self, Receiver<RecordedEvent>) {
        let (sender, receiver) = sync_channel(buffer);
        (Self { sender }, receiver)
    }

    pub fn event(&self, pod: &Pod, event_type: RecordedEventType, reason: &str, message: String) {
        let event = RecordedEvent {
            event_type,
            involved_object: pod.metadata.key(),
            reason: reason.to_string(),
            message,
        };
        trace!("Recording event {:?}", event.format());
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                trace!("Event buffer is full, dropping {:?}", event.format())
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::events::RecordedEventType;
    use crate::core::pod::Pod;
    use crate::core::scheduler::recorder::EventRecorder;

    #[test]
    fn test_events_over_buffer_are_dropped() {
        let (recorder, events) = EventRecorder::new(2);
        let pod = Pod::new("pod_1", "default", 1, 1);
        for reason in ["Scheduled", "Scheduled", "Dropped"] {
            recorder.event(&pod, RecordedEventType::Normal, reason, "message".to_string());
        }

        let recorded: Vec<String> = events.try_iter().map(|e| e.format()).collect();
        assert_eq!(
            vec!["Normal Scheduled message", "Normal Scheduled message"],
            recorded
        );
    }
}
