//! Workflow events fanned out over a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is owned by one
//! [`ImportController`](crate::controller::ImportController); subscribers
//! see step changes, progress, notices and background layout failures for
//! that session only.

use mde_core::types::DiagramId;
use mde_core::workflow::{Notice, WorkflowStep};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkflowEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StepChanged {
        session_id: Uuid,
        from: WorkflowStep,
        to: WorkflowStep,
    },

    /// An accepted progress report for the current upload attempt.
    UploadProgress { attempt: u64, percent: u8 },

    /// Destination fields changed; `complete` is the re-evaluated
    /// completeness of the form.
    DestinationChanged { complete: bool },

    Notice(Notice),

    /// The background layout pass failed. The import itself stands.
    AutoLayoutFailed { diagram_id: DiagramId, error: String },
}

impl WorkflowEvent {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StepChanged { .. } => "step_changed",
            Self::UploadProgress { .. } => "upload_progress",
            Self::DestinationChanged { .. } => "destination_changed",
            Self::Notice(_) => "notice",
            Self::AutoLayoutFailed { .. } => "auto_layout_failed",
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    /// When the buffer is full the oldest events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: WorkflowEvent) {
        tracing::trace!(kind = event.kind(), "Publishing workflow event");
        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_events() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(WorkflowEvent::UploadProgress {
            attempt: 1,
            percent: 40,
        });

        for rx in [&mut a, &mut b] {
            let event = rx.recv().await.unwrap();
            assert_eq!(
                event,
                WorkflowEvent::UploadProgress {
                    attempt: 1,
                    percent: 40
                }
            );
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(WorkflowEvent::DestinationChanged { complete: false });
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(WorkflowEvent::StepChanged {
            session_id: Uuid::nil(),
            from: WorkflowStep::Idle,
            to: WorkflowStep::Uploading,
        })
        .unwrap();
        assert_eq!(json["type"], "step_changed");
        assert_eq!(json["to"], "uploading");
    }
}
