//! Event types for streaming run progress
//!
//! Events are sent from the scheduler to the canvas (or any consumer)
//! to report node state changes, streamed text, and run completion.

use serde::{Deserialize, Serialize};

use crate::output::NodeOutput;

/// Trait for sending run events
///
/// This abstracts over the transport mechanism (UI channel, mpsc, etc.)
/// allowing the scheduler to be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone, thiserror::Error)]
#[error("Event error: {message}")]
pub struct EventError {
    pub message: String,
}

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    /// A run started
    #[serde(rename_all = "camelCase")]
    RunStarted {
        execution_id: String,
        target: Option<String>,
        nodes: Vec<String>,
    },

    /// A node was dispatched
    #[serde(rename_all = "camelCase")]
    NodeStarted {
        node_id: String,
        execution_id: String,
    },

    /// Partial text streamed by a running node
    #[serde(rename_all = "camelCase")]
    NodeProgress {
        node_id: String,
        execution_id: String,
        text: String,
    },

    /// A node completed with an output
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        node_id: String,
        execution_id: String,
        output: NodeOutput,
    },

    /// A node failed
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        node_id: String,
        execution_id: String,
        error: String,
    },

    /// A run finished with no work left
    #[serde(rename_all = "camelCase")]
    RunCompleted {
        execution_id: String,
        completed: usize,
        failed: usize,
    },

    /// A run stopped because it was cancelled
    #[serde(rename_all = "camelCase")]
    RunCancelled { execution_id: String },
}

impl WorkflowEvent {
    /// Create a node failure event
    pub fn node_failed(node_id: &str, execution_id: &str, error: impl Into<String>) -> Self {
        Self::NodeFailed {
            node_id: node_id.to_string(),
            execution_id: execution_id.to_string(),
            error: error.into(),
        }
    }

    /// Create a node progress event
    pub fn node_progress(node_id: &str, execution_id: &str, text: impl Into<String>) -> Self {
        Self::NodeProgress {
            node_id: node_id.to_string(),
            execution_id: execution_id.to_string(),
            text: text.into(),
        }
    }

    /// The node this event is about, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { node_id, .. }
            | Self::NodeProgress { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. } => Some(node_id),
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunCancelled { .. } => {
                None
            }
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
#[derive(Default)]
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<WorkflowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(WorkflowEvent::node_progress("enhance", "exec1", "A fluffy"))
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            WorkflowEvent::NodeProgress { node_id, text, .. } => {
                assert_eq!(node_id, "enhance");
                assert_eq!(text, "A fluffy");
            }
            _ => panic!("Expected NodeProgress event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(WorkflowEvent::node_failed("gen", "exec1", "boom"))
            .unwrap();
    }

    #[test]
    fn test_event_wire_format() {
        let event = WorkflowEvent::node_failed("gen", "exec1", "upstream dependency failed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "nodeFailed",
                "nodeId": "gen",
                "executionId": "exec1",
                "error": "upstream dependency failed"
            })
        );
        assert_eq!(event.node_id(), Some("gen"));
    }
}
