//! Raw A2A events and task records as delivered by the task store.
//!
//! These are consumed, never produced, by the visualizer pipeline. The
//! envelope keeps the SSE wire names; the nested protocol payload stays
//! opaque JSON because its shape depends on direction and metadata flags.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Event Envelope
// ============================================================================

/// Direction tag of an A2A event envelope
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum EventDirection {
    Request,
    Response,
    StatusUpdate,
    ArtifactUpdate,
    Discovery,
    /// Anything the transport adds later
    #[serde(other)]
    Unknown,
}

/// One raw event as pushed over the SSE channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct A2AEvent {
    /// Envelope kind, usually "a2a_message"
    #[serde(default)]
    pub event_type: String,

    /// ISO 8601 envelope timestamp
    pub timestamp: String,

    pub direction: EventDirection,

    #[serde(default)]
    pub source_entity: String,

    #[serde(default)]
    pub target_entity: String,

    /// JSON-RPC id
    #[serde(default)]
    pub message_id: Option<String>,

    /// A2A task id; absent for global/discovery traffic
    #[serde(default)]
    pub task_id: Option<String>,

    /// The full JSON-RPC message
    #[serde(default)]
    #[ts(type = "unknown")]
    pub full_payload: serde_json::Value,
}

impl A2AEvent {
    pub fn new(
        direction: EventDirection,
        task_id: impl Into<String>,
        timestamp: impl Into<String>,
        full_payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: "a2a_message".to_string(),
            timestamp: timestamp.into(),
            direction,
            source_entity: String::new(),
            target_entity: String::new(),
            message_id: None,
            task_id: Some(task_id.into()),
            full_payload,
        }
    }

    pub fn with_entities(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_entity = source.into();
        self.target_entity = target.into();
        self
    }
}

// ============================================================================
// Task Records
// ============================================================================

/// Everything the task store knows about one A2A task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct TaskRecord {
    pub task_id: String,

    /// Truncated text of the first request
    #[serde(default)]
    pub initial_request_text: String,

    /// Events in arrival order
    #[serde(default)]
    pub events: Vec<A2AEvent>,

    pub first_seen: DateTime<Utc>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,

    /// Explicit parent; when absent it is inferred from the first event
    #[serde(default)]
    pub parent_task_id: Option<String>,
}

impl TaskRecord {
    pub fn new(task_id: impl Into<String>, first_seen: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.into(),
            initial_request_text: String::new(),
            events: Vec::new(),
            first_seen,
            last_updated: None,
            parent_task_id: None,
        }
    }

    pub fn with_events(mut self, events: Vec<A2AEvent>) -> Self {
        self.events = events;
        self
    }
}

/// Snapshot of the client-side task store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct TaskStoreState {
    pub tasks: HashMap<String, TaskRecord>,

    /// Insertion order of task ids
    #[serde(default)]
    pub task_order: Vec<String>,
}
