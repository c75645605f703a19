//! Per-agent-instance timing report derived alongside the visualizer steps.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct LlmCallPerformance {
    pub model_name: String,
    #[ts(type = "number")]
    pub duration_ms: i64,
    /// When the call started
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct ToolCallPerformance {
    pub tool_name: String,
    #[ts(type = "number")]
    pub duration_ms: i64,
    pub is_peer: bool,
    /// When the call was decided
    pub timestamp: DateTime<Utc>,
    /// Display name of the delegated peer instance
    pub peer_agent_name: Option<String>,
    pub sub_task_id: Option<String>,
    /// Id of the decision step that fanned out this call in parallel
    pub parallel_block_id: Option<String>,
}

impl ToolCallPerformance {
    pub fn end_ms(&self) -> i64 {
        self.timestamp.timestamp_millis() + self.duration_ms
    }
}

/// Metrics of one agent instance: an agent name running inside one task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct AgentPerformanceMetrics {
    pub agent_name: String,
    /// `agentName:taskId`
    pub instance_id: String,
    pub task_id: String,
    /// Agent name, suffixed with " (n)" when the name has several instances
    pub display_name: String,
    pub llm_calls: Vec<LlmCallPerformance>,
    pub tool_calls: Vec<ToolCallPerformance>,
    #[ts(type = "number")]
    pub total_llm_time_ms: i64,
    #[ts(type = "number")]
    pub total_tool_time_ms: i64,
}

impl AgentPerformanceMetrics {
    pub fn new(agent_name: impl Into<String>, task_id: impl Into<String>) -> Self {
        let agent_name = agent_name.into();
        let task_id = task_id.into();
        Self {
            instance_id: instance_id(&agent_name, &task_id),
            display_name: agent_name.clone(),
            agent_name,
            task_id,
            llm_calls: Vec::new(),
            tool_calls: Vec::new(),
            total_llm_time_ms: 0,
            total_tool_time_ms: 0,
        }
    }

    /// Earliest start over all recorded calls
    pub fn first_activity_ms(&self) -> Option<i64> {
        self.llm_calls
            .iter()
            .map(|call| call.timestamp.timestamp_millis())
            .chain(
                self.tool_calls
                    .iter()
                    .map(|call| call.timestamp.timestamp_millis()),
            )
            .min()
    }
}

pub fn instance_id(agent_name: &str, task_id: &str) -> String {
    format!("{agent_name}:{task_id}")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct OverallMetrics {
    #[ts(type = "number")]
    pub total_task_duration_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct PerformanceReport {
    pub overall: OverallMetrics,
    /// Keyed by instance id
    pub agents: BTreeMap<String, AgentPerformanceMetrics>,
}
