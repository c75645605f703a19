//! Visualizer steps: the semantic, ordered view of a task execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::performance::PerformanceReport;

// ============================================================================
// Step Type
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum StepType {
    UserRequest,
    AgentLlmCall,
    AgentLlmResponseToolDecision,
    AgentLlmResponseToAgent,
    AgentToolInvocationStart,
    AgentToolExecutionResult,
    AgentResponseText,
    AgentArtifactNotification,
    TaskCompleted,
    TaskFailed,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRequest => "USER_REQUEST",
            Self::AgentLlmCall => "AGENT_LLM_CALL",
            Self::AgentLlmResponseToolDecision => "AGENT_LLM_RESPONSE_TOOL_DECISION",
            Self::AgentLlmResponseToAgent => "AGENT_LLM_RESPONSE_TO_AGENT",
            Self::AgentToolInvocationStart => "AGENT_TOOL_INVOCATION_START",
            Self::AgentToolExecutionResult => "AGENT_TOOL_EXECUTION_RESULT",
            Self::AgentResponseText => "AGENT_RESPONSE_TEXT",
            Self::AgentArtifactNotification => "AGENT_ARTIFACT_NOTIFICATION",
            Self::TaskCompleted => "TASK_COMPLETED",
            Self::TaskFailed => "TASK_FAILED",
        }
    }

    /// Lowercase phrase used where a full title does not fit
    pub fn phrase(&self) -> String {
        self.as_str().replace('_', " ").to_ascii_lowercase()
    }
}

// ============================================================================
// Step Payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct TextData {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct LlmCallData {
    pub model_name: String,
    pub prompt_preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct ToolDecision {
    pub function_call_id: String,
    pub tool_name: String,
    #[ts(type = "unknown")]
    pub tool_arguments: serde_json::Value,
    pub is_peer_delegation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct ToolDecisionData {
    pub decisions: Vec<ToolDecision>,
    pub is_parallel: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct LlmResponseToAgentData {
    pub response_preview: String,
    pub is_final_response: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct ToolInvocationStartData {
    pub function_call_id: String,
    pub tool_name: String,
    #[ts(type = "unknown")]
    pub tool_arguments: serde_json::Value,
    pub is_peer_invocation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct ToolResultData {
    pub tool_name: String,
    pub function_call_id: String,
    #[ts(type = "unknown")]
    pub result_data: serde_json::Value,
    pub is_peer_response: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct ArtifactNotificationData {
    pub artifact_name: String,
    #[ts(type = "number | null")]
    pub version: Option<i64>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct CompletionData {
    pub final_message: Option<String>,
}

/// Error descriptor; `code` is a number or a string depending on the producer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct ErrorDetails {
    pub message: String,
    #[ts(type = "number | string | null")]
    pub code: Option<serde_json::Value>,
    #[ts(type = "unknown")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct FailureData {
    pub error_details: ErrorDetails,
}

/// Type tag plus the payload relevant to that type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum StepData {
    UserRequest(TextData),
    AgentLlmCall(LlmCallData),
    AgentLlmResponseToolDecision(ToolDecisionData),
    AgentLlmResponseToAgent(LlmResponseToAgentData),
    AgentToolInvocationStart(ToolInvocationStartData),
    AgentToolExecutionResult(ToolResultData),
    AgentResponseText(TextData),
    AgentArtifactNotification(ArtifactNotificationData),
    TaskCompleted(CompletionData),
    TaskFailed(FailureData),
}

impl StepData {
    pub fn step_type(&self) -> StepType {
        match self {
            Self::UserRequest(_) => StepType::UserRequest,
            Self::AgentLlmCall(_) => StepType::AgentLlmCall,
            Self::AgentLlmResponseToolDecision(_) => StepType::AgentLlmResponseToolDecision,
            Self::AgentLlmResponseToAgent(_) => StepType::AgentLlmResponseToAgent,
            Self::AgentToolInvocationStart(_) => StepType::AgentToolInvocationStart,
            Self::AgentToolExecutionResult(_) => StepType::AgentToolExecutionResult,
            Self::AgentResponseText(_) => StepType::AgentResponseText,
            Self::AgentArtifactNotification(_) => StepType::AgentArtifactNotification,
            Self::TaskCompleted(_) => StepType::TaskCompleted,
            Self::TaskFailed(_) => StepType::TaskFailed,
        }
    }
}

// ============================================================================
// Visualizer Step
// ============================================================================

/// Correlates one peer delegation decision with the sub-task it spawned
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct DelegationInfo {
    pub function_call_id: String,
    pub peer_agent_name: String,
    pub sub_task_id: String,
}

/// One semantic step of a (possibly nested) task execution.
/// Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct VisualizerStep {
    pub id: String,

    #[serde(flatten)]
    pub data: StepData,

    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub source: String,
    pub target: String,

    /// Raw event ids this step was derived from
    pub raw_event_ids: Vec<String>,

    /// 0 for the root task
    pub nesting_level: u32,
    pub is_sub_task_step: bool,
    pub owning_task_id: String,
    pub function_call_id: Option<String>,
    pub delegation_info: Option<Vec<DelegationInfo>>,
}

impl VisualizerStep {
    pub fn step_type(&self) -> StepType {
        self.data.step_type()
    }

    pub fn tool_decision(&self) -> Option<&ToolDecisionData> {
        match &self.data {
            StepData::AgentLlmResponseToolDecision(data) => Some(data),
            _ => None,
        }
    }

    pub fn tool_invocation(&self) -> Option<&ToolInvocationStartData> {
        match &self.data {
            StepData::AgentToolInvocationStart(data) => Some(data),
            _ => None,
        }
    }

    pub fn tool_result(&self) -> Option<&ToolResultData> {
        match &self.data {
            StepData::AgentToolExecutionResult(data) => Some(data),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            StepData::UserRequest(data) | StepData::AgentResponseText(data) => {
                Some(data.text.as_str())
            }
            _ => None,
        }
    }

    /// The agent this step belongs to, whichever side of the arrow it is on
    pub fn agent_name(&self) -> &str {
        match self.step_type() {
            StepType::UserRequest
            | StepType::AgentLlmResponseToolDecision
            | StepType::AgentLlmResponseToAgent
            | StepType::AgentToolExecutionResult => &self.target,
            _ => &self.source,
        }
    }
}

// ============================================================================
// Visualized Task
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum TaskStatus {
    Working,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct VisualizedTask {
    pub task_id: String,
    pub initial_request_text: String,
    pub status: TaskStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[ts(type = "number | null")]
    pub duration_ms: Option<i64>,
    pub steps: Vec<VisualizerStep>,
    pub performance_report: PerformanceReport,
}
