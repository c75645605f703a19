//! Edge construction: handle names, labels, and the deduplicated edge list.

use std::collections::HashSet;

use shared_types::{EdgeAnimationType, FlowEdge, FlowEdgeData, VisualizerStep};

use super::animation::is_request_step;
use super::registry::AgentKind;

pub const EDGE_TYPE: &str = "defaultFlowEdge";

// ── Handle ids ───────────────────────────────────────────────────────────────

pub const USER_BOTTOM_OUTPUT: &str = "user-bottom-output";
pub const USER_TOP_INPUT: &str = "user-top-input";
pub const LLM_LEFT_INPUT: &str = "llm-left-input";
pub const LLM_BOTTOM_OUTPUT: &str = "llm-bottom-output";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleSide {
    Top,
    Bottom,
    Right,
}

/// Handle of an agent node, e.g. `orch-right-output-tools`
pub fn agent_handle(kind: AgentKind, output: bool, side: HandleSide) -> String {
    let prefix = kind.handle_prefix();
    match (output, side) {
        (true, HandleSide::Bottom) => format!("{prefix}-bottom-output"),
        (true, _) => format!("{prefix}-right-output-tools"),
        (false, HandleSide::Top) => format!("{prefix}-top-input"),
        (false, _) => format!("{prefix}-right-input-tools"),
    }
}

pub fn tool_input_handle(tool_node_id: &str) -> String {
    format!("{tool_node_id}-tool-left-input")
}

pub fn tool_output_handle(tool_node_id: &str) -> String {
    format!("{tool_node_id}-tool-bottom-output")
}

// ── Labels and ids ───────────────────────────────────────────────────────────

/// The step title, or the step-type phrase when the title is too long
pub fn edge_label(step: &VisualizerStep, max_chars: usize) -> String {
    if step.title.chars().count() > max_chars {
        step.step_type().phrase()
    } else {
        step.title.clone()
    }
}

pub fn edge_id(
    source: &str,
    target: &str,
    source_handle: Option<&str>,
    target_handle: Option<&str>,
    step_id: &str,
) -> String {
    format!(
        "edge-{source}{}-to-{target}{}-{step_id}",
        source_handle.unwrap_or_default(),
        target_handle.unwrap_or_default()
    )
}

// ── Edge set ─────────────────────────────────────────────────────────────────

/// Edges in creation order, deduplicated by id
#[derive(Debug, Default)]
pub struct EdgeSet {
    edges: Vec<FlowEdge>,
    ids: HashSet<String>,
}

pub struct EdgeRequest<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub source_handle: Option<&'a str>,
    pub target_handle: Option<&'a str>,
}

impl EdgeSet {
    /// Adds the edge unless it is a self-loop, a duplicate, or refers to a
    /// node `node_exists` does not know. Returns whether it was added.
    pub fn connect(
        &mut self,
        request: EdgeRequest<'_>,
        step: &VisualizerStep,
        label_max_chars: usize,
        node_exists: impl Fn(&str) -> bool,
    ) -> bool {
        let EdgeRequest {
            source,
            target,
            source_handle,
            target_handle,
        } = request;

        if source.is_empty() || target.is_empty() || source == target {
            return false;
        }
        if !node_exists(source) || !node_exists(target) {
            tracing::debug!(
                source = %source,
                target = %target,
                step_id = %step.id,
                "Dropping edge to a node that does not exist"
            );
            return false;
        }

        let id = edge_id(source, target, source_handle, target_handle, &step.id);
        if !self.ids.insert(id.clone()) {
            return false;
        }

        let animated = is_request_step(step);
        self.edges.push(FlowEdge {
            id,
            source: source.to_string(),
            target: target.to_string(),
            source_handle: source_handle.map(ToString::to_string),
            target_handle: target_handle.map(ToString::to_string),
            label: edge_label(step, label_max_chars),
            edge_type: EDGE_TYPE.to_string(),
            data: FlowEdgeData {
                visualizer_step_id: step.id.clone(),
                is_animated: animated,
                animation_type: if animated {
                    EdgeAnimationType::Request
                } else {
                    EdgeAnimationType::Static
                },
                duration: 1.0,
            },
        });
        true
    }

    pub fn into_edges(self) -> Vec<FlowEdge> {
        self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared_types::{StepData, TextData, ToolInvocationStartData};

    fn step(id: &str, title: &str, data: StepData) -> VisualizerStep {
        VisualizerStep {
            id: id.to_string(),
            data,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            title: title.to_string(),
            source: "OrchestratorAgent".to_string(),
            target: "search".to_string(),
            raw_event_ids: vec![],
            nesting_level: 0,
            is_sub_task_step: false,
            owning_task_id: "task-1".to_string(),
            function_call_id: None,
            delegation_info: None,
        }
    }

    fn text_step(id: &str, title: &str) -> VisualizerStep {
        step(id, title, StepData::AgentResponseText(TextData { text: "hi".to_string() }))
    }

    fn request<'a>(source: &'a str, target: &'a str) -> EdgeRequest<'a> {
        EdgeRequest {
            source,
            target,
            source_handle: Some("orch-right-output-tools"),
            target_handle: None,
        }
    }

    #[test]
    fn test_long_titles_use_type_phrase() {
        let short = text_step("s1", "Billing: Response");
        assert_eq!(edge_label(&short, 30), "Billing: Response");
        let long = text_step("s2", "OrchestratorAgent: Executing tool web_search");
        assert_eq!(edge_label(&long, 30), "agent response text");
    }

    #[test]
    fn test_connect_dedups_and_drops_dangling() {
        let mut edges = EdgeSet::default();
        let exists = |id: &str| id == "a" || id == "b";
        let s = text_step("s1", "x");

        assert!(edges.connect(request("a", "b"), &s, 30, exists));
        assert!(!edges.connect(request("a", "b"), &s, 30, exists));
        assert!(!edges.connect(request("a", "missing"), &s, 30, exists));
        assert!(!edges.connect(request("a", "a"), &s, 30, exists));

        let edges = edges.into_edges();
        assert_eq!(edges.len(), 1);
        let edge = &edges[0];
        assert_eq!(edge.id, "edge-aorch-right-output-tools-to-b-s1");
        assert_eq!(edge.edge_type, "defaultFlowEdge");
        assert!(!edge.data.is_animated);
    }

    #[test]
    fn test_tool_request_edges_start_animated() {
        let mut edges = EdgeSet::default();
        let s = step(
            "s1",
            "OrchestratorAgent: Executing tool search",
            StepData::AgentToolInvocationStart(ToolInvocationStartData {
                function_call_id: "fc-1".to_string(),
                tool_name: "search".to_string(),
                tool_arguments: serde_json::json!({}),
                is_peer_invocation: false,
            }),
        );
        edges.connect(request("a", "b"), &s, 30, |_| true);
        let edge = &edges.into_edges()[0];
        assert!(edge.data.is_animated);
        assert_eq!(edge.data.animation_type, EdgeAnimationType::Request);
    }

    #[test]
    fn test_agent_handles() {
        assert_eq!(
            agent_handle(AgentKind::Orchestrator, true, HandleSide::Bottom),
            "orch-bottom-output"
        );
        assert_eq!(
            agent_handle(AgentKind::Peer, false, HandleSide::Top),
            "peer-top-input"
        );
        assert_eq!(
            agent_handle(AgentKind::Orchestrator, false, HandleSide::Right),
            "orch-right-input-tools"
        );
        assert_eq!(tool_input_handle("search_3"), "search_3-tool-left-input");
    }
}
