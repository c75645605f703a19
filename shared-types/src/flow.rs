//! Positioned diagram handed to the renderer.
//!
//! Type tags and handle ids are a contract with the diagram component;
//! positions of children of a group node are relative to that group.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum FlowNodeType {
    OrchestratorNode,
    GenericAgentNode,
    GenericToolNode,
    LlmNode,
    UserNode,
    Group,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct FlowPosition {
    pub x: f64,
    pub y: f64,
}

impl FlowPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct FlowNodeData {
    pub label: String,
    pub visualizer_step_id: Option<String>,
    pub tool_name: Option<String>,
    #[serde(default)]
    pub is_top_node: bool,
    #[serde(default)]
    pub is_bottom_node: bool,
    pub status: Option<String>,
    pub description: Option<String>,
}

impl FlowNodeData {
    pub fn labeled(label: impl Into<String>, visualizer_step_id: &str) -> Self {
        Self {
            label: label.into(),
            visualizer_step_id: Some(visualizer_step_id.to_string()),
            ..Self::default()
        }
    }
}

/// Explicit size of a group box
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct NodeStyle {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub min_height: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: FlowNodeType,
    pub position: FlowPosition,
    pub data: FlowNodeData,
    /// Group this node is drawn inside of
    pub parent_id: Option<String>,
    pub style: Option<NodeStyle>,
}

// ============================================================================
// Edges
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub enum EdgeAnimationType {
    Request,
    Response,
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct FlowEdgeData {
    pub visualizer_step_id: String,
    pub is_animated: bool,
    pub animation_type: EdgeAnimationType,
    /// Seconds per animation cycle
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
    pub label: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub data: FlowEdgeData,
}

/// Everything the renderer needs for one task diagram
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/generated.ts")]
pub struct TimelineFlow {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl TimelineFlow {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn nodes_of_type(&self, node_type: FlowNodeType) -> impl Iterator<Item = &FlowNode> {
        self.nodes
            .iter()
            .filter(move |node| node.node_type == node_type)
    }
}
