//! Layout state for one pass over the visualizer steps.
//!
//! Positions are tracked in absolute coordinates. Nodes drawn inside a
//! group box have their position converted to group-relative when they
//! are created.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use shared_types::{
    FlowNode, FlowNodeData, FlowNodeType, FlowPosition, NodeStyle, TimelineFlow, VisualizerStep,
};

use super::edges::{EdgeRequest, EdgeSet};
use super::registry::{AgentKind, AgentNodeInfo, AgentRegistry};
use crate::config::{LayoutConfig, ReconstructConfig, VisualizerConfig};

// ── Layout records ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NodeInstance {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub tool_name: Option<String>,
    pub function_call_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GroupBox {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Tool and LLM nodes stacked under one agent instance
#[derive(Debug, Clone, Default)]
pub struct ToolStack {
    pub instances: Vec<NodeInstance>,
    pub y_offset: f64,
    pub last_llm: Option<String>,
}

impl ToolStack {
    /// Latest node for the call, falling back to the latest node of that tool
    pub fn find(&self, function_call_id: &str, tool_name: &str) -> Option<&NodeInstance> {
        self.instances
            .iter()
            .rev()
            .find(|i| i.function_call_id.as_deref() == Some(function_call_id))
            .or_else(|| {
                self.instances
                    .iter()
                    .rev()
                    .find(|i| i.tool_name.as_deref() == Some(tool_name))
            })
    }
}

/// One top-level orchestrator turn
#[derive(Debug, Clone)]
pub struct Phase {
    pub id: String,
    pub orchestrator_name: String,
    /// Current orchestrator instance; replaced after every peer return
    pub orchestrator: NodeInstance,
    pub user_nodes: Vec<NodeInstance>,
    pub subflows: Vec<Subflow>,
    pub tools: ToolStack,
    pub max_y: f64,
    answered_instance: Option<String>,
}

/// One peer agent instance drawn inside its group box
#[derive(Debug, Clone)]
pub struct Subflow {
    /// Delegated sub-task id when known
    pub id: String,
    pub function_call_id: String,
    pub is_parallel: bool,
    pub peer_name: String,
    pub peer: NodeInstance,
    pub group: GroupBox,
    pub tools: ToolStack,
    pub max_y: f64,
    /// Right edge of the content, relative to the group
    pub max_content_x: f64,
}

/// Sibling delegations issued by one parallel tool decision
#[derive(Debug, Clone)]
pub struct ParallelFlow {
    pub function_call_ids: Vec<String>,
    pub completed: BTreeSet<String>,
    /// Agent that issued the decision and receives the join
    pub receiver: String,
    pub start_x: f64,
    pub start_y: f64,
    pub x_offset: f64,
    pub max_height: f64,
}

impl ParallelFlow {
    pub fn is_complete(&self) -> bool {
        self.function_call_ids
            .iter()
            .all(|id| self.completed.contains(id))
    }
}

/// Where an agent's tools and LLM calls are stacked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentContext {
    Phase,
    Subflow(usize),
}

pub struct SubflowOrigin {
    pub id: Option<String>,
    pub function_call_id: String,
    pub is_parallel: bool,
    pub is_peer_return: bool,
}

// ── Layout manager ───────────────────────────────────────────────────────────

pub struct LayoutManager<'c> {
    layout: &'c LayoutConfig,
    reconstruct: &'c ReconstructConfig,
    phases: Vec<Phase>,
    current_phase: Option<usize>,
    current_subflow: Option<usize>,
    parallel_flows: BTreeMap<String, ParallelFlow>,
    /// Function calls whose peer already handed back its result
    returned_calls: HashSet<String>,
    next_y: f64,
    node_counter: u64,
    nodes: Vec<FlowNode>,
    node_ids: HashSet<String>,
    edges: EdgeSet,
    registry: AgentRegistry,
    indentation: u32,
}

impl<'c> LayoutManager<'c> {
    pub fn new(config: &'c VisualizerConfig) -> Self {
        Self {
            layout: &config.layout,
            reconstruct: &config.reconstruct,
            phases: Vec::new(),
            current_phase: None,
            current_subflow: None,
            parallel_flows: BTreeMap::new(),
            returned_calls: HashSet::new(),
            next_y: config.layout.y_start,
            node_counter: 0,
            nodes: Vec::new(),
            node_ids: HashSet::new(),
            edges: EdgeSet::default(),
            registry: AgentRegistry::new(config.reconstruct.peer_tool_prefix.clone()),
            indentation: 0,
        }
    }

    pub fn reconstruct(&self) -> &'c ReconstructConfig {
        self.reconstruct
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        self.phases.get(self.current_phase?)
    }

    pub fn subflow(&self, index: usize) -> Option<&Subflow> {
        self.current_phase()?.subflows.get(index)
    }

    pub fn into_flow(self) -> TimelineFlow {
        TimelineFlow {
            nodes: self.nodes,
            edges: self.edges.into_edges(),
        }
    }

    fn generate_node_id(&mut self, prefix: &str) -> String {
        self.node_counter += 1;
        let sanitized: String = prefix
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        format!("{sanitized}_{}", self.node_counter)
    }

    fn add_node(&mut self, node: FlowNode) {
        self.node_ids.insert(node.id.clone());
        self.nodes.push(node);
    }

    pub fn set_node_status(&mut self, node_id: &str, status: &str) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == node_id) {
            node.data.status = Some(status.to_string());
        }
    }

    /// Adds an edge between two existing nodes; see [`EdgeSet::connect`]
    pub fn connect(
        &mut self,
        source: &str,
        target: &str,
        source_handle: Option<&str>,
        target_handle: Option<&str>,
        step: &VisualizerStep,
    ) -> bool {
        let node_ids = &self.node_ids;
        self.edges.connect(
            EdgeRequest {
                source,
                target,
                source_handle,
                target_handle,
            },
            step,
            self.reconstruct.edge_label_max_chars,
            |id| node_ids.contains(id),
        )
    }

    // ── Phases and orchestrator instances ────────────────────────────────────

    fn add_orchestrator_node(&mut self, name: &str, phase_id: &str, step: &VisualizerStep) -> NodeInstance {
        let node_id = self.generate_node_id(&format!("{name}_{phase_id}"));
        let (x, y) = (self.layout.main_lane_x, self.next_y);
        self.add_node(FlowNode {
            id: node_id.clone(),
            node_type: FlowNodeType::OrchestratorNode,
            position: FlowPosition::new(x, y),
            data: FlowNodeData::labeled(name, &step.id),
            parent_id: None,
            style: None,
        });
        self.registry.register(AgentNodeInfo {
            node_id: node_id.clone(),
            name: name.to_string(),
            kind: AgentKind::Orchestrator,
            phase_id: phase_id.to_string(),
            subflow_id: None,
        });
        NodeInstance {
            id: node_id,
            x,
            y,
            tool_name: None,
            function_call_id: None,
        }
    }

    pub fn start_phase(&mut self, orchestrator_name: &str, step: &VisualizerStep) -> usize {
        let phase_id = format!("phase_{}", self.phases.len());
        let orchestrator = self.add_orchestrator_node(orchestrator_name, &phase_id, step);
        let max_y = orchestrator.y + self.layout.node_height;

        tracing::debug!(phase = %phase_id, agent = %orchestrator_name, "Starting layout phase");
        self.phases.push(Phase {
            id: phase_id,
            orchestrator_name: orchestrator_name.to_string(),
            orchestrator,
            user_nodes: Vec::new(),
            subflows: Vec::new(),
            tools: ToolStack::default(),
            max_y,
            answered_instance: None,
        });
        let index = self.phases.len() - 1;
        self.current_phase = Some(index);
        self.current_subflow = None;
        self.next_y = max_y + self.layout.vertical_spacing;
        index
    }

    /// Opens a phase when none is open and the step comes from the
    /// orchestrator. Other steps without a phase are not drawn.
    pub fn ensure_phase(&mut self, step: &VisualizerStep) -> bool {
        if self.current_phase.is_some() {
            return true;
        }
        let agent = step.agent_name();
        if step.is_sub_task_step || !self.reconstruct.is_orchestrator(agent) {
            tracing::debug!(step_id = %step.id, agent = %agent, "No open phase for step");
            return false;
        }
        let agent = agent.to_string();
        self.start_phase(&agent, step);
        true
    }

    pub fn close_phase(&mut self) {
        self.current_phase = None;
        self.current_subflow = None;
        self.indentation = 0;
    }

    /// Fresh orchestrator instance below everything laid out so far
    pub fn add_orchestrator_instance(&mut self, step: &VisualizerStep) -> Option<String> {
        let phase_index = self.current_phase?;
        let phase = self.phases.get(phase_index)?;
        let (name, phase_id) = (phase.orchestrator_name.clone(), phase.id.clone());

        let instance = self.add_orchestrator_node(&name, &phase_id, step);
        let node_id = instance.id.clone();
        let bottom = instance.y + self.layout.node_height;

        let phase = self.phases.get_mut(phase_index)?;
        phase.orchestrator = instance;
        phase.tools = ToolStack::default();
        phase.max_y = phase.max_y.max(bottom);
        self.current_subflow = None;
        self.next_y = self.next_y.max(bottom + self.layout.vertical_spacing);
        Some(node_id)
    }

    // ── User nodes ───────────────────────────────────────────────────────────

    pub fn add_top_user_node(&mut self, step: &VisualizerStep) -> Option<String> {
        let phase_index = self.current_phase?;
        let phase = self.phases.get(phase_index)?;
        let prefix = format!("User_{}", phase.id);
        let y = phase.orchestrator.y - self.layout.top_user_offset;

        let node_id = self.generate_node_id(&prefix);
        let x = self.layout.user_lane_x;
        self.add_node(FlowNode {
            id: node_id.clone(),
            node_type: FlowNodeType::UserNode,
            position: FlowPosition::new(x, y),
            data: FlowNodeData {
                is_top_node: true,
                ..FlowNodeData::labeled("User", &step.id)
            },
            parent_id: None,
            style: None,
        });
        self.phases.get_mut(phase_index)?.user_nodes.push(NodeInstance {
            id: node_id.clone(),
            x,
            y,
            tool_name: None,
            function_call_id: None,
        });
        Some(node_id)
    }

    /// Bottom user node for the current orchestrator instance; `None` when
    /// that instance already answered the user
    pub fn add_bottom_user_node(&mut self, step: &VisualizerStep) -> Option<String> {
        let phase_index = self.current_phase?;
        let phase = self.phases.get(phase_index)?;
        if phase.answered_instance.as_deref() == Some(phase.orchestrator.id.as_str()) {
            return None;
        }
        let answered = phase.orchestrator.id.clone();

        let node_id = self.generate_node_id("User_response");
        let (x, y) = (
            self.layout.user_lane_x,
            self.next_y + self.layout.bottom_user_gap,
        );
        self.add_node(FlowNode {
            id: node_id.clone(),
            node_type: FlowNodeType::UserNode,
            position: FlowPosition::new(x, y),
            data: FlowNodeData {
                is_bottom_node: true,
                ..FlowNodeData::labeled("User", &step.id)
            },
            parent_id: None,
            style: None,
        });

        let bottom = y + self.layout.node_height;
        let phase = self.phases.get_mut(phase_index)?;
        phase.user_nodes.push(NodeInstance {
            id: node_id.clone(),
            x,
            y,
            tool_name: None,
            function_call_id: None,
        });
        phase.max_y = phase.max_y.max(bottom);
        phase.answered_instance = Some(answered);
        self.next_y = bottom + self.layout.vertical_spacing;
        Some(node_id)
    }

    // ── Subflows ─────────────────────────────────────────────────────────────

    pub fn outdent(&mut self) {
        self.indentation = self.indentation.saturating_sub(1);
    }

    /// Group box plus peer agent node for one delegation
    pub fn start_subflow(
        &mut self,
        peer_name: &str,
        step: &VisualizerStep,
        origin: SubflowOrigin,
    ) -> Option<usize> {
        let phase_index = self.current_phase?;
        let layout = self.layout;

        let from_orchestrator = self.reconstruct.is_orchestrator(&step.source);
        if !origin.is_peer_return && !from_orchestrator && !origin.is_parallel {
            self.indentation += 1;
        }

        let phase = self.phases.get(phase_index)?;
        let phase_id = phase.id.clone();
        let subflow_id = origin
            .id
            .unwrap_or_else(|| format!("subflow_{}", phase.subflows.len()));
        let peer_node_id = self.generate_node_id(&format!("{peer_name}_{subflow_id}"));
        let group_node_id = self.generate_node_id(&format!("group_{peer_name}_{subflow_id}"));

        let parallel_key = if origin.is_parallel {
            self.parallel_key_for(&origin.function_call_id)
        } else {
            None
        };
        let (group_x, group_y) = match parallel_key
            .as_ref()
            .and_then(|key| self.parallel_flows.get_mut(key))
        {
            Some(flow) => {
                let x = flow.start_x + flow.x_offset;
                flow.x_offset += layout.parallel_sibling_spacing();
                (x, flow.start_y)
            }
            None => (
                self.indented_group_x(),
                self.next_y - layout.group_padding_y,
            ),
        };
        let peer_y = group_y + layout.group_padding_y;
        let group_height = layout.min_group_height();
        let max_content_x = layout.peer_x_in_group + layout.node_width;
        let group_width = max_content_x + layout.group_padding_x;

        self.add_node(FlowNode {
            id: group_node_id.clone(),
            node_type: FlowNodeType::Group,
            position: FlowPosition::new(group_x, group_y),
            data: FlowNodeData {
                label: format!("{peer_name} Sub-flow"),
                ..FlowNodeData::default()
            },
            parent_id: None,
            style: Some(NodeStyle {
                width: Some(group_width),
                height: Some(group_height),
                min_height: Some(group_height),
            }),
        });
        self.add_node(FlowNode {
            id: peer_node_id.clone(),
            node_type: FlowNodeType::GenericAgentNode,
            position: FlowPosition::new(layout.peer_x_in_group, layout.group_padding_y),
            data: FlowNodeData::labeled(peer_name, &step.id),
            parent_id: Some(group_node_id.clone()),
            style: None,
        });
        self.registry.register(AgentNodeInfo {
            node_id: peer_node_id.clone(),
            name: peer_name.to_string(),
            kind: AgentKind::Peer,
            phase_id,
            subflow_id: Some(subflow_id.clone()),
        });

        tracing::debug!(
            subflow = %subflow_id,
            peer = %peer_name,
            function_call_id = %origin.function_call_id,
            parallel = origin.is_parallel,
            indentation = self.indentation,
            "Starting subflow"
        );

        let phase = self.phases.get_mut(phase_index)?;
        phase.subflows.push(Subflow {
            id: subflow_id,
            function_call_id: origin.function_call_id,
            is_parallel: origin.is_parallel,
            peer_name: peer_name.to_string(),
            peer: NodeInstance {
                id: peer_node_id,
                x: group_x + layout.peer_x_in_group,
                y: peer_y,
                tool_name: None,
                function_call_id: None,
            },
            group: GroupBox {
                id: group_node_id,
                x: group_x,
                y: group_y,
                width: group_width,
                height: group_height,
            },
            tools: ToolStack::default(),
            max_y: peer_y + layout.node_height,
            max_content_x,
        });
        let index = phase.subflows.len() - 1;
        self.current_subflow = Some(index);

        let group_bottom = group_y + group_height + layout.vertical_spacing;
        match parallel_key.and_then(|key| self.parallel_flows.get_mut(&key)) {
            Some(flow) => {
                flow.max_height = flow.max_height.max(group_height);
                self.next_y = self
                    .next_y
                    .max(flow.start_y + flow.max_height + layout.vertical_spacing);
            }
            None => self.next_y = self.next_y.max(group_bottom),
        }
        Some(index)
    }

    fn indented_group_x(&self) -> f64 {
        self.layout.main_lane_x - self.layout.peer_x_in_group
            + f64::from(self.indentation) * self.layout.indentation_step
    }

    pub fn select_subflow(&mut self, index: usize) {
        self.current_subflow = Some(index);
    }

    /// Latest subflow started by this function call
    pub fn subflow_by_call_id(&self, function_call_id: &str) -> Option<usize> {
        self.current_phase()?
            .subflows
            .iter()
            .rposition(|s| s.function_call_id == function_call_id)
    }

    /// Records the peer return for `function_call_id`; `false` when that
    /// call has already returned
    pub fn mark_returned(&mut self, function_call_id: &str) -> bool {
        self.returned_calls.insert(function_call_id.to_string())
    }

    pub fn subflow_by_id(&self, subflow_id: &str) -> Option<usize> {
        self.current_phase()?
            .subflows
            .iter()
            .rposition(|s| s.id == subflow_id)
    }

    /// Subflow of the latest node registered for `agent_name` in this phase
    pub fn subflow_for_agent(&self, agent_name: &str) -> Option<usize> {
        let phase = self.current_phase()?;
        let info = self.registry.find_agent_by_name(agent_name)?;
        if info.kind != AgentKind::Peer || info.phase_id != phase.id {
            return None;
        }
        let subflow_id = info.subflow_id.as_deref()?;
        phase
            .subflows
            .iter()
            .rposition(|s| s.id == subflow_id && s.peer.id == info.node_id)
    }

    /// Which subflow a sub-task step belongs to. Tries, in order: the
    /// step's function call (skipped when `match_call_id` is false), its
    /// owning task, the active subflow, then the agent name (first level
    /// only; deeper steps stay in the active subflow).
    pub fn resolve_subflow(&self, step: &VisualizerStep, match_call_id: bool) -> Option<usize> {
        let phase = self.current_phase()?;

        if match_call_id {
            if let Some(index) = step
                .function_call_id
                .as_deref()
                .and_then(|id| self.subflow_by_call_id(id))
            {
                return Some(index);
            }
        }
        if step.is_sub_task_step {
            if let Some(index) = phase
                .subflows
                .iter()
                .rposition(|s| s.id == step.owning_task_id)
            {
                return Some(index);
            }
        }
        if step.nesting_level > 0 && step.is_sub_task_step && self.current_subflow.is_some() {
            return self.current_subflow;
        }
        match step.nesting_level {
            0 => None,
            1 => self
                .subflow_for_agent(&step.source)
                .or(self.current_subflow),
            // Deeper agents may share a name with a shallower one
            _ => self.current_subflow,
        }
    }

    pub fn context_for(&self, step: &VisualizerStep, match_call_id: bool) -> AgentContext {
        if !step.is_sub_task_step && step.nesting_level == 0 {
            return AgentContext::Phase;
        }
        match self.resolve_subflow(step, match_call_id) {
            Some(index) => AgentContext::Subflow(index),
            None => {
                tracing::debug!(
                    step_id = %step.id,
                    task_id = %step.owning_task_id,
                    "No subflow for sub-task step, using the phase"
                );
                AgentContext::Phase
            }
        }
    }

    /// Node id and handle family of the agent owning `context`
    pub fn agent_node(&self, context: AgentContext) -> Option<(String, AgentKind)> {
        let phase = self.current_phase()?;
        match context {
            AgentContext::Phase => Some((phase.orchestrator.id.clone(), AgentKind::Orchestrator)),
            AgentContext::Subflow(index) => phase
                .subflows
                .get(index)
                .map(|s| (s.peer.id.clone(), AgentKind::Peer)),
        }
    }

    fn tools(&self, context: AgentContext) -> Option<&ToolStack> {
        let phase = self.current_phase()?;
        match context {
            AgentContext::Phase => Some(&phase.tools),
            AgentContext::Subflow(index) => phase.subflows.get(index).map(|s| &s.tools),
        }
    }

    pub fn find_tool_node(
        &self,
        context: AgentContext,
        function_call_id: &str,
        tool_name: &str,
    ) -> Option<String> {
        self.tools(context)?
            .find(function_call_id, tool_name)
            .map(|instance| instance.id.clone())
    }

    pub fn last_llm_node(&self, context: AgentContext) -> Option<String> {
        self.tools(context)?.last_llm.clone()
    }

    /// New instance of `agent_name` to receive a peer return: an
    /// orchestrator instance, or a continuation of the agent's subflow
    pub fn continue_agent(
        &mut self,
        agent_name: &str,
        step: &VisualizerStep,
    ) -> Option<(String, AgentKind)> {
        if self.reconstruct.is_orchestrator(agent_name) {
            return self
                .add_orchestrator_instance(step)
                .map(|id| (id, AgentKind::Orchestrator));
        }

        let index = self.subflow_for_agent(agent_name)?;
        let receiver = self.subflow(index)?;
        let origin = SubflowOrigin {
            id: Some(receiver.id.clone()),
            function_call_id: receiver.function_call_id.clone(),
            is_parallel: false,
            is_peer_return: true,
        };
        let peer_name = receiver.peer_name.clone();
        let index = self.start_subflow(&peer_name, step, origin)?;
        self.subflow(index)
            .map(|s| (s.peer.id.clone(), AgentKind::Peer))
    }

    // ── Tool and LLM nodes ───────────────────────────────────────────────────

    /// A new node for every call, stacked under the calling agent
    pub fn add_tool_node(
        &mut self,
        context: AgentContext,
        step: &VisualizerStep,
        tool_name: &str,
        is_llm: bool,
        function_call_id: Option<String>,
    ) -> Option<String> {
        let phase_index = self.current_phase?;
        let layout = self.layout;
        let prefix = if is_llm {
            format!("LLM_{}", step.id)
        } else {
            format!("{tool_name}_{}", step.id)
        };
        let node_id = self.generate_node_id(&prefix);

        let phase = self.phases.get_mut(phase_index)?;
        let (position, absolute, group, tools) = match context {
            AgentContext::Subflow(index) => {
                let subflow = phase.subflows.get_mut(index)?;
                let y = subflow.peer.y + subflow.tools.y_offset;
                subflow.tools.y_offset += layout.tool_stacking_offset;
                let relative_x = layout.peer_x_in_group + layout.tool_offset_from_peer;

                subflow.max_y = subflow.max_y.max(y + layout.node_height);
                subflow.max_content_x = subflow
                    .max_content_x
                    .max(relative_x + layout.node_width);
                subflow.group.height = subflow
                    .group
                    .height
                    .max(subflow.max_y - subflow.group.y + layout.group_padding_y);
                subflow.group.width = subflow
                    .group
                    .width
                    .max(subflow.max_content_x + layout.group_padding_x);

                (
                    FlowPosition::new(relative_x, y - subflow.group.y),
                    (subflow.group.x + relative_x, y),
                    Some((subflow.group.clone(), subflow.function_call_id.clone())),
                    &mut subflow.tools,
                )
            }
            AgentContext::Phase => {
                let y = phase.orchestrator.y + phase.tools.y_offset;
                phase.tools.y_offset += layout.tool_stacking_offset;
                phase.max_y = phase.max_y.max(y + layout.node_height);
                (
                    FlowPosition::new(layout.tools_lane_x, y),
                    (layout.tools_lane_x, y),
                    None,
                    &mut phase.tools,
                )
            }
        };

        tools.instances.push(NodeInstance {
            id: node_id.clone(),
            x: absolute.0,
            y: absolute.1,
            tool_name: Some(tool_name.to_string()),
            function_call_id,
        });
        if is_llm {
            tools.last_llm = Some(node_id.clone());
        }
        let phase_bottom = phase.max_y + layout.vertical_spacing;

        let (node_type, label) = if is_llm {
            (FlowNodeType::LlmNode, "LLM".to_string())
        } else {
            (FlowNodeType::GenericToolNode, format!("Tool: {tool_name}"))
        };
        self.add_node(FlowNode {
            id: node_id.clone(),
            node_type,
            position,
            data: FlowNodeData {
                tool_name: Some(tool_name.to_string()),
                ..FlowNodeData::labeled(label, &step.id)
            },
            parent_id: group.as_ref().map(|(g, _)| g.id.clone()),
            style: None,
        });

        match group {
            Some((group, function_call_id)) => self.resize_group(&group, &function_call_id),
            None => self.next_y = self.next_y.max(phase_bottom),
        }
        Some(node_id)
    }

    fn resize_group(&mut self, group: &GroupBox, function_call_id: &str) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == group.id) {
            let style = node.style.get_or_insert_with(NodeStyle::default);
            style.width = Some(group.width);
            style.height = Some(group.height);
        }
        if let Some(flow) = self
            .parallel_flows
            .values_mut()
            .find(|f| f.function_call_ids.iter().any(|id| id == function_call_id))
        {
            flow.max_height = flow.max_height.max(group.height);
        }
        self.next_y = self
            .next_y
            .max(group.y + group.height + self.layout.vertical_spacing);
    }

    // ── Parallel blocks ──────────────────────────────────────────────────────

    pub fn register_parallel_flow(
        &mut self,
        key: String,
        function_call_ids: Vec<String>,
        receiver: &str,
    ) {
        tracing::debug!(
            block = %key,
            branches = function_call_ids.len(),
            receiver = %receiver,
            "Registered parallel block"
        );
        let flow = ParallelFlow {
            function_call_ids,
            completed: BTreeSet::new(),
            receiver: receiver.to_string(),
            start_x: self.indented_group_x(),
            start_y: self.next_y - self.layout.group_padding_y,
            x_offset: 0.0,
            max_height: 0.0,
        };
        self.parallel_flows.insert(key, flow);
    }

    fn parallel_key_for(&self, function_call_id: &str) -> Option<String> {
        self.parallel_flows
            .iter()
            .find(|(_, flow)| flow.function_call_ids.iter().any(|id| id == function_call_id))
            .map(|(key, _)| key.clone())
    }

    pub fn is_parallel_call(&self, function_call_id: &str) -> bool {
        self.parallel_key_for(function_call_id).is_some()
    }

    /// Records a finished branch. Returns the block once every branch has
    /// finished; it is then no longer tracked.
    pub fn complete_parallel_branch(&mut self, function_call_id: &str) -> Option<ParallelFlow> {
        let key = self.parallel_key_for(function_call_id)?;
        let flow = self.parallel_flows.get_mut(&key)?;
        flow.completed.insert(function_call_id.to_string());
        if !flow.is_complete() {
            return None;
        }
        tracing::debug!(block = %key, "Parallel block joined");
        self.parallel_flows.remove(&key)
    }
}
