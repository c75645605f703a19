//! Agent name → node resolution.
//!
//! The same agent name can own several nodes (a new orchestrator instance
//! after each peer return, one group per delegation); lookups always
//! return the most recently created one.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Orchestrator,
    Peer,
}

impl AgentKind {
    /// Handle-id prefix the renderer uses for this node type
    pub fn handle_prefix(self) -> &'static str {
        match self {
            Self::Orchestrator => "orch",
            Self::Peer => "peer",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentNodeInfo {
    pub node_id: String,
    pub name: String,
    pub kind: AgentKind,
    pub phase_id: String,
    pub subflow_id: Option<String>,
}

#[derive(Debug)]
pub struct AgentRegistry {
    agents: Vec<AgentNodeInfo>,
    peer_prefix: String,
}

impl AgentRegistry {
    pub fn new(peer_prefix: impl Into<String>) -> Self {
        Self {
            agents: Vec::new(),
            peer_prefix: peer_prefix.into(),
        }
    }

    pub fn register(&mut self, info: AgentNodeInfo) {
        tracing::debug!(node_id = %info.node_id, agent = %info.name, "Registered agent node");
        self.agents.push(info);
    }

    /// Most recent node for `name`, accepting the peer-tool form `peer_<name>`
    pub fn find_agent_by_name(&self, name: &str) -> Option<&AgentNodeInfo> {
        let normalized = name.strip_prefix(self.peer_prefix.as_str()).unwrap_or(name);
        self.agents
            .iter()
            .filter(|info| info.name == normalized || info.name == name)
            .max_by_key(|info| node_sequence(&info.node_id))
    }
}

/// Counter suffix of a generated node id (`Name_12` → 12)
pub fn node_sequence(node_id: &str) -> u64 {
    node_id
        .rsplit('_')
        .next()
        .and_then(|suffix| suffix.parse().ok())
        .unwrap_or(0)
}
