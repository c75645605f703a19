//! Shared types between the task store, the visualizer pipeline and the renderer
//!
//! These types are used by:
//! - the task-visualizer pipeline (native Rust and WASM)
//! - the browser diagram/step views, through the generated TypeScript bindings
//!
//! Serializable with serde for JSON over SSE/HTTP

pub mod events;
pub mod flow;
pub mod performance;
pub mod steps;

pub use events::*;
pub use flow::*;
pub use performance::*;
pub use steps::*;

// ============================================================================
// Constants
// ============================================================================

/// Tool-name prefix the agent runtime uses for peer-agent delegation tools
pub const PEER_TOOL_PREFIX: &str = "peer_";

/// Metadata `type` values carried on status-update messages
pub const META_LLM_INVOCATION: &str = "llm_invocation";
pub const META_LLM_RESPONSE: &str = "llm_response";
pub const META_TOOL_INVOCATION_START: &str = "tool_invocation_start";
pub const META_TOOL_RESPONSE_CONTENT: &str = "tool_response_content";

/// Data-part signal forwarded from peers
pub const SIGNAL_AGENT_STATUS_MESSAGE: &str = "agent_status_message";

/// Entity names used on steps that do not involve a named agent
pub const ENTITY_USER: &str = "User";
pub const ENTITY_LLM: &str = "LLM";

// ============================================================================
// Tests
// ============================================================================
