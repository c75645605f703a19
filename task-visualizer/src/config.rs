//! Tunables for reconstruction and layout.
//!
//! `VisualizerConfig::default()` is what the renderer expects; a TOML file
//! may override any subset of fields.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_PATH_ENV: &str = "TASK_VISUALIZER_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub layout: LayoutConfig,
    pub reconstruct: ReconstructConfig,
}

/// Pixel constants of the timeline layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub y_start: f64,
    pub node_height: f64,
    pub node_width: f64,
    pub vertical_spacing: f64,
    pub group_padding_y: f64,
    pub group_padding_x: f64,
    /// Vertical distance between stacked tool nodes of one agent
    pub tool_stacking_offset: f64,
    /// Horizontal shift per nested delegation level
    pub indentation_step: f64,
    pub user_lane_x: f64,
    pub main_lane_x: f64,
    pub tools_lane_x: f64,
    /// Peer agent x relative to its group box
    pub peer_x_in_group: f64,
    pub tool_offset_from_peer: f64,
    /// Sibling groups of a parallel block are spaced by
    /// `(node_width + group_padding_x) * parallel_spacing_factor`
    pub parallel_spacing_factor: f64,
    pub bottom_user_gap: f64,
    /// Top user node sits this far above its orchestrator. Must stay
    /// below `y_start` so the first phase's user node has a positive y.
    pub top_user_offset: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            y_start: 50.0,
            node_height: 50.0,
            node_width: 330.0,
            vertical_spacing: 50.0,
            group_padding_y: 20.0,
            group_padding_x: 10.0,
            tool_stacking_offset: 70.0,
            indentation_step: 50.0,
            user_lane_x: 50.0,
            main_lane_x: 300.0,
            tools_lane_x: 600.0,
            peer_x_in_group: 50.0,
            tool_offset_from_peer: 300.0,
            parallel_spacing_factor: 2.2,
            bottom_user_gap: 20.0,
            top_user_offset: 10.0,
        }
    }
}

impl LayoutConfig {
    pub fn parallel_sibling_spacing(&self) -> f64 {
        (self.node_width + self.group_padding_x) * self.parallel_spacing_factor
    }

    /// Height of a group box holding only its peer agent
    pub fn min_group_height(&self) -> f64 {
        self.node_height + 2.0 * self.group_padding_y
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("node_height", self.node_height),
            ("node_width", self.node_width),
            ("tool_stacking_offset", self.tool_stacking_offset),
            ("parallel_spacing_factor", self.parallel_spacing_factor),
        ];
        for (field, value) in sizes {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }

        let offsets = [
            ("y_start", self.y_start),
            ("vertical_spacing", self.vertical_spacing),
            ("group_padding_y", self.group_padding_y),
            ("group_padding_x", self.group_padding_x),
            ("indentation_step", self.indentation_step),
            ("bottom_user_gap", self.bottom_user_gap),
        ];
        for (field, value) in offsets {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }

        let top_user_offset = self.top_user_offset;
        if !top_user_offset.is_finite() || top_user_offset < 0.0 || top_user_offset > self.y_start {
            return Err(ConfigError::InvalidValue {
                field: "top_user_offset",
                value: top_user_offset,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructConfig {
    /// Tool-name prefix marking a peer-agent delegation
    pub peer_tool_prefix: String,
    /// Characters kept in an LLM response preview
    pub response_preview_chars: usize,
    /// Edge labels longer than this fall back to the step-type phrase
    pub edge_label_max_chars: usize,
    /// Exact name of the top-level orchestrator agent
    pub orchestrator_name: String,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            peer_tool_prefix: shared_types::PEER_TOOL_PREFIX.to_string(),
            response_preview_chars: 200,
            edge_label_max_chars: 30,
            orchestrator_name: "OrchestratorAgent".to_string(),
        }
    }
}

impl ReconstructConfig {
    pub fn peer_name<'a>(&self, tool_name: &'a str) -> Option<&'a str> {
        tool_name.strip_prefix(self.peer_tool_prefix.as_str())
    }

    pub fn is_peer_tool(&self, tool_name: &str) -> bool {
        self.peer_name(tool_name).is_some()
    }

    pub fn peer_tool_name(&self, agent_name: &str) -> String {
        format!("{}{agent_name}", self.peer_tool_prefix)
    }

    /// Exact name match, or any name containing "orchestrator"
    pub fn is_orchestrator(&self, agent_name: &str) -> bool {
        agent_name == self.orchestrator_name
            || agent_name.to_ascii_lowercase().contains("orchestrator")
    }
}

impl VisualizerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.layout.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded visualizer config");
        Ok(config)
    }

    /// Explicit path first, then `TASK_VISUALIZER_CONFIG`, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        });

        match path {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}
