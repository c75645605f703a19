//! Error types for the fallible edges of the crate.
//!
//! The pipeline itself never fails; these cover loading configuration and
//! snapshots, plus the reasons a single raw event is skipped.

use std::path::PathBuf;

/// Errors loading a `VisualizerConfig`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid layout value {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

/// Errors loading a task-store snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("task not found in snapshot: {0}")]
    TaskNotFound(String),

    #[error("snapshot contains no top-level task")]
    NoRootTask,
}

/// Why a raw event produced no visualizer step
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventSkip {
    #[error("unparseable timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("malformed field: {0}")]
    MalformedField(&'static str),
}
