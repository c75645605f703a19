//! Task Visualizer - A2A task events to a timeline diagram
//!
//! Two synchronous passes over an in-memory task store snapshot:
//! the Event Reconstructor (`processor`) turns the raw events of a task
//! tree into visualizer steps plus a performance report, and the
//! Timeline Layout Engine (`flow`) turns those steps into positioned
//! nodes and edges for the diagram renderer.

pub mod config;
pub mod error;
pub mod flow;
pub mod processor;
pub mod snapshot;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared_types::{TaskRecord, TimelineFlow, VisualizedTask};

pub use config::VisualizerConfig;
pub use flow::build_timeline_flow;
pub use processor::process_task_for_visualization;

/// Output of the full pipeline for one root task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskVisualization {
    pub task: VisualizedTask,
    pub flow: TimelineFlow,
}

/// Reconstruct and lay out `root_task_id`. `None` when the task is unknown.
pub fn visualize(
    tasks: &HashMap<String, TaskRecord>,
    root_task_id: &str,
    config: &VisualizerConfig,
) -> Option<TaskVisualization> {
    let Some(root) = tasks.get(root_task_id) else {
        tracing::warn!(task_id = %root_task_id, "Cannot visualize unknown task");
        return None;
    };
    let task = process_task_for_visualization(tasks, root, &config.reconstruct)?;
    let flow = build_timeline_flow(&task.steps, config);
    Some(TaskVisualization { task, flow })
}
