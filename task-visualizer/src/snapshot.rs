//! Loading a task-store snapshot and picking the task to visualize.

use std::path::Path;

use shared_types::{TaskRecord, TaskStoreState};

use crate::error::SnapshotError;
use crate::processor::payload::parent_task_id;

pub fn load_snapshot(path: &Path) -> Result<TaskStoreState, SnapshotError> {
    let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let state: TaskStoreState = serde_json::from_str(&content)?;
    tracing::debug!(
        path = %path.display(),
        tasks = state.tasks.len(),
        "Loaded task store snapshot"
    );
    Ok(state)
}

/// The requested task, or the most recent top-level task.
///
/// Recency follows `taskOrder`; tasks missing from it fall back to
/// `firstSeen` order.
pub fn select_root<'a>(
    state: &'a TaskStoreState,
    task_id: Option<&str>,
) -> Result<&'a TaskRecord, SnapshotError> {
    if let Some(task_id) = task_id {
        return state
            .tasks
            .get(task_id)
            .ok_or_else(|| SnapshotError::TaskNotFound(task_id.to_string()));
    }

    let is_top_level = |task: &&TaskRecord| parent_task_id(task).is_none();

    let from_order = state
        .task_order
        .iter()
        .rev()
        .filter_map(|id| state.tasks.get(id))
        .find(is_top_level);
    if let Some(task) = from_order {
        return Ok(task);
    }

    state
        .tasks
        .values()
        .filter(is_top_level)
        .max_by(|a, b| {
            a.first_seen
                .cmp(&b.first_seen)
                .then_with(|| a.task_id.cmp(&b.task_id))
        })
        .ok_or(SnapshotError::NoRootTask)
}
