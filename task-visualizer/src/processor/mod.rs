//! Event Reconstructor: raw A2A events of a task tree → ordered visualizer
//! steps plus a per-agent-instance performance report.

pub mod collect;
pub mod context;
pub mod handlers;
pub mod payload;
pub mod performance;

use std::collections::HashMap;

use shared_types::{StepType, TaskRecord, TaskStatus, VisualizedTask, VisualizerStep};

use self::collect::{collect_descendant_events, order_events};
use self::context::ReconstructionContext;
use self::payload::duration_between_ms;
use crate::config::ReconstructConfig;

/// Reconstruct the steps of `root` and all of its descendant tasks.
///
/// Returns `None` only when `root` is not part of `tasks`; every other
/// problem drops the affected event and is logged.
pub fn process_task_for_visualization(
    tasks: &HashMap<String, TaskRecord>,
    root: &TaskRecord,
    config: &ReconstructConfig,
) -> Option<VisualizedTask> {
    if !tasks.contains_key(&root.task_id) {
        tracing::warn!(task_id = %root.task_id, "Root task not found in task lookup");
        return None;
    }

    let root_id = root.task_id.as_str();
    let collected = collect_descendant_events(tasks, root_id);
    let ordered = order_events(&collected, root_id);

    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return Some(VisualizedTask {
            task_id: root.task_id.clone(),
            initial_request_text: root.initial_request_text.clone(),
            status: TaskStatus::Working,
            start_time: root.first_seen,
            end_time: None,
            duration_ms: None,
            steps: Vec::new(),
            performance_report: Default::default(),
        });
    };
    let start_time = first.timestamp;
    let last_task_id = last.owning_task_id.clone();

    let mut ctx = ReconstructionContext::new(tasks, root_id, &collected.nesting_levels, config);
    for event in &ordered {
        handlers::handle_event(&mut ctx, event);
    }
    ctx.flush_text(&last_task_id);

    let (status, end_time) = derive_status(&ctx.steps, root_id);
    let duration_ms = end_time.map(|end| duration_between_ms(start_time, end));

    tracing::debug!(
        task_id = %root_id,
        events = ordered.len(),
        steps = ctx.steps.len(),
        status = status.as_str(),
        "Reconstructed task"
    );

    let steps = std::mem::take(&mut ctx.steps);
    let performance = std::mem::take(&mut ctx.performance);

    Some(VisualizedTask {
        task_id: root.task_id.clone(),
        initial_request_text: root.initial_request_text.clone(),
        status,
        start_time,
        end_time,
        duration_ms,
        steps,
        performance_report: performance.finish(duration_ms),
    })
}

/// Status comes from the root task's last step
fn derive_status(
    steps: &[VisualizerStep],
    root_id: &str,
) -> (TaskStatus, Option<chrono::DateTime<chrono::Utc>>) {
    let last_root_step = steps.iter().rev().find(|step| step.owning_task_id == root_id);
    match last_root_step {
        Some(step) if step.step_type() == StepType::TaskCompleted => {
            (TaskStatus::Completed, Some(step.timestamp))
        }
        Some(step) if step.step_type() == StepType::TaskFailed => {
            (TaskStatus::Failed, Some(step.timestamp))
        }
        _ => (TaskStatus::Working, None),
    }
}
