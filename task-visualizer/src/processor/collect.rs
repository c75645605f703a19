//! Gathers a task's events with those of every descendant task and orders
//! them into one stream.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use shared_types::{A2AEvent, TaskRecord};

use super::payload::{event_timestamp, parent_task_id, parse_rfc3339_utc};
use crate::error::EventSkip;

/// One raw event placed on the merged timeline
#[derive(Debug, Clone)]
pub struct TimedEvent<'a> {
    pub event: &'a A2AEvent,
    /// `raw-{taskId}-{index}`, stable for a given input
    pub raw_id: String,
    pub owning_task_id: String,
    pub nesting_level: u32,
    pub timestamp: DateTime<Utc>,
}

impl TimedEvent<'_> {
    pub fn is_sub_task(&self) -> bool {
        self.nesting_level > 0
    }
}

/// Events of the root and all of its descendants, with each task's depth
#[derive(Debug, Default)]
pub struct CollectedEvents<'a> {
    pub events: Vec<&'a A2AEvent>,
    pub nesting_levels: HashMap<String, u32>,
}

impl CollectedEvents<'_> {
    pub fn nesting_level(&self, task_id: &str) -> u32 {
        self.nesting_levels.get(task_id).copied().unwrap_or(0)
    }
}

/// Direct children of `parent_id`, oldest first
pub fn child_tasks<'a>(tasks: &'a HashMap<String, TaskRecord>, parent_id: &str) -> Vec<&'a TaskRecord> {
    let mut children: Vec<&TaskRecord> = tasks
        .values()
        .filter(|task| task.task_id != parent_id && parent_task_id(task) == Some(parent_id))
        .collect();
    children.sort_by(|a, b| {
        a.first_seen
            .cmp(&b.first_seen)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    children
}

/// Depth-first union of `root_id`'s events with all descendants' events.
/// A task reachable twice (a parent cycle) is only collected once.
pub fn collect_descendant_events<'a>(
    tasks: &'a HashMap<String, TaskRecord>,
    root_id: &str,
) -> CollectedEvents<'a> {
    let mut collected = CollectedEvents::default();
    let mut visited = BTreeSet::new();
    collect_into(tasks, root_id, 0, &mut visited, &mut collected);
    collected
}

fn collect_into<'a>(
    tasks: &'a HashMap<String, TaskRecord>,
    task_id: &str,
    level: u32,
    visited: &mut BTreeSet<String>,
    collected: &mut CollectedEvents<'a>,
) {
    let Some(task) = tasks.get(task_id) else {
        tracing::warn!(task_id = %task_id, "Task not found while collecting descendant events");
        return;
    };
    if !visited.insert(task_id.to_string()) {
        return;
    }

    collected.nesting_levels.insert(task_id.to_string(), level);
    collected.events.extend(task.events.iter());

    for child in child_tasks(tasks, task_id) {
        collect_into(tasks, &child.task_id, level + 1, visited, collected);
    }
}

/// Resolve timestamps, stable-sort by them and assign raw event ids.
/// Events without a parseable timestamp cannot be placed and are dropped.
pub fn order_events<'a>(collected: &CollectedEvents<'a>, root_id: &str) -> Vec<TimedEvent<'a>> {
    let mut timed: Vec<(&'a A2AEvent, DateTime<Utc>)> = collected
        .events
        .iter()
        .filter_map(|event| match resolve_timestamp(event) {
            Ok(ts) => Some((*event, ts)),
            Err(skip) => {
                tracing::warn!(
                    task_id = event.task_id.as_deref().unwrap_or("global"),
                    reason = %skip,
                    "Skipping event"
                );
                None
            }
        })
        .collect();

    // `sort_by_key` is stable, so same-millisecond events keep encounter order
    timed.sort_by_key(|(_, ts)| ts.timestamp_millis());

    timed
        .into_iter()
        .enumerate()
        .map(|(index, (event, timestamp))| {
            let owning_task_id = event
                .task_id
                .clone()
                .unwrap_or_else(|| root_id.to_string());
            TimedEvent {
                event,
                raw_id: format!(
                    "raw-{}-{index}",
                    event.task_id.as_deref().unwrap_or("global")
                ),
                nesting_level: collected.nesting_level(&owning_task_id),
                owning_task_id,
                timestamp,
            }
        })
        .collect()
}

fn resolve_timestamp(event: &A2AEvent) -> Result<DateTime<Utc>, EventSkip> {
    let raw = event_timestamp(event);
    parse_rfc3339_utc(raw).ok_or_else(|| EventSkip::InvalidTimestamp(raw.to_string()))
}
