//! Open LLM/tool timers and the per-instance performance report.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use shared_types::{
    instance_id, AgentPerformanceMetrics, LlmCallPerformance, PerformanceReport,
    ToolCallPerformance,
};

use super::payload::duration_between_ms;

#[derive(Debug, Clone)]
struct OpenLlmCall {
    started: DateTime<Utc>,
    model_name: String,
}

#[derive(Debug, Clone)]
pub struct OpenToolCall {
    pub started: DateTime<Utc>,
    pub tool_name: String,
    pub peer_agent_name: Option<String>,
    pub invoking_instance_id: String,
    pub sub_task_id: Option<String>,
    pub parallel_block_id: Option<String>,
}

/// Timers keyed by agent instance (LLM) or function call id (tools)
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    open_llm_calls: HashMap<String, OpenLlmCall>,
    open_tool_calls: HashMap<String, OpenToolCall>,
    agents: BTreeMap<String, AgentPerformanceMetrics>,
}

impl PerformanceTracker {
    pub fn ensure_agent(&mut self, agent_name: &str, task_id: &str) -> &mut AgentPerformanceMetrics {
        self.agents
            .entry(instance_id(agent_name, task_id))
            .or_insert_with(|| AgentPerformanceMetrics::new(agent_name, task_id))
    }

    /// Opening a second call on the same instance restarts the timer
    pub fn open_llm_call(&mut self, agent_name: &str, task_id: &str, model_name: &str, at: DateTime<Utc>) {
        self.ensure_agent(agent_name, task_id);
        self.open_llm_calls.insert(
            instance_id(agent_name, task_id),
            OpenLlmCall {
                started: at,
                model_name: model_name.to_string(),
            },
        );
    }

    pub fn close_llm_call(&mut self, agent_name: &str, task_id: &str, at: DateTime<Utc>) {
        let Some(open) = self.open_llm_calls.remove(&instance_id(agent_name, task_id)) else {
            return;
        };
        self.ensure_agent(agent_name, task_id)
            .llm_calls
            .push(LlmCallPerformance {
                model_name: open.model_name,
                duration_ms: duration_between_ms(open.started, at),
                timestamp: open.started,
            });
    }

    /// Returns false when a timer for `function_call_id` is already running
    pub fn open_tool_call(&mut self, function_call_id: &str, call: OpenToolCall) -> bool {
        if self.open_tool_calls.contains_key(function_call_id) {
            tracing::debug!(function_call_id = %function_call_id, "Tool timer already open");
            return false;
        }
        self.open_tool_calls.insert(function_call_id.to_string(), call);
        true
    }

    /// Records the duration against the instance that invoked the tool
    pub fn close_tool_call(&mut self, function_call_id: &str, at: DateTime<Utc>) {
        let Some(open) = self.open_tool_calls.remove(function_call_id) else {
            return;
        };
        let Some(metrics) = self.agents.get_mut(&open.invoking_instance_id) else {
            tracing::warn!(
                function_call_id = %function_call_id,
                instance_id = %open.invoking_instance_id,
                "Tool call closed for unknown agent instance"
            );
            return;
        };
        metrics.tool_calls.push(ToolCallPerformance {
            tool_name: open.tool_name,
            duration_ms: duration_between_ms(open.started, at),
            is_peer: open.peer_agent_name.is_some(),
            timestamp: open.started,
            peer_agent_name: open.peer_agent_name,
            sub_task_id: open.sub_task_id,
            parallel_block_id: open.parallel_block_id,
        });
    }

    /// Derive totals and display names, consuming the tracker
    pub fn finish(self, total_task_duration_ms: Option<i64>) -> PerformanceReport {
        let mut agents = self.agents;

        for metrics in agents.values_mut() {
            metrics.total_llm_time_ms = metrics.llm_calls.iter().map(|call| call.duration_ms).sum();
            metrics.total_tool_time_ms = total_tool_time_ms(&metrics.tool_calls);
        }

        assign_display_names(&mut agents);
        link_peer_display_names(&mut agents);

        let mut report = PerformanceReport {
            agents,
            ..PerformanceReport::default()
        };
        report.overall.total_task_duration_ms = total_task_duration_ms.unwrap_or(0);
        report
    }
}

/// Sequential calls are summed; calls sharing a parallel block count as the
/// wall-clock span of that block.
pub fn total_tool_time_ms(calls: &[ToolCallPerformance]) -> i64 {
    let sequential: i64 = calls
        .iter()
        .filter(|call| call.parallel_block_id.is_none())
        .map(|call| call.duration_ms)
        .sum();

    let mut blocks: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for call in calls {
        let Some(block_id) = call.parallel_block_id.as_deref() else {
            continue;
        };
        let start = call.timestamp.timestamp_millis();
        let end = call.end_ms();
        blocks
            .entry(block_id)
            .and_modify(|(min_start, max_end)| {
                *min_start = (*min_start).min(start);
                *max_end = (*max_end).max(end);
            })
            .or_insert((start, end));
    }
    let parallel: i64 = blocks.values().map(|(start, end)| end - start).sum();

    sequential + parallel
}

/// Names with several instances become "Name (1)", "Name (2)", ... by first activity
fn assign_display_names(agents: &mut BTreeMap<String, AgentPerformanceMetrics>) {
    let mut by_name: BTreeMap<String, Vec<(Option<i64>, String)>> = BTreeMap::new();
    for (key, metrics) in agents.iter() {
        by_name
            .entry(metrics.agent_name.clone())
            .or_default()
            .push((metrics.first_activity_ms(), key.clone()));
    }

    for (name, mut instances) in by_name {
        if instances.len() < 2 {
            continue;
        }
        // Instances without any recorded call sort last
        instances.sort_by_key(|(first, _)| (first.is_none(), *first));
        for (index, (_, key)) in instances.iter().enumerate() {
            if let Some(metrics) = agents.get_mut(key) {
                metrics.display_name = format!("{name} ({})", index + 1);
            }
        }
    }
}

fn link_peer_display_names(agents: &mut BTreeMap<String, AgentPerformanceMetrics>) {
    let by_task: HashMap<String, String> = agents
        .values()
        .map(|metrics| (metrics.task_id.clone(), metrics.display_name.clone()))
        .collect();

    for metrics in agents.values_mut() {
        for call in metrics.tool_calls.iter_mut().filter(|call| call.is_peer) {
            if let Some(display) = call.sub_task_id.as_ref().and_then(|id| by_task.get(id)) {
                call.peer_agent_name = Some(display.clone());
            }
        }
    }
}
