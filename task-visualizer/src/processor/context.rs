//! Mutable state threaded through one reconstruction pass.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use shared_types::{DelegationInfo, StepData, TaskRecord, TextData, VisualizerStep, ENTITY_USER};

use super::collect::TimedEvent;
use super::performance::PerformanceTracker;
use crate::config::ReconstructConfig;

// ── Text aggregation ─────────────────────────────────────────────────────────

/// Streaming text fragments of one agent waiting to become a response step
#[derive(Debug, Default)]
pub struct TextBuffer {
    text: String,
    source_agent: Option<String>,
    started: Option<DateTime<Utc>>,
    raw_event_ids: Vec<String>,
    owning_task_id: Option<String>,
    forwarded: bool,
}

impl TextBuffer {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn source_agent(&self) -> Option<&str> {
        self.source_agent.as_deref()
    }

    pub fn is_from(&self, agent_name: &str) -> bool {
        self.source_agent() == Some(agent_name)
    }

    pub fn append(&mut self, agent_name: &str, event: &TimedEvent<'_>, fragment: &str, forwarded: bool) {
        if self.source_agent.is_none() {
            self.source_agent = Some(agent_name.to_string());
            self.started = Some(event.timestamp);
            self.owning_task_id = Some(event.owning_task_id.clone());
            self.forwarded = forwarded;
        }
        self.text.push_str(fragment);
        self.raw_event_ids.push(event.raw_id.clone());
    }
}

// ── Step drafts ──────────────────────────────────────────────────────────────

/// Everything about a step that the event handler decides
#[derive(Debug)]
pub struct StepDraft {
    /// Short kind used in the step id, e.g. `llmcall`
    pub kind: &'static str,
    pub data: StepData,
    pub title: String,
    pub source: String,
    pub target: String,
    pub function_call_id: Option<String>,
    pub delegation_info: Option<Vec<DelegationInfo>>,
    /// Appended to the id when one event yields several steps
    pub id_suffix: Option<usize>,
}

impl StepDraft {
    pub fn new(
        kind: &'static str,
        data: StepData,
        title: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            data,
            title: title.into(),
            source: source.into(),
            target: target.into(),
            function_call_id: None,
            delegation_info: None,
            id_suffix: None,
        }
    }

    pub fn function_call_id(mut self, function_call_id: Option<String>) -> Self {
        self.function_call_id = function_call_id;
        self
    }

    pub fn delegation_info(mut self, delegation_info: Vec<DelegationInfo>) -> Self {
        if !delegation_info.is_empty() {
            self.delegation_info = Some(delegation_info);
        }
        self
    }

    pub fn id_suffix(mut self, index: usize) -> Self {
        self.id_suffix = Some(index);
        self
    }
}

// ── Reconstruction context ───────────────────────────────────────────────────

pub struct ReconstructionContext<'a> {
    pub tasks: &'a HashMap<String, TaskRecord>,
    pub root_task_id: &'a str,
    pub config: &'a ReconstructConfig,
    nesting_levels: &'a HashMap<String, u32>,

    pub steps: Vec<VisualizerStep>,
    pub buffer: TextBuffer,
    /// Last response text shown to the user, used to suppress repeats
    pub last_flushed_text: Option<String>,

    /// Sub-task id → function call id of the delegation that created it
    pub sub_task_function_calls: HashMap<String, String>,
    /// Function call id → resolved delegation
    pub delegations: HashMap<String, DelegationInfo>,
    /// Task id → function call id the task is currently serving
    pub active_function_calls: HashMap<String, String>,
    /// Sub-tasks already bound to a delegation decision
    pub claimed_sub_tasks: BTreeSet<String>,

    pub performance: PerformanceTracker,
}

impl<'a> ReconstructionContext<'a> {
    pub fn new(
        tasks: &'a HashMap<String, TaskRecord>,
        root_task_id: &'a str,
        nesting_levels: &'a HashMap<String, u32>,
        config: &'a ReconstructConfig,
    ) -> Self {
        Self {
            tasks,
            root_task_id,
            config,
            nesting_levels,
            steps: Vec::new(),
            buffer: TextBuffer::default(),
            last_flushed_text: None,
            sub_task_function_calls: HashMap::new(),
            delegations: HashMap::new(),
            active_function_calls: HashMap::new(),
            claimed_sub_tasks: BTreeSet::new(),
            performance: PerformanceTracker::default(),
        }
    }

    pub fn nesting_level(&self, task_id: &str) -> u32 {
        self.nesting_levels.get(task_id).copied().unwrap_or(0)
    }

    pub fn is_root(&self, task_id: &str) -> bool {
        task_id == self.root_task_id
    }

    /// Function call a step of `task_id` belongs to
    pub fn function_call_for_task(&self, task_id: &str) -> Option<String> {
        self.sub_task_function_calls
            .get(task_id)
            .or_else(|| self.active_function_calls.get(task_id))
            .cloned()
    }

    /// Correlation for a generic step: the sub-task's delegation for nested
    /// events, the active call for root events, overridden by an explicit
    /// `function_call_id` on the message metadata
    pub fn step_function_call_id(&self, event: &TimedEvent<'_>, explicit: Option<&str>) -> Option<String> {
        if let Some(explicit) = explicit {
            return Some(explicit.to_string());
        }
        if event.is_sub_task() {
            self.sub_task_function_calls.get(&event.owning_task_id).cloned()
        } else {
            self.active_function_calls.get(&event.owning_task_id).cloned()
        }
    }

    pub fn emit(&mut self, event: &TimedEvent<'_>, draft: StepDraft) -> String {
        let suffix = draft
            .id_suffix
            .map(|index| format!("-{index}"))
            .unwrap_or_default();
        let id = format!(
            "vstep-{}-{}-{}{suffix}",
            draft.kind,
            self.steps.len(),
            event.raw_id
        );
        self.steps.push(VisualizerStep {
            id: id.clone(),
            data: draft.data,
            timestamp: event.timestamp,
            title: draft.title,
            source: draft.source,
            target: draft.target,
            raw_event_ids: vec![event.raw_id.clone()],
            nesting_level: event.nesting_level,
            is_sub_task_step: event.is_sub_task(),
            owning_task_id: event.owning_task_id.clone(),
            function_call_id: draft.function_call_id,
            delegation_info: draft.delegation_info,
        });
        id
    }

    /// Turn the text buffer into an `AGENT_RESPONSE_TEXT` step if it holds
    /// any non-blank text. The buffer is cleared either way.
    pub fn flush_text(&mut self, fallback_task_id: &str) -> bool {
        let buffer = std::mem::take(&mut self.buffer);
        let text = buffer.text.trim();
        let (Some(agent), Some(started)) = (buffer.source_agent.as_deref(), buffer.started) else {
            return false;
        };
        if text.is_empty() {
            return false;
        }

        let owning_task_id = buffer
            .owning_task_id
            .clone()
            .unwrap_or_else(|| fallback_task_id.to_string());
        let nesting_level = self.nesting_level(&owning_task_id);
        let first_raw_id = buffer
            .raw_event_ids
            .first()
            .map(String::as_str)
            .unwrap_or("unknown");
        let id = format!("vstep-agenttext-{}-{first_raw_id}", self.steps.len());
        let function_call_id = self.function_call_for_task(&owning_task_id);

        self.steps.push(VisualizerStep {
            id,
            data: StepData::AgentResponseText(TextData {
                text: text.to_string(),
            }),
            timestamp: started,
            title: format!("{agent}: Response"),
            source: agent.to_string(),
            target: ENTITY_USER.to_string(),
            raw_event_ids: buffer.raw_event_ids.clone(),
            nesting_level,
            is_sub_task_step: nesting_level > 0,
            function_call_id,
            owning_task_id,
            delegation_info: None,
        });
        self.last_flushed_text = Some(text.to_string());
        true
    }

    /// Flush before emitting a step for `agent_name`; a flush of that same
    /// agent's text also forgets it for duplicate suppression.
    ///
    /// Buffered text is flushed whichever agent owns it. Holding another
    /// agent's text past this step would emit it after a step whose raw
    /// event came later, and emitted steps must follow raw event order.
    pub fn flush_before(&mut self, agent_name: &str, fallback_task_id: &str) {
        let same_agent = self.buffer.is_from(agent_name);
        if self.flush_text(fallback_task_id) && same_agent {
            self.last_flushed_text = None;
        }
    }

    /// Whether the buffer was a root-task, non-forwarded response
    pub fn buffer_is_root_response(&self) -> bool {
        !self.buffer.forwarded
            && self
                .buffer
                .owning_task_id
                .as_deref()
                .map(|task_id| self.nesting_level(task_id) == 0)
                .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use shared_types::{A2AEvent, EventDirection, StepType};

    fn timed<'e>(event: &'e A2AEvent, index: usize, owning: &str, level: u32) -> TimedEvent<'e> {
        TimedEvent {
            event,
            raw_id: format!("raw-{owning}-{index}"),
            owning_task_id: owning.to_string(),
            nesting_level: level,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, index as u32).unwrap(),
        }
    }

    #[test]
    fn test_flush_aggregates_and_clears() {
        let tasks = HashMap::new();
        let levels = HashMap::from([("root".to_string(), 0), ("sub".to_string(), 1)]);
        let config = ReconstructConfig::default();
        let mut ctx = ReconstructionContext::new(&tasks, "root", &levels, &config);
        ctx.sub_task_function_calls
            .insert("sub".to_string(), "fc-1".to_string());

        let raw = A2AEvent::new(EventDirection::StatusUpdate, "sub", "", json!({}));
        for (i, fragment) in ["  Hel", "lo ", "world  "].iter().enumerate() {
            ctx.buffer.append("Billing", &timed(&raw, i, "sub", 1), fragment, false);
        }

        assert!(ctx.flush_text("root"));
        assert!(!ctx.buffer.has_text());
        assert!(!ctx.flush_text("root"));

        let step = &ctx.steps[0];
        assert_eq!(step.step_type(), StepType::AgentResponseText);
        assert_eq!(step.text(), Some("Hello world"));
        assert_eq!(step.raw_event_ids.len(), 3);
        assert_eq!(step.id, "vstep-agenttext-0-raw-sub-0");
        assert_eq!(step.owning_task_id, "sub");
        assert!(step.is_sub_task_step);
        assert_eq!(step.function_call_id.as_deref(), Some("fc-1"));
        assert_eq!(ctx.last_flushed_text.as_deref(), Some("Hello world"));
    }

    #[test]
    fn test_blank_buffer_emits_nothing() {
        let tasks = HashMap::new();
        let levels = HashMap::new();
        let config = ReconstructConfig::default();
        let mut ctx = ReconstructionContext::new(&tasks, "root", &levels, &config);
        let raw = A2AEvent::new(EventDirection::StatusUpdate, "root", "", json!({}));
        ctx.buffer.append("Orchestrator", &timed(&raw, 0, "root", 0), "   ", false);

        assert!(!ctx.flush_text("root"));
        assert!(ctx.steps.is_empty());
        assert!(ctx.buffer.source_agent().is_none());
    }
}
