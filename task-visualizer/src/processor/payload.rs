//! Accessors over the opaque JSON-RPC payload of an A2A event.

use chrono::{DateTime, Utc};
use serde_json::Value;
use shared_types::{A2AEvent, EventDirection, TaskRecord, SIGNAL_AGENT_STATUS_MESSAGE};

// ── Generic helpers ──────────────────────────────────────────────────────────

pub fn str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

/// Like `str_at`, but treats an empty string as absent
pub fn non_empty_str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    str_at(value, key).filter(|s| !s.is_empty())
}

pub fn array_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn parse_rfc3339_utc(timestamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn duration_between_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_milliseconds().max(0)
}

// ── Event envelope helpers ───────────────────────────────────────────────────

pub fn result(event: &A2AEvent) -> Option<&Value> {
    event.full_payload.get("result")
}

pub fn status_message(event: &A2AEvent) -> Option<&Value> {
    result(event)
        .and_then(|r| r.get("status"))
        .and_then(|s| s.get("message"))
}

pub fn message_metadata(event: &A2AEvent) -> Option<&Value> {
    status_message(event).and_then(|m| m.get("metadata"))
}

pub fn message_parts(event: &A2AEvent) -> &[Value] {
    status_message(event)
        .map(|m| array_at(m, "parts"))
        .unwrap_or(&[])
}

/// Metadata `type` of the status message (`llm_invocation`, ...)
pub fn metadata_type(event: &A2AEvent) -> Option<&str> {
    message_metadata(event).and_then(|m| str_at(m, "type"))
}

pub fn metadata_data(event: &A2AEvent) -> Option<&Value> {
    message_metadata(event).and_then(|m| m.get("data"))
}

/// The protocol status timestamp when present, else the envelope timestamp
pub fn event_timestamp(event: &A2AEvent) -> &str {
    result(event)
        .and_then(|r| r.get("status"))
        .and_then(|s| non_empty_str_at(s, "timestamp"))
        .unwrap_or(event.timestamp.as_str())
}

pub fn status_state(event: &A2AEvent) -> Option<&str> {
    result(event)
        .and_then(|r| r.get("status"))
        .and_then(|s| str_at(s, "state"))
}

pub fn is_final(event: &A2AEvent) -> bool {
    result(event)
        .and_then(|r| r.get("final"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub fn forwarded_from_peer(event: &A2AEvent) -> Option<&str> {
    message_metadata(event).and_then(|m| non_empty_str_at(m, "forwarded_from_peer"))
}

/// Agent named by the payload itself, ignoring the envelope
fn payload_agent_name(event: &A2AEvent) -> Option<&str> {
    result(event)
        .and_then(|r| r.get("metadata"))
        .and_then(|m| non_empty_str_at(m, "agent_name"))
        .or_else(|| message_metadata(event).and_then(|m| non_empty_str_at(m, "agent_name")))
}

/// Agent a status update speaks for; a forwarding peer wins over everything
pub fn status_agent_name(event: &A2AEvent) -> String {
    forwarded_from_peer(event)
        .or_else(|| payload_agent_name(event))
        .or_else(|| Some(event.source_entity.as_str()).filter(|s| !s.is_empty()))
        .unwrap_or("Agent")
        .to_string()
}

/// Agent a terminal response or artifact update is reported by
pub fn response_agent_name(event: &A2AEvent) -> String {
    payload_agent_name(event)
        .or_else(|| {
            result(event)
                .and_then(|r| r.get("artifact"))
                .and_then(|a| a.get("metadata"))
                .and_then(|m| non_empty_str_at(m, "agent_name"))
        })
        .or_else(|| Some(event.source_entity.as_str()).filter(|s| !s.is_empty()))
        .unwrap_or("Agent")
        .to_string()
}

pub fn request_metadata(event: &A2AEvent) -> Option<&Value> {
    event
        .full_payload
        .get("params")
        .and_then(|p| p.get("metadata"))
}

/// Function call id a sub-task creation request was issued for
pub fn request_function_call_id(event: &A2AEvent) -> Option<&str> {
    request_metadata(event).and_then(|m| non_empty_str_at(m, "function_call_id"))
}

pub fn request_method(event: &A2AEvent) -> Option<&str> {
    str_at(&event.full_payload, "method")
}

// ── Parts ────────────────────────────────────────────────────────────────────

pub fn part_kind(part: &Value) -> Option<&str> {
    str_at(part, "type").or_else(|| str_at(part, "kind"))
}

pub fn text_parts(parts: &[Value]) -> impl Iterator<Item = &str> {
    parts
        .iter()
        .filter(|part| part_kind(part) == Some("text"))
        .filter_map(|part| str_at(part, "text"))
}

pub fn first_text_part(parts: &[Value]) -> Option<&str> {
    text_parts(parts).next()
}

/// Text of a forwarded `agent_status_message` data-part signal
pub fn status_signal_text(parts: &[Value]) -> Option<&str> {
    parts
        .iter()
        .filter(|part| part_kind(part) == Some("data"))
        .filter_map(|part| part.get("data"))
        .find(|data| str_at(data, "a2a_signal_type") == Some(SIGNAL_AGENT_STATUS_MESSAGE))
        .and_then(|data| non_empty_str_at(data, "text"))
}

/// User-request text; the second text part wins over the first because
/// the gateway prepends an injected timestamp part
pub fn user_request_text(event: &A2AEvent) -> Option<String> {
    let parts = event
        .full_payload
        .get("params")
        .and_then(|p| p.get("message"))
        .map(|m| array_at(m, "parts"))?;
    let texts: Vec<&str> = text_parts(parts).collect();
    texts.get(1).or_else(|| texts.first()).map(|s| s.to_string())
}

// ── Task helpers ─────────────────────────────────────────────────────────────

/// Explicit parent, else the parent named in the first event's request metadata
pub fn parent_task_id(task: &TaskRecord) -> Option<&str> {
    task.parent_task_id.as_deref().or_else(|| {
        task.events
            .first()
            .and_then(request_metadata)
            .and_then(|m| non_empty_str_at(m, "parentTaskId"))
    })
}

/// First status-update agent name of a task, else the target of its first request
pub fn agent_name_for_task(task: &TaskRecord) -> Option<String> {
    task.events
        .iter()
        .filter(|event| event.direction == EventDirection::StatusUpdate && result(event).is_some())
        .find_map(|event| {
            payload_agent_name(event)
                .or_else(|| Some(event.source_entity.as_str()).filter(|s| !s.is_empty()))
                .map(ToString::to_string)
        })
        .or_else(|| {
            task.events
                .iter()
                .find(|event| event.direction == EventDirection::Request)
                .map(|event| event.target_entity.clone())
                .filter(|name| !name.is_empty())
        })
}
