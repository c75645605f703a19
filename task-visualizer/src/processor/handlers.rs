//! Per-event classification. Each handler consumes one timed event and
//! emits zero or more steps into the context.

use serde_json::Value;
use shared_types::{
    instance_id, ArtifactNotificationData, CompletionData, DelegationInfo, ErrorDetails,
    EventDirection, FailureData, LlmCallData, LlmResponseToAgentData, StepData, TextData,
    ToolDecision, ToolDecisionData, ToolInvocationStartData, ToolResultData, ENTITY_LLM,
    ENTITY_USER, META_LLM_INVOCATION, META_LLM_RESPONSE, META_TOOL_INVOCATION_START,
    META_TOOL_RESPONSE_CONTENT,
};

use super::collect::TimedEvent;
use super::context::{ReconstructionContext, StepDraft};
use super::payload::{self, array_at, non_empty_str_at, str_at};
use super::performance::OpenToolCall;
use crate::error::EventSkip;

pub fn handle_event(ctx: &mut ReconstructionContext<'_>, event: &TimedEvent<'_>) {
    let outcome = match event.event.direction {
        EventDirection::Request => handle_request(ctx, event),
        EventDirection::StatusUpdate if payload::result(event.event).is_some() => {
            handle_status_update(ctx, event)
        }
        EventDirection::ArtifactUpdate if artifact(event).is_some() => handle_artifact(ctx, event),
        EventDirection::Response if payload::status_state(event.event).is_some() => {
            handle_terminal_response(ctx, event)
        }
        _ => Ok(Handled::Unmatched),
    };

    match outcome {
        Ok(Handled::Done) => {}
        Ok(Handled::Unmatched) => flush_unmatched(ctx, event),
        Err(skip) => {
            tracing::warn!(
                task_id = %event.owning_task_id,
                event_id = %event.raw_id,
                reason = %skip,
                "Skipping event"
            );
        }
    }
}

/// Whether a handler claimed the event
enum Handled {
    Done,
    Unmatched,
}

type HandlerResult = Result<Handled, EventSkip>;

/// Any event no handler claimed ends the current text run
fn flush_unmatched(ctx: &mut ReconstructionContext<'_>, event: &TimedEvent<'_>) {
    if !ctx.buffer.has_text() {
        return;
    }
    let forget = ctx.buffer_is_root_response();
    ctx.flush_text(&event.owning_task_id);
    if forget {
        ctx.last_flushed_text = None;
    }
}

// ── Requests ─────────────────────────────────────────────────────────────────

fn handle_request(ctx: &mut ReconstructionContext<'_>, event: &TimedEvent<'_>) -> HandlerResult {
    let task_id = event.event.task_id.as_deref();

    if event.is_sub_task() {
        let (Some(sub_task_id), Some(function_call_id)) =
            (task_id, payload::request_function_call_id(event.event))
        else {
            return Ok(Handled::Unmatched);
        };
        tracing::debug!(
            sub_task_id = %sub_task_id,
            function_call_id = %function_call_id,
            "Sub-task bound to function call"
        );
        ctx.sub_task_function_calls
            .insert(sub_task_id.to_string(), function_call_id.to_string());
        ctx.active_function_calls
            .insert(sub_task_id.to_string(), function_call_id.to_string());
        return Ok(Handled::Done);
    }

    if task_id != Some(ctx.root_task_id) {
        return Ok(Handled::Unmatched);
    }

    ctx.flush_text(&event.owning_task_id);
    ctx.last_flushed_text = None;

    let text = payload::user_request_text(event.event).unwrap_or_else(|| "User request".to_string());
    let target = Some(event.event.target_entity.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| payload::response_agent_name(event.event));
    ctx.emit(
        event,
        StepDraft::new(
            "userreq",
            StepData::UserRequest(TextData { text }),
            "User Input",
            ENTITY_USER,
            target,
        ),
    );
    Ok(Handled::Done)
}

// ── Status updates ───────────────────────────────────────────────────────────

fn handle_status_update(ctx: &mut ReconstructionContext<'_>, event: &TimedEvent<'_>) -> HandlerResult {
    let agent_name = payload::status_agent_name(event.event);

    match payload::metadata_type(event.event) {
        Some(META_LLM_INVOCATION) => return handle_llm_invocation(ctx, event, &agent_name),
        Some(META_LLM_RESPONSE) => return handle_llm_response(ctx, event, &agent_name),
        Some(META_TOOL_INVOCATION_START) => return handle_tool_invocation(ctx, event, &agent_name),
        Some(META_TOOL_RESPONSE_CONTENT) if !payload::message_parts(event.event).is_empty() => {
            return handle_tool_results(ctx, event, &agent_name)
        }
        _ => {}
    }

    if payload::is_final(event.event) && ctx.is_root(&event.owning_task_id) {
        return handle_final_update(ctx, event, &agent_name);
    }

    aggregate_text(ctx, event, &agent_name);
    Ok(Handled::Done)
}

fn handle_llm_invocation(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
    agent_name: &str,
) -> HandlerResult {
    ctx.flush_text(&event.owning_task_id);

    let llm_data = payload::metadata_data(event.event);
    let prompt_preview = llm_data
        .map(|data| array_at(data, "contents"))
        .and_then(latest_user_prompt)
        .unwrap_or_else(|| "System-initiated LLM call".to_string());
    let model_name = llm_data
        .and_then(|data| non_empty_str_at(data, "model"))
        .unwrap_or("Unknown Model")
        .to_string();

    ctx.performance
        .open_llm_call(agent_name, &event.owning_task_id, &model_name, event.timestamp);

    let function_call_id = ctx.step_function_call_id(event, explicit_function_call_id(event));
    ctx.emit(
        event,
        StepDraft::new(
            "llmcall",
            StepData::AgentLlmCall(LlmCallData {
                model_name,
                prompt_preview,
            }),
            format!("{agent_name}: LLM Call"),
            agent_name,
            ENTITY_LLM,
        )
        .function_call_id(function_call_id),
    );
    Ok(Handled::Done)
}

/// Most recent user-role content: its joined text, or a note about the
/// function response it carries
fn latest_user_prompt(contents: &[Value]) -> Option<String> {
    contents
        .iter()
        .rev()
        .filter(|content| str_at(content, "role") == Some("user"))
        .find_map(|content| {
            let parts = array_at(content, "parts");
            let texts: Vec<&str> = parts.iter().filter_map(|p| str_at(p, "text")).collect();
            if !texts.is_empty() {
                return Some(texts.join("\n"));
            }
            parts
                .iter()
                .find_map(|p| p.get("function_response"))
                .map(|response| {
                    format!(
                        "Processing response from tool: {}",
                        str_at(response, "name").unwrap_or("unknown")
                    )
                })
        })
}

fn handle_llm_response(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
    agent_name: &str,
) -> HandlerResult {
    let data = payload::metadata_data(event.event);
    let Some(parts) = data
        .and_then(|d| d.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    else {
        return Err(EventSkip::MissingField("content.parts"));
    };

    ctx.performance
        .close_llm_call(agent_name, &event.owning_task_id, event.timestamp);

    let function_calls: Vec<&Value> = parts.iter().filter_map(|p| p.get("function_call")).collect();
    if !function_calls.is_empty() {
        return handle_tool_decision(ctx, event, agent_name, &function_calls);
    }

    ctx.flush_text(&event.owning_task_id);

    let text = parts
        .iter()
        .filter_map(|p| str_at(p, "text"))
        .collect::<Vec<_>>()
        .join("\n");
    let limit = ctx.config.response_preview_chars;
    let response_preview = if text.chars().count() > limit {
        format!("{}...", text.chars().take(limit).collect::<String>())
    } else {
        text
    };
    let is_final_response = data
        .and_then(|d| d.get("partial"))
        .and_then(|v| v.as_bool())
        == Some(false);

    let function_call_id = ctx.step_function_call_id(event, explicit_function_call_id(event));
    ctx.emit(
        event,
        StepDraft::new(
            "llmrespagent",
            StepData::AgentLlmResponseToAgent(LlmResponseToAgentData {
                response_preview,
                is_final_response,
            }),
            format!("{agent_name}: LLM Response"),
            ENTITY_LLM,
            agent_name,
        )
        .function_call_id(function_call_id),
    );
    Ok(Handled::Done)
}

fn handle_tool_decision(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
    agent_name: &str,
    function_calls: &[&Value],
) -> HandlerResult {
    let decisions: Vec<ToolDecision> = function_calls
        .iter()
        .filter_map(|call| {
            let (Some(id), Some(name)) = (non_empty_str_at(call, "id"), non_empty_str_at(call, "name"))
            else {
                tracing::warn!(
                    task_id = %event.owning_task_id,
                    event_id = %event.raw_id,
                    "Skipping function call without id or name"
                );
                return None;
            };
            Some(ToolDecision {
                function_call_id: id.to_string(),
                tool_name: name.to_string(),
                tool_arguments: call
                    .get("args")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default())),
                is_peer_delegation: ctx.config.is_peer_tool(name),
            })
        })
        .collect();
    if decisions.is_empty() {
        return Err(EventSkip::MalformedField("function_call"));
    }

    ctx.flush_before(agent_name, &event.owning_task_id);
    ctx.active_function_calls.remove(&event.owning_task_id);

    let delegations: Vec<DelegationInfo> = decisions
        .iter()
        .filter_map(|decision| resolve_delegation(ctx, event, decision))
        .collect();

    let is_parallel = decisions.len() > 1;
    let title = if is_parallel {
        "LLM: Tool Decision (Parallel)"
    } else {
        "LLM: Tool Decision"
    };
    let function_call_id = ctx.step_function_call_id(event, None);
    let step_id = ctx.emit(
        event,
        StepDraft::new(
            "tooldecision",
            StepData::AgentLlmResponseToolDecision(ToolDecisionData {
                decisions: decisions.clone(),
                is_parallel,
            }),
            title,
            ENTITY_LLM,
            agent_name,
        )
        .function_call_id(function_call_id)
        .delegation_info(delegations),
    );

    if is_parallel {
        tracing::debug!(step_id = %step_id, calls = decisions.len(), "Parallel tool block");
    }

    let invoking_instance_id = instance_id(agent_name, &event.owning_task_id);
    ctx.performance.ensure_agent(agent_name, &event.owning_task_id);
    for decision in &decisions {
        let sub_task_id = ctx
            .delegations
            .get(&decision.function_call_id)
            .map(|info| info.sub_task_id.clone());
        ctx.performance.open_tool_call(
            &decision.function_call_id,
            OpenToolCall {
                started: event.timestamp,
                tool_name: decision.tool_name.clone(),
                peer_agent_name: ctx.config.peer_name(&decision.tool_name).map(ToString::to_string),
                invoking_instance_id: invoking_instance_id.clone(),
                sub_task_id,
                parallel_block_id: is_parallel.then(|| step_id.clone()),
            },
        );
    }
    Ok(Handled::Done)
}

/// Bind a peer decision to the earliest unclaimed child task of the owning
/// task whose creation request targets that peer at or after the decision
fn resolve_delegation(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
    decision: &ToolDecision,
) -> Option<DelegationInfo> {
    let peer_agent_name = ctx.config.peer_name(&decision.tool_name)?;
    let decided_at = event.timestamp.timestamp_millis();

    let candidate = ctx
        .tasks
        .values()
        .filter(|task| !ctx.claimed_sub_tasks.contains(&task.task_id))
        .filter(|task| payload::parent_task_id(task) == Some(event.owning_task_id.as_str()))
        .filter_map(|task| {
            let request = task.events.iter().find(|e| {
                e.direction == EventDirection::Request
                    && payload::request_method(e).is_some_and(|m| m.starts_with("tasks/"))
                    && e.target_entity == peer_agent_name
            })?;
            let requested_at = payload::parse_rfc3339_utc(payload::event_timestamp(request))?
                .timestamp_millis();
            (requested_at >= decided_at).then_some((requested_at, task.task_id.as_str()))
        })
        .min();

    let Some((_, sub_task_id)) = candidate else {
        tracing::debug!(
            function_call_id = %decision.function_call_id,
            peer = %peer_agent_name,
            "No sub-task found for peer delegation"
        );
        return None;
    };

    let info = DelegationInfo {
        function_call_id: decision.function_call_id.clone(),
        peer_agent_name: peer_agent_name.to_string(),
        sub_task_id: sub_task_id.to_string(),
    };
    tracing::debug!(
        function_call_id = %info.function_call_id,
        sub_task_id = %info.sub_task_id,
        "Claimed sub-task for peer delegation"
    );
    ctx.claimed_sub_tasks.insert(info.sub_task_id.clone());
    ctx.sub_task_function_calls
        .insert(info.sub_task_id.clone(), info.function_call_id.clone());
    ctx.delegations
        .insert(info.function_call_id.clone(), info.clone());
    Some(info)
}

fn handle_tool_invocation(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
    agent_name: &str,
) -> HandlerResult {
    let data = payload::metadata_data(event.event);
    let Some(tool_name) = data.and_then(|d| non_empty_str_at(d, "tool_name")) else {
        return Err(EventSkip::MissingField("tool_name"));
    };

    ctx.flush_before(agent_name, &event.owning_task_id);

    let function_call_id = data
        .and_then(|d| non_empty_str_at(d, "function_call_id"))
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("unknown-{tool_name}-{}", ctx.steps.len()));
    let tool_arguments = data
        .and_then(|d| d.get("tool_args"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    let is_peer_invocation = ctx.config.is_peer_tool(tool_name);
    let delegation = if is_peer_invocation {
        ctx.delegations.get(&function_call_id).cloned()
    } else {
        None
    };

    ctx.emit(
        event,
        StepDraft::new(
            "toolinvokestart",
            StepData::AgentToolInvocationStart(ToolInvocationStartData {
                function_call_id: function_call_id.clone(),
                tool_name: tool_name.to_string(),
                tool_arguments,
                is_peer_invocation,
            }),
            format!("{agent_name}: Executing tool {tool_name}"),
            agent_name,
            tool_name,
        )
        .function_call_id(Some(function_call_id))
        .delegation_info(delegation.into_iter().collect()),
    );
    Ok(Handled::Done)
}

/// One message may report several parallel results, one data part each
fn handle_tool_results(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
    agent_name: &str,
) -> HandlerResult {
    ctx.flush_text(&event.owning_task_id);

    let result_parts = payload::message_parts(event.event)
        .iter()
        .filter(|part| payload::part_kind(part) == Some("data"))
        .filter(|part| {
            part.get("metadata")
                .and_then(|m| non_empty_str_at(m, "tool_name"))
                .is_some()
        });

    for (index, part) in result_parts.enumerate() {
        let metadata = part.get("metadata");
        let (Some(tool_name), Some(function_call_id)) = (
            metadata.and_then(|m| non_empty_str_at(m, "tool_name")),
            metadata.and_then(|m| non_empty_str_at(m, "function_call_id")),
        ) else {
            tracing::warn!(
                task_id = %event.owning_task_id,
                event_id = %event.raw_id,
                part = index,
                "Skipping tool result part without function_call_id"
            );
            continue;
        };

        ctx.performance.close_tool_call(function_call_id, event.timestamp);

        let is_peer_response = ctx.config.is_peer_tool(tool_name);
        ctx.emit(
            event,
            StepDraft::new(
                "toolresult",
                StepData::AgentToolExecutionResult(ToolResultData {
                    tool_name: tool_name.to_string(),
                    function_call_id: function_call_id.to_string(),
                    result_data: part.get("data").cloned().unwrap_or(Value::Null),
                    is_peer_response,
                }),
                format!("{agent_name}: Tool Result - {tool_name}"),
                tool_name,
                agent_name,
            )
            .function_call_id(Some(function_call_id.to_string()))
            .id_suffix(index),
        );
    }
    Ok(Handled::Done)
}

fn handle_final_update(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
    agent_name: &str,
) -> HandlerResult {
    ctx.flush_text(&event.owning_task_id);

    let Some(text) = payload::first_text_part(payload::message_parts(event.event))
        .map(str::trim)
        .filter(|text| !text.is_empty())
    else {
        return Ok(Handled::Done);
    };
    if ctx.last_flushed_text.as_deref() == Some(text) {
        return Ok(Handled::Done);
    }

    let function_call_id = ctx.step_function_call_id(event, explicit_function_call_id(event));
    ctx.emit(
        event,
        StepDraft::new(
            "agenttext-finalevent",
            StepData::AgentResponseText(TextData {
                text: text.to_string(),
            }),
            format!("{agent_name}: Response (Final Update)"),
            agent_name,
            ENTITY_USER,
        )
        .function_call_id(function_call_id),
    );
    ctx.last_flushed_text = Some(text.to_string());
    Ok(Handled::Done)
}

/// Plain text parts, or forwarded status signals, join the text buffer
fn aggregate_text(ctx: &mut ReconstructionContext<'_>, event: &TimedEvent<'_>, agent_name: &str) {
    let parts = payload::message_parts(event.event);
    let forwarded = payload::forwarded_from_peer(event.event).is_some();

    let fragment = match payload::first_text_part(parts).filter(|text| !text.is_empty()) {
        Some(text) => text,
        None if forwarded => match payload::status_signal_text(parts) {
            Some(text) => text,
            None => return,
        },
        None => return,
    };

    if ctx.buffer.source_agent().is_some_and(|source| source != agent_name) {
        ctx.flush_text(&event.owning_task_id);
        ctx.last_flushed_text = None;
    }
    ctx.buffer.append(agent_name, event, fragment, forwarded);
}

// ── Artifacts ────────────────────────────────────────────────────────────────

fn artifact<'e>(event: &TimedEvent<'e>) -> Option<&'e Value> {
    payload::result(event.event).and_then(|r| r.get("artifact"))
}

/// Whole-number versions only; fractional or out-of-range values are dropped
fn artifact_version(metadata: Option<&Value>) -> Option<i64> {
    metadata.and_then(|m| m.get("version")).and_then(Value::as_i64)
}

fn handle_artifact(ctx: &mut ReconstructionContext<'_>, event: &TimedEvent<'_>) -> HandlerResult {
    let Some(artifact) = artifact(event) else {
        return Ok(Handled::Unmatched);
    };
    ctx.flush_text(&event.owning_task_id);

    let metadata = artifact.get("metadata");
    let agent_name = metadata
        .and_then(|m| non_empty_str_at(m, "agent_name"))
        .or_else(|| Some(event.event.source_entity.as_str()).filter(|s| !s.is_empty()))
        .unwrap_or("Agent")
        .to_string();

    let mime_type = array_at(artifact, "parts").first().and_then(|part| {
        if payload::part_kind(part) == Some("file") {
            part.get("file").and_then(|f| non_empty_str_at(f, "mimeType"))
        } else {
            part.get("metadata").and_then(|m| non_empty_str_at(m, "mime_type"))
        }
    });
    let artifact_name = non_empty_str_at(artifact, "name")
        .unwrap_or("Unnamed Artifact")
        .to_string();

    let data = ArtifactNotificationData {
        version: artifact_version(metadata),
        description: non_empty_str_at(artifact, "description").map(ToString::to_string),
        mime_type: mime_type.map(ToString::to_string),
        artifact_name,
    };

    let function_call_id = ctx.step_function_call_id(event, explicit_function_call_id(event));
    ctx.emit(
        event,
        StepDraft::new(
            "artifactnotify",
            StepData::AgentArtifactNotification(data.clone()),
            format!("{agent_name}: Artifact Update - {}", data.artifact_name),
            agent_name,
            "User/System",
        )
        .function_call_id(function_call_id),
    );
    Ok(Handled::Done)
}

// ── Terminal responses ───────────────────────────────────────────────────────

fn handle_terminal_response(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
) -> HandlerResult {
    let Some(state) = payload::status_state(event.event) else {
        return Ok(Handled::Unmatched);
    };
    ctx.flush_text(&event.owning_task_id);

    let agent_name = payload::response_agent_name(event.event);

    if event.is_sub_task() && state == "completed" && handle_peer_return(ctx, event, &agent_name) {
        return Ok(Handled::Done);
    }

    let failed = match state {
        "completed" => false,
        "failed" | "canceled" => true,
        other => {
            tracing::debug!(
                task_id = %event.owning_task_id,
                state = %other,
                "Ignoring non-terminal response"
            );
            return Ok(Handled::Unmatched);
        }
    };

    let is_root = ctx.is_root(&event.owning_task_id);
    let final_text = payload::first_text_part(payload::message_parts(event.event))
        .map(str::trim)
        .filter(|text| !text.is_empty());
    let final_message = final_text
        .filter(|text| !is_root || ctx.last_flushed_text.as_deref() != Some(*text))
        .map(ToString::to_string);

    let data = if failed {
        StepData::TaskFailed(FailureData {
            error_details: error_details(event, state, final_message),
        })
    } else {
        StepData::TaskCompleted(CompletionData { final_message })
    };

    let function_call_id = ctx.step_function_call_id(event, explicit_function_call_id(event));
    ctx.emit(
        event,
        StepDraft::new(
            state_kind(state),
            data,
            format!("{agent_name}: Task {}", capitalize(state)),
            agent_name,
            ENTITY_USER,
        )
        .function_call_id(function_call_id),
    );
    if is_root {
        ctx.last_flushed_text = None;
    }
    Ok(Handled::Done)
}

/// A completed sub-task reports back to its parent agent as a tool result.
/// Returns false when the parent agent or the delegation cannot be resolved.
fn handle_peer_return(
    ctx: &mut ReconstructionContext<'_>,
    event: &TimedEvent<'_>,
    agent_name: &str,
) -> bool {
    let parent_agent_name = ctx
        .tasks
        .get(&event.owning_task_id)
        .and_then(payload::parent_task_id)
        .and_then(|parent_id| ctx.tasks.get(parent_id))
        .and_then(payload::agent_name_for_task);
    let function_call_id = ctx.sub_task_function_calls.get(&event.owning_task_id).cloned();

    let (Some(parent_agent_name), Some(function_call_id)) = (parent_agent_name, function_call_id)
    else {
        tracing::warn!(
            task_id = %event.owning_task_id,
            event_id = %event.raw_id,
            "Could not resolve parent agent or delegation for sub-task return"
        );
        return false;
    };

    ctx.performance.close_tool_call(&function_call_id, event.timestamp);

    let peer_tool_name = ctx.config.peer_tool_name(agent_name);
    let result_data = payload::status_message(event.event)
        .cloned()
        .unwrap_or(Value::Null);
    ctx.emit(
        event,
        StepDraft::new(
            "toolresult",
            StepData::AgentToolExecutionResult(ToolResultData {
                tool_name: peer_tool_name.clone(),
                function_call_id: function_call_id.clone(),
                result_data,
                is_peer_response: true,
            }),
            format!("{parent_agent_name}: Tool Result - {peer_tool_name}"),
            peer_tool_name,
            parent_agent_name,
        )
        .function_call_id(Some(function_call_id)),
    );
    true
}

/// Status text first, then the JSON-RPC error, then the task's own error
fn error_details(event: &TimedEvent<'_>, state: &str, final_message: Option<String>) -> ErrorDetails {
    let mut details = ErrorDetails {
        message: final_message.unwrap_or_else(|| format!("Task {state}.")),
        code: None,
        details: None,
    };

    let rpc_error = event.event.full_payload.get("error");
    let task_error = payload::result(event.event).and_then(|r| r.get("error"));
    for (error, overrides_code) in [(rpc_error, true), (task_error, false)] {
        let Some(error) = error.filter(|e| e.is_object()) else {
            continue;
        };
        if let Some(message) = non_empty_str_at(error, "message") {
            details.message = message.to_string();
        }
        let code = error.get("code").filter(|c| !c.is_null()).cloned();
        if overrides_code || code.is_some() {
            details.code = code.or(details.code.take());
        }
        if let Some(data) = error.get("data").filter(|d| !d.is_null()) {
            details.details = Some(data.clone());
        }
    }
    details
}

fn explicit_function_call_id<'e>(event: &TimedEvent<'e>) -> Option<&'e str> {
    payload::message_metadata(event.event).and_then(|m| non_empty_str_at(m, "function_call_id"))
}

fn state_kind(state: &str) -> &'static str {
    match state {
        "completed" => "completed",
        "failed" => "failed",
        _ => "canceled",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
