//! One handler per step type, each a scoped mutation of the layout state.

use shared_types::{
    StepData, ToolDecisionData, ToolInvocationStartData, ToolResultData, VisualizerStep,
};

use super::edges::{
    agent_handle, tool_input_handle, tool_output_handle, HandleSide, LLM_BOTTOM_OUTPUT,
    LLM_LEFT_INPUT, USER_BOTTOM_OUTPUT, USER_TOP_INPUT,
};
use super::layout::{AgentContext, LayoutManager, ParallelFlow, SubflowOrigin};
use super::registry::AgentKind;

pub fn handle_step(manager: &mut LayoutManager<'_>, step: &VisualizerStep) {
    match &step.data {
        StepData::UserRequest(_) => handle_user_request(manager, step),
        StepData::AgentLlmCall(_) => handle_llm_call(manager, step),
        StepData::AgentLlmResponseToAgent(_) => handle_llm_response(manager, step),
        StepData::AgentLlmResponseToolDecision(decision) => {
            handle_tool_decision(manager, step, decision)
        }
        StepData::AgentToolInvocationStart(invocation) => {
            handle_tool_invocation(manager, step, invocation)
        }
        StepData::AgentToolExecutionResult(result) => handle_tool_result(manager, step, result),
        StepData::AgentResponseText(_) => handle_root_response(manager, step, false),
        StepData::TaskCompleted(_) => handle_root_response(manager, step, true),
        StepData::TaskFailed(_) => handle_task_failed(manager, step),
        // Artifacts are listed with the steps but not drawn
        StepData::AgentArtifactNotification(_) => {}
    }
}

// ── User requests and responses ──────────────────────────────────────────────

fn handle_user_request(manager: &mut LayoutManager<'_>, step: &VisualizerStep) {
    if step.is_sub_task_step {
        return;
    }
    let agent = step.agent_name();
    let continuing = manager
        .current_phase()
        .is_some_and(|phase| phase.orchestrator_name == agent);

    let user_node = if continuing {
        let last_user = manager
            .current_phase()
            .and_then(|phase| phase.user_nodes.last())
            .map(|user| user.id.clone());
        if manager.add_orchestrator_instance(step).is_none() {
            return;
        }
        last_user.or_else(|| manager.add_top_user_node(step))
    } else {
        manager.start_phase(agent, step);
        manager.add_top_user_node(step)
    };

    let (Some(user_node), Some((orchestrator, kind))) =
        (user_node, manager.agent_node(AgentContext::Phase))
    else {
        return;
    };
    manager.connect(
        &user_node,
        &orchestrator,
        Some(USER_BOTTOM_OUTPUT),
        Some(&agent_handle(kind, false, HandleSide::Top)),
        step,
    );
}

/// Root text, completion or failure: answer the user once per orchestrator
/// instance. Completion and failure also close the phase.
fn handle_root_response(manager: &mut LayoutManager<'_>, step: &VisualizerStep, closes_phase: bool) {
    if step.is_sub_task_step {
        return;
    }
    if !manager.ensure_phase(step) {
        return;
    }

    if let Some(user_node) = manager.add_bottom_user_node(step) {
        if let Some((orchestrator, kind)) = manager.agent_node(AgentContext::Phase) {
            manager.connect(
                &orchestrator,
                &user_node,
                Some(&agent_handle(kind, true, HandleSide::Bottom)),
                Some(USER_TOP_INPUT),
                step,
            );
        }
    }
    if closes_phase {
        manager.close_phase();
    }
}

fn handle_task_failed(manager: &mut LayoutManager<'_>, step: &VisualizerStep) {
    if !step.is_sub_task_step {
        handle_root_response(manager, step, true);
        return;
    }

    let Some(subflow) = manager
        .resolve_subflow(step, true)
        .and_then(|index| manager.subflow(index))
    else {
        tracing::warn!(task_id = %step.owning_task_id, step_id = %step.id, "No subflow for failed sub-task");
        return;
    };
    let (peer_node, function_call_id) = (subflow.peer.id.clone(), subflow.function_call_id.clone());
    manager.set_node_status(&peer_node, "failed");
    manager.mark_returned(&function_call_id);

    // A failed branch still counts towards its parallel join
    if let Some(flow) = manager.complete_parallel_branch(&function_call_id) {
        join_parallel_flow(manager, flow, step);
    }
}

// ── LLM calls ────────────────────────────────────────────────────────────────

fn handle_llm_call(manager: &mut LayoutManager<'_>, step: &VisualizerStep) {
    if !manager.ensure_phase(step) {
        return;
    }
    let context = manager.context_for(step, true);
    let Some((agent_node, kind)) = manager.agent_node(context) else {
        return;
    };
    let Some(llm_node) =
        manager.add_tool_node(context, step, "LLM", true, step.function_call_id.clone())
    else {
        return;
    };
    manager.connect(
        &agent_node,
        &llm_node,
        Some(&agent_handle(kind, true, HandleSide::Right)),
        Some(LLM_LEFT_INPUT),
        step,
    );
}

/// Edge back from the context's latest LLM node to its agent
fn handle_llm_response(manager: &mut LayoutManager<'_>, step: &VisualizerStep) {
    if !manager.ensure_phase(step) {
        return;
    }
    let context = manager.context_for(step, true);
    let (Some((agent_node, kind)), Some(llm_node)) =
        (manager.agent_node(context), manager.last_llm_node(context))
    else {
        return;
    };
    manager.connect(
        &llm_node,
        &agent_node,
        Some(LLM_BOTTOM_OUTPUT),
        Some(&agent_handle(kind, false, HandleSide::Right)),
        step,
    );
}

fn handle_tool_decision(
    manager: &mut LayoutManager<'_>,
    step: &VisualizerStep,
    decision: &ToolDecisionData,
) {
    handle_llm_response(manager, step);

    if !decision.is_parallel {
        return;
    }
    let peer_calls: Vec<String> = decision
        .decisions
        .iter()
        .filter(|d| d.is_peer_delegation)
        .map(|d| d.function_call_id.clone())
        .collect();
    if peer_calls.len() > 1 {
        manager.register_parallel_flow(format!("parallel-{}", step.id), peer_calls, step.agent_name());
    }
}

// ── Tool calls ───────────────────────────────────────────────────────────────

fn handle_tool_invocation(
    manager: &mut LayoutManager<'_>,
    step: &VisualizerStep,
    invocation: &ToolInvocationStartData,
) {
    if !manager.ensure_phase(step) {
        return;
    }
    if invocation.is_peer_invocation {
        handle_peer_invocation(manager, step, invocation);
        return;
    }

    let context = manager.context_for(step, true);
    let Some((agent_node, kind)) = manager.agent_node(context) else {
        return;
    };
    let Some(tool_node) = manager.add_tool_node(
        context,
        step,
        &invocation.tool_name,
        false,
        Some(invocation.function_call_id.clone()),
    ) else {
        return;
    };
    manager.connect(
        &agent_node,
        &tool_node,
        Some(&agent_handle(kind, true, HandleSide::Right)),
        Some(&tool_input_handle(&tool_node)),
        step,
    );
}

/// Opens (or re-enters) the peer's subflow and connects the invoker to it
fn handle_peer_invocation(
    manager: &mut LayoutManager<'_>,
    step: &VisualizerStep,
    invocation: &ToolInvocationStartData,
) {
    // The call's own id names the subflow being opened, not the invoker's
    let invoker = manager.context_for(step, false);
    let Some((invoker_node, invoker_kind)) = manager.agent_node(invoker) else {
        return;
    };

    let function_call_id = invocation.function_call_id.as_str();
    let peer_name = manager
        .reconstruct()
        .peer_name(&invocation.tool_name)
        .unwrap_or(invocation.tool_name.as_str())
        .to_string();
    let sub_task_id = step
        .delegation_info
        .iter()
        .flatten()
        .find(|d| d.function_call_id == function_call_id)
        .map(|d| d.sub_task_id.clone());

    let existing = manager
        .subflow_by_call_id(function_call_id)
        .or_else(|| sub_task_id.as_deref().and_then(|id| manager.subflow_by_id(id)));
    let index = match existing {
        Some(index) => {
            manager.select_subflow(index);
            Some(index)
        }
        None => {
            let origin = SubflowOrigin {
                id: sub_task_id,
                function_call_id: function_call_id.to_string(),
                is_parallel: manager.is_parallel_call(function_call_id),
                is_peer_return: false,
            };
            manager.start_subflow(&peer_name, step, origin)
        }
    };
    let Some(peer_node) = index
        .and_then(|index| manager.subflow(index))
        .map(|subflow| subflow.peer.id.clone())
    else {
        return;
    };

    manager.connect(
        &invoker_node,
        &peer_node,
        Some(&agent_handle(invoker_kind, true, HandleSide::Bottom)),
        Some(&agent_handle(AgentKind::Peer, false, HandleSide::Top)),
        step,
    );
}

fn handle_tool_result(manager: &mut LayoutManager<'_>, step: &VisualizerStep, result: &ToolResultData) {
    if !manager.ensure_phase(step) {
        return;
    }
    if result.is_peer_response {
        handle_peer_return(manager, step, result);
        return;
    }

    let context = manager.context_for(step, true);
    let (Some((agent_node, kind)), Some(tool_node)) = (
        manager.agent_node(context),
        manager.find_tool_node(context, &result.function_call_id, &result.tool_name),
    ) else {
        tracing::debug!(
            step_id = %step.id,
            function_call_id = %result.function_call_id,
            "No tool node for tool result"
        );
        return;
    };
    manager.connect(
        &tool_node,
        &agent_node,
        Some(&tool_output_handle(&tool_node)),
        Some(&agent_handle(kind, false, HandleSide::Right)),
        step,
    );
}

/// A peer handing its answer back. Sequential returns get a fresh receiver
/// instance right away; parallel branches wait for their siblings.
fn handle_peer_return(manager: &mut LayoutManager<'_>, step: &VisualizerStep, result: &ToolResultData) {
    let function_call_id = result.function_call_id.as_str();
    let Some(returning_peer) = manager
        .subflow_by_call_id(function_call_id)
        .and_then(|index| manager.subflow(index))
        .map(|subflow| subflow.peer.id.clone())
    else {
        tracing::warn!(
            step_id = %step.id,
            function_call_id = %function_call_id,
            "Peer return without a matching subflow"
        );
        return;
    };
    if !manager.mark_returned(function_call_id) {
        tracing::debug!(
            step_id = %step.id,
            function_call_id = %function_call_id,
            "Ignoring repeated peer return"
        );
        return;
    }

    if manager.is_parallel_call(function_call_id) {
        if let Some(flow) = manager.complete_parallel_branch(function_call_id) {
            join_parallel_flow(manager, flow, step);
        }
        return;
    }

    let receiver = step.target.as_str();
    if !manager.reconstruct().is_orchestrator(receiver) {
        manager.outdent();
    }
    let Some((receiver_node, kind)) = manager.continue_agent(receiver, step) else {
        tracing::warn!(step_id = %step.id, receiver = %receiver, "Could not place peer return receiver");
        return;
    };
    manager.connect(
        &returning_peer,
        &receiver_node,
        Some(&agent_handle(AgentKind::Peer, true, HandleSide::Bottom)),
        Some(&agent_handle(kind, false, HandleSide::Top)),
        step,
    );
}

/// One receiver instance below the block, fed by every sibling
fn join_parallel_flow(manager: &mut LayoutManager<'_>, flow: ParallelFlow, step: &VisualizerStep) {
    let siblings: Vec<String> = flow
        .function_call_ids
        .iter()
        .filter_map(|id| manager.subflow_by_call_id(id))
        .filter_map(|index| manager.subflow(index))
        .map(|subflow| subflow.peer.id.clone())
        .collect();

    let Some((receiver_node, kind)) = manager.continue_agent(&flow.receiver, step) else {
        tracing::warn!(step_id = %step.id, receiver = %flow.receiver, "Could not place parallel join");
        return;
    };
    let target_handle = agent_handle(kind, false, HandleSide::Top);
    let source_handle = agent_handle(AgentKind::Peer, true, HandleSide::Bottom);
    for sibling in &siblings {
        manager.connect(
            sibling,
            &receiver_node,
            Some(&source_handle),
            Some(&target_handle),
            step,
        );
    }
}
