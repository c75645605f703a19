//! End-to-end pipeline tests: raw task-store events → steps, performance
//! report and timeline diagram, through the public API only.
//!
//! Run:
//!   cargo test -p task-visualizer --test pipeline_test

use std::collections::HashMap;

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Value};
use shared_types::{
    instance_id, A2AEvent, EventDirection, FlowNode, FlowNodeType, StepData, StepType, TaskRecord,
    TaskStatus, TimelineFlow,
};
use task_visualizer::{
    build_timeline_flow, process_task_for_visualization, visualize, VisualizerConfig,
};

const ORCHESTRATOR: &str = "OrchestratorAgent";

// ─── Event fixtures ─────────────────────────────────────────────────────────

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn at(ms: i64) -> DateTime<Utc> {
    base() + Duration::milliseconds(ms)
}

fn ts(ms: i64) -> String {
    at(ms).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `tasks/sendSubscribe` creating `task`; sub-tasks name their parent and
/// the function call they were issued for
fn request(
    task: &str,
    ms: i64,
    sender: &str,
    target: &str,
    text: &str,
    parent: Option<(&str, &str)>,
) -> A2AEvent {
    let metadata = match parent {
        Some((parent_task_id, function_call_id)) => json!({
            "parentTaskId": parent_task_id,
            "function_call_id": function_call_id,
        }),
        None => json!({}),
    };
    A2AEvent::new(
        EventDirection::Request,
        task,
        ts(ms),
        json!({
            "jsonrpc": "2.0",
            "method": "tasks/sendSubscribe",
            "params": {
                "id": task,
                "message": {"role": "user", "parts": [{"type": "text", "text": text}]},
                "metadata": metadata,
            },
        }),
    )
    .with_entities(sender, target)
}

fn status(task: &str, ms: i64, agent: &str, message: Value) -> A2AEvent {
    status_event(task, ms, agent, message, false)
}

/// Status update closing the stream (`final: true`)
fn final_status(task: &str, ms: i64, agent: &str, text: &str) -> A2AEvent {
    status_event(
        task,
        ms,
        agent,
        json!({"role": "agent", "parts": [{"type": "text", "text": text}]}),
        true,
    )
}

fn status_event(task: &str, ms: i64, agent: &str, message: Value, is_final: bool) -> A2AEvent {
    A2AEvent::new(
        EventDirection::StatusUpdate,
        task,
        ts(ms),
        json!({
            "jsonrpc": "2.0",
            "result": {
                "id": task,
                "status": {"state": "working", "message": message, "timestamp": ts(ms)},
                "final": is_final,
                "metadata": {"agent_name": agent},
            },
        }),
    )
    .with_entities(agent, "User")
}

fn llm_call(task: &str, ms: i64, agent: &str) -> A2AEvent {
    status(
        task,
        ms,
        agent,
        json!({
            "role": "agent",
            "parts": [],
            "metadata": {
                "type": "llm_invocation",
                "data": {
                    "model": "gpt-4o",
                    "contents": [{"role": "user", "parts": [{"text": "What do I owe?"}]}],
                },
            },
        }),
    )
}

fn decision(task: &str, ms: i64, agent: &str, calls: &[(&str, &str)]) -> A2AEvent {
    let parts: Vec<Value> = calls
        .iter()
        .map(|(id, name)| json!({"function_call": {"id": id, "name": name, "args": {}}}))
        .collect();
    status(
        task,
        ms,
        agent,
        json!({
            "role": "agent",
            "parts": [],
            "metadata": {
                "type": "llm_response",
                "data": {"content": {"role": "model", "parts": parts}, "partial": false},
            },
        }),
    )
}

fn tool_start(task: &str, ms: i64, agent: &str, function_call_id: &str, tool: &str) -> A2AEvent {
    status(
        task,
        ms,
        agent,
        json!({
            "role": "agent",
            "parts": [],
            "metadata": {
                "type": "tool_invocation_start",
                "data": {"tool_name": tool, "function_call_id": function_call_id, "tool_args": {}},
            },
        }),
    )
}

fn tool_result(task: &str, ms: i64, agent: &str, function_call_id: &str, tool: &str) -> A2AEvent {
    status(
        task,
        ms,
        agent,
        json!({
            "role": "agent",
            "parts": [{
                "type": "data",
                "data": {"ok": true},
                "metadata": {"tool_name": tool, "function_call_id": function_call_id},
            }],
            "metadata": {"type": "tool_response_content"},
        }),
    )
}

fn text(task: &str, ms: i64, agent: &str, text: &str) -> A2AEvent {
    status(
        task,
        ms,
        agent,
        json!({"role": "agent", "parts": [{"type": "text", "text": text}]}),
    )
}

fn terminal(task: &str, ms: i64, agent: &str, state: &str, text: Option<&str>) -> A2AEvent {
    let parts: Vec<Value> = text
        .map(|t| json!({"type": "text", "text": t}))
        .into_iter()
        .collect();
    A2AEvent::new(
        EventDirection::Response,
        task,
        ts(ms),
        json!({
            "jsonrpc": "2.0",
            "result": {
                "id": task,
                "status": {
                    "state": state,
                    "message": {"role": "agent", "parts": parts},
                    "timestamp": ts(ms),
                },
                "metadata": {"agent_name": agent},
            },
        }),
    )
    .with_entities(agent, "User")
}

fn artifact(task: &str, ms: i64, agent: &str, name: &str, version: Value) -> A2AEvent {
    A2AEvent::new(
        EventDirection::ArtifactUpdate,
        task,
        ts(ms),
        json!({
            "jsonrpc": "2.0",
            "result": {
                "id": task,
                "artifact": {
                    "name": name,
                    "description": "Search summary",
                    "parts": [{"type": "file", "file": {"name": name, "mimeType": "text/markdown"}}],
                    "metadata": {"agent_name": agent, "version": version},
                },
            },
        }),
    )
    .with_entities(agent, "User")
}

fn store(records: Vec<TaskRecord>) -> HashMap<String, TaskRecord> {
    records
        .into_iter()
        .map(|record| (record.task_id.clone(), record))
        .collect()
}

fn record(task_id: &str, first_seen_ms: i64, events: Vec<A2AEvent>) -> TaskRecord {
    TaskRecord::new(task_id, at(first_seen_ms)).with_events(events)
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

fn single_tool_events() -> Vec<A2AEvent> {
    vec![
        request("root", 0, "User", ORCHESTRATOR, "Search the docs", None),
        llm_call("root", 10, ORCHESTRATOR),
        decision("root", 20, ORCHESTRATOR, &[("fc-1", "web_search")]),
        tool_start("root", 30, ORCHESTRATOR, "fc-1", "web_search"),
        tool_result("root", 40, ORCHESTRATOR, "fc-1", "web_search"),
        text("root", 50, ORCHESTRATOR, "Found it."),
        terminal("root", 60, ORCHESTRATOR, "completed", Some("Found it.")),
    ]
}

/// Orchestrator → Billing → Ledger, each returning to its caller
fn nested_delegation_store() -> HashMap<String, TaskRecord> {
    let root = record(
        "root",
        0,
        vec![
            request("root", 0, "User", ORCHESTRATOR, "Settle my bill", None),
            llm_call("root", 10, ORCHESTRATOR),
            decision("root", 20, ORCHESTRATOR, &[("fc-1", "peer_Billing")]),
            tool_start("root", 30, ORCHESTRATOR, "fc-1", "peer_Billing"),
            text("root", 300, ORCHESTRATOR, "Your bill is settled."),
            terminal("root", 310, ORCHESTRATOR, "completed", None),
        ],
    );
    let billing = record(
        "sub-1",
        40,
        vec![
            request("sub-1", 40, ORCHESTRATOR, "Billing", "Settle", Some(("root", "fc-1"))),
            llm_call("sub-1", 50, "Billing"),
            decision("sub-1", 60, "Billing", &[("fc-2", "peer_Ledger")]),
            tool_start("sub-1", 70, "Billing", "fc-2", "peer_Ledger"),
            terminal("sub-1", 200, "Billing", "completed", Some("billed")),
        ],
    );
    let ledger = record(
        "sub-2",
        80,
        vec![
            request("sub-2", 80, "Billing", "Ledger", "Post entry", Some(("sub-1", "fc-2"))),
            llm_call("sub-2", 90, "Ledger"),
            terminal("sub-2", 150, "Ledger", "completed", Some("posted")),
        ],
    );
    store(vec![root, billing, ledger])
}

/// Orchestrator fans out to Billing and Shipping in one decision
fn parallel_delegation_store() -> HashMap<String, TaskRecord> {
    let root = record(
        "root",
        0,
        vec![
            request("root", 0, "User", ORCHESTRATOR, "Bill and ship", None),
            llm_call("root", 10, ORCHESTRATOR),
            decision(
                "root",
                20,
                ORCHESTRATOR,
                &[("fc-1", "peer_Billing"), ("fc-2", "peer_Shipping")],
            ),
            tool_start("root", 30, ORCHESTRATOR, "fc-1", "peer_Billing"),
            tool_start("root", 31, ORCHESTRATOR, "fc-2", "peer_Shipping"),
            text("root", 200, ORCHESTRATOR, "Billed and shipped."),
            terminal("root", 210, ORCHESTRATOR, "completed", None),
        ],
    );
    let billing = record(
        "sub-1",
        40,
        vec![
            request("sub-1", 40, ORCHESTRATOR, "Billing", "Bill", Some(("root", "fc-1"))),
            llm_call("sub-1", 50, "Billing"),
            terminal("sub-1", 120, "Billing", "completed", Some("billed")),
        ],
    );
    let shipping = record(
        "sub-2",
        41,
        vec![
            request("sub-2", 41, ORCHESTRATOR, "Shipping", "Ship", Some(("root", "fc-2"))),
            llm_call("sub-2", 51, "Shipping"),
            terminal("sub-2", 100, "Shipping", "completed", Some("shipped")),
        ],
    );
    store(vec![root, billing, shipping])
}

// ─── Assertions ─────────────────────────────────────────────────────────────

fn assert_flow_integrity(flow: &TimelineFlow) {
    let mut ids: Vec<&str> = flow.nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort_unstable();
    let before = ids.len();
    ids.dedup();
    assert_eq!(before, ids.len(), "node ids must be unique");

    for edge in &flow.edges {
        assert!(flow.node(&edge.source).is_some(), "dangling source on {}", edge.id);
        assert!(flow.node(&edge.target).is_some(), "dangling target on {}", edge.id);
    }
    for node in &flow.nodes {
        if let Some(parent) = node.parent_id.as_deref() {
            assert_eq!(
                flow.node(parent).map(|p| p.node_type),
                Some(FlowNodeType::Group),
                "{} must be parented to a group",
                node.id
            );
        }
    }
}

fn nodes_labeled<'a>(flow: &'a TimelineFlow, node_type: FlowNodeType, label: &str) -> Vec<&'a FlowNode> {
    flow.nodes_of_type(node_type)
        .filter(|node| node.data.label == label)
        .collect()
}

fn has_edge(flow: &TimelineFlow, source: &str, target: &str) -> bool {
    flow.edges.iter().any(|e| e.source == source && e.target == target)
}

// ─── Reconstruction ─────────────────────────────────────────────────────────

#[test]
fn test_single_tool_turn_end_to_end() {
    let tasks = store(vec![record("root", 0, single_tool_events())]);
    let config = VisualizerConfig::default();
    let result = visualize(&tasks, "root", &config).expect("root task is known");

    let types: Vec<StepType> = result.task.steps.iter().map(|s| s.step_type()).collect();
    assert_eq!(
        types,
        vec![
            StepType::UserRequest,
            StepType::AgentLlmCall,
            StepType::AgentLlmResponseToolDecision,
            StepType::AgentToolInvocationStart,
            StepType::AgentToolExecutionResult,
            StepType::AgentResponseText,
            StepType::TaskCompleted,
        ]
    );
    assert_eq!(result.task.status, TaskStatus::Completed);
    assert_eq!(result.task.start_time, at(0));
    assert_eq!(result.task.end_time, Some(at(60)));
    assert_eq!(result.task.duration_ms, Some(60));
    assert_eq!(result.task.steps[0].text(), Some("Search the docs"));

    let report = &result.task.performance_report;
    assert_eq!(report.overall.total_task_duration_ms, 60);
    let orchestrator = &report.agents[&instance_id(ORCHESTRATOR, "root")];
    assert_eq!(orchestrator.llm_calls.len(), 1);
    assert_eq!(orchestrator.total_llm_time_ms, 10);
    assert_eq!(orchestrator.tool_calls.len(), 1);
    assert_eq!(orchestrator.total_tool_time_ms, 20);

    let flow = &result.flow;
    assert_eq!(flow.nodes_of_type(FlowNodeType::OrchestratorNode).count(), 1);
    assert_eq!(flow.nodes_of_type(FlowNodeType::GenericToolNode).count(), 1);
    assert_eq!(flow.nodes_of_type(FlowNodeType::UserNode).count(), 2);
    assert!(flow.edges.len() >= 3);
    assert_flow_integrity(flow);
}

#[test]
fn test_malformed_events_never_abort_reconstruction() {
    let events = vec![
        request("root", 0, "User", ORCHESTRATOR, "hello", None),
        A2AEvent::new(EventDirection::StatusUpdate, "root", ts(10), json!({"jsonrpc": "2.0"})),
        A2AEvent::new(EventDirection::StatusUpdate, "root", "not-a-time", json!({"result": {}})),
        A2AEvent::new(EventDirection::Response, "root", ts(20), Value::Null),
        A2AEvent::new(EventDirection::Unknown, "root", ts(30), json!({"anything": true})),
        status("root", 40, ORCHESTRATOR, json!({"metadata": {"type": "llm_response"}})),
        status("root", 50, ORCHESTRATOR, json!({"metadata": {"type": "tool_invocation_start"}})),
    ];
    let tasks = store(vec![record("root", 0, events)]);

    let result = visualize(&tasks, "root", &VisualizerConfig::default())
        .expect("malformed events are skipped, not fatal");
    assert_eq!(result.task.steps.len(), 1);
    assert_eq!(result.task.steps[0].step_type(), StepType::UserRequest);
    assert_eq!(result.task.status, TaskStatus::Working);
    assert_eq!(result.task.end_time, None);
    assert_flow_integrity(&result.flow);
}

#[test]
fn test_unknown_root_yields_none() {
    let tasks = store(vec![record("root", 0, single_tool_events())]);
    let config = VisualizerConfig::default();

    let stranger = TaskRecord::new("elsewhere", base());
    assert!(process_task_for_visualization(&tasks, &stranger, &config.reconstruct).is_none());
    assert!(visualize(&tasks, "elsewhere", &config).is_none());
}

#[test]
fn test_reconstruction_is_idempotent_and_order_independent() {
    let config = VisualizerConfig::default();
    let ordered = store(vec![record("root", 0, single_tool_events())]);

    let mut reversed_events = single_tool_events();
    reversed_events.reverse();
    let reversed = store(vec![record("root", 0, reversed_events)]);

    let first = visualize(&ordered, "root", &config).unwrap();
    let again = visualize(&ordered, "root", &config).unwrap();
    let from_reversed = visualize(&reversed, "root", &config).unwrap();

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&again).unwrap()
    );
    assert_eq!(first.task.steps, from_reversed.task.steps);
    assert!(first
        .task
        .steps
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
}

#[test]
fn test_streamed_text_fragments_become_one_response() {
    let events = vec![
        request("root", 0, "User", ORCHESTRATOR, "greet me", None),
        text("root", 10, ORCHESTRATOR, "Hel"),
        text("root", 20, ORCHESTRATOR, "lo "),
        text("root", 30, ORCHESTRATOR, "world"),
        terminal("root", 40, ORCHESTRATOR, "completed", None),
    ];
    let tasks = store(vec![record("root", 0, events)]);
    let task = visualize(&tasks, "root", &VisualizerConfig::default())
        .unwrap()
        .task;

    let responses: Vec<_> = task
        .steps
        .iter()
        .filter(|s| s.step_type() == StepType::AgentResponseText)
        .collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].text(), Some("Hello world"));
    assert_eq!(responses[0].raw_event_ids.len(), 3);
    assert_eq!(responses[0].timestamp, at(10));
    assert_eq!(task.status, TaskStatus::Completed);
}

#[test]
fn test_parallel_tool_block_counts_wall_clock_span() {
    let events = vec![
        request("root", 0, "User", ORCHESTRATOR, "look both up", None),
        decision("root", 10, ORCHESTRATOR, &[("fc-a", "search"), ("fc-b", "fetch")]),
        tool_start("root", 11, ORCHESTRATOR, "fc-a", "search"),
        tool_start("root", 12, ORCHESTRATOR, "fc-b", "fetch"),
        tool_result("root", 110, ORCHESTRATOR, "fc-a", "search"),
        tool_result("root", 160, ORCHESTRATOR, "fc-b", "fetch"),
        terminal("root", 200, ORCHESTRATOR, "completed", Some("done")),
    ];
    let tasks = store(vec![record("root", 0, events)]);
    let task = visualize(&tasks, "root", &VisualizerConfig::default())
        .unwrap()
        .task;

    let decision = task
        .steps
        .iter()
        .find_map(|s| s.tool_decision())
        .expect("decision step");
    assert!(decision.is_parallel);

    let metrics = &task.performance_report.agents[&instance_id(ORCHESTRATOR, "root")];
    let durations: Vec<i64> = metrics.tool_calls.iter().map(|c| c.duration_ms).collect();
    assert_eq!(durations.iter().sum::<i64>(), 250);
    assert!(metrics
        .tool_calls
        .iter()
        .all(|c| c.parallel_block_id.is_some() && c.parallel_block_id == metrics.tool_calls[0].parallel_block_id));
    // Wall clock of the block, not the sum of its calls
    assert_eq!(metrics.total_tool_time_ms, 150);
}

#[test]
fn test_delegation_binds_earliest_sub_task_after_decision() {
    let root = record(
        "root",
        0,
        vec![
            request("root", 0, "User", ORCHESTRATOR, "bill me", None),
            decision("root", 100, ORCHESTRATOR, &[("fc-1", "peer_Billing")]),
            terminal("root", 300, ORCHESTRATOR, "completed", Some("ok")),
        ],
    );
    // Requested before the decision, so it cannot answer it
    let early = record(
        "sub-early",
        99,
        vec![request("sub-early", 99, ORCHESTRATOR, "Billing", "old", None)],
    );
    let late = record(
        "sub-late",
        101,
        vec![
            request("sub-late", 101, ORCHESTRATOR, "Billing", "new", None),
            terminal("sub-late", 150, "Billing", "completed", Some("paid")),
        ],
    );
    let mut tasks = store(vec![root]);
    for mut child in [early, late] {
        child.parent_task_id = Some("root".to_string());
        tasks.insert(child.task_id.clone(), child);
    }

    let task = visualize(&tasks, "root", &VisualizerConfig::default())
        .unwrap()
        .task;
    let decision_step = task
        .steps
        .iter()
        .find(|s| s.step_type() == StepType::AgentLlmResponseToolDecision)
        .unwrap();
    let delegation = decision_step
        .delegation_info
        .as_deref()
        .and_then(|infos| infos.first())
        .expect("delegation resolved");
    assert_eq!(delegation.function_call_id, "fc-1");
    assert_eq!(delegation.peer_agent_name, "Billing");
    assert_eq!(delegation.sub_task_id, "sub-late");

    // The peer call is timed from the decision to the sub-task's completion
    let metrics = &task.performance_report.agents[&instance_id(ORCHESTRATOR, "root")];
    assert_eq!(metrics.tool_calls.len(), 1);
    assert_eq!(metrics.tool_calls[0].sub_task_id.as_deref(), Some("sub-late"));
    assert!(metrics.tool_calls[0].is_peer);
    assert_eq!(metrics.tool_calls[0].duration_ms, 50);
}

#[test]
fn test_sub_task_completion_returns_as_peer_result() {
    let tasks = nested_delegation_store();
    let task = visualize(&tasks, "root", &VisualizerConfig::default())
        .unwrap()
        .task;

    let returns: Vec<_> = task
        .steps
        .iter()
        .filter(|s| s.tool_result().is_some_and(|r| r.is_peer_response))
        .collect();
    assert_eq!(returns.len(), 2);

    assert_eq!(returns[0].source, "peer_Ledger");
    assert_eq!(returns[0].target, "Billing");
    assert_eq!(returns[0].owning_task_id, "sub-2");
    assert_eq!(returns[0].function_call_id.as_deref(), Some("fc-2"));
    assert_eq!(returns[0].nesting_level, 2);

    assert_eq!(returns[1].source, "peer_Billing");
    assert_eq!(returns[1].target, ORCHESTRATOR);
    assert_eq!(returns[1].function_call_id.as_deref(), Some("fc-1"));

    // One metrics entry per agent instance
    for (agent, task_id) in [(ORCHESTRATOR, "root"), ("Billing", "sub-1"), ("Ledger", "sub-2")] {
        assert!(
            task.performance_report
                .agents
                .contains_key(&instance_id(agent, task_id)),
            "missing metrics for {agent} in {task_id}"
        );
    }
    assert_eq!(task.status, TaskStatus::Completed);
}

#[test]
fn test_final_update_repeating_streamed_text_is_suppressed() {
    let events = vec![
        request("root", 0, "User", ORCHESTRATOR, "Search the docs", None),
        text("root", 10, ORCHESTRATOR, "Found it."),
        final_status("root", 20, ORCHESTRATOR, "Found it."),
        terminal("root", 30, ORCHESTRATOR, "completed", None),
    ];
    let tasks = store(vec![record("root", 0, events)]);
    let task = visualize(&tasks, "root", &VisualizerConfig::default())
        .unwrap()
        .task;

    let responses: Vec<_> = task
        .steps
        .iter()
        .filter(|s| s.step_type() == StepType::AgentResponseText)
        .collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].text(), Some("Found it."));
    assert_eq!(task.status, TaskStatus::Completed);
}

#[test]
fn test_final_update_with_new_text_becomes_response() {
    let events = vec![
        request("root", 0, "User", ORCHESTRATOR, "Search the docs", None),
        text("root", 10, ORCHESTRATOR, "Searching..."),
        final_status("root", 20, ORCHESTRATOR, "Found it."),
        terminal("root", 30, ORCHESTRATOR, "completed", None),
    ];
    let tasks = store(vec![record("root", 0, events)]);
    let task = visualize(&tasks, "root", &VisualizerConfig::default())
        .unwrap()
        .task;

    let responses: Vec<_> = task
        .steps
        .iter()
        .filter(|s| s.step_type() == StepType::AgentResponseText)
        .collect();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].text(), Some("Searching..."));
    assert_eq!(responses[1].text(), Some("Found it."));
    assert!(responses[1].title.contains("Final Update"));
    assert_eq!(responses[1].timestamp, at(20));
}

#[test]
fn test_artifact_update_is_listed_but_not_drawn() {
    let config = VisualizerConfig::default();
    let plain = visualize(
        &store(vec![record("root", 0, single_tool_events())]),
        "root",
        &config,
    )
    .unwrap();

    let mut events = single_tool_events();
    events.push(artifact("root", 55, ORCHESTRATOR, "summary.md", json!(2)));
    let result = visualize(&store(vec![record("root", 0, events)]), "root", &config).unwrap();

    let notifications: Vec<_> = result
        .task
        .steps
        .iter()
        .filter(|s| s.step_type() == StepType::AgentArtifactNotification)
        .collect();
    assert_eq!(notifications.len(), 1);
    let step = notifications[0];
    assert_eq!(step.source, ORCHESTRATOR);
    assert_eq!(step.timestamp, at(55));
    let StepData::AgentArtifactNotification(data) = &step.data else {
        panic!("expected an artifact notification, got {:?}", step.step_type());
    };
    assert_eq!(data.artifact_name, "summary.md");
    assert_eq!(data.version, Some(2));
    assert_eq!(data.mime_type.as_deref(), Some("text/markdown"));
    assert_eq!(data.description.as_deref(), Some("Search summary"));

    assert_eq!(result.flow.nodes.len(), plain.flow.nodes.len());
    assert!(result
        .flow
        .nodes
        .iter()
        .all(|n| n.data.visualizer_step_id.as_deref() != Some(step.id.as_str())));
    assert!(result
        .flow
        .edges
        .iter()
        .all(|e| e.data.visualizer_step_id != step.id));
    assert_flow_integrity(&result.flow);
}

#[test]
fn test_fractional_artifact_version_is_dropped() {
    let events = vec![
        request("root", 0, "User", ORCHESTRATOR, "Write it up", None),
        artifact("root", 10, ORCHESTRATOR, "draft.md", json!(1.5)),
    ];
    let tasks = store(vec![record("root", 0, events)]);
    let task = visualize(&tasks, "root", &VisualizerConfig::default())
        .unwrap()
        .task;

    let version = task.steps.iter().find_map(|s| match &s.data {
        StepData::AgentArtifactNotification(data) => Some(data.version),
        _ => None,
    });
    assert_eq!(version, Some(None));
}

// ─── Layout ─────────────────────────────────────────────────────────────────

#[test]
fn test_nested_delegation_layout() {
    let tasks = nested_delegation_store();
    let result = visualize(&tasks, "root", &VisualizerConfig::default()).unwrap();
    let flow = &result.flow;
    assert_flow_integrity(flow);

    let billing_groups = nodes_labeled(flow, FlowNodeType::Group, "Billing Sub-flow");
    let ledger_groups = nodes_labeled(flow, FlowNodeType::Group, "Ledger Sub-flow");
    assert_eq!(ledger_groups.len(), 1);
    // The delegation, then a continuation receiving Ledger's answer
    assert_eq!(billing_groups.len(), 2);
    assert!(ledger_groups[0].position.x > billing_groups[0].position.x);
    assert!(billing_groups[1].position.y > ledger_groups[0].position.y);

    let billing_peers = nodes_labeled(flow, FlowNodeType::GenericAgentNode, "Billing");
    let ledger_peer = nodes_labeled(flow, FlowNodeType::GenericAgentNode, "Ledger")[0];
    assert!(has_edge(flow, &billing_peers[0].id, &ledger_peer.id));
    assert!(has_edge(flow, &ledger_peer.id, &billing_peers[1].id));

    let orchestrators: Vec<_> = flow.nodes_of_type(FlowNodeType::OrchestratorNode).collect();
    assert_eq!(orchestrators.len(), 2);
    assert!(has_edge(flow, &billing_peers[1].id, &orchestrators[1].id));
    assert!(orchestrators[1].position.y > billing_groups[1].position.y);
}

#[test]
fn test_repeated_peer_return_adds_no_receiver() {
    let mut tasks = nested_delegation_store();
    // The parent also reports the peer's result as its own tool response
    if let Some(root) = tasks.get_mut("root") {
        root.events
            .push(tool_result("root", 210, ORCHESTRATOR, "fc-1", "peer_Billing"));
    }
    let result = visualize(&tasks, "root", &VisualizerConfig::default()).unwrap();

    let returns_for_fc1 = result
        .task
        .steps
        .iter()
        .filter(|s| {
            s.tool_result()
                .is_some_and(|r| r.is_peer_response && r.function_call_id == "fc-1")
        })
        .count();
    assert_eq!(returns_for_fc1, 2);

    let flow = &result.flow;
    assert_flow_integrity(flow);
    let orchestrators: Vec<_> = flow.nodes_of_type(FlowNodeType::OrchestratorNode).collect();
    assert_eq!(orchestrators.len(), 2);

    let billing_peers = nodes_labeled(flow, FlowNodeType::GenericAgentNode, "Billing");
    let returning = billing_peers[1];
    let receivers = flow
        .edges
        .iter()
        .filter(|e| e.source == returning.id)
        .filter_map(|e| flow.node(&e.target))
        .filter(|target| target.node_type == FlowNodeType::OrchestratorNode)
        .count();
    assert_eq!(receivers, 1);
}

#[test]
fn test_parallel_delegation_layout_joins_once() {
    let tasks = parallel_delegation_store();
    let config = VisualizerConfig::default();
    let result = visualize(&tasks, "root", &config).unwrap();
    let flow = &result.flow;
    assert_flow_integrity(flow);

    let groups: Vec<_> = flow.nodes_of_type(FlowNodeType::Group).collect();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].position.y, groups[1].position.y);
    let spacing = groups[1].position.x - groups[0].position.x;
    assert!((spacing - config.layout.parallel_sibling_spacing()).abs() < 1e-9);

    let orchestrators: Vec<_> = flow.nodes_of_type(FlowNodeType::OrchestratorNode).collect();
    assert_eq!(orchestrators.len(), 2);
    let join = orchestrators[1];
    assert!(join.position.y > groups[0].position.y);

    for peer in flow.nodes_of_type(FlowNodeType::GenericAgentNode) {
        assert!(has_edge(flow, &orchestrators[0].id, &peer.id), "no delegation edge to {}", peer.id);
        assert!(has_edge(flow, &peer.id, &join.id), "{} does not feed the join", peer.id);
    }
}

#[test]
fn test_failed_sub_task_marks_peer_node() {
    let mut tasks = nested_delegation_store();
    tasks.remove("sub-2");
    let billing = tasks.get_mut("sub-1").unwrap();
    billing.events = vec![
        request("sub-1", 40, ORCHESTRATOR, "Billing", "Settle", Some(("root", "fc-1"))),
        llm_call("sub-1", 50, "Billing"),
        terminal("sub-1", 200, "Billing", "failed", Some("card declined")),
    ];

    let result = visualize(&tasks, "root", &VisualizerConfig::default()).unwrap();
    let failure = result
        .task
        .steps
        .iter()
        .find(|s| s.step_type() == StepType::TaskFailed)
        .expect("failure step");
    assert_eq!(failure.owning_task_id, "sub-1");
    assert!(failure.is_sub_task_step);
    // The root still completed on its own
    assert_eq!(result.task.status, TaskStatus::Completed);

    let peer = nodes_labeled(&result.flow, FlowNodeType::GenericAgentNode, "Billing")[0];
    assert_eq!(peer.data.status.as_deref(), Some("failed"));
    assert_flow_integrity(&result.flow);
}

#[test]
fn test_layout_is_deterministic_for_same_steps() {
    let tasks = parallel_delegation_store();
    let config = VisualizerConfig::default();
    let task = visualize(&tasks, "root", &config).unwrap().task;

    let first = build_timeline_flow(&task.steps, &config);
    let second = build_timeline_flow(&task.steps, &config);
    assert_eq!(first, second);
    assert!(build_timeline_flow(&[], &config).nodes.is_empty());
}

#[test]
fn test_layout_config_overrides_apply() {
    let config = VisualizerConfig::from_toml_str(
        r#"
        [layout]
        main_lane_x = 500.0
        "#,
    )
    .unwrap();
    let tasks = store(vec![record("root", 0, single_tool_events())]);
    let flow = visualize(&tasks, "root", &config).unwrap().flow;

    let orchestrator = flow.nodes_of_type(FlowNodeType::OrchestratorNode).next().unwrap();
    assert_eq!(orchestrator.position.x, 500.0);
}
