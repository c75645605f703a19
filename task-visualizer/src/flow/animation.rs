//! Edge animation during step replay.
//!
//! A request edge (agent → LLM, agent → tool/peer) animates from the moment
//! its step is replayed until the step that answers it has been replayed.

use std::collections::HashMap;

use shared_types::{EdgeAnimationType, FlowEdge, StepType, VisualizerStep};

pub fn is_request_step(step: &VisualizerStep) -> bool {
    matches!(
        step.step_type(),
        StepType::AgentLlmCall | StepType::AgentToolInvocationStart
    )
}

fn is_response_step(step: &VisualizerStep) -> bool {
    matches!(
        step.step_type(),
        StepType::AgentLlmResponseToAgent
            | StepType::AgentLlmResponseToolDecision
            | StepType::AgentToolExecutionResult
    )
}

/// Whether `candidate` answers the request made by `request`
fn answers(request: &VisualizerStep, candidate: &VisualizerStep) -> bool {
    match request.step_type() {
        StepType::AgentToolInvocationStart => {
            let Some(invocation) = request.tool_invocation() else {
                return false;
            };
            candidate
                .tool_result()
                .is_some_and(|result| result.function_call_id == invocation.function_call_id)
        }
        StepType::AgentLlmCall => {
            matches!(
                candidate.step_type(),
                StepType::AgentLlmResponseToAgent | StepType::AgentLlmResponseToolDecision
            ) && candidate.owning_task_id == request.owning_task_id
                && candidate.target == request.source
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeAnimationState {
    pub is_animated: bool,
    pub animation_type: EdgeAnimationType,
}

impl EdgeAnimationState {
    const STATIC: Self = Self {
        is_animated: false,
        animation_type: EdgeAnimationType::Static,
    };
}

/// Answers "which edges move at replay position N" for one step list
pub struct EdgeAnimationService<'a> {
    steps: &'a [VisualizerStep],
    index_by_id: HashMap<&'a str, usize>,
    /// Request step index → index of the step answering it
    answered_at: HashMap<usize, usize>,
}

impl<'a> EdgeAnimationService<'a> {
    pub fn new(steps: &'a [VisualizerStep]) -> Self {
        let index_by_id = steps
            .iter()
            .enumerate()
            .map(|(index, step)| (step.id.as_str(), index))
            .collect();

        let answered_at = steps
            .iter()
            .enumerate()
            .filter(|(_, step)| is_request_step(step))
            .filter_map(|(index, request)| {
                steps[index + 1..]
                    .iter()
                    .position(|candidate| answers(request, candidate))
                    .map(|offset| (index, index + 1 + offset))
            })
            .collect();

        Self {
            steps,
            index_by_id,
            answered_at,
        }
    }

    /// State of `edge` once steps `0..=cursor` have been replayed
    pub fn state_at(&self, edge: &FlowEdge, cursor: usize) -> EdgeAnimationState {
        let Some(&index) = self.index_by_id.get(edge.data.visualizer_step_id.as_str()) else {
            return EdgeAnimationState::STATIC;
        };
        if index > cursor {
            return EdgeAnimationState::STATIC;
        }

        let step = &self.steps[index];
        if is_request_step(step) {
            let pending = self
                .answered_at
                .get(&index)
                .map_or(true, |&answer| answer > cursor);
            return EdgeAnimationState {
                is_animated: pending,
                animation_type: EdgeAnimationType::Request,
            };
        }
        if is_response_step(step) && index == cursor {
            return EdgeAnimationState {
                is_animated: true,
                animation_type: EdgeAnimationType::Response,
            };
        }
        EdgeAnimationState::STATIC
    }

    pub fn apply(&self, edges: &mut [FlowEdge], cursor: usize) {
        for edge in edges.iter_mut() {
            let state = self.state_at(edge, cursor);
            edge.data.is_animated = state.is_animated;
            edge.data.animation_type = state.animation_type;
        }
    }
}
