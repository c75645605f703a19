//! Timeline Layout Engine: ordered visualizer steps → positioned nodes and
//! edges for the diagram renderer.
//!
//! The whole layout is rebuilt on every call; the same steps always give
//! the same node ids, positions and edges.

pub mod animation;
pub mod edges;
pub mod handlers;
pub mod layout;
pub mod registry;

use shared_types::{TimelineFlow, VisualizerStep};

use self::layout::LayoutManager;
use crate::config::VisualizerConfig;

pub use self::animation::{EdgeAnimationService, EdgeAnimationState};

pub fn build_timeline_flow(steps: &[VisualizerStep], config: &VisualizerConfig) -> TimelineFlow {
    let mut manager = LayoutManager::new(config);
    for step in steps {
        handlers::handle_step(&mut manager, step);
    }
    let flow = manager.into_flow();

    tracing::debug!(
        steps = steps.len(),
        nodes = flow.nodes.len(),
        edges = flow.edges.len(),
        "Built timeline flow"
    );
    flow
}
