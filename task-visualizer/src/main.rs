use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use task_visualizer::flow::EdgeAnimationService;
use task_visualizer::{snapshot, visualize, VisualizerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "task-visualizer",
    version,
    about = "Reconstruct an A2A task from a task-store snapshot and print its steps and timeline diagram as JSON"
)]
struct Args {
    /// Task-store snapshot (`{"tasks": {...}, "taskOrder": [...]}`)
    snapshot: PathBuf,

    #[arg(long, env = "TASK_VISUALIZER_CONFIG", help = "TOML file overriding layout and reconstruction settings")]
    config: Option<PathBuf>,

    #[arg(long, help = "Root task id (default: most recent top-level task)")]
    task: Option<String>,

    #[arg(long, conflicts_with = "flow_only", help = "Print only the visualized task")]
    steps_only: bool,

    #[arg(long, help = "Print only nodes and edges")]
    flow_only: bool,

    #[arg(long, help = "Animate edges as if steps up to this index had been replayed")]
    replay_cursor: Option<usize>,
}

fn load_env_file() {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine current directory for .env lookup");
            return;
        }
    };

    let mut current = cwd.clone();
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            match dotenvy::from_path(&candidate) {
                Ok(_) => tracing::debug!(path = %candidate.display(), "Loaded environment from .env"),
                Err(e) => tracing::warn!(
                    path = %candidate.display(),
                    error = %e,
                    "Failed to load .env file"
                ),
            }
            return;
        }
        if !current.pop() {
            break;
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Before parsing so `.env` can supply TASK_VISUALIZER_CONFIG
    load_env_file();
    let args = Args::parse();

    let config = VisualizerConfig::resolve(args.config.as_deref()).context("loading config")?;
    let state = snapshot::load_snapshot(&args.snapshot)
        .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;
    let root = snapshot::select_root(&state, args.task.as_deref())?;

    tracing::info!(task_id = %root.task_id, tasks = state.tasks.len(), "Visualizing task");
    let mut visualization = visualize(&state.tasks, &root.task_id, &config)
        .with_context(|| format!("task {} could not be visualized", root.task_id))?;

    if let Some(cursor) = args.replay_cursor {
        let service = EdgeAnimationService::new(&visualization.task.steps);
        service.apply(&mut visualization.flow.edges, cursor);
    }

    let output = if args.steps_only {
        serde_json::to_string_pretty(&visualization.task)?
    } else if args.flow_only {
        serde_json::to_string_pretty(&visualization.flow)?
    } else {
        serde_json::to_string_pretty(&visualization)?
    };
    println!("{output}");

    tracing::info!(
        status = visualization.task.status.as_str(),
        steps = visualization.task.steps.len(),
        nodes = visualization.flow.nodes.len(),
        edges = visualization.flow.edges.len(),
        "Done"
    );
    Ok(())
}
