//! `taskweave` command-line front end.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use taskweave_core::TaskweaveError;
use taskweave_orchestrator::{
    EchoInvoker, RunStatus, WorkflowConfig, WorkflowDriver, WorkflowPlan, WorkflowRun,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskweave", about = "Taskweave — dependency-aware workflow scheduler")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "taskweave.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a plan file for unknown dependencies and cycles
    Validate {
        /// Plan file (TOML)
        plan: PathBuf,
    },
    /// Print the dependency layers of a plan
    Plan {
        /// Plan file (TOML)
        plan: PathBuf,
    },
    /// Execute a plan with the local echo invoker
    Run {
        /// Plan file (TOML)
        plan: PathBuf,
        /// Maximum tasks per batch (overrides config)
        #[arg(short, long)]
        width: Option<usize>,
        /// Per-task timeout in milliseconds (overrides config)
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Simulated latency of each echo invocation in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },
}

/// Load `[workflow]` settings, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<WorkflowConfig, TaskweaveError> {
    if path.exists() {
        WorkflowConfig::from_file(path)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(WorkflowConfig::default())
    }
}

fn apply_overrides(
    mut config: WorkflowConfig,
    width: Option<usize>,
    timeout_ms: Option<u64>,
) -> Result<WorkflowConfig, TaskweaveError> {
    if let Some(width) = width {
        config.max_parallel_width = width;
    }
    if timeout_ms.is_some() {
        config.task_timeout_ms = timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

fn load_run(plan: &Path, width: usize) -> Result<WorkflowRun, TaskweaveError> {
    WorkflowPlan::from_file(plan)?.into_run(width)
}

/// Render the dependency layers of `run` as indented text.
fn render_layers(run: &WorkflowRun) -> Result<String, TaskweaveError> {
    let registry = run.registry();
    let mut out = String::new();
    for (i, layer) in registry.topological_layers()?.iter().enumerate() {
        out.push_str(&format!("layer {i}:\n"));
        for id in layer {
            if let Some(task) = registry.get(*id) {
                out.push_str(&format!(
                    "  - {} ({}, {})\n",
                    task.name, task.kind, task.priority
                ));
            }
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Validate { plan } => {
            let run = load_run(&plan, config.max_parallel_width)?;
            let layers = run.registry().topological_layers()?;
            println!(
                "{}: {} task(s), {} layer(s), OK",
                plan.display(),
                run.registry().total_count(),
                layers.len()
            );
        }
        Commands::Plan { plan } => {
            let run = load_run(&plan, config.max_parallel_width)?;
            print!("{}", render_layers(&run)?);
        }
        Commands::Run {
            plan,
            width,
            timeout_ms,
            latency_ms,
        } => {
            let config = apply_overrides(config, width, timeout_ms)?;
            let invoker =
                EchoInvoker::default().with_latency(Duration::from_millis(latency_ms));
            let driver = WorkflowDriver::new(Arc::new(invoker), config)?;
            let mut run = load_run(&plan, driver.config().max_parallel_width)?;

            info!(plan = %plan.display(), run_id = %run.id(), "Running workflow plan");
            let result = driver.run(&mut run).await;

            println!(
                "{}",
                serde_json::to_string_pretty(&driver.monitor().to_json().await)?
            );
            match result {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    if report.status != RunStatus::Completed {
                        anyhow::bail!(report.summary);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Workflow did not finish");
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
