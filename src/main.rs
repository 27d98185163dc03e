use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trellis_engine::{EngineConfig, RunCoordinator, TaskDispatcher};
use trellis_handler::builtin_registry;
use trellis_store::{MemoryStore, SqliteStore, Store};
use trellis_workflow::WorkflowGraph;

/// Trellis - a workflow automation backend
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.trellis)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow or a single node
  Run {
    #[command(subcommand)]
    target: RunTarget,
  },

  /// Inspect recorded workflow runs
  Executions {
    #[command(subcommand)]
    query: ExecutionsQuery,
  },
}

#[derive(Subcommand)]
enum RunTarget {
  /// Run an entire workflow
  Workflow {
    /// Path to the workflow definition (JSON)
    workflow_file: PathBuf,

    /// Run inputs as a JSON object (falls back to stdin)
    #[arg(long)]
    input: Option<String>,

    /// Use an in-memory store instead of sqlite
    #[arg(long)]
    ephemeral: bool,
  },

  /// Run a single node, bypassing graph traversal
  Node {
    /// Path to the workflow definition (JSON)
    workflow_file: PathBuf,

    /// The node id to execute
    #[arg(long)]
    node: String,

    /// Node input as a JSON value (falls back to stdin)
    #[arg(long)]
    input: Option<String>,
  },
}

#[derive(Subcommand)]
enum ExecutionsQuery {
  /// List runs of a workflow, newest first
  List {
    /// The workflow id
    workflow_id: String,
  },

  /// Show one run and its node logs
  Show {
    /// The execution id
    execution_id: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".trellis"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match cli.command {
      Some(Commands::Run { target }) => match target {
        RunTarget::Workflow {
          workflow_file,
          input,
          ephemeral,
        } => run_workflow(workflow_file, input, data_dir, ephemeral).await,
        RunTarget::Node {
          workflow_file,
          node,
          input,
        } => run_node(workflow_file, node, input).await,
      },
      Some(Commands::Executions { query }) => match query {
        ExecutionsQuery::List { workflow_id } => list_executions(workflow_id, data_dir).await,
        ExecutionsQuery::Show { execution_id } => show_execution(execution_id, data_dir).await,
      },
      None => {
        println!("trellis - use --help to see available commands");
        Ok(())
      }
    }
  })
}

async fn open_store(data_dir: &PathBuf) -> Result<Arc<SqliteStore>> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

  let options = SqliteConnectOptions::new()
    .filename(data_dir.join("trellis.db"))
    .create_if_missing(true);
  let pool = SqlitePoolOptions::new()
    .connect_with(options)
    .await
    .context("failed to open sqlite database")?;

  let store = SqliteStore::new(pool);
  store.migrate().await.context("failed to run migrations")?;
  Ok(Arc::new(store))
}

async fn load_workflow(workflow_file: &PathBuf) -> Result<WorkflowGraph> {
  let content = tokio::fs::read_to_string(workflow_file)
    .await
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  let workflow: WorkflowGraph = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))?;

  Ok(workflow)
}

async fn run_workflow(
  workflow_file: PathBuf,
  input: Option<String>,
  data_dir: PathBuf,
  ephemeral: bool,
) -> Result<()> {
  let workflow = load_workflow(&workflow_file).await?;
  info!(workflow = %workflow.name, nodes = workflow.nodes.len(), "workflow loaded");

  let inputs = resolve_input(input)?;

  let store: Arc<dyn Store> = if ephemeral {
    Arc::new(MemoryStore::new())
  } else {
    open_store(&data_dir).await?
  };

  let dispatcher = Arc::new(TaskDispatcher::new(
    builtin_registry(),
    store.clone(),
    EngineConfig::default(),
  ));
  let coordinator = RunCoordinator::new(dispatcher, store);

  let cancel = CancellationToken::new();
  let outcome = coordinator
    .execute(&workflow, inputs, cancel)
    .await
    .context("workflow execution failed")?;

  info!(
    execution_id = %outcome.execution_id,
    status = ?outcome.status,
    nodes = outcome.node_results.len(),
    "execution settled"
  );
  if let Some(reason) = &outcome.error {
    error!(execution_id = %outcome.execution_id, error = %reason, "run did not complete");
  }

  let output: serde_json::Map<String, serde_json::Value> = outcome
    .node_results
    .into_iter()
    .map(|(id, r)| (id, r.output_data))
    .collect();
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

async fn run_node(workflow_file: PathBuf, node_id: String, input: Option<String>) -> Result<()> {
  let workflow = load_workflow(&workflow_file).await?;

  let node = workflow
    .get_node(&node_id)
    .with_context(|| format!("node '{}' not found in workflow", node_id))?;

  info!(node_id, node_type = %node.node_type, "running single node");

  let input = resolve_input(input)?;

  // Single-node runs are debug aids; their logs don't need to outlive the
  // process.
  let store = Arc::new(MemoryStore::new());
  let dispatcher = TaskDispatcher::new(builtin_registry(), store, EngineConfig::default());

  let run_id = uuid::Uuid::new_v4().to_string();
  let result = dispatcher
    .dispatch(node, input, &run_id, 0)
    .await
    .context("node execution failed")?;

  if let Some(reason) = &result.error {
    error!(node_id, error = %reason, "node failed");
  } else {
    info!(node_id, duration_secs = result.duration_secs, "node completed");
  }
  println!("{}", serde_json::to_string_pretty(&result.output_data)?);

  Ok(())
}

async fn list_executions(workflow_id: String, data_dir: PathBuf) -> Result<()> {
  let store = open_store(&data_dir).await?;
  let runs = store.list_runs(&workflow_id).await?;

  if runs.is_empty() {
    eprintln!("No runs recorded for workflow '{}'", workflow_id);
    return Ok(());
  }

  for run in runs {
    println!(
      "{}  {:?}  created {}  {}",
      run.execution_id,
      run.status,
      run.created_at.format("%Y-%m-%d %H:%M:%S"),
      run.error.as_deref().unwrap_or("")
    );
  }

  Ok(())
}

async fn show_execution(execution_id: String, data_dir: PathBuf) -> Result<()> {
  let store = open_store(&data_dir).await?;
  let run = store.get_run(&execution_id).await?;

  println!("Execution:  {}", run.execution_id);
  println!("Workflow:   {}", run.workflow_id);
  println!("Status:     {:?}", run.status);
  println!("Created:    {}", run.created_at);
  if let Some(started) = run.started_at {
    println!("Started:    {}", started);
  }
  if let Some(completed) = run.completed_at {
    println!("Completed:  {}", completed);
  }
  if let Some(error) = &run.error {
    println!("Error:      {}", error);
  }

  let logs = store.list_node_logs(&execution_id).await?;
  println!("\nNode logs ({}):", logs.len());
  for log in logs {
    let duration = log
      .duration_secs
      .map(|d| format!(" {:.3}s", d))
      .unwrap_or_default();
    println!(
      "  {} {:?} {}{}{}",
      log.timestamp.format("%H:%M:%S%.3f"),
      log.status,
      log.node_id,
      duration,
      log.error.map(|e| format!("  {}", e)).unwrap_or_default()
    );
  }

  Ok(())
}

fn resolve_input(input: Option<String>) -> Result<serde_json::Value> {
  match input {
    Some(raw) => serde_json::from_str(&raw).context("failed to parse --input JSON"),
    None => read_payload_from_stdin(),
  }
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read payload from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
    }
  }
}
