use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stately_definition::{StateMachineDefinition, validate};
use stately_engine::{EngineConfig, ExecutionService};
use stately_runtime::{ExecutionStatus, MockTaskExecutor};
use stately_store::{MemoryStore, SqliteStore, Store};

/// Stately - an Amazon States Language interpreter
#[derive(Parser)]
#[command(name = "stately")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.stately)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a state machine definition and report every problem
  Validate {
    /// Path to the definition (ASL JSON)
    definition_file: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
  },

  /// Parse a definition and print it back as ASL JSON
  Render {
    /// Path to the definition (ASL JSON)
    definition_file: PathBuf,
  },

  /// Run a state machine with input read from stdin
  Run {
    /// Path to the definition (ASL JSON)
    definition_file: PathBuf,

    /// Scripted task responses, keyed by resource (JSON)
    #[arg(long)]
    mocks: Option<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Execution name (default: a UUID)
    #[arg(long)]
    name: Option<String>,

    /// Print the execution history along with the result
    #[arg(long)]
    history: bool,

    /// Record the execution in the data directory
    #[arg(long)]
    persist: bool,
  },

  /// Print the recorded history of an execution
  History {
    /// The execution ID, e.g. `orders:run-1`
    execution_id: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".stately"),
  };

  match cli.command {
    Some(Commands::Validate {
      definition_file,
      config,
    }) => validate_definition(&definition_file, config.as_deref())?,
    Some(Commands::Render { definition_file }) => render_definition(&definition_file)?,
    Some(Commands::Run {
      definition_file,
      mocks,
      config,
      name,
      history,
      persist,
    }) => {
      let options = RunOptions {
        definition_file,
        mocks,
        config,
        name,
        history,
        persist,
        data_dir,
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_state_machine(options))?;
    }
    Some(Commands::History { execution_id }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(print_history(&execution_id, &data_dir))?;
    }
    None => {
      println!("stately - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_definition(path: &Path) -> Result<StateMachineDefinition> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read definition file: {}", path.display()))?;
  StateMachineDefinition::from_json(&content)
    .with_context(|| format!("failed to parse definition file: {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
  let Some(path) = path else {
    return Ok(EngineConfig::default());
  };
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read config file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse config file: {}", path.display()))
}

fn validate_definition(path: &Path, config: Option<&Path>) -> Result<()> {
  let definition = load_definition(path)?;
  let config = load_config(config)?;

  let errors = validate(&definition, &config.runtime.validation);
  if errors.is_empty() {
    println!("{}: valid", path.display());
    return Ok(());
  }
  for error in &errors {
    println!("{error}");
  }
  bail!("{} problem(s) found in {}", errors.len(), path.display());
}

fn render_definition(path: &Path) -> Result<()> {
  let definition = load_definition(path)?;
  println!("{}", definition.render()?);
  Ok(())
}

struct RunOptions {
  definition_file: PathBuf,
  mocks: Option<PathBuf>,
  config: Option<PathBuf>,
  name: Option<String>,
  history: bool,
  persist: bool,
  data_dir: PathBuf,
}

async fn run_state_machine(options: RunOptions) -> Result<()> {
  let definition = load_definition(&options.definition_file)?;
  let config = load_config(options.config.as_deref())?;
  let input = read_input_from_stdin()?;

  let store: Arc<dyn Store> = if options.persist {
    Arc::new(open_store(&options.data_dir).await?)
  } else {
    Arc::new(MemoryStore::new())
  };
  let service = ExecutionService::new(store, config);

  let executor = match &options.mocks {
    Some(path) => {
      let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read mocks file: {}", path.display()))?;
      let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse mocks file: {}", path.display()))?;
      MockTaskExecutor::from_json(value)
        .with_context(|| format!("invalid mocks file: {}", path.display()))?
    }
    None => MockTaskExecutor::new(),
  }
  .with_callbacks(service.tokens().clone());

  let machine_name = options
    .definition_file
    .file_stem()
    .and_then(|stem| stem.to_str())
    .unwrap_or("state-machine")
    .to_string();
  let arn = service
    .register_state_machine(machine_name, definition, Arc::new(executor))
    .context("failed to register state machine")?;

  let execution_id = service
    .start_execution(&arn, input, options.name)
    .await
    .context("failed to start execution")?;
  eprintln!("Started execution: {execution_id}");

  let description = tokio::select! {
    description = service.wait_for_execution(&execution_id) => description?,
    _ = tokio::signal::ctrl_c() => {
      service
        .stop_execution(&execution_id, Some("Interrupted".to_string()), None)
        .await?;
      service.wait_for_execution(&execution_id).await?
    }
  };

  let output = if options.history {
    let history = service.get_execution_history(&execution_id).await?;
    serde_json::json!({"execution": description, "history": history})
  } else {
    serde_json::to_value(&description)?
  };
  println!("{}", serde_json::to_string_pretty(&output)?);

  if description.status != ExecutionStatus::Succeeded {
    bail!(
      "execution {} ended {}",
      execution_id,
      description.status.as_str()
    );
  }
  Ok(())
}

async fn open_store(data_dir: &Path) -> Result<SqliteStore> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
  let path = data_dir.join("stately.db");
  SqliteStore::open(&path)
    .await
    .with_context(|| format!("failed to open store: {}", path.display()))
}

async fn print_history(execution_id: &str, data_dir: &Path) -> Result<()> {
  let store = open_store(data_dir).await?;
  let entries = store
    .get_history(execution_id)
    .await
    .context("failed to read history")?;
  if entries.is_empty() {
    store
      .get_execution(execution_id)
      .await
      .with_context(|| format!("execution '{execution_id}' not found"))?;
  }

  let events: Vec<serde_json::Value> = entries.into_iter().map(|entry| entry.details.0).collect();
  println!("{}", serde_json::to_string_pretty(&events)?);
  Ok(())
}

fn read_input_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    Ok(serde_json::json!({}))
  } else {
    let mut input = String::new();
    io::stdin()
      .read_to_string(&mut input)
      .context("failed to read input from stdin")?;

    if input.trim().is_empty() {
      Ok(serde_json::json!({}))
    } else {
      serde_json::from_str(&input).context("failed to parse input JSON from stdin")
    }
  }
}
