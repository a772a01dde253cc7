use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use runlog_config::{REPO_PATH_ENV, StorageConfig};
use runlog_store::{Namespace, OutputManager, StoreContext};

/// Runlog - inspect persisted execution output
#[derive(Parser)]
#[command(name = "runlog")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Project repository path (default: $RUNLOG_REPO_PATH or ~/.runlog/default_repo)
  #[arg(long, global = true)]
  repo_path: Option<PathBuf>,

  /// Variables root (default: $RUNLOG_VARIABLES_DIR or the repo path)
  #[arg(long, global = true)]
  variables_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// List executions of an environment
  List {
    #[command(flatten)]
    target: EnvironmentArgs,

    /// Maximum number of executions to show
    #[arg(long)]
    limit: Option<usize>,
  },

  /// Print one execution as JSON
  Show {
    #[command(flatten)]
    target: EnvironmentArgs,

    /// Execution id
    execution: String,
  },

  /// Delete one execution
  Delete {
    #[command(flatten)]
    target: EnvironmentArgs,

    /// Execution id
    execution: String,

    /// Only delete when the execution directory is empty
    #[arg(long)]
    if_empty: bool,
  },
}

#[derive(clap::Args)]
struct EnvironmentArgs {
  /// Environment type (e.g. code, pipeline)
  environment_type: String,

  /// Environment id
  environment_uuid: String,

  /// Output path relative to the variables root (default: the repo name)
  #[arg(long)]
  path: Option<String>,
}

impl EnvironmentArgs {
  fn namespace(&self) -> Namespace {
    Namespace::new(self.environment_type.clone(), self.environment_uuid.clone())
  }

  fn output_path(&self, config: &StorageConfig) -> String {
    self
      .path
      .clone()
      .unwrap_or_else(|| config.default_output_path())
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let config = storage_config(cli.repo_path, cli.variables_dir, |name| {
    std::env::var(name).ok()
  })?;

  let Some(command) = cli.command else {
    println!("runlog - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(run(command, config))
}

/// Resolve storage settings: flags first, then `RUNLOG_*` variables, then
/// the home directory default.
fn storage_config<F>(
  repo_path: Option<PathBuf>,
  variables_dir: Option<PathBuf>,
  lookup: F,
) -> Result<StorageConfig>
where
  F: Fn(&str) -> Option<String>,
{
  let repo_path = repo_path.map(|p| p.to_string_lossy().into_owned());
  let mut config = StorageConfig::from_lookup(|name| match (name, &repo_path) {
    (REPO_PATH_ENV, Some(path)) => Some(path.clone()),
    _ => lookup(name),
  })
  .context("failed to load storage config")?;

  if let Some(variables_dir) = variables_dir {
    config.variables_dir = variables_dir;
  }
  Ok(config)
}

async fn run(command: Commands, config: StorageConfig) -> Result<()> {
  debug!(
    repo_path = %config.repo_path.display(),
    variables_dir = %config.variables_dir.display(),
    "resolved storage config"
  );
  let ctx = StoreContext::from_config(config);

  match command {
    Commands::List { target, limit } => {
      let path = target.output_path(ctx.config());
      let namespace = target.namespace();
      let outputs = OutputManager::load_with_messages(&ctx, &path, &namespace, limit)
        .await
        .with_context(|| format!("failed to list executions of {}", namespace))?;

      if outputs.is_empty() {
        eprintln!("No executions found for {}", namespace);
      }
      for output in outputs {
        match output {
          Ok(output) => println!("{}\t{} messages", output.uuid(), output.messages().len()),
          Err(e) => println!("<error>\t{:#}", anyhow::Error::new(e)),
        }
      }
    }
    Commands::Show { target, execution } => {
      let manager = OutputManager::new(
        ctx.clone(),
        target.output_path(ctx.config()),
        target.namespace(),
        execution,
      )?;
      let output = manager
        .build_output()
        .await
        .with_context(|| format!("failed to read {}", manager.absolute_path().display()))?;
      println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Commands::Delete {
      target,
      execution,
      if_empty,
    } => {
      let manager = OutputManager::new(
        ctx.clone(),
        target.output_path(ctx.config()),
        target.namespace(),
        execution,
      )?;
      manager
        .delete(if_empty)
        .await
        .with_context(|| format!("failed to delete {}", manager.absolute_path().display()))?;
      eprintln!("Deleted {}", manager.absolute_path().display());
    }
  }

  Ok(())
}
