use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::BufReader;

use reasoning::cli::commands;
use reasoning::config::{Config, StoreBackend};
use reasoning::pipeline::GenerateRequest;

#[derive(Parser)]
#[command(name = "reasoning")]
#[command(
  about = "Reasoning - Scientific Reasoning Chain Generator\nRetrieves similar studies and drafts a new experimental reasoning chain"
)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), ", courtesy of Kernelle Software"))]
struct Cli {
  /// YAML configuration file
  #[arg(long, global = true, env = "REASONING_CONFIG")]
  config: Option<PathBuf>,

  /// Vector store location (overrides configuration)
  #[arg(long, global = true)]
  store: Option<PathBuf>,

  /// Vector store backend: lancedb or memory
  #[arg(long, global = true)]
  backend: Option<StoreBackend>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Generate a reasoning chain for a research question
  Generate {
    /// The research question
    #[arg(required_unless_present = "interactive", conflicts_with = "interactive")]
    question: Option<String>,
    /// Keep asking for questions on stdin until 'quit'
    #[arg(short, long)]
    interactive: bool,
    /// Number of reference studies to retrieve
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
    /// Generation model to use
    #[arg(short, long)]
    model: Option<String>,
    /// Sampling temperature in [0, 1]
    #[arg(short, long)]
    temperature: Option<f32>,
    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
  },
  /// Embed a JSONL corpus of reasoning chains into the vector store
  Index {
    /// Corpus file, one reasoning chain per line
    corpus: PathBuf,
    /// Discard the existing store first
    #[arg(long)]
    reset: bool,
    /// Embedding requests in flight at once
    #[arg(short, long)]
    concurrency: Option<usize>,
  },
  /// Show the number of records in the vector store
  Count,
}

fn load_config(cli: &Cli) -> Result<Config> {
  let mut config = Config::load(cli.config.as_deref())?;
  if let Some(store) = &cli.store {
    config.store_path = store.clone();
  }
  if let Some(backend) = cli.backend {
    config.store_backend = backend;
  }
  Ok(config)
}

async fn handle(command: Command, mut config: Config) -> Result<bool> {
  match command {
    Command::Generate { question, interactive, top_k, model, temperature, json } => {
      if let Some(temperature) = temperature {
        config.temperature = temperature;
        config.validate()?;
      }
      let request = GenerateRequest { question: question.unwrap_or_default(), top_k, model };
      if interactive {
        let stdin = BufReader::new(tokio::io::stdin());
        commands::generate_interactive(&config, request, json, stdin).await?;
        return Ok(true);
      }
      commands::generate(&config, request, json).await
    }
    Command::Index { corpus, reset, concurrency } => {
      commands::index(&config, &corpus, reset, concurrency).await?;
      Ok(true)
    }
    Command::Count => {
      commands::count(&config).await?;
      Ok(true)
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  bentley::init(cli.verbose);

  let config = load_config(&cli)?;
  if !handle(cli.command, config).await? {
    std::process::exit(1);
  }
  Ok(())
}
