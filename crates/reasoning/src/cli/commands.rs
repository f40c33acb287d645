use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::cli::display::{render_chain, render_failure, render_index_report};
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::index::{build_index, load_corpus, IndexReport};
use crate::pipeline::{GenerateRequest, Outcome, Pipeline};
use crate::store::{open_store, VectorStore};

/// Generate a reasoning chain and print it. Returns whether generation succeeded.
pub async fn generate(config: &Config, request: GenerateRequest, json: bool) -> Result<bool> {
  let pipeline = open_pipeline(config).await?;

  let outcome = pipeline.run(request).await;
  print_outcome(&outcome, json)?;
  Ok(outcome.is_success())
}

/// Answer questions read line by line from `input` until `quit` or end of
/// input. `template` supplies `top_k` and `model` for every question. Returns
/// how many questions were answered or failed.
pub async fn generate_interactive<R>(
  config: &Config,
  template: GenerateRequest,
  json: bool,
  input: R,
) -> Result<usize>
where
  R: AsyncBufRead + Unpin,
{
  let pipeline = open_pipeline(config).await?;
  bentley::announce("Scientific Reasoning Chain Generator");
  bentley::log("Enter a research question to draft a reasoning chain ('quit' to exit)");

  let mut lines = input.lines();
  let mut asked = 0;
  loop {
    eprint!("\n>>> Research question: ");
    let Some(line) = lines.next_line().await.context("failed to read question")? else {
      break;
    };

    let question = line.trim();
    if question.is_empty() {
      continue;
    }
    if is_quit(question) {
      break;
    }

    asked += 1;
    let request = GenerateRequest { question: question.to_string(), ..template.clone() };
    let outcome = pipeline.run(request).await;
    print_outcome(&outcome, json)?;
  }

  eprintln!();
  bentley::info!("questions asked this session: {asked}");
  Ok(asked)
}

fn is_quit(input: &str) -> bool {
  matches!(input.to_lowercase().as_str(), "quit" | "exit")
}

async fn open_pipeline(config: &Config) -> Result<Pipeline> {
  let store: Arc<dyn VectorStore> = Arc::from(open_store(config, false).await?);
  Ok(Pipeline::from_config(config, store)?)
}

fn print_outcome(outcome: &Outcome, json: bool) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(outcome).context("failed to encode outcome")?);
    return Ok(());
  }

  match outcome {
    Outcome::Done(generated) => {
      bentley::announce("Scientific Reasoning Chain");
      print!("{}", render_chain(generated));
    }
    Outcome::Failed(report) => bentley::fail(&render_failure(report)),
  }
  Ok(())
}

/// Build (or extend) the vector store from a JSONL corpus.
pub async fn index(
  config: &Config,
  corpus: &Path,
  reset: bool,
  concurrency: Option<usize>,
) -> Result<IndexReport> {
  let entries = load_corpus(corpus)?;
  bentley::info!("loaded {} corpus entries from {}", entries.len(), corpus.display());

  let embedder = EmbeddingClient::from_config(config)?;
  let mut store = open_store(config, reset).await?;
  let concurrency = concurrency.unwrap_or(config.index_concurrency);

  let report = build_index(&entries, &embedder, store.as_mut(), concurrency).await?;
  bentley::success(&render_index_report(&report));
  Ok(report)
}

/// Print how many records the store holds.
pub async fn count(config: &Config) -> Result<usize> {
  let store = open_store(config, false).await?;
  let records = store.len().await?;
  println!("{records}");
  Ok(records)
}
