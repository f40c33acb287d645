//! Reasoning REST Server
//!
//! HTTP API over the reasoning chain generation pipeline.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use reasoning::config::Config;
use reasoning::server::startup::start_server;

#[derive(Parser)]
#[command(name = "reasoning_server")]
#[command(about = "Reasoning REST API Server")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), ", courtesy of Kernelle Software"))]
struct Args {
  /// Server bind address
  #[arg(long, default_value = "127.0.0.1:3000")]
  bind: SocketAddr,

  /// YAML configuration file
  #[arg(long, env = "REASONING_CONFIG")]
  config: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  bentley::init(args.verbose);

  let config = Config::load(args.config.as_deref())?;

  bentley::info!("starting Reasoning REST Server v{}", env!("CARGO_PKG_VERSION"));
  bentley::info!("binding to address: {}", args.bind);

  start_server(args.bind, config).await
}
