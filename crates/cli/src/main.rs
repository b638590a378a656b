//! context-engine CLI - filesystem indexing and hybrid search over a local
//! codebase.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use context_engine::Engine;

mod commands;
mod config;
mod logging;

use commands::{cmd_index, cmd_query, cmd_rebuild, cmd_stats, cmd_watch};

#[derive(Parser)]
#[command(name = "context-engine")]
#[command(about = "Local filesystem indexer and hybrid code search engine")]
struct Cli {
  /// Path to a context-engine.toml config file. Defaults to
  /// `./context-engine.toml` if present, otherwise built-in defaults rooted
  /// at the current directory.
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Enumerate changes since the last index and index them.
  Index,
  /// Watch the configured roots and index changes as they happen.
  Watch,
  /// Run a hybrid search query against the index.
  Query {
    query: String,
    #[arg(short, long)]
    k: Option<usize>,
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long = "path")]
    paths: Vec<String>,
    #[arg(long = "language")]
    languages: Vec<String>,
    #[arg(long = "kind")]
    kinds: Vec<String>,
    #[arg(long)]
    json: bool,
  },
  /// Print index statistics (file, chunk and embedding counts).
  Stats {
    #[arg(long)]
    json: bool,
  },
  /// Clear stored progress and re-index everything from scratch.
  Rebuild {
    #[arg(long)]
    yes: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  logging::init_cli_logging();
  let cli = Cli::parse();
  let cwd = std::env::current_dir()?;
  let config = config::load(cli.config.as_deref(), &cwd)?;
  let engine = Arc::new(Engine::open(config).await?);

  match cli.command {
    Commands::Index => cmd_index(engine).await,
    Commands::Watch => cmd_watch(engine).await,
    Commands::Query { query, k, max_tokens, paths, languages, kinds, json } => {
      cmd_query(engine, query, k, max_tokens, paths, languages, kinds, json).await
    }
    Commands::Stats { json } => cmd_stats(engine, json).await,
    Commands::Rebuild { yes } => cmd_rebuild(engine, yes).await,
  }
}
