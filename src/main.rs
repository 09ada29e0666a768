#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use reagent::agent::AgentLoop;
use reagent::config::Config;
use reagent::llm::OllamaGenerator;
use reagent::tools::{InMemoryStore, Toolkit};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a careful research assistant. Think step by step and use the \
available tools when they help answer the question. When you have enough \
information, answer directly.";

#[derive(Parser)]
#[command(
    name = "reagent",
    about = "Bounded, cancellable ReAct tool loop for local language models"
)]
struct Cli {
    /// Question to answer; omit for interactive mode.
    query: Option<String>,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Generator endpoint, e.g. http://localhost:11434
    #[arg(long)]
    base_url: Option<String>,

    /// Model name passed to the generator.
    #[arg(long)]
    model: Option<String>,

    /// Print the serialized step ledger after each run.
    #[arg(long)]
    trace: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = cli.base_url {
        config.provider.base_url = base_url;
    }
    if let Some(model) = cli.model {
        config.provider.model = model;
    }

    let generator = Arc::new(OllamaGenerator::new(
        &config.provider.base_url,
        &config.provider.model,
        config.provider.temperature,
    ));

    // Memory is the one capability wired in-process; search and code
    // execution backends are injected by embedding applications.
    let store = Arc::new(InMemoryStore::new());
    let toolkit = Arc::new(
        Toolkit::new()
            .with_memory_save(store.clone())
            .with_memory_recall(store),
    );

    let agent = AgentLoop::with_limits(generator, toolkit, &config.limits);

    if let Some(query) = cli.query {
        let answer = agent.run(&query, DEFAULT_SYSTEM_PROMPT).await;
        println!("{answer}");
        if cli.trace {
            print_trace(&agent)?;
        }
        return Ok(());
    }

    println!("reagent interactive mode. Type /quit to exit.\n");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "/quit" {
            break;
        }
        let answer = agent.run(query, DEFAULT_SYSTEM_PROMPT).await;
        println!("\n{answer}\n");
        if cli.trace {
            print_trace(&agent)?;
        }
    }

    Ok(())
}

fn print_trace(agent: &AgentLoop) -> Result<()> {
    let snapshot = agent.snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
