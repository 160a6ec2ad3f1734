//! # RAG Relay CLI (`relay`)
//!
//! Answers a question over retrieved context (database tables, web pages,
//! documents) that may be far larger than one model call can take. Items
//! are split into size-bounded chunks, each chunk is answered separately,
//! and the partial answers are synthesized into one.
//!
//! ## Usage
//!
//! ```bash
//! relay --config ./config/relay.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `relay profiles` | Print the per-model chunk budgets |
//! | `relay sources` | List item sources and their health |
//! | `relay plan` | Show how items would be chunked for a model |
//! | `relay render` | Print the rendered prompt context of a chunk |
//! | `relay ask "<query>"` | Answer a question over the items |
//!
//! ## Examples
//!
//! ```bash
//! # How would 3 MB of documents be split for o1?
//! relay plan --model o1-preview --items retrieved.json
//!
//! # Dry run (`provider = "echo"` in the config)
//! relay ask "What changed in Q3?" --model gpt-4o --items retrieved.json
//!
//! # Full run with extended reasoning, saved as JSON
//! relay ask "Summarize the incidents" --model claude-3-7-sonnet-latest \
//!     --reasoning --output runs/incidents.json
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=rag_relay=debug` for chunk sizes and
//! retry details.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rag_relay::config::{self, Config};
use rag_relay::progress::ProgressMode;
use rag_relay::{ask, plan_cmd, responder, sources};
use rag_relay_core::CancelToken;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// RAG Relay: budget-aware scatter-gather question answering over
/// retrieved tables, pages, and documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means defaults: no item sources and a disabled
/// responder.
#[derive(Parser)]
#[command(
    name = "relay",
    about = "RAG Relay: budget-aware scatter-gather question answering",
    version,
    long_about = "RAG Relay plans retrieved context into chunks that fit a model's budget, \
    asks the question once per chunk, and synthesizes the partial answers into one final answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/relay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the model profile table (prefix, chunk budget, preview sizes).
    Profiles,

    /// List configured item sources and whether they are usable.
    Sources,

    /// Show the chunk plan for a model without calling it.
    Plan {
        /// Model name; selects the budget by prefix. Defaults to `[responder].model`.
        #[arg(long)]
        model: Option<String>,

        /// JSON item manifest; replaces the configured sources.
        #[arg(long)]
        items: Option<PathBuf>,

        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the rendered prompt context of one chunk, or of all chunks.
    Render {
        /// Model name; selects the budget and preview sizes.
        #[arg(long)]
        model: Option<String>,

        /// JSON item manifest; replaces the configured sources.
        #[arg(long)]
        items: Option<PathBuf>,

        /// 1-based chunk number. All chunks when omitted.
        #[arg(long)]
        chunk: Option<usize>,
    },

    /// Answer a question over the items.
    ///
    /// Uses one request when the items fit the model's budget, otherwise
    /// one request per chunk plus a synthesis request. Ctrl-C cancels the
    /// run.
    Ask {
        /// The question.
        query: String,

        /// Model name. Defaults to `[responder].model`.
        #[arg(long)]
        model: Option<String>,

        /// JSON item manifest; replaces the configured sources.
        #[arg(long)]
        items: Option<PathBuf>,

        /// Request extended reasoning for the final answer.
        #[arg(long)]
        reasoning: bool,

        /// Print the full run as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Also write the JSON export to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress on stderr: `auto`, `off`, `human`, or `json`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },
}

fn resolve_model(cli_model: Option<String>, cfg: &Config) -> Result<String> {
    cli_model
        .or_else(|| cfg.responder.model.clone())
        .ok_or_else(|| anyhow!("No model given. Pass --model or set [responder].model."))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Profiles = cli.command {
        return plan_cmd::run_profiles();
    }

    let cfg = config::load_config_or_minimal(&cli.config)?;

    match cli.command {
        Commands::Profiles => unreachable!(),
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Plan { model, items, json } => {
            let model = resolve_model(model, &cfg)?;
            let items = sources::collect_items(&cfg, items.as_deref())?;
            plan_cmd::run_plan(&items, &model, json)?;
        }
        Commands::Render {
            model,
            items,
            chunk,
        } => {
            let model = resolve_model(model, &cfg)?;
            let items = sources::collect_items(&cfg, items.as_deref())?;
            plan_cmd::run_render(&items, &model, chunk)?;
        }
        Commands::Ask {
            query,
            model,
            items,
            reasoning,
            json,
            output,
            progress,
        } => {
            let model = resolve_model(model, &cfg)?;
            let items = sources::collect_items(&cfg, items.as_deref())?;
            let responder: Arc<dyn rag_relay_core::Responder> =
                Arc::from(responder::create_responder(&cfg.responder)?);

            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancelling...");
                    on_interrupt.cancel();
                }
            });

            let opts = ask::AskOptions {
                model: &model,
                reasoning,
                json,
                output: output.as_deref(),
                progress: ProgressMode::parse(&progress)?,
                cancel,
            };
            ask::run_ask(&cfg, responder, &query, &items, opts).await?;
        }
    }

    Ok(())
}
