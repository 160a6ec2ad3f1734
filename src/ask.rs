//! `relay ask`: answer a question over the retrieved items.
//!
//! Runs the chunked pipeline (or a single request when the items fit one
//! chunk) and prints the answer, or a JSON export of the whole run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rag_relay_core::{answer, Answer, CancelToken, Responder, RetrievableItem, RunOptions};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::Config;
use crate::progress::ProgressMode;

/// One complete run, as written by `--json` / `--output`.
#[derive(Debug, Serialize)]
pub struct AskExport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub responder: String,
    pub query: String,
    pub item_count: usize,
    pub elapsed_secs: f64,
    pub answer: Answer,
}

pub struct AskOptions<'a> {
    pub model: &'a str,
    pub reasoning: bool,
    pub json: bool,
    pub output: Option<&'a Path>,
    pub progress: ProgressMode,
    pub cancel: CancelToken,
}

/// Answer `query` and build the export record.
pub async fn ask(
    config: &Config,
    responder: &dyn Responder,
    query: &str,
    items: &[RetrievableItem],
    opts: &AskOptions<'_>,
) -> Result<AskExport> {
    let run_options = RunOptions {
        enable_reasoning: opts.reasoning || config.relay.enable_reasoning,
        max_concurrency: config.relay.max_concurrency,
        progress: opts.progress.reporter(),
        cancel: opts.cancel.clone(),
    };

    let started = Instant::now();
    let result = answer(query, items, opts.model, responder, &run_options)
        .await
        .context("relay run failed")?;

    Ok(AskExport {
        run_id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        model: opts.model.to_string(),
        responder: responder.name().to_string(),
        query: query.to_string(),
        item_count: items.len(),
        elapsed_secs: started.elapsed().as_secs_f64(),
        answer: result,
    })
}

pub async fn run_ask(
    config: &Config,
    responder: Arc<dyn Responder>,
    query: &str,
    items: &[RetrievableItem],
    opts: AskOptions<'_>,
) -> Result<()> {
    let export = ask(config, responder.as_ref(), query, items, &opts).await?;

    if let Some(path) = opts.output {
        write_export(&export, path)?;
        eprintln!("Wrote run {} to {}", export.run_id, path.display());
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&export)?);
    } else {
        print!("{}", format_answer(&export));
    }
    Ok(())
}

pub fn write_export(export: &AskExport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(export)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

/// Human-readable rendering of an answer for the terminal.
pub fn format_answer(export: &AskExport) -> String {
    let answer = &export.answer;
    let mut out = String::new();

    if let Some(reasoning) = answer.reasoning() {
        out.push_str("── reasoning ──\n");
        out.push_str(reasoning.trim());
        out.push_str("\n\n");
    }

    out.push_str(answer.content().trim_end());
    out.push('\n');

    let sources = answer.sources();
    if !sources.is_empty() {
        out.push_str("\n── sources ──\n");
        for source in sources {
            out.push_str(&format!("- {}: {}\n", source.display_name, source.detail_text));
        }
    }

    let mode = match answer {
        Answer::Chunked(_) => format!("{} chunks", answer.chunk_count()),
        Answer::Direct(_) => "single request".to_string(),
    };
    out.push_str(&format!(
        "\n{} · {} · {} items · {:.1}s\n",
        export.model, mode, export.item_count, export.elapsed_secs
    ));
    out
}
