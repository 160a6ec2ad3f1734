//! Chunked-run progress on stderr.
//!
//! `relay ask` reports which chunk is in flight so users can follow a long
//! multi-call run. Progress goes to **stderr** so stdout stays parseable.

use rag_relay_core::progress::{ChunkProgressEvent, NoProgress, ProgressReporter};
use rag_relay_core::render::format_number;
use std::io::Write;
use std::sync::Arc;

/// Human-friendly progress: "relay  chunk 2 / 5  answering".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ChunkProgressEvent) {
        let line = human_line(&event);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

fn human_line(event: &ChunkProgressEvent) -> String {
    match event {
        ChunkProgressEvent::Planned {
            chunk_count,
            item_count,
        } => format!(
            "relay  {} items split into {} chunks\n",
            format_number(*item_count as u64),
            chunk_count
        ),
        ChunkProgressEvent::ChunkStarted { index, total } => {
            format!("relay  chunk {} / {}  answering\n", index, total)
        }
        ChunkProgressEvent::ChunkCompleted { index, total } => {
            format!("relay  chunk {} / {}  done\n", index, total)
        }
        ChunkProgressEvent::Synthesizing { total } => {
            format!("relay  synthesizing {} partial answers\n", total)
        }
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ChunkProgressEvent) {
        let obj = json_event(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn json_event(event: &ChunkProgressEvent) -> serde_json::Value {
    match event {
        ChunkProgressEvent::Planned {
            chunk_count,
            item_count,
        } => serde_json::json!({
            "event": "progress",
            "phase": "planned",
            "chunks": chunk_count,
            "items": item_count
        }),
        ChunkProgressEvent::ChunkStarted { index, total } => serde_json::json!({
            "event": "progress",
            "phase": "chunk_started",
            "n": index,
            "total": total
        }),
        ChunkProgressEvent::ChunkCompleted { index, total } => serde_json::json!({
            "event": "progress",
            "phase": "chunk_completed",
            "n": index,
            "total": total
        }),
        ChunkProgressEvent::Synthesizing { total } => serde_json::json!({
            "event": "progress",
            "phase": "synthesizing",
            "total": total
        }),
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse the `--progress` flag value.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            "auto" => Ok(Self::default_for_tty()),
            other => anyhow::bail!("Unknown progress mode: '{}'. Must be auto, off, human, or json.", other),
        }
    }

    pub fn reporter(&self) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
