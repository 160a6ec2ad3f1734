//! Offline inspection commands: `relay profiles`, `relay plan`, `relay render`.
//!
//! None of these call a model; they show what a chunked run *would* send.

use anyhow::{bail, Result};
use rag_relay_core::profile::{DEFAULT_PROFILE, PROFILE_TABLE};
use rag_relay_core::render::{format_number, render};
use rag_relay_core::{plan, profile_for, RetrievableItem};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PlannedChunk {
    pub index: usize,
    pub item_count: usize,
    pub estimated_size: usize,
    pub fingerprint: String,
    pub items: Vec<String>,
}

/// Plan `items` for `model` and describe each chunk (1-based indices).
pub fn describe_plan(items: &[RetrievableItem], model: &str) -> Vec<PlannedChunk> {
    plan(items, model)
        .iter()
        .enumerate()
        .map(|(i, chunk)| PlannedChunk {
            index: i + 1,
            item_count: chunk.len(),
            estimated_size: chunk.estimated_size(),
            fingerprint: chunk.fingerprint(),
            items: chunk.iter().map(|item| item.name().to_string()).collect(),
        })
        .collect()
}

pub fn run_profiles() -> Result<()> {
    println!(
        "{:<10} {:>15} {:>12} {:>14}",
        "PREFIX", "MAX CHUNK", "SAMPLE ROWS", "PREVIEW CHARS"
    );
    let rows = PROFILE_TABLE
        .iter()
        .map(|(prefix, profile)| (*prefix, *profile))
        .chain(std::iter::once(("*", &DEFAULT_PROFILE)));
    for (prefix, profile) in rows {
        println!(
            "{:<10} {:>15} {:>12} {:>14}",
            prefix,
            format_number(profile.max_chunk_bytes as u64),
            profile.sample_preview_rows,
            profile.content_preview_chars
        );
    }
    Ok(())
}

pub fn run_plan(items: &[RetrievableItem], model: &str, json: bool) -> Result<()> {
    let chunks = describe_plan(items, model);

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    let profile = profile_for(model);
    println!(
        "model {}  profile {}  budget {}  items {}  chunks {}",
        model,
        profile.name,
        format_number(profile.max_chunk_bytes as u64),
        items.len(),
        chunks.len()
    );
    if chunks.len() <= 1 {
        println!("(single request: no chunking needed)");
    }

    for chunk in &chunks {
        println!();
        println!(
            "chunk {}  items {}  estimated {}  {}",
            chunk.index,
            chunk.item_count,
            format_number(chunk.estimated_size as u64),
            &chunk.fingerprint[..12]
        );
        for name in &chunk.items {
            println!("  {}", name);
        }
    }
    Ok(())
}

/// Print the rendered context of one chunk (`Some(n)`, 1-based) or all of them.
pub fn run_render(items: &[RetrievableItem], model: &str, chunk: Option<usize>) -> Result<()> {
    let profile = profile_for(model);
    let chunks = plan(items, model);

    if chunks.is_empty() {
        println!("No items to render.");
        return Ok(());
    }

    let selected: Vec<usize> = match chunk {
        Some(n) if n == 0 || n > chunks.len() => {
            bail!("Chunk {} out of range (plan has {} chunks)", n, chunks.len())
        }
        Some(n) => vec![n - 1],
        None => (0..chunks.len()).collect(),
    };

    for i in selected {
        let rendered = render(&chunks[i], profile);
        println!("# chunk {}/{}", i + 1, chunks.len());
        println!("{}", rendered.prompt_text);
        println!();
        println!("# sources");
        for source in &rendered.sources {
            println!("- {}: {}", source.display_name, source.detail_text);
        }
        println!();
    }
    Ok(())
}
