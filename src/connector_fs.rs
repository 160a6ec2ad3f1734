//! Filesystem item source.
//!
//! Walks `[connectors.filesystem].root` and turns every matching text file
//! into a [`RetrievableItem::File`] named by its path relative to the root.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rag_relay_core::RetrievableItem;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::{Config, FilesystemConnectorConfig};

const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

pub fn scan_filesystem(config: &Config) -> Result<Vec<RetrievableItem>> {
    let fs_config = config
        .connectors
        .filesystem
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Filesystem connector not configured"))?;
    scan_root(fs_config)
}

pub fn scan_root(fs_config: &FilesystemConnectorConfig) -> Result<Vec<RetrievableItem>> {
    let root = &fs_config.root;
    if !root.exists() {
        bail!(
            "Filesystem connector root does not exist: {}",
            root.display()
        );
    }

    let include_set = build_globset(&fs_config.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(fs_config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut items = Vec::new();

    for entry in WalkDir::new(root).follow_links(fs_config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match file_to_item(path, &rel_str)? {
            Some(item) => items.push(item),
            None => tracing::debug!(path = %rel_str, "skipping non-UTF-8 file"),
        }
    }

    items.sort_by(|a, b| a.name().cmp(b.name()));
    tracing::debug!(root = %root.display(), files = items.len(), "filesystem scan complete");

    Ok(items)
}

fn file_to_item(path: &Path, relative_path: &str) -> Result<Option<RetrievableItem>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => return Ok(None),
    };
    // Size is reported to the model in characters, not bytes.
    let size_bytes = content.chars().count() as u64;

    Ok(Some(RetrievableItem::File {
        name: relative_path.to_string(),
        size_bytes,
        content,
    }))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
