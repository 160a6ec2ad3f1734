//! JSON manifest of retrieved items.
//!
//! A manifest is what an upstream retrieval step hands to `relay`:
//!
//! ```json
//! {
//!   "tables": [{ "name": "orders", "row_count": 1200, "columns": ["id", "total"],
//!                "sample_rows": [[1, 9.5]] }],
//!   "pages":  [{ "title": "Pricing", "url": "https://example.com/pricing", "content": "..." }],
//!   "files":  [{ "name": "notes.txt", "content": "..." }]
//! }
//! ```
//!
//! Every list is optional. Pages without a name are called `Page_<n>`
//! (1-based position in the list); files without `size_bytes` report their
//! character count.

use anyhow::{Context, Result};
use rag_relay_core::{Cell, RetrievableItem};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub tables: Vec<TableEntry>,
    #[serde(default)]
    pub pages: Vec<PageEntry>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TableEntry {
    pub name: String,
    pub row_count: u64,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub sample_rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Deserialize)]
pub struct PageEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FileEntry {
    pub name: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub content: String,
}

impl Manifest {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid item manifest")
    }

    /// Flatten into items: tables, then pages, then files.
    pub fn into_items(self) -> Vec<RetrievableItem> {
        let mut items =
            Vec::with_capacity(self.tables.len() + self.pages.len() + self.files.len());

        items.extend(self.tables.into_iter().map(|t| RetrievableItem::Table {
            name: t.name,
            row_count: t.row_count,
            columns: t.columns,
            sample_rows: t.sample_rows,
        }));

        items.extend(
            self.pages
                .into_iter()
                .enumerate()
                .map(|(i, p)| RetrievableItem::WebPage {
                    name: p.name.unwrap_or_else(|| format!("Page_{}", i + 1)),
                    title: p.title,
                    url: p.url,
                    content: p.content,
                }),
        );

        items.extend(self.files.into_iter().map(|f| {
            let size_bytes = f
                .size_bytes
                .unwrap_or_else(|| f.content.chars().count() as u64);
            RetrievableItem::File {
                name: f.name,
                size_bytes,
                content: f.content,
            }
        }));

        items
    }
}

pub fn load_manifest(path: &Path) -> Result<Vec<RetrievableItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read item manifest: {}", path.display()))?;
    let items = Manifest::parse(&content)
        .with_context(|| format!("Failed to parse item manifest: {}", path.display()))?
        .into_items();
    tracing::debug!(path = %path.display(), items = items.len(), "loaded manifest");
    Ok(items)
}
