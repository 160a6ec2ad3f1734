//! Core data models used throughout RAG Relay.
//!
//! These types represent the retrieved context items that flow into the
//! planner, the provenance records attached to answers, and the answers
//! themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single scalar value in a tabular sample row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("None"),
            Cell::Bool(true) => f.write_str("True"),
            Cell::Bool(false) => f.write_str("False"),
            Cell::Integer(n) => write!(f, "{}", n),
            Cell::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Integer(n)
    }
}

/// One piece of retrieved context that may be included in a prompt.
///
/// Items come from three heterogeneous sources: database table extracts,
/// scraped web pages, and parsed documents. Only a bounded preview of each
/// item is ever rendered into a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievableItem {
    /// A database table extract: metadata plus a handful of sample rows.
    Table {
        name: String,
        row_count: u64,
        columns: Vec<String>,
        #[serde(default)]
        sample_rows: Vec<Vec<Cell>>,
    },
    /// A scraped web page.
    WebPage {
        name: String,
        title: String,
        url: String,
        content: String,
    },
    /// A parsed, uploaded document.
    File {
        name: String,
        size_bytes: u64,
        content: String,
    },
}

impl RetrievableItem {
    pub fn name(&self) -> &str {
        match self {
            RetrievableItem::Table { name, .. }
            | RetrievableItem::WebPage { name, .. }
            | RetrievableItem::File { name, .. } => name,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            RetrievableItem::Table { .. } => SourceKind::Table,
            RetrievableItem::WebPage { .. } => SourceKind::WebPage,
            RetrievableItem::File { .. } => SourceKind::File,
        }
    }
}

/// The three kinds of context source.
///
/// The declaration order is the order sections appear in rendered context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Table,
    WebPage,
    File,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Table, SourceKind::WebPage, SourceKind::File];

    /// Stable machine label (`"table"`, `"web_page"`, `"file"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Table => "table",
            SourceKind::WebPage => "web_page",
            SourceKind::File => "file",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance record: which sources of one kind contributed to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub kind: SourceKind,
    /// Human label, e.g. `"MySQL tables (3)"`.
    pub display_name: String,
    /// First few identifiers, e.g. `"sales, users, orders..."`.
    pub detail_text: String,
    /// Every item name of this kind, in chunk order.
    pub identifiers: Vec<String>,
}

/// The model's answer for one chunk of context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialAnswer {
    /// 1-based position of the chunk in the plan.
    pub chunk_index: usize,
    pub rendered_text: String,
    pub sources_used: Vec<SourceSummary>,
}

/// Result of a chunked (scatter-gather) query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalAnswer {
    pub content: String,
    pub reasoning: String,
    pub has_reasoning: bool,
    pub chunk_count: usize,
    pub partial_answers: Vec<PartialAnswer>,
    pub all_sources_used: Vec<SourceSummary>,
}

/// Result of a single-shot query, used when no chunking was needed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectAnswer {
    pub content: String,
    pub reasoning: String,
    pub has_reasoning: bool,
    pub sources_used: Vec<SourceSummary>,
}

/// Either kind of answer, as returned by [`crate::direct::answer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Answer {
    Chunked(FinalAnswer),
    Direct(DirectAnswer),
}

impl Answer {
    pub fn content(&self) -> &str {
        match self {
            Answer::Chunked(a) => &a.content,
            Answer::Direct(a) => &a.content,
        }
    }

    pub fn reasoning(&self) -> Option<&str> {
        let (has, text) = match self {
            Answer::Chunked(a) => (a.has_reasoning, &a.reasoning),
            Answer::Direct(a) => (a.has_reasoning, &a.reasoning),
        };
        if has && !text.trim().is_empty() {
            Some(text)
        } else {
            None
        }
    }

    pub fn sources(&self) -> &[SourceSummary] {
        match self {
            Answer::Chunked(a) => &a.all_sources_used,
            Answer::Direct(a) => &a.sources_used,
        }
    }

    /// Number of chunks processed; `1` for a single-shot answer.
    pub fn chunk_count(&self) -> usize {
        match self {
            Answer::Chunked(a) => a.chunk_count,
            Answer::Direct(_) => 1,
        }
    }
}
