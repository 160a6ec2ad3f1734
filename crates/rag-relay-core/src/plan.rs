//! Size estimation and greedy chunk planning.
//!
//! Retrieved items are sorted by estimated rendered size (smallest first,
//! stable on ties) and packed greedily into [`Chunk`]s whose summed size
//! stays within the model's budget. A single item larger than the budget is
//! never split or dropped; it becomes a chunk of its own.
//!
//! Estimation never reads more than a fixed preview of an item's content, so
//! planning cost does not grow with document size.

use std::borrow::Borrow;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::RetrievableItem;
use crate::profile::profile_for;
use crate::render::sample_table_preview;

/// Number of sample rows measured when estimating a table.
pub const ESTIMATE_SAMPLE_ROWS: usize = 3;
/// Characters of page/document content measured when estimating.
pub const ESTIMATE_CONTENT_CHARS: usize = 500;
/// Fixed overhead for a table block (header, labels).
pub const TABLE_OVERHEAD: usize = 200;
/// Fixed overhead for a page or document block.
pub const TEXT_OVERHEAD: usize = 100;

/// Anything the planner can pack.
pub trait EstimateSize {
    /// Approximate number of characters the item occupies once rendered.
    fn estimated_size(&self) -> usize;
}

impl<T: EstimateSize + ?Sized> EstimateSize for &T {
    fn estimated_size(&self) -> usize {
        (**self).estimated_size()
    }
}

impl EstimateSize for RetrievableItem {
    fn estimated_size(&self) -> usize {
        match self {
            RetrievableItem::Table {
                columns,
                sample_rows,
                ..
            } => {
                let preview = sample_table_preview(columns, sample_rows, ESTIMATE_SAMPLE_ROWS);
                char_len(&preview) + char_len(&columns.join(", ")) + TABLE_OVERHEAD
            }
            RetrievableItem::WebPage { title, content, .. } => {
                prefix_len(content, ESTIMATE_CONTENT_CHARS) + char_len(title) + TEXT_OVERHEAD
            }
            RetrievableItem::File { name, content, .. } => {
                prefix_len(content, ESTIMATE_CONTENT_CHARS) + char_len(name) + TEXT_OVERHEAD
            }
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn prefix_len(s: &str, max_chars: usize) -> usize {
    s.chars().take(max_chars).count()
}

/// An ordered, non-empty group of items processed by one model call.
///
/// Chunks are only created by the planner and cannot be modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    items: Vec<T>,
    estimated_size: usize,
}

impl<T> Chunk<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always `false`: the planner never emits empty chunks.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of the items' estimated sizes.
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T: EstimateSize> Chunk<T> {
    /// Wrap all items in one chunk regardless of budget, keeping input order.
    ///
    /// Used by the single-shot path; returns `None` for no items.
    pub(crate) fn whole(items: Vec<T>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        let estimated_size = items.iter().map(EstimateSize::estimated_size).sum();
        Some(Self {
            items,
            estimated_size,
        })
    }
}

impl<T: Borrow<RetrievableItem>> Chunk<T> {
    /// SHA-256 over the kind, name, and estimated size of every item.
    ///
    /// Identical plans produce identical fingerprints across runs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for item in &self.items {
            let item = item.borrow();
            hasher.update(item.kind().as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(item.name().as_bytes());
            hasher.update([0u8]);
            hasher.update(item.estimated_size().to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl<'a, T> IntoIterator for &'a Chunk<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Plan retrieved items into chunks using the budget of `model_name`'s profile.
pub fn plan<'a>(items: &'a [RetrievableItem], model_name: &str) -> Vec<Chunk<&'a RetrievableItem>> {
    let budget = profile_for(model_name).max_chunk_bytes;
    let chunks = plan_with_budget(items, budget);
    debug!(
        model = model_name,
        budget,
        items = items.len(),
        chunks = chunks.len(),
        "planned chunks"
    );
    chunks
}

/// Greedy single-pass partition of `items` under `budget`.
///
/// 1. Estimate every item once.
/// 2. Stable-sort ascending by estimate.
/// 3. Walk: when adding an item would exceed the budget and the current
///    chunk is non-empty, close the chunk and start a new one with the item.
/// 4. Close the trailing chunk.
pub fn plan_with_budget<I>(items: I, budget: usize) -> Vec<Chunk<I::Item>>
where
    I: IntoIterator,
    I::Item: EstimateSize,
{
    let mut sized: Vec<(usize, I::Item)> = items
        .into_iter()
        .map(|item| (item.estimated_size(), item))
        .collect();
    sized.sort_by_key(|(size, _)| *size);

    let mut chunks = Vec::new();
    let mut current: Vec<I::Item> = Vec::new();
    let mut current_size = 0usize;

    for (size, item) in sized {
        if current_size + size > budget && !current.is_empty() {
            chunks.push(Chunk {
                items: std::mem::take(&mut current),
                estimated_size: current_size,
            });
            current_size = 0;
        }
        current.push(item);
        current_size += size;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            items: current,
            estimated_size: current_size,
        });
    }

    chunks
}

/// True when a plan should be handled as a single ordinary request.
///
/// Covers both the empty plan and the one-chunk plan.
pub fn is_single_shot<T>(chunks: &[Chunk<T>]) -> bool {
    chunks.len() <= 1
}
