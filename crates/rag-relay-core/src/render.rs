//! Chunk context rendering.
//!
//! Turns one [`Chunk`] of retrieved items into a single prompt-ready text
//! blob plus provenance ([`SourceSummary`]) records. Items are grouped into
//! sections by kind (tables, then web pages, then documents), each section
//! opening with a banner; inside a section, chunk order is preserved.
//!
//! Rendering is pure: the same chunk and profile always produce
//! byte-identical output.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::models::{Cell, RetrievableItem, SourceKind, SourceSummary};
use crate::plan::Chunk;
use crate::profile::ModelProfile;

/// Hard cap on rendered sample-row text, independent of the profile.
pub const SAMPLE_TEXT_CAP: usize = 500;
/// Maximum number of table columns shown in sample rows.
pub const MAX_SAMPLE_COLUMNS: usize = 5;
/// Number of identifiers listed in a source's detail text.
const DETAIL_IDENTIFIERS: usize = 3;
const ELLIPSIS: &str = "...";

/// Rendered prompt context for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedChunk {
    pub prompt_text: String,
    pub sources: Vec<SourceSummary>,
}

/// Render a chunk's items into prompt text and per-kind source summaries.
pub fn render<T: Borrow<RetrievableItem>>(chunk: &Chunk<T>, profile: &ModelProfile) -> RenderedChunk {
    let mut blocks: BTreeMap<SourceKind, Vec<String>> = BTreeMap::new();
    let mut names: BTreeMap<SourceKind, Vec<String>> = BTreeMap::new();

    for item in chunk {
        let item = item.borrow();
        blocks
            .entry(item.kind())
            .or_default()
            .push(render_item(item, profile));
        names
            .entry(item.kind())
            .or_default()
            .push(item.name().to_string());
    }

    let mut parts = Vec::new();
    for (kind, kind_blocks) in blocks {
        parts.push(section_banner(kind, kind_blocks.len()));
        parts.extend(kind_blocks);
    }

    let sources = names
        .into_iter()
        .map(|(kind, identifiers)| summarize(kind, identifiers))
        .collect();

    RenderedChunk {
        prompt_text: parts.join("\n"),
        sources,
    }
}

fn render_item(item: &RetrievableItem, profile: &ModelProfile) -> String {
    match item {
        RetrievableItem::Table {
            name,
            row_count,
            columns,
            sample_rows,
        } => {
            let mut block = format!("\n[{}] table:\n", name);
            block.push_str(&format!("- Rows: {}\n", format_number(*row_count)));
            block.push_str(&format!("- Columns: {}\n", columns.join(", ")));
            if *row_count > 0 && !sample_rows.is_empty() {
                block.push_str("- Sample data:\n");
                block.push_str(&sample_table_preview(
                    columns,
                    sample_rows,
                    profile.sample_preview_rows,
                ));
                block.push('\n');
            }
            block
        }
        RetrievableItem::WebPage {
            name,
            title,
            url,
            content,
        } => {
            let mut block = format!("\n[{}] {}\n", name, title);
            block.push_str(&format!("URL: {}\n", url));
            block.push_str(&format!(
                "Content: {}{}\n",
                truncate_chars(content, profile.content_preview_chars),
                ELLIPSIS
            ));
            block
        }
        RetrievableItem::File {
            name,
            size_bytes,
            content,
        } => {
            let mut block = format!("\n[Document] {}\n", name);
            block.push_str(&format!("Size: {} chars\n", format_number(*size_bytes)));
            block.push_str(&format!(
                "Content: {}{}\n",
                truncate_chars(content, profile.content_preview_chars),
                ELLIPSIS
            ));
            block
        }
    }
}

fn section_banner(kind: SourceKind, count: usize) -> String {
    match kind {
        SourceKind::Table => format!("=== MySQL tables ({}) ===", count),
        SourceKind::WebPage => format!("=== Website pages ({}) ===", count),
        SourceKind::File => format!("=== Documents ({}) ===", count),
    }
}

fn display_name(kind: SourceKind, count: usize) -> String {
    match kind {
        SourceKind::Table => format!("MySQL tables ({})", count),
        SourceKind::WebPage => format!("Websites ({})", count),
        SourceKind::File => format!("Documents ({})", count),
    }
}

fn summarize(kind: SourceKind, identifiers: Vec<String>) -> SourceSummary {
    let mut detail_text = identifiers
        .iter()
        .take(DETAIL_IDENTIFIERS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if identifiers.len() > DETAIL_IDENTIFIERS {
        detail_text.push_str(ELLIPSIS);
    }
    SourceSummary {
        kind,
        display_name: display_name(kind, identifiers.len()),
        detail_text,
        identifiers,
    }
}

/// Collapse summaries from many chunks into one summary per kind.
///
/// Kinds keep their first-appearance order; identifiers are unioned in
/// order of appearance without duplicates.
pub fn merge_sources(sources: &[SourceSummary]) -> Vec<SourceSummary> {
    let mut merged: Vec<(SourceKind, Vec<String>, HashSet<&str>)> = Vec::new();

    for source in sources {
        let idx = match merged.iter().position(|(kind, _, _)| *kind == source.kind) {
            Some(idx) => idx,
            None => {
                merged.push((source.kind, Vec::new(), HashSet::new()));
                merged.len() - 1
            }
        };
        let (_, identifiers, seen) = &mut merged[idx];
        for id in &source.identifiers {
            if seen.insert(id.as_str()) {
                identifiers.push(id.clone());
            }
        }
    }

    merged
        .into_iter()
        .map(|(kind, identifiers, _)| summarize(kind, identifiers))
        .collect()
}

/// Render up to `max_rows` sample rows as a right-aligned text table.
///
/// Only the first [`MAX_SAMPLE_COLUMNS`] columns are shown. Output longer
/// than [`SAMPLE_TEXT_CAP`] characters is cut and suffixed with `...`.
pub(crate) fn sample_table_preview(columns: &[String], rows: &[Vec<Cell>], max_rows: usize) -> String {
    let shown_cols = columns.len().min(MAX_SAMPLE_COLUMNS);
    let elided = columns.len() > MAX_SAMPLE_COLUMNS;

    let mut grid: Vec<Vec<String>> = Vec::new();
    let mut header: Vec<String> = columns[..shown_cols]
        .iter()
        .map(|c| truncate_chars(c, SAMPLE_TEXT_CAP).to_string())
        .collect();
    if elided {
        header.push(ELLIPSIS.to_string());
    }
    grid.push(header);

    for row in rows.iter().take(max_rows) {
        let mut line: Vec<String> = (0..shown_cols)
            .map(|i| row.get(i).map(cell_preview).unwrap_or_default())
            .collect();
        if elided {
            line.push(ELLIPSIS.to_string());
        }
        grid.push(line);
    }

    let width_count = grid[0].len();
    let widths: Vec<usize> = (0..width_count)
        .map(|i| {
            grid.iter()
                .map(|line| line[i].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let text = grid
        .iter()
        .map(|line| {
            line.iter()
                .zip(widths.iter())
                .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    if text.chars().count() > SAMPLE_TEXT_CAP {
        format!("{}{}", truncate_chars(&text, SAMPLE_TEXT_CAP), ELLIPSIS)
    } else {
        text
    }
}

/// The first `max_chars` characters of `s` (never splits a code point).
/// Cell text capped at [`SAMPLE_TEXT_CAP`] chars. Text cells are sliced in
/// place so a huge cell is never copied whole.
fn cell_preview(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) => truncate_chars(s, SAMPLE_TEXT_CAP).to_string(),
        other => truncate_chars(&other.to_string(), SAMPLE_TEXT_CAP).to_string(),
    }
}

pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Format an integer with comma thousands separators: `1234567` → `"1,234,567"`.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::plan_with_budget;
    use crate::profile::{CLAUDE_PROFILE, DEFAULT_PROFILE, O1_PROFILE};

    fn table(name: &str, rows: u64) -> RetrievableItem {
        RetrievableItem::Table {
            name: name.to_string(),
            row_count: rows,
            columns: vec!["id".into(), "city".into()],
            sample_rows: vec![
                vec![Cell::Integer(1), Cell::from("Seoul")],
                vec![Cell::Integer(2), Cell::from("Busan")],
                vec![Cell::Integer(3), Cell::from("Incheon")],
            ],
        }
    }

    fn page(name: &str, content: &str) -> RetrievableItem {
        RetrievableItem::WebPage {
            name: name.to_string(),
            title: format!("{} title", name),
            url: format!("https://example.com/{}", name),
            content: content.to_string(),
        }
    }

    fn file(name: &str, content: &str) -> RetrievableItem {
        RetrievableItem::File {
            name: name.to_string(),
            size_bytes: content.chars().count() as u64,
            content: content.to_string(),
        }
    }

    fn one_chunk(items: &[RetrievableItem]) -> Chunk<&RetrievableItem> {
        Chunk::whole(items.iter().collect()).unwrap()
    }

    #[test]
    fn web_page_preview_always_has_ellipsis() {
        let items = vec![page("Page_1", "short")];
        let rendered = render(&one_chunk(&items), &DEFAULT_PROFILE);
        assert!(rendered.prompt_text.contains("Content: short...\n"));
        assert!(rendered.prompt_text.contains("URL: https://example.com/Page_1"));
        assert!(rendered.prompt_text.starts_with("=== Website pages (1) ==="));
    }

    #[test]
    fn content_preview_respects_profile() {
        let long = "a".repeat(1_000);
        let items = vec![file("report.txt", &long)];
        let rendered = render(&one_chunk(&items), &CLAUDE_PROFILE);
        let expected = format!("Content: {}...\n", "a".repeat(200));
        assert!(rendered.prompt_text.contains(&expected));
        assert!(!rendered.prompt_text.contains(&"a".repeat(201)));
        assert!(rendered.prompt_text.contains("Size: 1,000 chars"));
        assert!(rendered.prompt_text.contains("[Document] report.txt"));
    }

    #[test]
    fn table_sample_rows_follow_profile() {
        let items = vec![table("cities", 1234)];
        let claude = render(&one_chunk(&items), &CLAUDE_PROFILE).prompt_text;
        assert!(claude.contains("- Rows: 1,234"));
        assert!(claude.contains("- Columns: id, city"));
        assert!(claude.contains("Seoul"));
        assert!(!claude.contains("Busan"));

        let o1 = render(&one_chunk(&items), &O1_PROFILE).prompt_text;
        assert!(o1.contains("Busan"));
        assert!(!o1.contains("Incheon"));
    }

    #[test]
    fn empty_table_has_no_sample_section() {
        let items = vec![table("empty", 0)];
        let rendered = render(&one_chunk(&items), &DEFAULT_PROFILE).prompt_text;
        assert!(!rendered.contains("Sample data"));
    }

    #[test]
    fn sections_grouped_by_kind_in_fixed_order() {
        let items = vec![
            file("b.txt", "file body"),
            page("Page_1", "page body"),
            table("t1", 3),
            page("Page_2", "more"),
        ];
        let rendered = render(&one_chunk(&items), &DEFAULT_PROFILE);
        let text = &rendered.prompt_text;
        let t = text.find("=== MySQL tables (1) ===").unwrap();
        let w = text.find("=== Website pages (2) ===").unwrap();
        let d = text.find("=== Documents (1) ===").unwrap();
        assert!(t < w && w < d);
        assert!(text.find("[Page_1]").unwrap() < text.find("[Page_2]").unwrap());
        assert!(d < text.find("[Document] b.txt").unwrap());

        let kinds: Vec<SourceKind> = rendered.sources.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SourceKind::Table, SourceKind::WebPage, SourceKind::File]
        );
        assert_eq!(rendered.sources[1].display_name, "Websites (2)");
        assert_eq!(rendered.sources[1].identifiers, vec!["Page_1", "Page_2"]);
    }

    #[test]
    fn one_summary_per_kind_with_truncated_detail() {
        let items: Vec<RetrievableItem> = (1..=5).map(|i| file(&format!("f{}.md", i), "x")).collect();
        let rendered = render(&one_chunk(&items), &DEFAULT_PROFILE);
        assert_eq!(rendered.sources.len(), 1);
        let s = &rendered.sources[0];
        assert_eq!(s.display_name, "Documents (5)");
        assert_eq!(s.detail_text, "f1.md, f2.md, f3.md...");
        assert_eq!(s.identifiers.len(), 5);
    }

    #[test]
    fn render_is_pure() {
        let items = vec![table("t", 3), page("Page_1", "body"), file("a.txt", "doc")];
        let chunks = plan_with_budget(items.iter(), 10_000);
        let a = render(&chunks[0], &DEFAULT_PROFILE);
        let b = render(&chunks[0], &DEFAULT_PROFILE);
        assert_eq!(a, b);
    }

    #[test]
    fn sample_text_is_hard_capped() {
        let columns = vec!["blob".to_string()];
        let rows = vec![vec![Cell::Text("z".repeat(5_000))]];
        let preview = sample_table_preview(&columns, &rows, 3);
        assert_eq!(preview.chars().count(), SAMPLE_TEXT_CAP + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn sample_table_limits_columns() {
        let columns: Vec<String> = (0..8).map(|i| format!("c{}", i)).collect();
        let rows = vec![(0..8).map(Cell::Integer).collect::<Vec<_>>()];
        let preview = sample_table_preview(&columns, &rows, 1);
        assert!(preview.contains("c4"));
        assert!(!preview.contains("c5"));
        let lines: Vec<&str> = preview.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("..."));
        assert_eq!(lines[1], " 0   1   2   3   4  ...");
    }

    #[test]
    fn merge_sources_dedups_by_kind() {
        let a = summarize(SourceKind::File, vec!["a".into(), "b".into()]);
        let b = summarize(SourceKind::Table, vec!["t".into()]);
        let c = summarize(SourceKind::File, vec!["b".into(), "c".into(), "d".into()]);
        let merged = merge_sources(&[a, b, c]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, SourceKind::File);
        assert_eq!(merged[0].identifiers, vec!["a", "b", "c", "d"]);
        assert_eq!(merged[0].display_name, "Documents (4)");
        assert_eq!(merged[0].detail_text, "a, b, c...");
        assert_eq!(merged[1].kind, SourceKind::Table);
    }

    #[test]
    fn huge_text_cell_is_sliced_not_copied() {
        let cell = Cell::Text("가".repeat(2_000_000));
        let preview = cell_preview(&cell);
        assert_eq!(preview.chars().count(), SAMPLE_TEXT_CAP);
        assert!(preview.capacity() <= SAMPLE_TEXT_CAP * 4);
        assert_eq!(cell_preview(&Cell::Float(2.0)), "2.0");
        assert_eq!(cell_preview(&Cell::Null), "None");
    }

    #[test]
    fn merge_sources_scales_with_many_identifiers() {
        let first: Vec<String> = (0..50_000).map(|i| format!("doc-{}", i)).collect();
        let second: Vec<String> = (25_000..75_000).map(|i| format!("doc-{}", i)).collect();
        let merged = merge_sources(&[
            summarize(SourceKind::File, first),
            summarize(SourceKind::File, second),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].identifiers.len(), 75_000);
        assert_eq!(merged[0].identifiers[0], "doc-0");
        assert_eq!(merged[0].identifiers[50_000], "doc-50000");
        assert_eq!(merged[0].identifiers[74_999], "doc-74999");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("가나다라", 2), "가나");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
