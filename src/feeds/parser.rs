//! RSS 2.0 / RDF / Atom entry extraction

use super::FeedEntry;
use crate::markup::{element_attr, element_text, elements, strip_tags};

/// Summaries longer than this are cut at a character boundary
const SUMMARY_MAX_CHARS: usize = 500;

/// Parse up to `limit` entries from a feed document.
///
/// RSS `<item>` blocks are used when present, Atom `<entry>` blocks
/// otherwise. Entries without a title or a link are skipped. A document
/// with no recognizable entries yields an empty list.
pub fn parse_feed(raw: &str, source_id: &str, limit: usize) -> Vec<FeedEntry> {
    let mut blocks = elements(raw, "item");
    if blocks.is_empty() {
        blocks = elements(raw, "entry");
    }

    blocks
        .into_iter()
        .filter_map(|block| parse_entry(block, source_id))
        .take(limit)
        .collect()
}

fn parse_entry(block: &str, source_id: &str) -> Option<FeedEntry> {
    let title = element_text(block, "title").filter(|t| !t.is_empty())?;
    let link = entry_link(block)?;

    let summary = ["description", "summary", "content"]
        .iter()
        .find_map(|tag| element_text(block, tag).filter(|s| !s.is_empty()))
        .map(|html| truncate_chars(&strip_tags(&html), SUMMARY_MAX_CHARS))
        .unwrap_or_default();

    Some(FeedEntry {
        title: strip_tags(&title),
        link,
        summary,
        source_id: source_id.to_string(),
    })
}

/// RSS puts the URL in the element body, Atom in an `href` attribute
fn entry_link(block: &str) -> Option<String> {
    element_text(block, "link")
        .filter(|link| !link.is_empty())
        .or_else(|| element_attr(block, "link", "href"))
        .or_else(|| element_text(block, "guid").filter(|guid| guid.starts_with("http")))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
