//! Web search by scraping a results page

use crate::markup::{attr_value, element_attr, element_text, find_open_tag, strip_tags, unescape};
use crate::validation::{RuleKind, ValidatedInput};
use anyhow::{Context, Result};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Results returned per query
pub const SEARCH_RESULT_LIMIT: usize = 5;

/// Class of a result container on the results page
const RESULT_CLASS: &str = "g";

/// Class of the snippet element inside a result
const SNIPPET_CLASS: &str = "VwiC3b";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Client for the configured search results page
#[derive(Debug, Clone)]
pub struct WebSearch {
    client: reqwest::Client,
    base_url: String,
}

impl WebSearch {
    /// `base_url` is the results page up to and including the query parameter
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .context("Failed to build HTTP client for search")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Search for `query`.
    ///
    /// Invalid queries make no request. They, network failures and parse
    /// failures are all logged and produce an empty result list.
    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let Some(query) = ValidatedInput::check(query, RuleKind::SearchQuery) else {
            warn!("Rejected search query: {:?}", query);
            return Vec::new();
        };

        let url = self.query_url(&query);
        debug!("Searching: {}", url);

        match self.fetch_page(&url).await {
            Ok(page) => parse_search_results(&page, SEARCH_RESULT_LIMIT),
            Err(e) => {
                error!("Search error: {:#}", e);
                Vec::new()
            }
        }
    }

    fn query_url(&self, query: &ValidatedInput) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(query.as_str()))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search page returned an error status")?;

        response.text().await.context("Failed to read search page")
    }
}

/// Extract `{title, link, snippet}` triples from a results page.
///
/// A result is a `<div>` whose class list contains `g`; the title is its
/// first `<h3>`, the link the first anchor's `href`, the snippet the text of
/// the `VwiC3b` element. Blocks without title or link are skipped.
pub fn parse_search_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let starts = class_positions(html, "div", RESULT_CLASS);

    starts
        .iter()
        .enumerate()
        .filter_map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(html.len());
            parse_result_block(&html[start..end])
        })
        .take(limit)
        .collect()
}

fn parse_result_block(block: &str) -> Option<SearchResult> {
    let title = element_text(block, "h3")
        .map(|t| strip_tags(&t))
        .filter(|t| !t.is_empty())?;
    let link = element_attr(block, "a", "href")?;

    let snippet = class_positions(block, "div", SNIPPET_CLASS)
        .first()
        .and_then(|&pos| {
            let body_start = pos + block[pos..].find('>')? + 1;
            let body_end = block[body_start..]
                .find("</div>")
                .map(|len| body_start + len)
                .unwrap_or(block.len());
            Some(strip_tags(&unescape(&block[body_start..body_end])))
        })
        .unwrap_or_default();

    Some(SearchResult {
        title,
        link,
        snippet,
    })
}

/// Byte offsets of every `<tag>` whose class list contains `class`
fn class_positions(html: &str, tag: &str, class: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut cursor = 0;

    while let Some((start, end)) = find_open_tag(html, tag, cursor) {
        let has_class = attr_value(&html[start..=end], "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false);
        if has_class {
            positions.push(start);
        }
        cursor = end + 1;
    }

    positions
}
