//! News feed aggregation
//!
//! A [`FeedAggregator`] merges the entries of every source configured for a
//! topic and remembers the merged list for a freshness window. Sources fail
//! independently: a broken feed only removes its own entries.

use crate::cache::TtlCache;
use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod http;
pub mod parser;

pub use http::HttpFeedFetcher;

/// Default freshness window of an aggregated topic
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(3600);

/// Default number of entries kept per source
pub const DEFAULT_ENTRIES_PER_SOURCE: usize = 5;

/// A single normalized feed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub source_id: String,
}

/// A named list of feed URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTopic {
    pub name: String,
    pub sources: Vec<String>,
}

impl FeedTopic {
    pub fn new(name: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            name: name.into(),
            sources,
        }
    }

    /// Key under which the aggregated topic is cached
    pub fn cache_key(&self) -> String {
        self.name.clone()
    }
}

/// A source that could not be fetched or read
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
}

/// Retrieves the entries of one feed source
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source_url: &str, limit: usize) -> Result<Vec<FeedEntry>, FeedError>;
}

/// Cached, failure-tolerant aggregation over a [`FeedFetcher`]
pub struct FeedAggregator<F = HttpFeedFetcher> {
    fetcher: F,
    cache: TtlCache<String, Vec<FeedEntry>>,
    freshness: Duration,
    entries_per_source: usize,
}

impl<F: FeedFetcher> FeedAggregator<F> {
    pub fn new(fetcher: F, freshness: Duration, entries_per_source: usize, cache_capacity: usize) -> Self {
        Self {
            fetcher,
            cache: TtlCache::with_capacity(cache_capacity),
            freshness,
            entries_per_source,
        }
    }

    /// Aggregator with the default freshness window and per-source cap
    pub fn with_defaults(fetcher: F) -> Self {
        Self::new(fetcher, DEFAULT_FRESHNESS, DEFAULT_ENTRIES_PER_SOURCE, 100)
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Entries for `topic`, sources concatenated in configured order.
    ///
    /// A fresh cached result is returned as is. Otherwise every source is
    /// fetched concurrently and the merged list, possibly empty, is cached.
    pub async fn fetch(&self, topic: &FeedTopic) -> Vec<FeedEntry> {
        let key = topic.cache_key();
        if let Some(entries) = self.cache.get(&key) {
            debug!("Serving {} cached entries for topic '{}'", entries.len(), topic.name);
            return entries;
        }

        let results = join_all(
            topic
                .sources
                .iter()
                .map(|source| self.fetcher.fetch(source, self.entries_per_source)),
        )
        .await;

        let mut merged = Vec::new();
        for (source, result) in topic.sources.iter().zip(results) {
            match result {
                Ok(entries) => {
                    debug!("Fetched {} entries from {}", entries.len(), source);
                    merged.extend(entries.into_iter().take(self.entries_per_source));
                }
                Err(e) => error!("{} news error: {}", topic.name, e),
            }
        }

        info!(
            "Aggregated {} entries for topic '{}' from {} sources",
            merged.len(),
            topic.name,
            topic.sources.len()
        );
        self.cache.put(key, merged.clone(), self.freshness);
        merged
    }

    /// Forget the cached result for `topic`
    pub fn invalidate(&self, topic: &FeedTopic) {
        self.cache.invalidate(&topic.cache_key());
    }

    /// Drop every expired topic result, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }
}
