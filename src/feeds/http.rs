//! HTTP feed source backed by reqwest

use super::parser::parse_feed;
use super::{FeedEntry, FeedError, FeedFetcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::time::Duration;

const USER_AGENT: &str = concat!("hostdeck/", env!("CARGO_PKG_VERSION"), " (feed-aggregator)");

/// Fetches RSS/Atom documents over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client for feeds")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source_url: &str, limit: usize) -> Result<Vec<FeedEntry>, FeedError> {
        let request_error = |e: reqwest::Error| FeedError::Request {
            url: source_url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(source_url).send().await.map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: source_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(request_error)?;
        debug!("Read {} bytes from {}", body.len(), source_url);

        Ok(parse_feed(&body, source_url, limit))
    }
}
