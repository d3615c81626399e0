//! HTTP client for the catalog search endpoint.

use std::time::Duration;

use lbxmodel::{Track, TrackId};
use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ErrorResponse, SearchResponse};

/// Default search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

/// Default timeout for search requests (5 seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Default number of results returned to the caller.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Extra items requested so that filtering out unplayable entries does not
/// leave the caller short.
const OVERFETCH_BUFFER: usize = 5;

/// Catalog search client.
#[derive(Clone, Debug)]
pub struct CatalogSearch {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    max_results: usize,
}

impl CatalogSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder().api_key(api_key).build()
    }

    pub fn builder() -> SearchBuilder {
        SearchBuilder::default()
    }

    /// Search the catalog.
    ///
    /// Fails before any I/O when no API key is configured; fails on non-OK
    /// responses (surfacing the API's own message when it sends one) and on
    /// timeout. At most `max_results` tracks are returned even though the
    /// request over-fetches to compensate for filtered-out entries.
    pub async fn search(&self, query: &str, max_results: Option<usize>) -> Result<Vec<Track>> {
        let limit = max_results.unwrap_or(self.max_results);
        if self.api_key.is_empty() {
            return Err(Error::MissingApiKey);
        }

        let fetch = (limit + OVERFETCH_BUFFER).to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", fetch.as_str()),
                ("key", self.api_key.as_str()),
                // Only embeddable videos are playable in a hidden surface;
                // filtering here spares the user restricted-video errors.
                ("videoEmbeddable", "true"),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error.map(|detail| detail.message))
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("API error: {status}"));
            return Err(Error::Api { status, message });
        }

        let data: SearchResponse = response.json().await?;
        let tracks = map_items(data, limit);
        debug!(query, count = tracks.len(), "Search complete");
        Ok(tracks)
    }
}

/// Keep entries with a well-formed catalog id, cap to `limit`, map snippets
/// into tracks.
fn map_items(data: SearchResponse, limit: usize) -> Vec<Track> {
    data.items
        .into_iter()
        .filter_map(|item| {
            let id = TrackId::new(item.id.and_then(|id| id.video_id)?);
            if !id.is_well_formed() {
                return None;
            }
            let snippet = item.snippet?;
            let thumbnail = snippet
                .thumbnails
                .and_then(|t| t.medium.or(t.default))
                .map(|t| t.url)
                .unwrap_or_default();
            Some(Track {
                id,
                title: snippet.title,
                channel: snippet.channel_title,
                thumbnail,
            })
        })
        .take(limit)
        .collect()
}

/// Builder for configuring a [`CatalogSearch`].
#[derive(Debug)]
pub struct SearchBuilder {
    client: Option<Client>,
    endpoint: String,
    api_key: String,
    timeout: Duration,
    max_results: usize,
}

impl Default for SearchBuilder {
    fn default() -> Self {
        Self {
            client: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl SearchBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Override the endpoint (tests point this at a local server).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> CatalogSearch {
        CatalogSearch {
            client: self.client.unwrap_or_default(),
            endpoint: self.endpoint,
            api_key: self.api_key,
            timeout: self.timeout,
            max_results: self.max_results,
        }
    }
}
