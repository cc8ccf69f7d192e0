use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::fetcher::Fetcher;
use crate::types::{NewsItem, NewsSource, SourceError};
use crate::utils::url::canonical_link;

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Google Programmable Search (custom search engine) as a news source.
pub struct GoogleSearchSource {
    fetcher: Arc<Fetcher>,
    api_key: String,
    engine_id: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

impl GoogleSearchSource {
    pub fn new(fetcher: Arc<Fetcher>, api_key: impl Into<String>, engine_id: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// A response without `items` means no results, not a failure.
fn into_items(response: SearchResponse) -> Vec<NewsItem> {
    response
        .items
        .unwrap_or_default()
        .into_iter()
        .filter_map(|hit| {
            let link = hit.link.filter(|l| !l.trim().is_empty())?;
            let title = hit.title.unwrap_or_else(|| link.clone());
            Some(NewsItem::new(canonical_link(&link), title, link).with_text(hit.snippet.unwrap_or_default()))
        })
        .collect()
}

#[async_trait]
impl NewsSource for GoogleSearchSource {
    fn source_name(&self) -> String {
        "Google Custom Search".to_string()
    }

    async fn fetch(&self, query: &str) -> Result<Vec<NewsItem>, SourceError> {
        if self.api_key.trim().is_empty() || self.engine_id.trim().is_empty() {
            return Err(SourceError::Unavailable(
                "Google API key or search engine id is not configured".to_string(),
            ));
        }

        let url = Url::parse_with_params(
            &self.endpoint,
            &[("q", query), ("key", self.api_key.as_str()), ("cx", self.engine_id.as_str())],
        )
        .map_err(|e| SourceError::Unavailable(format!("invalid search endpoint: {}", e)))?;

        let response: SearchResponse = self.fetcher.get_json(&url).await.map_err(|e| {
            warn!("Google search failed: {}", e);
            SourceError::Unavailable(e.to_string())
        })?;

        let items = into_items(response);
        info!("Google search returned {} items", items.len());
        Ok(items)
    }
}
