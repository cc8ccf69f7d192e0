use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::fetcher::Fetcher;
use crate::types::{NewsItem, NewsSource, SourceError};
use crate::utils::url::canonical_link;

const DEFAULT_ENDPOINT: &str = "https://newsapi.org/v2/everything";

/// Keyword search over NewsAPI's `everything` endpoint, newest first.
pub struct NewsApiSource {
    fetcher: Arc<Fetcher>,
    api_key: String,
    endpoint: String,
    language: String,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

impl NewsApiSource {
    pub fn new(fetcher: Arc<Fetcher>, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: "en".to_string(),
            page_size: 10,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn request_url(&self, query: &str) -> Result<Url, SourceError> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", query),
                ("sortBy", "publishedAt"),
                ("language", self.language.as_str()),
                ("pageSize", &self.page_size.to_string()),
                ("apiKey", self.api_key.as_str()),
            ],
        )
        .map_err(|e| SourceError::Unavailable(format!("invalid NewsAPI endpoint: {}", e)))
    }
}

fn into_items(response: NewsApiResponse) -> Result<Vec<NewsItem>, SourceError> {
    if response.status != "ok" {
        return Err(SourceError::Unavailable(format!(
            "NewsAPI error {}: {}",
            response.code.as_deref().unwrap_or("unknown"),
            response.message.as_deref().unwrap_or("no message")
        )));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|article| {
            let link = article.url.filter(|u| !u.trim().is_empty())?;
            let title = article.title.filter(|t| t != "[Removed]")?;
            let mut item = NewsItem::new(canonical_link(&link), title, link)
                .with_text(article.description.unwrap_or_default());
            item.published_at = article.published_at;
            Some(item)
        })
        .collect())
}

#[async_trait]
impl NewsSource for NewsApiSource {
    fn source_name(&self) -> String {
        "NewsAPI".to_string()
    }

    async fn fetch(&self, query: &str) -> Result<Vec<NewsItem>, SourceError> {
        if self.api_key.trim().is_empty() {
            return Err(SourceError::Unavailable("NewsAPI key is not configured".to_string()));
        }

        let url = self.request_url(query)?;
        let response: NewsApiResponse = self.fetcher.get_json(&url).await.map_err(|e| {
            warn!("NewsAPI fetch failed: {}", e);
            SourceError::Unavailable(e.to_string())
        })?;

        let items = into_items(response)?;
        info!("NewsAPI returned {} items", items.len());
        Ok(items)
    }
}
