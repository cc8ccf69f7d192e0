use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetcher::{redacted, Fetcher};
use crate::parser::FeedParser;
use crate::types::{NewsItem, NewsSource, Result, SourceError};
use crate::utils::text::{matches_any_keyword, query_keywords};

/// A company newsroom feed (RSS or Atom).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyFeed {
    pub company: String,
    pub url: String,
}

impl CompanyFeed {
    pub fn new(company: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            url: url.into(),
        }
    }
}

/// Press releases from a set of company feeds, filtered by the query keywords.
pub struct PressReleaseFeedSource {
    fetcher: Arc<Fetcher>,
    parser: FeedParser,
    feeds: Vec<CompanyFeed>,
}

impl PressReleaseFeedSource {
    pub fn new(fetcher: Arc<Fetcher>, feeds: Vec<CompanyFeed>) -> Self {
        Self {
            fetcher,
            parser: FeedParser::new(),
            feeds,
        }
    }

    pub fn feeds(&self) -> &[CompanyFeed] {
        &self.feeds
    }

    async fn fetch_feed(&self, feed: &CompanyFeed) -> Result<Vec<NewsItem>> {
        let url = Url::parse(&feed.url)?;
        let body = self.fetcher.get_text(&url).await?;
        let items = self.parser.parse_items(&body)?;
        debug!("{}: {} entries from {}", feed.company, items.len(), redacted(&url));
        Ok(items)
    }
}

/// Keep entries mentioning any keyword in their title or text; an empty
/// keyword list keeps everything.
fn filter_by_keywords(items: Vec<NewsItem>, keywords: &[String]) -> Vec<NewsItem> {
    items
        .into_iter()
        .filter(|item| matches_any_keyword(keywords, &[&item.title, &item.text]))
        .collect()
}

#[async_trait]
impl NewsSource for PressReleaseFeedSource {
    fn source_name(&self) -> String {
        format!("Press releases ({} feeds)", self.feeds.len())
    }

    async fn fetch(&self, query: &str) -> std::result::Result<Vec<NewsItem>, SourceError> {
        if self.feeds.is_empty() {
            return Err(SourceError::Unavailable("no company feeds configured".to_string()));
        }

        let results = join_all(self.feeds.iter().map(|feed| self.fetch_feed(feed))).await;

        let mut items = Vec::new();
        let mut failures = Vec::new();
        for (feed, result) in self.feeds.iter().zip(results) {
            match result {
                Ok(feed_items) => items.extend(feed_items),
                Err(e) => {
                    warn!("Feed for {} failed: {}", feed.company, e);
                    failures.push(format!("{}: {}", feed.company, e));
                }
            }
        }

        if failures.len() == self.feeds.len() {
            return Err(SourceError::Unavailable(format!(
                "all company feeds failed ({})",
                failures.join("; ")
            )));
        }

        let keywords = query_keywords(query);
        let total = items.len();
        let items = filter_by_keywords(items, &keywords);
        info!(
            "Press releases: {} of {} entries match the query ({} feeds failed)",
            items.len(),
            total,
            failures.len()
        );
        Ok(items)
    }
}
