use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single article or press release surfaced by a news source.
///
/// `id` is the dedup key and must be stable across runs for the same
/// underlying article. Sources derive it from the canonical link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub text: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: String::new(),
            link: link.into(),
            published_at: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Three-language summary of exactly one [`NewsItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub item_id: String,
    pub english: String,
    pub chinese: String,
    pub swedish: String,
}

/// Recorded in place of a [`Summary`] when an item could not be summarized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureMarker {
    pub item_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Summarized(Summary),
    Failed(FailureMarker),
}

impl SummaryOutcome {
    pub fn item_id(&self) -> &str {
        match self {
            SummaryOutcome::Summarized(summary) => &summary.item_id,
            SummaryOutcome::Failed(marker) => &marker.item_id,
        }
    }

    pub fn is_summarized(&self) -> bool {
        matches!(self, SummaryOutcome::Summarized(_))
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            SummaryOutcome::Summarized(summary) => Some(summary),
            SummaryOutcome::Failed(_) => None,
        }
    }
}

/// One line of a rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub item: NewsItem,
    pub outcome: SummaryOutcome,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("news source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummarizeError {
    #[error("rate limited by summarization service")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient summarization failure: {0}")]
    Transient(String),

    #[error("summarization service error: {0}")]
    Service(String),
}

impl SummarizeError {
    /// Rate limits and transient transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SummarizeError::RateLimited { .. } | SummarizeError::Transient(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SummarizeError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("report rendering failed: {0}")]
pub struct RenderError(pub String);

// Collaborators hold configuration and clients only. Run state, including
// the seen-set, stays with the pipeline.

/// Produces candidate items for a query (keywords, or a company target).
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn source_name(&self) -> String;

    async fn fetch(&self, query: &str) -> Result<Vec<NewsItem>, SourceError>;
}

/// Turns one bounded text unit into a raw multilingual summary payload.
///
/// The payload is not trusted; callers decode and validate it.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn summarizer_name(&self) -> String;

    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

pub trait ReportRenderer: Send + Sync {
    fn render(&self, entries: &[ReportEntry], generated_at: DateTime<Utc>) -> Result<Vec<u8>, RenderError>;
}
