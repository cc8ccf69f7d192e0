use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::types::{NewsItem, NewsSource, SourceError};
use crate::utils::url::canonical_link;

/// Items read from a JSON array on disk, for offline runs and replays.
///
/// Each element needs `title` and `link`; `id` defaults to the canonical
/// link. The query is ignored.
pub struct JsonFileSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileItem {
    id: Option<String>,
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    link: String,
    published_at: Option<DateTime<Utc>>,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn into_items(entries: Vec<FileItem>) -> Vec<NewsItem> {
    entries
        .into_iter()
        .filter(|entry| !entry.link.trim().is_empty())
        .map(|entry| {
            let id = entry
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| canonical_link(&entry.link));
            let mut item = NewsItem::new(id, entry.title, entry.link).with_text(entry.text);
            item.published_at = entry.published_at;
            item
        })
        .collect()
}

#[async_trait]
impl NewsSource for JsonFileSource {
    fn source_name(&self) -> String {
        format!("File ({})", self.path.display())
    }

    async fn fetch(&self, _query: &str) -> Result<Vec<NewsItem>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::Unavailable(format!("cannot read {}: {}", self.path.display(), e)))?;
        let entries: Vec<FileItem> = serde_json::from_str(&raw)
            .map_err(|e| SourceError::Unavailable(format!("invalid items file {}: {}", self.path.display(), e)))?;

        let items = into_items(entries);
        info!("Loaded {} items from {}", items.len(), self.path.display());
        Ok(items)
    }
}
