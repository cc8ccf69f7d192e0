use async_trait::async_trait;

use crate::defs::{NewsItem, NewsSource, SourceError};

/// A news source that always answers with the same result.
///
/// Useful for offline runs and as a test double for the pipeline.
pub struct StaticNewsSource {
    name: String,
    result: Result<Vec<NewsItem>, String>,
}

impl StaticNewsSource {
    pub fn new(items: Vec<NewsItem>) -> Self {
        Self {
            name: "static".to_owned(),
            result: Ok(items),
        }
    }

    /// A source whose every fetch fails with [`SourceError::Unavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            name: "static".to_owned(),
            result: Err(reason.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl NewsSource for StaticNewsSource {
    fn source_name(&self) -> String {
        self.name.clone()
    }

    async fn fetch(&self, _query: &str) -> Result<Vec<NewsItem>, SourceError> {
        self.result.clone().map_err(SourceError::Unavailable)
    }
}
