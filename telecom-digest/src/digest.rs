use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::decode::{decode_batch, decode_single};
use crate::prompt::{batch_unit, item_unit};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::types::{
    DigestConfig, DigestError, FailureMarker, NewsItem, ReportEntry, Result, Summarizer, SummaryMode,
    SummaryOutcome,
};

/// Runs the summarization service over a batch of new items.
///
/// Output always has one entry per input item, in input order. Failures are
/// recorded per item and never abort the batch.
pub struct BatchSummarizer {
    service: Arc<dyn Summarizer>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    mode: SummaryMode,
    batch_size: usize,
    max_item_chars: usize,
    concurrency: usize,
}

impl BatchSummarizer {
    pub fn new(service: Arc<dyn Summarizer>, policy: RetryPolicy) -> Self {
        Self {
            service,
            policy,
            sleeper: Arc::new(TokioSleeper),
            mode: SummaryMode::PerItem,
            batch_size: 5,
            max_item_chars: 2_000,
            concurrency: 1,
        }
    }

    pub fn from_config(service: Arc<dyn Summarizer>, config: &DigestConfig) -> Self {
        Self::new(service, RetryPolicy::from_config(&config.retry))
            .with_mode(config.mode, config.batch_size)
            .with_max_item_chars(config.max_item_chars)
            .with_concurrency(config.concurrency)
    }

    pub fn with_mode(mut self, mode: SummaryMode, batch_size: usize) -> Self {
        self.mode = mode;
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_item_chars(mut self, max_item_chars: usize) -> Self {
        self.max_item_chars = max_item_chars.max(1);
        self
    }

    /// Units in flight at once. Keep at 1 when the service enforces a global rate limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub async fn summarize_all(&self, items: &[NewsItem]) -> Vec<ReportEntry> {
        info!(
            "Summarizing {} items with {} ({:?}, concurrency {})",
            items.len(),
            self.service.summarizer_name(),
            self.mode,
            self.concurrency
        );

        let entries: Vec<ReportEntry> = match self.mode {
            SummaryMode::PerItem => {
                stream::iter(items)
                    .map(|item| self.summarize_item(item))
                    .buffered(self.concurrency)
                    .collect()
                    .await
            }
            SummaryMode::Batched => {
                let chunks: Vec<Vec<ReportEntry>> = stream::iter(items.chunks(self.batch_size))
                    .map(|chunk| self.summarize_chunk(chunk))
                    .buffered(self.concurrency)
                    .collect()
                    .await;
                chunks.into_iter().flatten().collect()
            }
        };

        let failed = entries.iter().filter(|e| !e.outcome.is_summarized()).count();
        info!("Summarized {}/{} items ({} failed)", entries.len() - failed, entries.len(), failed);
        entries
    }

    async fn summarize_item(&self, item: &NewsItem) -> ReportEntry {
        let unit = item_unit(item, self.max_item_chars);
        let outcome = match self.call(&unit).await.and_then(|raw| decode_single(&raw, &item.id)) {
            Ok(summary) => {
                debug!("Summarized {}", item.id);
                SummaryOutcome::Summarized(summary)
            }
            Err(e) => failed(item, &e),
        };
        ReportEntry { item: item.clone(), outcome }
    }

    async fn summarize_chunk(&self, chunk: &[NewsItem]) -> Vec<ReportEntry> {
        let unit = batch_unit(chunk, self.max_item_chars);
        let ids: Vec<&str> = chunk.iter().map(|item| item.id.as_str()).collect();

        match self.call(&unit).await.and_then(|raw| decode_batch(&raw, &ids)) {
            Ok(results) => chunk
                .iter()
                .zip(results)
                .map(|(item, result)| ReportEntry {
                    item: item.clone(),
                    outcome: match result {
                        Ok(summary) => SummaryOutcome::Summarized(summary),
                        Err(e) => failed(item, &e),
                    },
                })
                .collect(),
            Err(e) => chunk
                .iter()
                .map(|item| ReportEntry {
                    item: item.clone(),
                    outcome: failed(item, &e),
                })
                .collect(),
        }
    }

    async fn call(&self, unit: &str) -> Result<String> {
        self.policy
            .run(self.sleeper.as_ref(), || self.service.summarize(unit))
            .await
            .map_err(DigestError::from)
    }
}

fn failed(item: &NewsItem, err: &DigestError) -> SummaryOutcome {
    error!("Failed to summarize {} ({}): {}", item.id, item.title, err);
    SummaryOutcome::Failed(FailureMarker {
        item_id: item.id.clone(),
        reason: err.to_string(),
    })
}
