use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::digest::BatchSummarizer;
use crate::lock::RunLock;
use crate::render::HtmlReportRenderer;
use crate::retry::Sleeper;
use crate::state::SeenSetStore;
use crate::types::{
    DigestConfig, DigestError, FailedItemPolicy, NewsItem, NewsSource, ReportRenderer, Result, Summarizer,
};
use crate::utils::fs::atomic_write;

/// Counts for a run that published a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub fetched: usize,
    pub already_seen: usize,
    pub summarized: usize,
    pub failed: usize,
    /// Ids added to the seen-set by this run.
    pub committed: usize,
    pub report_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing new; report and seen-set were left untouched.
    NoNewItems { fetched: usize, already_seen: usize },
    Published(RunReport),
}

/// Single-pass fetch, dedupe, summarize, render and commit.
///
/// A run either replaces the report and advances the seen-set, or fails
/// and leaves both as they were. Runs against the same state file are
/// serialized by a lock next to it.
pub struct DigestPipeline {
    config: DigestConfig,
    source: Arc<dyn NewsSource>,
    summarizer: BatchSummarizer,
    renderer: Arc<dyn ReportRenderer>,
    store: SeenSetStore,
}

impl DigestPipeline {
    pub fn builder(config: DigestConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Run once, aborting with [`DigestError::TimedOut`] after the configured
    /// run timeout. Persisted files are only ever replaced whole, so an
    /// aborted run leaves the previous state.
    pub async fn run_with_timeout(&self) -> Result<RunOutcome> {
        let secs = self.config.run_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(secs), self.run()).await {
            Ok(result) => result,
            Err(_) => {
                error!("Run aborted after {}s", secs);
                Err(DigestError::TimedOut { secs })
            }
        }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("digest_run", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunOutcome> {
        let _lock = RunLock::acquire(
            self.config.lock_path(),
            Duration::from_secs(self.config.stale_lock_secs),
        )?;

        let mut seen = self.store.load().await;
        info!("Starting run from {} with {} seen ids", self.source.source_name(), seen.len());

        let query = self.config.query();
        let fetched = self.source.fetch(&query).await.map_err(|e| {
            error!("Fetch from {} failed: {}", self.source.source_name(), e);
            DigestError::Source(e)
        })?;
        let fetched_count = fetched.len();

        let (new_items, already_seen) = partition_new(fetched, |id| seen.contains(id));
        info!("Fetched {} items: {} new, {} already seen", fetched_count, new_items.len(), already_seen);

        if new_items.is_empty() {
            info!("No new items, leaving report and seen-set unchanged");
            return Ok(RunOutcome::NoNewItems {
                fetched: fetched_count,
                already_seen,
            });
        }

        let entries = self.summarizer.summarize_all(&new_items).await;
        let summarized = entries.iter().filter(|e| e.outcome.is_summarized()).count();
        let failed = entries.len() - summarized;

        let document = self.renderer.render(&entries, Utc::now())?;
        atomic_write(&self.config.report_path, &document).await?;
        info!("Wrote report with {} entries to {}", entries.len(), self.config.report_path.display());

        let mut committed = 0;
        for entry in &entries {
            let commit = match self.config.failed_items {
                FailedItemPolicy::MarkSeen => true,
                FailedItemPolicy::RetryNextRun => entry.outcome.is_summarized(),
            };
            if commit && seen.add(entry.outcome.item_id()) {
                committed += 1;
            }
        }
        if failed > 0 && self.config.failed_items == FailedItemPolicy::RetryNextRun {
            warn!("{} failed items left unseen for the next run", failed);
        }

        if committed > 0 {
            self.store.flush(&seen).await?;
        }

        info!("Run complete: {} summarized, {} failed, {} ids committed", summarized, failed, committed);
        Ok(RunOutcome::Published(RunReport {
            run_id,
            fetched: fetched_count,
            already_seen,
            summarized,
            failed,
            committed,
            report_path: self.config.report_path.clone(),
        }))
    }
}

/// Split fetched items into those not yet seen, keeping source order and
/// the first occurrence of a repeated id, and the count of already seen ones.
fn partition_new(fetched: Vec<NewsItem>, is_seen: impl Fn(&str) -> bool) -> (Vec<NewsItem>, usize) {
    let mut already_seen = 0;
    let mut batch_ids = HashSet::new();
    let mut new_items = Vec::new();

    for item in fetched {
        if is_seen(&item.id) {
            already_seen += 1;
        } else if batch_ids.insert(item.id.clone()) {
            new_items.push(item);
        }
    }
    (new_items, already_seen)
}

pub struct PipelineBuilder {
    config: DigestConfig,
    source: Option<Arc<dyn NewsSource>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    renderer: Option<Arc<dyn ReportRenderer>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl PipelineBuilder {
    pub fn new(config: DigestConfig) -> Self {
        Self {
            config,
            source: None,
            summarizer: None,
            renderer: None,
            sleeper: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn NewsSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Defaults to [`HtmlReportRenderer`] built from the report config.
    pub fn renderer(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn build(self) -> Result<DigestPipeline> {
        self.config.validate()?;

        let source = self
            .source
            .ok_or_else(|| DigestError::Config("a news source is required".to_string()))?;
        let service = self
            .summarizer
            .ok_or_else(|| DigestError::Config("a summarizer is required".to_string()))?;

        let mut summarizer = BatchSummarizer::from_config(service, &self.config);
        if let Some(sleeper) = self.sleeper {
            summarizer = summarizer.with_sleeper(sleeper);
        }

        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(HtmlReportRenderer::from_config(&self.config.report)));

        Ok(DigestPipeline {
            store: SeenSetStore::new(self.config.state_path.clone()),
            config: self.config,
            source,
            summarizer,
            renderer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_drops_seen_and_repeated_ids() {
        let fetched = vec![
            NewsItem::new("a", "A", "https://x/a"),
            NewsItem::new("b", "B", "https://x/b"),
            NewsItem::new("b", "B again", "https://x/b"),
            NewsItem::new("c", "C", "https://x/c"),
        ];
        let (new_items, already_seen) = partition_new(fetched, |id| id == "a");
        let ids: Vec<&str> = new_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(new_items[0].title, "B");
        assert_eq!(already_seen, 1);
    }

    #[test]
    fn builder_requires_collaborators() {
        assert!(matches!(
            DigestPipeline::builder(DigestConfig::default()).build(),
            Err(DigestError::Config(_))
        ));
    }
}
