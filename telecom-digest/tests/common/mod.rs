#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use telecom_digest::{EchoSummarizer, NewsItem, NewsSource, SourceError, Sleeper, Summarizer, SummarizeError};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn item(id: &str) -> NewsItem {
    NewsItem::new(id, format!("Item {}", id), format!("https://news.example/{}", id))
        .with_text(format!("Snippet for {}", id))
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }

    pub fn delays_ms(&self) -> Vec<u128> {
        self.delays().iter().map(Duration::as_millis).collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub enum Reply {
    /// Well-formed payload echoing the unit.
    Echo,
    Raw(String),
    Fail(SummarizeError),
}

type Script = Box<dyn Fn(usize, &str) -> Reply + Send + Sync>;

/// Summarizer whose reply to each call is decided by a script taking the
/// zero-based call number and the text unit.
pub struct ScriptedSummarizer {
    calls: AtomicUsize,
    units: Mutex<Vec<String>>,
    script: Script,
}

impl ScriptedSummarizer {
    pub fn new(script: impl Fn(usize, &str) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            units: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    pub fn echo() -> Arc<Self> {
        Self::new(|_, _| Reply::Echo)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn units(&self) -> Vec<String> {
        self.units.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    fn summarizer_name(&self) -> String {
        "scripted".to_string()
    }

    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.units.lock().unwrap().push(text.to_string());
        match (self.script)(call, text) {
            Reply::Echo => EchoSummarizer.summarize(text).await,
            Reply::Raw(raw) => Ok(raw),
            Reply::Fail(err) => Err(err),
        }
    }
}

/// Source returning a fixed item list and counting fetches.
pub struct CountingSource {
    items: Mutex<Vec<NewsItem>>,
    fetches: AtomicUsize,
}

impl CountingSource {
    pub fn new(items: Vec<NewsItem>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn set_items(&self, items: Vec<NewsItem>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsSource for CountingSource {
    fn source_name(&self) -> String {
        "counting".to_string()
    }

    async fn fetch(&self, _query: &str) -> Result<Vec<NewsItem>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.lock().unwrap().clone())
    }
}
