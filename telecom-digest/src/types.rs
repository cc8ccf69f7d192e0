use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use interfaces::defs::{
    FailureMarker, NewsItem, NewsSource, RenderError, ReportEntry, ReportRenderer, SourceError, Summarizer,
    SummarizeError, Summary, SummaryOutcome,
};

/// Keywords used when no query is configured.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "telecom",
    "5G",
    "Ericsson",
    "Nokia",
    "Huawei",
    "Qualcomm",
    "ZTE",
    "Samsung",
    "Fujitsu",
    "mobile network",
    "satellite communications",
];

/// Whether each new item gets its own summarization call, or items are
/// grouped into combined units of `batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMode {
    PerItem,
    Batched,
}

/// What happens to items that could not be summarized after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedItemPolicy {
    /// Record the id anyway; the item is never attempted again.
    MarkSeen,
    /// Leave the id out of the seen-set so the next run attempts it again.
    RetryNextRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffKind {
    Constant,
    Exponential { multiplier: f64, max_delay_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff: BackoffKind,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 2_000,
            backoff: BackoffKind::Constant,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    /// Value of the page's `<meta http-equiv="refresh">`, 0 disables it.
    pub refresh_seconds: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Telecom News Summary".to_string(),
            refresh_seconds: 1_800,
        }
    }
}

/// Everything a pipeline run needs besides its collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub keywords: Vec<String>,
    pub state_path: PathBuf,
    pub report_path: PathBuf,
    pub mode: SummaryMode,
    pub batch_size: usize,
    pub max_item_chars: usize,
    pub concurrency: usize,
    pub retry: RetryConfig,
    pub failed_items: FailedItemPolicy,
    pub report: ReportConfig,
    pub stale_lock_secs: u64,
    pub run_timeout_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            state_path: PathBuf::from("seen.json"),
            report_path: PathBuf::from("index.html"),
            mode: SummaryMode::PerItem,
            batch_size: 5,
            max_item_chars: 2_000,
            concurrency: 1,
            retry: RetryConfig::default(),
            failed_items: FailedItemPolicy::MarkSeen,
            report: ReportConfig::default(),
            stale_lock_secs: 3_600,
            run_timeout_secs: 600,
        }
    }
}

impl DigestConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: DigestConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Search query built from the keyword list, e.g. `telecom OR 5G`.
    pub fn query(&self) -> String {
        self.keywords.join(" OR ")
    }

    /// The run lock lives next to the seen-set state it protects.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.state_path.clone().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(DigestError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(DigestError::Config("batch_size must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(DigestError::Config("concurrency must be at least 1".to_string()));
        }
        if self.max_item_chars == 0 {
            return Err(DigestError::Config("max_item_chars must be positive".to_string()));
        }
        if let BackoffKind::Exponential { multiplier, .. } = self.retry.backoff {
            if multiplier < 1.0 {
                return Err(DigestError::Config("exponential multiplier must be >= 1.0".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub max_body_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Telecom-Digest/1.0".to_string(),
            timeout_seconds: 30,
            max_attempts: 3,
            retry_delay_ms: 2_000,
            max_body_mb: 10,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error("malformed summary output: {0}")]
    MalformedOutput(String),

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<DigestError>,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response from {url} exceeds {limit_mb}MB")]
    ResponseTooLarge { url: String, limit_mb: usize },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("another run holds the lock at {}", path.display())]
    RunInProgress { path: PathBuf },

    #[error("run timed out after {secs}s")]
    TimedOut { secs: u64 },
}

pub type Result<T> = std::result::Result<T, DigestError>;
