pub mod types;
pub mod utils;
pub mod retry;
pub mod state;
pub mod lock;
pub mod prompt;
pub mod decode;
pub mod digest;
pub mod llm_adapter;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod render;
pub mod pipeline;

pub use types::*;
pub use retry::{RetryError, RetryPolicy, Retryable, Sleeper, TokioSleeper};
pub use state::{SeenSet, SeenSetStore};
pub use lock::RunLock;
pub use digest::BatchSummarizer;
pub use llm_adapter::{EchoSummarizer, OpenAiSummarizer};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use render::HtmlReportRenderer;
pub use pipeline::{DigestPipeline, PipelineBuilder, RunOutcome, RunReport};
pub use interfaces::StaticNewsSource;
