use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use telecom_digest::sources::{CompanyFeed, GoogleSearchSource, JsonFileSource, NewsApiSource, PressReleaseFeedSource};
use telecom_digest::utils::text::query_keywords;
use telecom_digest::{
    DigestConfig, DigestPipeline, EchoSummarizer, FailedItemPolicy, FetchConfig, Fetcher, LlmConfig, NewsSource,
    OpenAiSummarizer, RunOutcome, Summarizer, SummaryMode,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    Newsapi,
    Google,
    Feeds,
    File,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    PerItem,
    Batched,
}

/// Fetch telecom news, summarize new items in English, Chinese and Swedish,
/// and publish them as an HTML page. Runs once; schedule it externally.
#[derive(Debug, Parser)]
#[command(name = "telecom-digest", version)]
struct Cli {
    /// JSON file with a DigestConfig; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SourceKind::Newsapi)]
    source: SourceKind,

    /// Search query, keywords separated by " OR "
    #[arg(long)]
    query: Option<String>,

    /// Company press-release feed, repeatable
    #[arg(long = "feed", value_name = "COMPANY=URL", value_parser = parse_feed)]
    feeds: Vec<CompanyFeed>,

    /// JSON array of items for --source file
    #[arg(long)]
    items_file: Option<PathBuf>,

    /// Seen-set state file
    #[arg(long)]
    state: Option<PathBuf>,

    /// Output HTML report
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    max_attempts: Option<u32>,

    /// Leave items that failed to summarize unseen so the next run retries them
    #[arg(long)]
    retry_failed: bool,

    /// Use the offline echo summarizer instead of the OpenAI API
    #[arg(long)]
    offline: bool,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Chat model used for summaries
    #[arg(long)]
    model: Option<String>,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_feed(raw: &str) -> Result<CompanyFeed, String> {
    match raw.split_once('=') {
        Some((company, url)) if !company.trim().is_empty() && !url.trim().is_empty() => {
            Ok(CompanyFeed::new(company.trim(), url.trim()))
        }
        _ => Err(format!("expected COMPANY=URL, got '{}'", raw)),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(cli: &Cli) -> anyhow::Result<DigestConfig> {
    let mut config = match &cli.config {
        Some(path) => DigestConfig::from_json_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DigestConfig::default(),
    };

    if let Some(query) = &cli.query {
        config.keywords = query_keywords(query);
    }
    if let Some(state) = &cli.state {
        config.state_path = state.clone();
    }
    if let Some(report) = &cli.report {
        config.report_path = report.clone();
    }
    if let Some(mode) = cli.mode {
        config.mode = match mode {
            ModeArg::PerItem => SummaryMode::PerItem,
            ModeArg::Batched => SummaryMode::Batched,
        };
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(max_attempts) = cli.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if cli.retry_failed {
        config.failed_items = FailedItemPolicy::RetryNextRun;
    }
    if let Some(secs) = cli.timeout_secs {
        config.run_timeout_secs = secs;
    }
    Ok(config)
}

fn required_env(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{} is not set", name))
}

fn build_source(cli: &Cli) -> anyhow::Result<Arc<dyn NewsSource>> {
    let fetcher = || Fetcher::new(FetchConfig::default()).map(Arc::new);

    let source: Arc<dyn NewsSource> = match cli.source {
        SourceKind::Newsapi => Arc::new(NewsApiSource::new(fetcher()?, required_env("NEWSAPI_KEY")?)),
        SourceKind::Google => Arc::new(GoogleSearchSource::new(
            fetcher()?,
            required_env("GOOGLE_API_KEY")?,
            required_env("SEARCH_ENGINE_ID")?,
        )),
        SourceKind::Feeds => {
            if cli.feeds.is_empty() {
                bail!("--source feeds needs at least one --feed COMPANY=URL");
            }
            Arc::new(PressReleaseFeedSource::new(fetcher()?, cli.feeds.clone()))
        }
        SourceKind::File => match &cli.items_file {
            Some(path) => Arc::new(JsonFileSource::new(path)),
            None => bail!("--source file needs --items-file"),
        },
    };
    Ok(source)
}

fn build_summarizer(cli: &Cli) -> anyhow::Result<Arc<dyn Summarizer>> {
    if cli.offline {
        return Ok(Arc::new(EchoSummarizer));
    }

    let mut llm = LlmConfig::default();
    if let Some(model) = &cli.model {
        llm.model = model.clone();
    }
    let summarizer = OpenAiSummarizer::new(required_env("OPENAI_API_KEY")?, llm)?;
    Ok(Arc::new(summarizer))
}

async fn run(cli: Cli) -> anyhow::Result<RunOutcome> {
    let config = build_config(&cli)?;
    let pipeline = DigestPipeline::builder(config)
        .source(build_source(&cli)?)
        .summarizer(build_summarizer(&cli)?)
        .build()?;

    info!(
        "Query: {} (state {}, report {})",
        pipeline.config().query(),
        pipeline.config().state_path.display(),
        pipeline.config().report_path.display()
    );
    Ok(pipeline.run_with_timeout().await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(RunOutcome::NoNewItems { fetched, already_seen }) => {
            info!("No new items ({} fetched, {} already seen)", fetched, already_seen);
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Published(report)) => {
            info!(
                run_id = %report.run_id,
                "Published {}: {} summarized, {} failed, {} new ids recorded",
                report.report_path.display(),
                report.summarized,
                report.failed,
                report.committed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
