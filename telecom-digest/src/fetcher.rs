use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::types::{DigestError, FetchConfig, Result};

/// HTTP GET client shared by the news sources.
///
/// Transient failures (429, 5xx, timeouts, refused connections) are retried
/// with a constant delay; other failures are returned on the first attempt.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        let policy = RetryPolicy::constant(config.max_attempts, Duration::from_millis(config.retry_delay_ms));

        Ok(Self {
            client,
            config,
            policy,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub async fn get_text(&self, url: &Url) -> Result<String> {
        let start_time = Instant::now();
        let body = self
            .policy
            .run(self.sleeper.as_ref(), || self.get_once(url))
            .await?;
        info!(
            "Fetched {} ({} bytes, {} ms)",
            redacted(url),
            body.len(),
            start_time.elapsed().as_millis()
        );
        Ok(body)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_once(&self, url: &Url) -> Result<String> {
        debug!("GET {}", redacted(url));
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::HttpStatus {
                status: status.as_u16(),
                url: redacted(url),
            });
        }

        let limit = self.config.max_body_mb * 1024 * 1024;
        let too_large = || DigestError::ResponseTooLarge {
            url: redacted(url),
            limit_mb: self.config.max_body_mb,
        };
        if response.content_length().is_some_and(|len| len as usize > limit) {
            return Err(too_large());
        }

        let body = response.text().await?;
        if body.len() > limit {
            return Err(too_large());
        }
        Ok(body)
    }
}

/// URL without its query string, which may carry API keys.
pub fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
