use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::prompt::{batch_marker, SNIPPET_PREFIX, TITLE_PREFIX};
use crate::types::{DigestError, LlmConfig, Result, Summarizer, SummarizeError};
use crate::utils::text::truncate_chars;

const SYSTEM_PROMPT: &str = "You are a telecom industry analyst writing short news summaries. \
Reply with JSON only, no commentary.";

/// Summarization service backed by an OpenAI-compatible chat completions API.
pub struct OpenAiSummarizer {
    client: Client,
    config: LlmConfig,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl OpenAiSummarizer {
    pub fn new(api_key: impl Into<String>, config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(DigestError::Http)?;

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    fn summarizer_name(&self) -> String {
        format!("OpenAI ({})", self.config.model)
    }

    async fn summarize(&self, text: &str) -> std::result::Result<String, SummarizeError> {
        if self.api_key.trim().is_empty() {
            return Err(SummarizeError::Service("missing API key".to_string()));
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: text },
            ],
            temperature: self.config.temperature,
        };

        debug!("Requesting summary from {} ({} chars)", self.config.model, text.len());

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SummarizeError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        if status.is_server_error() {
            return Err(SummarizeError::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizeError::Service(format!("HTTP {}: {}", status, truncate_chars(&body, 200))));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::Service(format!("invalid response body: {}", e)))?;

        first_completion(body).ok_or_else(|| SummarizeError::Service("empty completion".to_string()))
    }
}

fn first_completion(body: ChatResponse) -> Option<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
}

fn classify_transport_error(err: reqwest::Error) -> SummarizeError {
    if err.is_timeout() || err.is_connect() {
        SummarizeError::Transient(err.to_string())
    } else {
        SummarizeError::Service(err.to_string())
    }
}

/// `Retry-After` in delta-seconds form; HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Offline summarizer that echoes each item's title and snippet back in a
/// well-formed payload, for dry runs without an API key.
pub struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    fn summarizer_name(&self) -> String {
        "Echo (offline)".to_string()
    }

    async fn summarize(&self, text: &str) -> std::result::Result<String, SummarizeError> {
        let titles: Vec<&str> = text.lines().filter_map(|l| l.strip_prefix(TITLE_PREFIX)).collect();
        let snippets: Vec<&str> = text.lines().filter_map(|l| l.strip_prefix(SNIPPET_PREFIX)).collect();
        if titles.is_empty() {
            return Err(SummarizeError::Service("no items in text unit".to_string()));
        }

        let echo = |i: usize| {
            let snippet = snippets.get(i).copied().unwrap_or("");
            if snippet.is_empty() {
                titles[i].to_string()
            } else {
                format!("{} - {}", titles[i], snippet)
            }
        };

        let batched = text.lines().any(|l| l == batch_marker(1));
        let payload = if batched {
            json!((0..titles.len())
                .map(|i| json!({
                    "index": i + 1,
                    "english": echo(i),
                    "chinese": echo(i),
                    "swedish": echo(i),
                }))
                .collect::<Vec<_>>())
        } else {
            json!({ "english": echo(0), "chinese": echo(0), "swedish": echo(0) })
        };
        Ok(payload.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_batch, decode_single};
    use crate::prompt::{batch_unit, item_unit};
    use crate::types::NewsItem;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_seconds_are_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn first_non_empty_completion_is_returned() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"{\"english\":\"e\"}"}}]}"#)
                .unwrap();
        assert_eq!(first_completion(body).as_deref(), Some("{\"english\":\"e\"}"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(first_completion(empty).is_none());
    }

    #[tokio::test]
    async fn missing_key_is_a_permanent_failure() {
        let summarizer = OpenAiSummarizer::new("", LlmConfig::default()).unwrap();
        let err = summarizer.summarize("anything").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn echo_output_decodes_in_both_modes() {
        let a = NewsItem::new("a", "Ericsson 5G", "https://example.com/a").with_text("New contract");
        let b = NewsItem::new("b", "Nokia RAN", "https://example.com/b");

        let single = EchoSummarizer.summarize(&item_unit(&a, 100)).await.unwrap();
        assert_eq!(decode_single(&single, "a").unwrap().english, "Ericsson 5G - New contract");

        let batch = EchoSummarizer.summarize(&batch_unit(&[a, b], 100)).await.unwrap();
        let results = decode_batch(&batch, &["a", "b"]).unwrap();
        assert_eq!(results[1].as_ref().unwrap().swedish, "Nokia RAN");
    }
}
