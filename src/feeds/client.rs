use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("upstream source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::SourceUnavailable(format!("request timed out: {}", err))
        } else {
            FeedError::SourceUnavailable(err.to_string())
        }
    }
}

/// One GET per call, returning the decoded JSON body. Implementations must
/// not retry; callers decide whether to try again.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, FeedError>;
}

pub struct HttpFeedClient {
    client: Client,
}

impl HttpFeedClient {
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self, FeedError> {
        Self::new(config.upstream_timeout())
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedClient {
    async fn fetch_json(&self, url: &str) -> Result<Value, FeedError> {
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FeedError::SourceUnavailable(format!(
                "HTTP {}: {}",
                status,
                error_text.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| FeedError::MalformedResponse(format!("invalid JSON: {}", e)))
    }
}
