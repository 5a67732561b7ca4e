//! HTTP layer for the GitHub REST API.
//!
//! A thin wrapper around `reqwest` with retry logic tuned for GitHub:
//! server errors and rate limits retry with exponential backoff, other
//! client errors fail immediately. Downloads stream to disk and poll a
//! cancellation flag between chunks.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::cancel::CancelToken;
use crate::github::releases::ChunkFn;
use crate::{Result, SetupError};

const DEFAULT_API_ROOT: &str = "https://api.github.com";
const DEFAULT_USER_AGENT: &str = concat!("junimo/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

pub(crate) const PER_PAGE: usize = 100;

/// How a streaming transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Complete,
    /// The flag was observed between chunks; the partial file is left for
    /// the caller to dispose of.
    Canceled,
}

pub struct GitHubClient {
    client: Client,
    api_root: String,
    token: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl GitHubClient {
    pub fn new() -> Result<Self> {
        Self::with_config(GitHubClientConfig::default())
    }

    pub fn with_config(config: GitHubClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            api_root: config.api_root,
            token: config.token,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    /// Absolute API URL for a path like `/repos/owner/repo/releases`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    /// GET with automatic retries. Server errors and 429 retry with
    /// exponential backoff; other 4xx fail immediately.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match self.execute_get(url).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        log::debug!("HTTP {} from {url}, retrying", status.as_u16());
                        last_error = Some(SetupError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    } else {
                        return Err(SetupError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }

            // Exponential backoff: 1s, 2s, 4s, ...; no sleep after the
            // final attempt.
            if attempt < self.max_retries {
                let delay = self.retry_delay * 2_u32.pow(attempt);
                tokio::time::sleep(delay).await;
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Err(SetupError::MaxRetries {
                url: url.to_string(),
            }),
        }
    }

    async fn execute_get(&self, url: &str) -> Result<Response> {
        let mut request = self.client.get(url).header("Accept", GITHUB_ACCEPT);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }

    /// GET JSON and deserialize.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| SetupError::ResponseDecode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GET every page of a list endpoint.
    pub async fn get_paged<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let page_url = format!("{url}?per_page={PER_PAGE}&page={page}");
            let items: Vec<T> = self.get_json(&page_url).await?;
            let last_page = items.len() < PER_PAGE;
            all.extend(items);
            if last_page {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Stream `url` into `dest`, polling `cancel` before each chunk write.
    ///
    /// Returns `Transfer::Canceled` without touching the bytes already on
    /// disk; the caller decides what happens to the partial file.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancelToken,
        on_chunk: ChunkFn<'_>,
    ) -> Result<Transfer> {
        let response = self.get(url).await?;
        let total = response.content_length();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            if cancel.is_canceled() {
                return Ok(Transfer::Canceled);
            }
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            on_chunk(received, total);
        }

        file.flush().await?;
        Ok(Transfer::Complete)
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
    pub api_root: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for GitHubClientConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl GitHubClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point at a different API root (test servers, GitHub Enterprise).
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// Authenticate with a personal access token; raises the rate limit.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_root_and_path() {
        let client = GitHubClient::new().unwrap();
        assert_eq!(
            client.api_url("/repos/Pathoschild/SMAPI/releases"),
            "https://api.github.com/repos/Pathoschild/SMAPI/releases"
        );
    }

    #[test]
    fn config_builders_chain() {
        let config = GitHubClientConfig::new()
            .with_api_root("http://127.0.0.1:9000")
            .with_token(Some("ghp_test".to_string()))
            .with_max_retries(1)
            .with_retry_delay(Duration::from_millis(10))
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("junimo-tests");

        assert_eq!(config.api_root, "http://127.0.0.1:9000");
        assert_eq!(config.token.as_deref(), Some("ghp_test"));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.user_agent, "junimo-tests");
    }

    #[test]
    fn default_user_agent_carries_the_version() {
        let config = GitHubClientConfig::default();
        assert!(config.user_agent.starts_with("junimo/"));
    }

    // Requires network access; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn lists_live_releases() {
        let client = GitHubClient::new().unwrap();
        let url = client.api_url("/repos/Pathoschild/SMAPI/releases");
        let releases: Vec<serde_json::Value> = client.get_paged(&url).await.unwrap();
        assert!(!releases.is_empty());
    }
}
