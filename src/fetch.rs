use crate::config::HarvestConfig;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tokio::time::timeout;

/// Errors from a single HTTP attempt. There is no retry; one attempt per URL.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A fully buffered response, owned by the worker that fetched it
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client that sends the configured User-Agent, follows redirects and
/// aborts any request that outlives the per-request timeout.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    /// Issue one GET and buffer the whole body.
    ///
    /// Non-2xx responses are returned as-is; callers decide whether to skip.
    pub async fn get(&self, url: &str) -> Result<FetchResult, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

        let request = async {
            let response = self
                .client
                .get(parsed)
                .header(ACCEPT, "*/*")
                .send()
                .await
                .map_err(FetchError::Transport)?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let bytes = response.bytes().await.map_err(FetchError::Transport)?;

            Ok(FetchResult {
                status,
                content_type,
                bytes: bytes.to_vec(),
            })
        };

        // Dropping the future on timeout aborts the in-flight request
        match timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }

    /// Fetch a small text resource such as robots.txt.
    ///
    /// Any failure or non-2xx status yields `None`.
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        match self.get(url).await {
            Ok(result) if result.is_success() => {
                Some(String::from_utf8_lossy(&result.bytes).into_owned())
            }
            Ok(result) => {
                ::log::debug!("{} returned status {}", url, result.status);
                None
            }
            Err(e) => {
                ::log::debug!("Failed to fetch {}: {}", url, e);
                None
            }
        }
    }
}
