use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// Fixed ceiling for connect + read of a single request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: u16,
    pub final_url: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    /// Body decoded as UTF-8; invalid sequences are replaced rather than rejected.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Single GET with no retries. Any error means the document is unavailable
/// for this cycle.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_bytes(
        &self,
        run_id: Uuid,
        source_id: &str,
        url: &str,
    ) -> Result<FetchedResponse, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .connect_timeout(config.timeout)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn get(&self, url: &str) -> Result<FetchedResponse, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let body = resp.bytes().await?.to_vec();
        debug!(bytes = body.len(), "fetched");
        Ok(FetchedResponse {
            status: status.as_u16(),
            final_url,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_bytes(
        &self,
        run_id: Uuid,
        source_id: &str,
        url: &str,
    ) -> Result<FetchedResponse, FetchError> {
        let span = info_span!("http_fetch", %run_id, source_id, url);
        self.get(url).instrument(span).await
    }
}

#[derive(Debug, Clone)]
enum StaticResponse {
    Body(Vec<u8>),
    Status(u16),
}

/// In-process fetcher serving canned bodies by URL. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, StaticResponse>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses
            .insert(url.into(), StaticResponse::Body(body.into()));
        self
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.responses
            .insert(url.into(), StaticResponse::Status(status));
        self
    }

    /// URLs requested so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch_bytes(
        &self,
        _run_id: Uuid,
        _source_id: &str,
        url: &str,
    ) -> Result<FetchedResponse, FetchError> {
        if let Ok(mut urls) = self.requested.lock() {
            urls.push(url.to_string());
        }
        match self.responses.get(url) {
            Some(StaticResponse::Body(body)) => Ok(FetchedResponse {
                status: StatusCode::OK.as_u16(),
                final_url: url.to_string(),
                body: body.clone(),
            }),
            Some(StaticResponse::Status(status)) => Err(FetchError::HttpStatus {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(FetchError::HttpStatus {
                status: StatusCode::NOT_FOUND.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_ten_seconds() {
        assert_eq!(HttpClientConfig::default().timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn static_fetcher_serves_bodies_and_statuses() {
        let fetcher = StaticFetcher::new()
            .with_body("https://a.test/ok", "hello")
            .with_status("https://a.test/down", 503);
        let run_id = Uuid::new_v4();

        let ok = fetcher
            .fetch_bytes(run_id, "a", "https://a.test/ok")
            .await
            .expect("ok body");
        assert_eq!(ok.text(), "hello");

        match fetcher.fetch_bytes(run_id, "a", "https://a.test/down").await {
            Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected status error, got {other:?}"),
        }
        match fetcher.fetch_bytes(run_id, "a", "https://a.test/missing").await {
            Err(FetchError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected 404, got {other:?}"),
        }

        assert_eq!(
            fetcher.requested(),
            vec![
                "https://a.test/ok".to_string(),
                "https://a.test/down".to_string(),
                "https://a.test/missing".to_string(),
            ]
        );
    }

    #[test]
    fn http_status_error_names_url() {
        let err = FetchError::HttpStatus {
            status: 502,
            url: "https://x.test/p".into(),
        };
        assert_eq!(err.to_string(), "http status 502 for https://x.test/p");
    }
}
