//! HTTP page fetcher backed by `reqwest`.
//!
//! Every request is bounded by the client timeout. Non-success statuses,
//! timeouts and transport errors are mapped onto [`FetchFailure`] so the
//! pipeline can count them without looking at `reqwest` types. Retryable
//! failures (timeouts, transport errors, 429, 5xx) are retried up to
//! `retries` times with a linear backoff.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use shelfscrape_core::error::Result as IngestResult;
use shelfscrape_core::traits::PageFetcher;
use shelfscrape_core::{FetchFailure, IngestError};

use crate::config::CrawlConfig;

const BACKOFF_STEP: Duration = Duration::from_millis(500);

pub struct HttpFetcher {
    http: Client,
    retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration, retries: u32) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            retries,
            backoff: BACKOFF_STEP,
        })
    }

    pub fn from_config(crawl: &CrawlConfig) -> Result<Self> {
        Self::new(
            &crawl.user_agent,
            Duration::from_secs(crawl.timeout_secs),
            crawl.fetch_retries,
        )
    }

    /// Override the per-attempt backoff step.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn fetch_once(&self, url: &str) -> IngestResult<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::fetch(url, classify(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IngestError::fetch(url, FetchFailure::Status(status.as_u16())));
        }

        resp.text()
            .await
            .map_err(|e| IngestError::fetch(url, classify(&e)))
    }
}

fn classify(e: &reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Network(e.to_string())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> IngestResult<String> {
        let mut attempt = 0;
        loop {
            debug!(url, attempt, "GET");
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!(url, attempt, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
        hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::SERVICE_UNAVAILABLE
    }

    async fn serve(hits: Arc<AtomicUsize>) -> String {
        let app = Router::new()
            .route("/ok", get(|| async { "<h1>hello</h1>" }))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "nope") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            )
            .route("/flaky", get(flaky))
            .with_state(hits);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fetcher(retries: u32) -> HttpFetcher {
        HttpFetcher::new("shelfscrape-test", Duration::from_millis(300), retries)
            .unwrap()
            .with_backoff(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let base = serve(Arc::new(AtomicUsize::new(0))).await;
        let body = fetcher(0).fetch(&format!("{base}/ok")).await.unwrap();
        assert_eq!(body, "<h1>hello</h1>");
    }

    #[tokio::test]
    async fn non_success_status_is_a_failure() {
        let base = serve(Arc::new(AtomicUsize::new(0))).await;
        let err = fetcher(3).fetch(&format!("{base}/missing")).await.unwrap_err();
        match err {
            IngestError::Fetch { reason, .. } => assert_eq!(reason, FetchFailure::Status(404)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let base = serve(Arc::new(AtomicUsize::new(0))).await;
        let err = fetcher(0).fetch(&format!("{base}/slow")).await.unwrap_err();
        match err {
            IngestError::Fetch { reason, .. } => assert_eq!(reason, FetchFailure::Timeout),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(hits.clone()).await;
        let err = fetcher(2).fetch(&format!("{base}/flaky")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
