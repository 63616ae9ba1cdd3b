use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::Config;
use crate::models::{parse_comment_response, CommentRequest, SearchRequest, SearchResult};

/// The search/QA service behind `/api/search` and `/api/comment`.
pub trait Backend: Send + Sync + 'static {
    fn search(&self, req: &SearchRequest) -> impl Future<Output = Result<SearchResult>> + Send;

    /// Returns the answer text for a follow-up question.
    fn comment(&self, req: &CommentRequest) -> impl Future<Output = Result<String>> + Send;
}

/// [`Backend`] over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    search_url: String,
    comment_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            search_url: config.search_url(),
            comment_url: config.comment_url(),
        })
    }

    async fn post_json<T: serde::Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Value> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            // Error bodies are only for the log line; never parsed.
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{url} returned {status}: {body}");
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to decode JSON from {url}"))
    }
}

impl Backend for HttpBackend {
    async fn search(&self, req: &SearchRequest) -> Result<SearchResult> {
        let body = self.post_json(&self.search_url, req).await?;
        SearchResult::from_value(body).context("Malformed search response")
    }

    async fn comment(&self, req: &CommentRequest) -> Result<String> {
        let body = self.post_json(&self.comment_url, req).await?;
        parse_comment_response(&body)
    }
}
