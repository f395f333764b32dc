use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::errors::BackendError;
use crate::models::message::Message;

/// Host used for search when none is configured
pub const DEFAULT_BACKEND_URL: &str = "https://api.boldvideo.io";

const MIN_API_KEY_LEN: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl BackendConfig {
    /// Both the host and the key are set to something non-empty
    pub fn is_complete(&self) -> bool {
        self.url().is_some() && self.api_key().is_some()
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.trim().is_empty())
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// Hosts may be configured without a scheme; those are reached over https
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Question body in the backend's abbreviated field names
#[derive(Debug, Serialize)]
struct UpstreamAsk<'a> {
    q: &'a str,
    vid: &'a str,
    subd: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    c: Option<&'a [Message]>,
}

/// Raw event-stream body of a backend answer, chunked as the backend sent it
pub type UpstreamBody = BoxStream<'static, Result<Bytes, reqwest::Error>>;

pub struct BackendClient {
    client: Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        // Answers stream for as long as the backend keeps talking, so no overall timeout
        let client = Client::builder().build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// URL of the ask endpoint for a video
    pub fn ask_url(&self, video_id: &str) -> Result<String, BackendError> {
        let host = self.config.url().ok_or(BackendError::MissingConfiguration)?;
        Ok(format!(
            "{}/videos/{}/ask",
            normalize_host(host),
            urlencoding::encode(video_id)
        ))
    }

    /// Forward a question and return the answer stream once the backend has
    /// accepted it. Fails before any I/O when the host or key is missing.
    pub async fn ask(
        &self,
        video_id: &str,
        tenant: &str,
        question: &str,
        conversation: Option<&[Message]>,
    ) -> Result<UpstreamBody, BackendError> {
        let api_key = self
            .config
            .api_key()
            .ok_or(BackendError::MissingConfiguration)?;
        let url = self.ask_url(video_id)?;

        debug!(url = %url, "forwarding question");
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, api_key)
            .json(&UpstreamAsk {
                q: question,
                vid: video_id,
                subd: tenant,
                c: conversation,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "backend refused question");
            return Err(BackendError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        info!(video_id, "answer stream opened");
        Ok(response.bytes_stream().boxed())
    }

    /// Full-text search over the tenant's videos; the backend's JSON is returned as is
    pub async fn search(&self, query: &str) -> Result<Value, BackendError> {
        let api_key = self
            .config
            .api_key()
            .ok_or(BackendError::MissingConfiguration)?;
        if api_key.len() < MIN_API_KEY_LEN {
            return Err(BackendError::InvalidConfiguration);
        }
        let host = normalize_host(self.config.url().unwrap_or(DEFAULT_BACKEND_URL));

        let response = self
            .client
            .get(format!("{}/api/v1/search", host))
            .query(&[("query", query)])
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "search request failed");
            return Err(BackendError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}
