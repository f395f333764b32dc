use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::BackendError;

/// Queries shorter than this are answered locally with no hits
pub const MIN_QUERY_LEN: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataMatches {
    pub title: bool,
    pub description: bool,
    pub teaser: bool,
}

/// Transcript passage that matched the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(default)]
    pub speakers: Vec<String>,
    #[serde(default)]
    pub has_highlight: bool,
    #[serde(default)]
    pub highlighted_text: String,
    #[serde(default)]
    pub matched_in_text: bool,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub video_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub internal_id: String,
    pub short_id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub duration: f64,
    pub published_at: String,
    #[serde(default)]
    pub has_metadata_match: bool,
    #[serde(default)]
    pub metadata_matches: MetadataMatches,
    #[serde(default)]
    pub segments: Vec<SearchSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub page: u32,
    pub per_page: u32,
    pub total_hits: u64,
    pub processing_time_ms: u64,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            page: 1,
            per_page: 10,
            total_hits: 0,
            processing_time_ms: 0,
        }
    }
}

/// Client for the portal's `/api/search` proxy
pub struct SearchClient {
    client: Client,
    endpoint: String,
}

impl SearchClient {
    pub fn new<E: Into<String>>(endpoint: E) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: endpoint.into(),
        })
    }

    pub async fn search(&self, query: &str) -> Result<SearchResponse, BackendError> {
        if query.trim().chars().count() < MIN_QUERY_LEN {
            return Ok(SearchResponse::empty());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}
