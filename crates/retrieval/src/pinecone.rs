//! Pinecone-compatible vector index client.
//!
//! Speaks the index's `POST /query` contract: a query vector in, ranked
//! matches out, with the passage text carried in each match's metadata.

use async_trait::async_trait;
use docq_core::capability::{ScoredPassage, VectorIndex};
use docq_core::error::UpstreamError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A Pinecone-compatible vector index.
pub struct PineconeIndex {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl PineconeIndex {
    /// Create a new index client against the index's endpoint URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<ScoredPassage>, UpstreamError> {
        let url = format!("{}/query", self.base_url);

        let request = QueryRequest {
            vector: vector.to_vec(),
            top_k,
            include_metadata: true,
            namespace: namespace.map(str::to_string),
        };

        debug!(top_k, namespace = ?namespace, dims = vector.len(), "querying vector index");

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200 => {}
            401 | 403 => {
                return Err(UpstreamError::AuthenticationFailed(
                    "Invalid index API key".into(),
                ));
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(status, body = %body, "vector index returned error");
                return Err(UpstreamError::ApiError {
                    status_code: status,
                    message: body,
                });
            }
        }

        let api_resp: QueryResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedResponse(format!("index query: {e}")))?;

        Ok(passages_from_matches(api_resp.matches))
    }

    async fn health_check(&self) -> Result<bool, UpstreamError> {
        let url = format!("{}/describe_index_stats", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

/// Pull scored passages out of raw matches, preserving rank order.
/// Matches without text metadata are discarded.
fn passages_from_matches(matches: Vec<QueryMatch>) -> Vec<ScoredPassage> {
    matches
        .into_iter()
        .filter_map(|m| {
            let text = m.metadata.and_then(|meta| meta.text)?;
            if text.is_empty() {
                return None;
            }
            Some(ScoredPassage {
                text,
                score: m.score,
            })
        })
        .collect()
}

// --- Index API types (internal) ---

#[derive(Debug, Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<MatchMetadata>,
}

#[derive(Debug, Deserialize)]
struct MatchMetadata {
    #[serde(default)]
    text: Option<String>,
}
