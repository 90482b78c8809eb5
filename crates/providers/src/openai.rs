//! OpenAI-compatible client implementation.
//!
//! Works with OpenAI and any endpoint exposing the same surface.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Embeddings (with newline normalization)
//! - Moderation

use async_trait::async_trait;
use docq_core::capability::{
    ChatCompletion, CompletionChunk, CompletionRequest, Embedder, ModerationVerdict, Moderator,
};
use docq_core::error::UpstreamError;
use docq_core::message::ChatMessage;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible model client.
///
/// One reqwest client is shared across the completion, embedding, and
/// moderation endpoints of the same base URL.
pub struct OpenAiClient {
    name: String,
    base_url: String,
    api_key: String,
    embedding_model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client against a base URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "openai".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            embedding_model: "text-embedding-ada-002".into(),
            client,
        }
    }

    /// Create a client against the public OpenAI API (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("https://api.openai.com/v1", api_key)
    }

    /// Override the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Map a non-success status to a typed error.
    fn status_error(status: u16, body: String) -> UpstreamError {
        match status {
            429 => UpstreamError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => UpstreamError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ),
            _ => {
                warn!(status, body = %body, "upstream returned error");
                UpstreamError::ApiError {
                    status_code: status,
                    message: body,
                }
            }
        }
    }
}

#[async_trait]
impl ChatCompletion for OpenAiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "messages": to_api_messages(&request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false,
        });

        debug!(model = %request.model, "sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedResponse(format!("completion: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::MalformedResponse("no choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<CompletionChunk, UpstreamError>>,
        UpstreamError,
    > {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": request.model,
            "messages": to_api_messages(&request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": true,
        });

        debug!(model = %request.model, "sending streaming completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_body));
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Read the SSE byte stream and forward parsed content deltas. The
        // [DONE] sentinel never escapes this task: consumers see a final
        // done-marked chunk followed by channel closure.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(UpstreamError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete lines
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    // Skip empty lines and SSE comments
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        let _ = tx
                            .send(Ok(CompletionChunk {
                                content: None,
                                done: true,
                            }))
                            .await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(stream_resp) => {
                            if let Some(choice) = stream_resp.choices.first() {
                                let has_content =
                                    choice.delta.content.as_ref().is_some_and(|c| !c.is_empty());
                                if has_content {
                                    let chunk = CompletionChunk {
                                        content: choice.delta.content.clone(),
                                        done: false,
                                    };
                                    if tx.send(Ok(chunk)).await.is_err() {
                                        return; // receiver dropped — caller cancelled
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            trace!(data = %data, error = %e, "ignoring unparseable SSE chunk");
                        }
                    }
                }
            }

            // Stream ended without [DONE] — still mark completion
            let _ = tx
                .send(Ok(CompletionChunk {
                    content: None,
                    done: true,
                }))
                .await;
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<bool, UpstreamError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let url = format!("{}/embeddings", self.base_url);

        // The embedding model's documented recommendation: newlines in the
        // input degrade embedding quality.
        let input = text.replace('\n', " ");

        let body = serde_json::json!({
            "model": self.embedding_model,
            "input": input,
        });

        debug!(model = %self.embedding_model, chars = input.len(), "sending embedding request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_body));
        }

        let api_resp: EmbeddingApiResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedResponse(format!("embedding: {e}")))?;

        api_resp
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| UpstreamError::MalformedResponse("no embedding in response".into()))
    }
}

#[async_trait]
impl Moderator for OpenAiClient {
    async fn moderate(&self, text: &str) -> Result<ModerationVerdict, UpstreamError> {
        let url = format!("{}/moderations", self.base_url);

        let body = serde_json::json!({ "input": text });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, error_body));
        }

        let api_resp: ModerationApiResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::MalformedResponse(format!("moderation: {e}")))?;

        let result = api_resp
            .results
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::MalformedResponse("no moderation result".into()))?;

        let categories = result
            .categories
            .into_iter()
            .filter_map(|(name, hit)| hit.then_some(name))
            .collect();

        Ok(ModerationVerdict {
            flagged: result.flagged,
            categories,
        })
    }
}

/// Convert domain messages to the OpenAI wire format.
fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: m.role.as_str().into(),
            content: Some(m.content.clone()),
            name: m.name.clone(),
        })
        .collect()
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

// --- Embedding API types ---

#[derive(Debug, Deserialize)]
struct EmbeddingApiResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

// --- Moderation API types ---

#[derive(Debug, Deserialize)]
struct ModerationApiResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: std::collections::BTreeMap<String, bool>,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_constructor() {
        let client = OpenAiClient::openai("sk-test");
        assert_eq!(client.name(), "openai");
        assert!(client.base_url.contains("api.openai.com"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = OpenAiClient::new("https://example.com/v1/", "key");
        assert_eq!(client.base_url, "https://example.com/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            ChatMessage::system("You are a documentation assistant"),
            ChatMessage::user("How do I add a view?"),
        ];
        let api_messages = to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_keeps_name() {
        let messages = vec![ChatMessage::user("hi").with_name("alice")];
        let api_messages = to_api_messages(&messages);
        assert_eq!(api_messages[0].name.as_deref(), Some("alice"));
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn parse_stream_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn parse_empty_choices() {
        let data = r#"{"choices":[]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices.is_empty());
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "Use @Route."}}
            ]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Use @Route.")
        );
    }

    #[test]
    fn parse_embedding_response() {
        let data = r#"{
            "data": [
                {"embedding": [0.1, 0.2, 0.3], "index": 0}
            ],
            "model": "text-embedding-ada-002",
            "usage": {"prompt_tokens": 8, "total_tokens": 8}
        }"#;
        let parsed: EmbeddingApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn parse_moderation_response() {
        let data = r#"{
            "id": "modr-1",
            "results": [
                {
                    "flagged": true,
                    "categories": {"hate": false, "violence": true}
                }
            ]
        }"#;
        let parsed: ModerationApiResponse = serde_json::from_str(data).unwrap();
        let result = &parsed.results[0];
        assert!(result.flagged);
        assert_eq!(result.categories.get("violence"), Some(&true));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiClient::status_error(429, String::new()),
            UpstreamError::RateLimited { .. }
        ));
        assert!(matches!(
            OpenAiClient::status_error(401, String::new()),
            UpstreamError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            OpenAiClient::status_error(500, "boom".into()),
            UpstreamError::ApiError {
                status_code: 500,
                ..
            }
        ));
    }
}
