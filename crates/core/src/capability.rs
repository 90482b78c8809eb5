//! Capability traits — the abstractions over external services.
//!
//! The pipeline depends on four collaborators: a chat-completion model,
//! an embedding model, a moderation endpoint, and a vector index. Each is
//! accessed by a request/response contract only; implementations live in
//! `docq-providers` and `docq-retrieval`, and tests substitute stubs.

use crate::error::UpstreamError;
use crate::message::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "gpt-3.5-turbo")
    pub model: String,

    /// The budget-fitted message sequence
    pub messages: Vec<ChatMessage>,

    /// Temperature (0.0 = deterministic)
    #[serde(default)]
    pub temperature: f32,

    /// Maximum tokens the model may generate — the fitter's reserved room
    pub max_tokens: u32,
}

/// A single fragment of a streaming completion.
///
/// The stream ends by natural channel exhaustion; `done` marks the final
/// frame so consumers can flush without waiting for the channel to close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

/// The verdict from a moderation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationVerdict {
    /// Whether the text violates content policy
    pub flagged: bool,

    /// Category labels that triggered the flag, if any
    #[serde(default)]
    pub categories: Vec<String>,
}

/// A documentation passage returned by similarity search, with its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    /// The passage text
    pub text: String,

    /// Similarity score from the index (higher is more relevant)
    pub score: f32,
}

/// A chat completion model.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a request and get the complete answer text.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<String, UpstreamError>;

    /// Send a request and get a stream of answer fragments.
    ///
    /// Dropping the receiver cancels the stream: the producer observes the
    /// failed send and releases its upstream connection.
    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<CompletionChunk, UpstreamError>>,
        UpstreamError,
    >;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, UpstreamError> {
        Ok(true)
    }
}

/// An embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a vector.
    ///
    /// Implementations normalize newlines to spaces before submission,
    /// per the embedding model's documented recommendation.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, UpstreamError>;
}

/// A content moderation endpoint.
#[async_trait]
pub trait Moderator: Send + Sync {
    /// Classify a single text against content policy.
    async fn moderate(
        &self,
        text: &str,
    ) -> std::result::Result<ModerationVerdict, UpstreamError>;
}

/// A vector similarity index over documentation passages.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return the `top_k` most similar passages to the query vector,
    /// most relevant first. `namespace` selects a documentation set.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: Option<&str>,
    ) -> std::result::Result<Vec<ScoredPassage>, UpstreamError>;

    /// Health check — can we reach the index?
    async fn health_check(&self) -> std::result::Result<bool, UpstreamError> {
        Ok(true)
    }
}
