//! External model clients for docq.
//!
//! One OpenAI-compatible HTTP client covers all three model-side
//! capabilities the pipeline needs: chat completions (plain and streaming),
//! embeddings, and moderation. The client implements the corresponding
//! `docq_core` traits; the pipeline never sees reqwest.

pub mod openai;

pub use openai::OpenAiClient;

use std::sync::Arc;

/// Build the model client from configuration.
pub fn build_from_config(config: &docq_config::AppConfig) -> Arc<OpenAiClient> {
    let api_key = config.api_key.clone().unwrap_or_default();
    let client = OpenAiClient::new(&config.api_base_url, api_key)
        .with_embedding_model(&config.embedding_model);
    Arc::new(client)
}
