//! Documentation retrieval for docq.
//!
//! The documentation corpus lives in an external vector index; this crate
//! provides the query client. Upserting/ingest is a separate offline
//! concern and not part of the serving path.

pub mod pinecone;

pub use pinecone::PineconeIndex;

use std::sync::Arc;

/// Build the vector index client from configuration.
pub fn build_from_config(config: &docq_config::AppConfig) -> Arc<PineconeIndex> {
    let api_key = config.retrieval.api_key.clone().unwrap_or_default();
    Arc::new(PineconeIndex::new(&config.retrieval.index_url, api_key))
}
