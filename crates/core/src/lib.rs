//! # docq Core
//!
//! Domain types, traits, and error definitions for the docq documentation
//! assistant. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (completion model, embedding model, moderation
//! endpoint, vector index) is defined as a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod capability;
pub mod error;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use capability::{
    ChatCompletion, CompletionChunk, CompletionRequest, Embedder, ModerationVerdict, Moderator,
    ScoredPassage, VectorIndex,
};
pub use error::{Error, Result, UpstreamError};
pub use message::{ChatMessage, RawMessage, Role};
