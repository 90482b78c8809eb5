//! The docq request pipeline.
//!
//! Each incoming chat request runs one sequential chain, suspending only
//! while awaiting an external call:
//!
//! 1. **Sanitize** the caller's messages (roles, whitespace)
//! 2. **Moderate** every message — fail fast before any paid call
//! 3. **Embed** the latest user question
//! 4. **Retrieve** the most similar documentation passages
//! 5. **Assemble** the grounding preamble from the fitted context block
//! 6. **Cap** history under the model ceiling
//! 7. **Complete** (or stream) the answer
//!
//! Nothing persists across requests; the pipeline object itself is
//! stateless and shared behind an `Arc`.

pub mod chat;
pub mod prompt;
pub mod sanitize;

pub use chat::{ChatPipeline, PipelineSettings};
pub use sanitize::sanitize;
