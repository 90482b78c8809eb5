//! Exact token counting via tiktoken BPE.
//!
//! The counter is the one seam the fitter needs from the outside world, so
//! it is a trait: production code wraps `tiktoken_rs::CoreBPE`, tests
//! substitute deterministic stubs.

use std::sync::Arc;

/// Count tokens in a piece of text.
pub trait CountTokens: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Token counter using tiktoken-rs for accurate BPE tokenization.
pub struct TokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TokenCounter {
    /// Create a token counter for the given model.
    /// Falls back to cl100k_base if the model isn't recognized.
    pub fn for_model(model: &str) -> Self {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .unwrap_or_else(|_| tiktoken_rs::cl100k_base().expect("cl100k_base should be available"));
        Self { bpe }
    }

    /// Create a counter for the model and wrap it for shared use.
    ///
    /// Loading the BPE ranks is expensive; build one per process at startup
    /// and pass the handle into the pipeline.
    pub fn shared(model: &str) -> Arc<Self> {
        Arc::new(Self::for_model(model))
    }
}

impl CountTokens for TokenCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_with_special_tokens(text).len()
    }
}
