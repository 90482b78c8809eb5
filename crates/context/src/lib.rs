//! Token-budget request shaping — the core algorithmic component.
//!
//! Given an ordered chat history and a ranked block of retrieved reference
//! passages, produce a message sequence that:
//!
//! 1. includes as much reference context as fits under a soft cap,
//! 2. includes as much conversation history as fits,
//! 3. stays under the model's total token ceiling after reserving room
//!    for the model's reply.
//!
//! Counting is exact (BPE via tiktoken) and per-message overhead follows
//! the target model family's accounting rule, so the budget math agrees
//! with what the completion API will actually charge.
//!
//! # Determinism
//!
//! Fitting is deterministic: identical inputs always produce identical
//! outputs. No random or time-dependent logic is used.

pub mod counter;
pub mod fitter;
pub mod rules;

pub use counter::{CountTokens, TokenCounter};
pub use fitter::{ContextFitter, CONTEXT_SEPARATOR};
pub use rules::MessageTokenRules;
