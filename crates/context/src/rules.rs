//! Per-model-family message token accounting.
//!
//! Chat APIs charge more than the sum of content tokens: every message
//! carries framing overhead, a present `name` field lets the role marker be
//! omitted, and the reply is primed with a fixed preamble. The constants
//! differ between model generations, so they are configuration keyed by
//! model identifier — not universal truths.

use crate::counter::CountTokens;
use docq_core::ChatMessage;

/// Accounting constants for one model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTokenRules {
    /// Fixed framing cost per message (role markers, separators).
    pub tokens_per_message: usize,

    /// Adjustment applied when a `name` field is present.
    pub tokens_per_name: isize,

    /// Fixed cost added once per request to prime the model's reply.
    pub reply_priming: usize,
}

impl MessageTokenRules {
    /// Look up the accounting rule for a model identifier.
    ///
    /// gpt-3.5-turbo frames every message as
    /// `<|start|>{role/name}\n{content}<|end|>\n` (4 tokens) and omits the
    /// role marker when a name is given (-1). gpt-4 tightened the framing
    /// to 3 tokens with a +1 name cost. Unknown models get the gpt-3.5
    /// constants, the family this service was budgeted against.
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("gpt-4") {
            Self {
                tokens_per_message: 3,
                tokens_per_name: 1,
                reply_priming: 3,
            }
        } else {
            Self {
                tokens_per_message: 4,
                tokens_per_name: -1,
                reply_priming: 3,
            }
        }
    }

    /// Count the tokens one message costs inside a chat request.
    ///
    /// Framing overhead, plus every field's text value (role label,
    /// content, and the optional name), plus the name adjustment.
    pub fn message_tokens(&self, counter: &dyn CountTokens, message: &ChatMessage) -> usize {
        let mut tokens = self.tokens_per_message as isize;
        tokens += counter.count(message.role.as_str()) as isize;
        tokens += counter.count(&message.content) as isize;
        if let Some(name) = &message.name {
            tokens += counter.count(name) as isize;
            tokens += self.tokens_per_name;
        }
        tokens.max(0) as usize
    }

    /// Count the tokens a whole multi-message request costs, including the
    /// reply priming overhead added once per request.
    pub fn request_tokens(&self, counter: &dyn CountTokens, messages: &[ChatMessage]) -> usize {
        messages
            .iter()
            .map(|m| self.message_tokens(counter, m))
            .sum::<usize>()
            + self.reply_priming
    }
}
