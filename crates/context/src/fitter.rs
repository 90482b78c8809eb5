//! The context fitter: greedy reference-block assembly and oldest-first
//! history capping.
//!
//! # Algorithm
//!
//! **Context block** — walk the ranked passages in order, keeping a running
//! token count. A passage is appended only if the running count after adding
//! it (separator included) stays within the soft cap; the walk stops at the
//! first passage that would exceed it. Ranking order is trusted as relevance
//! order, so the greedy prefix is "best-effort top-k within budget".
//! Passages are never partially included.
//!
//! **Capping** — compute the full request cost (preamble + history + reply
//! priming). While the total does not fit under `ceiling - reserved`, drop
//! the oldest history message. Each iteration strictly shrinks the
//! sequence, so the loop terminates in at most `history.len()` steps. If
//! the total still does not fit once only the latest question remains, the
//! request is unservable and fails with `BudgetExhausted`.

use crate::counter::CountTokens;
use crate::rules::MessageTokenRules;
use docq_core::{ChatMessage, Error};
use std::sync::Arc;
use tracing::debug;

/// Separator joined between accepted reference passages.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Budget-fits requests for one model family. Stateless — create one and
/// reuse it across requests.
pub struct ContextFitter {
    counter: Arc<dyn CountTokens>,
    rules: MessageTokenRules,
}

impl ContextFitter {
    /// Create a fitter from a token counter and the model family's
    /// accounting rule.
    pub fn new(counter: Arc<dyn CountTokens>, rules: MessageTokenRules) -> Self {
        Self { counter, rules }
    }

    /// The accounting rule in effect.
    pub fn rules(&self) -> &MessageTokenRules {
        &self.rules
    }

    /// Count the tokens one message costs inside a request.
    pub fn message_tokens(&self, message: &ChatMessage) -> usize {
        self.rules.message_tokens(self.counter.as_ref(), message)
    }

    /// Count the tokens a whole request costs, reply priming included.
    pub fn request_tokens(&self, messages: &[ChatMessage]) -> usize {
        self.rules.request_tokens(self.counter.as_ref(), messages)
    }

    /// Assemble a reference block from ranked passages under a token cap.
    ///
    /// Returns an empty string when nothing fits (including when the input
    /// is empty). The result is always an order-preserving prefix of the
    /// input, joined with [`CONTEXT_SEPARATOR`].
    pub fn build_context_block<S: AsRef<str>>(
        &self,
        sections: &[S],
        max_context_tokens: usize,
    ) -> String {
        let mut block = String::new();
        let mut used = 0;
        let mut included = 0;

        for section in sections {
            let text = section.as_ref();
            let mut cost = self.counter.count(text);
            if !block.is_empty() {
                cost += self.counter.count(CONTEXT_SEPARATOR);
            }
            if used + cost > max_context_tokens {
                break;
            }
            if !block.is_empty() {
                block.push_str(CONTEXT_SEPARATOR);
            }
            block.push_str(text);
            used += cost;
            included += 1;
        }

        if included < sections.len() {
            debug!(
                included,
                total = sections.len(),
                tokens = used,
                cap = max_context_tokens,
                "reference passages truncated to fit context cap"
            );
        }

        block
    }

    /// Fit `init ++ history` under the model ceiling, reserving reply room.
    ///
    /// History is dropped oldest-first (index 0). The latest message — the
    /// user's current question — is never dropped; if the request does not
    /// fit even then, there is no way to serve it and the call fails with
    /// [`Error::BudgetExhausted`].
    pub fn cap_messages(
        &self,
        init: &[ChatMessage],
        history: &[ChatMessage],
        ceiling: usize,
        reserved: usize,
    ) -> Result<Vec<ChatMessage>, Error> {
        let available = ceiling.saturating_sub(reserved);

        let mut total = self.request_tokens(init);
        total += history
            .iter()
            .map(|m| self.message_tokens(m))
            .sum::<usize>();

        // Per-message costs are independent, so dropping a message reduces
        // the total by exactly its own cost.
        let mut start = 0;
        while total >= available && history.len() - start > 1 {
            total -= self.message_tokens(&history[start]);
            start += 1;
        }

        if total >= available {
            return Err(Error::BudgetExhausted {
                needed: total,
                available,
            });
        }

        if start > 0 {
            debug!(
                dropped = start,
                kept = history.len() - start,
                tokens = total,
                available,
                "oldest conversation turns dropped to fit the model ceiling"
            );
        }

        Ok(init.iter().chain(&history[start..]).cloned().collect())
    }
}
