//! The grounding preamble.
//!
//! Three messages precede the conversation: a system identity, the fitted
//! documentation block, and the answering rules. The rules deliberately
//! handle the empty-context case — when retrieval finds nothing useful the
//! model is instructed to say it doesn't know rather than invent.

use docq_core::ChatMessage;

/// The refusal sentence the rules instruct the model to use.
pub const FALLBACK_ANSWER: &str = "Sorry, I don't know how to help with that.";

const ANSWER_RULES: &str = "Answer all future questions using only the above documentation. \
You must also follow the below rules when answering:\n\
- Do not make up answers that are not provided in the documentation.\n\
- If you are unsure and the answer is not explicitly written in the documentation context, \
say \"Sorry, I don't know how to help with that.\"\n\
- Prefer splitting your response into multiple paragraphs.\n\
- Output as markdown.\n\
- Always include code snippets if available.";

/// Build the system identity message text.
fn identity(product_name: &str, system_override: Option<&str>) -> String {
    match system_override {
        Some(text) => text.to_string(),
        None => format!(
            "You are a very enthusiastic {product_name} AI who loves to help people! \
             Given the following information from the {product_name} documentation, \
             answer the user's question using only that information, \
             outputted in markdown format."
        ),
    }
}

/// Build the grounding preamble around a fitted context block.
///
/// The block may be empty; the rules message still forces the
/// can't-answer reply in that case.
pub fn build_init_messages(
    context_block: &str,
    product_name: &str,
    system_override: Option<&str>,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(identity(product_name, system_override)),
        ChatMessage::user(format!(
            "Here is the {product_name} documentation:\n{context_block}"
        )),
        ChatMessage::user(ANSWER_RULES),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use docq_core::Role;

    #[test]
    fn preamble_shape() {
        let init = build_init_messages("Routing docs here.", "Hilla", None);
        assert_eq!(init.len(), 3);
        assert_eq!(init[0].role, Role::System);
        assert_eq!(init[1].role, Role::User);
        assert_eq!(init[2].role, Role::User);
    }

    #[test]
    fn context_block_is_embedded() {
        let init = build_init_messages("Routing docs here.", "Hilla", None);
        assert!(init[1].content.contains("Routing docs here."));
        assert!(init[1].content.contains("Hilla documentation"));
    }

    #[test]
    fn identity_names_the_product() {
        let init = build_init_messages("", "Hilla", None);
        assert!(init[0].content.contains("Hilla"));
    }

    #[test]
    fn system_override_wins() {
        let init = build_init_messages("", "Hilla", Some("You are terse."));
        assert_eq!(init[0].content, "You are terse.");
    }

    #[test]
    fn rules_include_the_fallback_answer() {
        let init = build_init_messages("", "Hilla", None);
        assert!(init[2].content.contains(FALLBACK_ANSWER));
    }
}
