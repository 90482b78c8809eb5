//! The chat pipeline service object.
//!
//! Holds constructed-once handles to the four external capabilities and the
//! context fitter, and runs the sanitize → moderate → embed → retrieve →
//! assemble → cap → complete chain for each request.

use std::sync::Arc;

use docq_context::{ContextFitter, CountTokens, MessageTokenRules};
use docq_core::capability::{
    ChatCompletion, CompletionRequest, Embedder, Moderator, VectorIndex,
};
use docq_core::error::{Result, UpstreamError};
use docq_core::{ChatMessage, Error, RawMessage, Role};
use futures::future;
use tracing::{debug, info, warn};

use crate::prompt::build_init_messages;
use crate::sanitize::sanitize;

/// Request-shaping settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Completion model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Hard limit for the whole request
    pub model_ceiling: usize,
    /// Tokens reserved for the model's reply
    pub reserved_reply_tokens: usize,
    /// Soft cap for the injected documentation block
    pub max_context_tokens: usize,
    /// Passages retrieved per question
    pub top_k: usize,
    /// Index namespace when the request names none
    pub default_namespace: Option<String>,
    /// Product name used in the grounding preamble
    pub product_name: String,
    /// Full override for the system identity message
    pub system_override: Option<String>,
}

impl PipelineSettings {
    /// Derive pipeline settings from the application config.
    pub fn from_config(config: &docq_config::AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            model_ceiling: config.budget.model_ceiling,
            reserved_reply_tokens: config.budget.reserved_reply_tokens,
            max_context_tokens: config.budget.max_context_tokens,
            top_k: config.retrieval.top_k,
            default_namespace: config.retrieval.namespace.clone(),
            product_name: config.prompt.product_name.clone(),
            system_override: config.prompt.system_override.clone(),
        }
    }
}

/// The documentation Q&A pipeline. Stateless across requests — build one
/// at startup and share it behind an `Arc`.
pub struct ChatPipeline {
    completion: Arc<dyn ChatCompletion>,
    embedder: Arc<dyn Embedder>,
    moderator: Arc<dyn Moderator>,
    index: Arc<dyn VectorIndex>,
    fitter: ContextFitter,
    settings: PipelineSettings,
}

impl ChatPipeline {
    /// Wire up the pipeline from its collaborators.
    pub fn new(
        completion: Arc<dyn ChatCompletion>,
        embedder: Arc<dyn Embedder>,
        moderator: Arc<dyn Moderator>,
        index: Arc<dyn VectorIndex>,
        counter: Arc<dyn CountTokens>,
        settings: PipelineSettings,
    ) -> Self {
        let fitter = ContextFitter::new(counter, MessageTokenRules::for_model(&settings.model));
        Self {
            completion,
            embedder,
            moderator,
            index,
            fitter,
            settings,
        }
    }

    /// Answer a chat request, returning the full completion text.
    pub async fn answer(
        &self,
        messages: &[RawMessage],
        frontend_variant: Option<&str>,
    ) -> Result<String> {
        let shaped = self.shape_request(messages, frontend_variant).await?;
        let text = self.completion.complete(self.completion_request(shaped)).await?;
        Ok(text)
    }

    /// Answer a chat request as a stream of text fragments.
    ///
    /// The stream ends by channel exhaustion. Dropping the receiver cancels
    /// the completion: the forwarding task's send fails and the upstream
    /// read is released.
    pub async fn answer_stream(
        &self,
        messages: &[RawMessage],
        frontend_variant: Option<&str>,
    ) -> Result<tokio::sync::mpsc::Receiver<std::result::Result<String, UpstreamError>>> {
        let shaped = self.shape_request(messages, frontend_variant).await?;
        let mut chunks = self
            .completion
            .stream(self.completion_request(shaped))
            .await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(item) = chunks.recv().await {
                match item {
                    Ok(chunk) => {
                        if let Some(content) = chunk.content {
                            if !content.is_empty() && tx.send(Ok(content)).await.is_err() {
                                return; // receiver dropped — caller cancelled
                            }
                        }
                        if chunk.done {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Run the request-shaping chain: sanitize → moderate → embed →
    /// retrieve → assemble → cap.
    async fn shape_request(
        &self,
        messages: &[RawMessage],
        frontend_variant: Option<&str>,
    ) -> Result<Vec<ChatMessage>> {
        let history = sanitize(messages)?;

        let question = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .ok_or_else(|| Error::Internal("request contains no user question".into()))?;

        // Moderation gate: every message, before any paid call.
        let verdicts = future::try_join_all(
            history.iter().map(|m| self.moderator.moderate(&m.content)),
        )
        .await
        .map_err(Error::Upstream)?;
        if let Some(flagged) = verdicts.iter().position(|v| v.flagged) {
            warn!(message_index = flagged, "moderation flagged request content");
            return Err(Error::ContentRejected);
        }

        let vector = self.embedder.embed(&question).await?;

        let namespace = frontend_variant.or(self.settings.default_namespace.as_deref());
        let passages = self
            .index
            .query(&vector, self.settings.top_k, namespace)
            .await?;
        debug!(retrieved = passages.len(), "similar documentation passages");

        let sections: Vec<String> = passages.into_iter().map(|p| p.text).collect();
        let context_block = self
            .fitter
            .build_context_block(&sections, self.settings.max_context_tokens);

        let init = build_init_messages(
            &context_block,
            &self.settings.product_name,
            self.settings.system_override.as_deref(),
        );

        let shaped = self.fitter.cap_messages(
            &init,
            &history,
            self.settings.model_ceiling,
            self.settings.reserved_reply_tokens,
        )?;

        info!(
            messages = shaped.len(),
            tokens = self.fitter.request_tokens(&shaped),
            "request shaped"
        );
        Ok(shaped)
    }

    fn completion_request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.reserved_reply_tokens as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docq_core::capability::{CompletionChunk, ModerationVerdict, ScoredPassage};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct WordCounter;

    impl CountTokens for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    #[derive(Default)]
    struct StubCompletion {
        reply: String,
        chunks: Vec<String>,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    #[async_trait]
    impl ChatCompletion for StubCompletion {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, UpstreamError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(self.reply.clone())
        }

        async fn stream(
            &self,
            request: CompletionRequest,
        ) -> Result<
            tokio::sync::mpsc::Receiver<Result<CompletionChunk, UpstreamError>>,
            UpstreamError,
        > {
            *self.last_request.lock().unwrap() = Some(request);
            let (tx, rx) = tokio::sync::mpsc::channel(8);
            let chunks = self.chunks.clone();
            tokio::spawn(async move {
                for content in chunks {
                    if tx
                        .send(Ok(CompletionChunk {
                            content: Some(content),
                            done: false,
                        }))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                let _ = tx
                    .send(Ok(CompletionChunk {
                        content: None,
                        done: true,
                    }))
                    .await;
            });
            Ok(rx)
        }
    }

    #[derive(Default)]
    struct StubEmbedder {
        called: AtomicBool,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, UpstreamError> {
            self.called.store(true, Ordering::SeqCst);
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    #[derive(Default)]
    struct StubModerator {
        flag_term: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Moderator for StubModerator {
        async fn moderate(&self, text: &str) -> Result<ModerationVerdict, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let flagged = self
                .flag_term
                .as_deref()
                .is_some_and(|term| text.contains(term));
            Ok(ModerationVerdict {
                flagged,
                categories: vec![],
            })
        }
    }

    #[derive(Default)]
    struct StubIndex {
        passages: Vec<ScoredPassage>,
        last_namespace: Mutex<Option<String>>,
    }

    #[async_trait]
    impl VectorIndex for StubIndex {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            namespace: Option<&str>,
        ) -> Result<Vec<ScoredPassage>, UpstreamError> {
            *self.last_namespace.lock().unwrap() = namespace.map(str::to_string);
            Ok(self.passages.clone())
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            model: "gpt-3.5-turbo".into(),
            temperature: 0.0,
            model_ceiling: 500,
            reserved_reply_tokens: 100,
            max_context_tokens: 50,
            top_k: 3,
            default_namespace: None,
            product_name: "Hilla".into(),
            system_override: None,
        }
    }

    struct Fixture {
        completion: Arc<StubCompletion>,
        embedder: Arc<StubEmbedder>,
        moderator: Arc<StubModerator>,
        index: Arc<StubIndex>,
    }

    impl Fixture {
        fn pipeline(&self, settings: PipelineSettings) -> ChatPipeline {
            ChatPipeline::new(
                self.completion.clone(),
                self.embedder.clone(),
                self.moderator.clone(),
                self.index.clone(),
                Arc::new(WordCounter),
                settings,
            )
        }
    }

    fn fixture() -> Fixture {
        Fixture {
            completion: Arc::new(StubCompletion {
                reply: "Use the Route annotation.".into(),
                chunks: vec!["Use the ".into(), "Route ".into(), "annotation.".into()],
                last_request: Mutex::new(None),
            }),
            embedder: Arc::new(StubEmbedder::default()),
            moderator: Arc::new(StubModerator::default()),
            index: Arc::new(StubIndex {
                passages: vec![
                    ScoredPassage {
                        text: "Views are registered with annotations.".into(),
                        score: 0.92,
                    },
                    ScoredPassage {
                        text: "The router renders the active view.".into(),
                        score: 0.85,
                    },
                ],
                last_namespace: Mutex::new(None),
            }),
        }
    }

    fn question(text: &str) -> Vec<RawMessage> {
        vec![RawMessage::new("user", text)]
    }

    #[tokio::test]
    async fn happy_path_returns_answer() {
        let fx = fixture();
        let pipeline = fx.pipeline(settings());

        let answer = pipeline
            .answer(&question("How do I register a view?"), None)
            .await
            .unwrap();
        assert_eq!(answer, "Use the Route annotation.");

        let request = fx.completion.last_request.lock().unwrap().clone().unwrap();
        // Preamble (3 messages) + the question
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[1].content.contains("Views are registered"));
        assert_eq!(request.messages[3].content, "How do I register a view?");
        assert_eq!(request.max_tokens, 100);
    }

    #[tokio::test]
    async fn flagged_content_aborts_before_embedding() {
        let fx = Fixture {
            moderator: Arc::new(StubModerator {
                flag_term: Some("FORBIDDEN".into()),
                calls: AtomicUsize::new(0),
            }),
            ..fixture()
        };
        let pipeline = fx.pipeline(settings());

        let err = pipeline
            .answer(&question("tell me the FORBIDDEN thing"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentRejected));
        // The moderation gate ran, but no embedding cost was incurred.
        assert_eq!(fx.moderator.calls.load(Ordering::SeqCst), 1);
        assert!(!fx.embedder.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn every_message_is_moderated() {
        let fx = fixture();
        let pipeline = fx.pipeline(settings());
        let messages = vec![
            RawMessage::new("user", "first question"),
            RawMessage::new("assistant", "earlier answer"),
            RawMessage::new("user", "follow-up question"),
        ];
        pipeline.answer(&messages, None).await.unwrap();
        assert_eq!(fx.moderator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn invalid_role_rejected_before_moderation() {
        let fx = fixture();
        let pipeline = fx.pipeline(settings());
        let messages = vec![RawMessage::new("tool", "smuggled output")];

        let err = pipeline.answer(&messages, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRole { .. }));
        assert_eq!(fx.moderator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_user_question_is_internal_error() {
        let fx = fixture();
        let pipeline = fx.pipeline(settings());
        let messages = vec![RawMessage::new("assistant", "only me here")];

        let err = pipeline.answer(&messages, None).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn unfittable_request_is_budget_exhausted() {
        let fx = fixture();
        let mut tight = settings();
        tight.model_ceiling = 60;
        tight.reserved_reply_tokens = 30;
        let pipeline = fx.pipeline(tight);

        let err = pipeline
            .answer(&question("a question that cannot possibly fit"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BudgetExhausted { .. }));
    }

    #[tokio::test]
    async fn variant_selects_namespace() {
        let fx = fixture();
        let pipeline = fx.pipeline(settings());
        pipeline
            .answer(&question("routing?"), Some("flow"))
            .await
            .unwrap();
        assert_eq!(
            fx.index.last_namespace.lock().unwrap().as_deref(),
            Some("flow")
        );
    }

    #[tokio::test]
    async fn default_namespace_applies_without_variant() {
        let fx = fixture();
        let mut with_ns = settings();
        with_ns.default_namespace = Some("hilla".into());
        let pipeline = fx.pipeline(with_ns);
        pipeline.answer(&question("routing?"), None).await.unwrap();
        assert_eq!(
            fx.index.last_namespace.lock().unwrap().as_deref(),
            Some("hilla")
        );
    }

    #[tokio::test]
    async fn streaming_yields_fragments_then_ends() {
        let fx = fixture();
        let pipeline = fx.pipeline(settings());

        let mut rx = pipeline
            .answer_stream(&question("How do I register a view?"), None)
            .await
            .unwrap();

        let mut answer = String::new();
        while let Some(fragment) = rx.recv().await {
            answer.push_str(&fragment.unwrap());
        }
        assert_eq!(answer, "Use the Route annotation.");
    }

    #[tokio::test]
    async fn empty_retrieval_still_answers() {
        let fx = Fixture {
            index: Arc::new(StubIndex::default()),
            ..fixture()
        };
        let pipeline = fx.pipeline(settings());

        // No passages found — the request still completes; the rules
        // prompt makes the model decline on its own.
        let answer = pipeline
            .answer(&question("something obscure"), None)
            .await
            .unwrap();
        assert_eq!(answer, "Use the Route annotation.");

        let request = fx.completion.last_request.lock().unwrap().clone().unwrap();
        assert!(request.messages[1].content.ends_with("documentation:\n"));
    }
}
