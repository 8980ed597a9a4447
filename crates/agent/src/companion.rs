//! The generation orchestrator.
//!
//! One call to [`Companion::respond`] turns a user message into a reply:
//!
//! 1. **Detect** the mood of the message
//! 2. **Assemble** the system prompt and memory digest
//! 3. **Compose** `[system] + history + [user]`
//! 4. **Generate** with exactly one backend request, bounded by a timeout
//! 5. **Commit** the user turn and the reply to the conversation window
//!
//! Step 5 only happens on success. On any failure the window is left as it
//! was and the user receives a fixed fallback message instead.

use crate::context::{AssembledContext, ContextAssembler};
use crate::conversation::ConversationStore;
use crate::error::GenerationError;
use mercy_config::AppConfig;
use mercy_core::identity::Identity;
use mercy_core::memory::{DEFAULT_DISPLAY_NAME, Fact, MemoryStore, Task};
use mercy_core::message::Message;
use mercy_core::mood::detect_mood;
use mercy_core::provider::{GenerationOptions, Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default upper bound on one backend call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// The mood-aware companion.
pub struct Companion {
    provider: Arc<dyn Provider>,
    store: Arc<dyn MemoryStore>,
    conversations: Arc<ConversationStore>,
    assembler: ContextAssembler,
    model: String,
    options: GenerationOptions,
    timeout: Duration,
}

impl Companion {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn MemoryStore>,
        conversations: Arc<ConversationStore>,
        identity: Identity,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            conversations,
            assembler: ContextAssembler::new(identity),
            model: model.into(),
            options: GenerationOptions::default(),
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    /// Build a companion from loaded configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn MemoryStore>,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        Self::new(provider, store, conversations, config.bot.clone(), &config.ollama.model)
            .with_options(config.ollama.options.clone())
            .with_timeout(Duration::from_secs(config.ollama.timeout_secs))
            .with_digest_limits(config.conversation.digest_facts, config.conversation.digest_tasks)
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the upper bound on one backend call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_digest_limits(mut self, facts: usize, tasks: usize) -> Self {
        self.assembler = self.assembler.with_limits(facts, tasks);
        self
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn identity(&self) -> &Identity {
        self.assembler.identity()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Reply to `message`, loading the user's name, facts, and tasks from
    /// the record store. Always returns some text; failures become the
    /// matching fallback message.
    pub async fn respond(&self, user_id: &str, message: &str) -> String {
        let display_name = self.store.get_display_name(user_id).await.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Display name lookup failed");
            DEFAULT_DISPLAY_NAME.into()
        });
        let facts = self
            .store
            .get_recent_facts(user_id, self.assembler.max_facts())
            .await
            .unwrap_or_else(|e| {
                warn!(user_id, error = %e, "Fact lookup failed, continuing without facts");
                Vec::new()
            });
        let tasks = self
            .store
            .get_pending_tasks(user_id, self.assembler.max_tasks())
            .await
            .unwrap_or_else(|e| {
                warn!(user_id, error = %e, "Task lookup failed, continuing without tasks");
                Vec::new()
            });

        match self.respond_with(user_id, message, &display_name, &facts, &tasks).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(user_id, kind = e.kind(), error = %e, "Generation failed, sending fallback");
                e.fallback_message()
            }
        }
    }

    /// Reply to `message` given pre-fetched snapshots.
    ///
    /// On success the user turn and the reply are committed to the
    /// conversation window as one pair. On failure nothing is committed.
    /// Dropping the returned future abandons the backend call and likewise
    /// commits nothing.
    pub async fn respond_with(
        &self,
        user_id: &str,
        message: &str,
        display_name: &str,
        facts: &[Fact],
        tasks: &[Task],
    ) -> Result<String, GenerationError> {
        let mood = detect_mood(message);
        let context = self
            .assembler
            .build_context(user_id, mood, display_name, facts, tasks);
        let history = self.conversations.get(user_id).await;

        debug!(
            user_id,
            mood = %mood,
            history = history.len(),
            digest = !context.memory_digest.is_empty(),
            "Generating reply"
        );

        let request = self.build_request(&context, history, message);

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                GenerationError::Timeout(format!("no reply within {}s", self.timeout.as_secs_f32()))
            })??;

        let reply = response.message.content;
        self.conversations
            .append_exchange(user_id, message, reply.as_str())
            .await;

        info!(user_id, mood = %mood, reply_len = reply.len(), "Reply generated");
        Ok(reply)
    }

    /// Compose the backend request: `[system] + history + [user]`.
    fn build_request(
        &self,
        context: &AssembledContext,
        history: Vec<Message>,
        message: &str,
    ) -> ProviderRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(context.effective_prompt()));
        messages.extend(history);
        messages.push(Message::user(message));

        ProviderRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: self.options.clone(),
        }
    }
}
