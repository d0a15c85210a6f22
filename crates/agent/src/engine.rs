//! The reply engine: one full conversational turn.

use parley_core::message::{ConversationId, Role};
use parley_memory::ConversationMemory;
use parley_providers::GenerationOrchestrator;
use std::sync::Arc;
use tracing::{debug, info};

use crate::persona::Persona;

/// Ties conversation memory to the generation orchestrator.
pub struct ReplyEngine {
    memory: Arc<ConversationMemory>,
    orchestrator: Arc<GenerationOrchestrator>,
    persona: Persona,
}

impl ReplyEngine {
    pub fn new(
        memory: Arc<ConversationMemory>,
        orchestrator: Arc<GenerationOrchestrator>,
        persona: Persona,
    ) -> Self {
        Self {
            memory,
            orchestrator,
            persona,
        }
    }

    /// Produce the reply to `text` from `user_name` in a conversation.
    ///
    /// The user's message and the reply are both appended to memory. Turns
    /// for the same conversation run one at a time; blank input is answered
    /// with the persona's nudge and leaves memory and providers untouched.
    pub async fn respond(&self, conversation: &ConversationId, user_name: &str, text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            debug!(conversation = %conversation, "Empty message, sending nudge");
            return self.persona.empty_message_reply().to_string();
        }

        let _turn = self.memory.lock_turn(conversation).await;

        info!(
            conversation = %conversation,
            user = user_name,
            chars = text.chars().count(),
            "Incoming message"
        );

        self.memory
            .add_message(conversation, Role::User, text)
            .await;
        let history = self.memory.history(conversation).await;
        let instruction = self.persona.instruction_for(user_name);

        let reply = self.orchestrator.generate(&history, &instruction).await;

        self.memory
            .add_message(conversation, Role::Assistant, reply.as_str())
            .await;

        info!(
            conversation = %conversation,
            chars = reply.chars().count(),
            history = history.len() + 1,
            "Replied"
        );
        reply
    }

    /// Forget a conversation's history. Returns whether it existed.
    pub async fn clear(&self, conversation: &ConversationId) -> bool {
        let _turn = self.memory.lock_turn(conversation).await;
        self.memory.clear(conversation).await
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub fn orchestrator(&self) -> &Arc<GenerationOrchestrator> {
        &self.orchestrator
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }
}
