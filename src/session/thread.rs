//! Conversation thread.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::message::{ChatMessage, MessageRole};
use crate::persona::Persona;

/// One persona-scoped, ordered conversation.
///
/// Messages are append-only. The only in-place mutation is the content and
/// streaming flag of the last message while it is an assistant message being
/// played back.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: String,
    persona: Persona,
    messages: Vec<ChatMessage>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session opened by the persona's greeting.
    #[must_use]
    pub fn new(persona: Persona) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            persona,
            messages: vec![ChatMessage::assistant(persona, persona.greeting())],
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn persona(&self) -> Persona {
        self.persona
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Append a message; returns its index.
    pub fn add_message(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Replace the content of the streaming tail message.
    ///
    /// Returns `false` (and changes nothing) when the last message is not an
    /// assistant message in the streaming state.
    pub fn update_streaming(&mut self, content: &str) -> bool {
        match self.streaming_tail() {
            Some(msg) => {
                content.clone_into(&mut msg.content);
                true
            }
            None => false,
        }
    }

    /// Clear the streaming flag on the tail message.
    pub fn finish_streaming(&mut self) -> bool {
        match self.streaming_tail() {
            Some(msg) => {
                msg.is_streaming = false;
                true
            }
            None => false,
        }
    }

    fn streaming_tail(&mut self) -> Option<&mut ChatMessage> {
        self.messages
            .last_mut()
            .filter(|m| m.role == MessageRole::Assistant && m.is_streaming)
    }
}
