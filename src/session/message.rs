//! Chat message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::persona::Persona;

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Visitor input.
    User,
    /// Persona reply.
    Assistant,
}

/// A single message in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Authoring persona; only set on assistant messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<Persona>,
    pub timestamp: DateTime<Utc>,
    /// True while streamed playback is still revealing `content`.
    #[serde(default)]
    pub is_streaming: bool,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            persona: None,
            timestamp: Utc::now(),
            is_streaming: false,
        }
    }

    #[must_use]
    pub fn assistant(persona: Persona, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            persona: Some(persona),
            timestamp: Utc::now(),
            is_streaming: false,
        }
    }

    /// Assistant message that starts out in the streaming state.
    #[must_use]
    pub fn streaming(persona: Persona, content: impl Into<String>) -> Self {
        Self {
            is_streaming: true,
            ..Self::assistant(persona, content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_has_no_persona() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("persona").is_none());
        assert_eq!(json["is_streaming"], false);
    }

    #[test]
    fn test_streaming_constructor() {
        let msg = ChatMessage::streaming(Persona::JobAdvisor, "full text");
        assert!(msg.is_streaming);
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.persona, Some(Persona::JobAdvisor));
    }
}
