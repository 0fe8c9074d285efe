//! External chat-completion endpoint.
//!
//! The controller treats the chat backend as an opaque collaborator behind
//! the [`ChatBackend`] trait: one request in, one complete reply out. The
//! production implementation is [`HttpChatBackend`], which posts JSON to
//! `{base_url}/api/chat`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ChatError;
use crate::persona::Persona;
use crate::session::{ChatMessage, MessageRole};

/// Upper bound on the error body kept for logging.
const MAX_ERROR_BODY: usize = 512;

/// One prior message forwarded as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_personality: Option<Persona>,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            agent_personality: msg.persona,
        }
    }
}

/// Request body sent to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The visitor's new message.
    pub message: String,
    /// Messages of the session before `message`.
    pub conversation_history: Vec<HistoryEntry>,
    /// Persona of the session.
    pub current_agent: Persona,
}

/// Reply from the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    /// Persona tag the backend answered as; kept raw so an unknown tag does
    /// not fail the whole reply.
    #[serde(default)]
    pub agent_personality: Option<String>,
    #[serde(default)]
    pub suggested_agent: Option<String>,
    #[serde(default)]
    pub tools_used: Vec<String>,
}

impl ChatReply {
    /// Persona the reply is attributed to, if the backend named a known one.
    #[must_use]
    pub fn persona(&self) -> Option<Persona> {
        self.agent_personality.as_deref()?.parse().ok()
    }
}

/// Trait for chat backends.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one message with its context and wait for the complete reply.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// undecodable body.
    async fn send(&self, req: ChatRequest) -> Result<ChatReply, ChatError>;
}

/// Chat backend reached over HTTP.
#[derive(Clone)]
pub struct HttpChatBackend {
    http: reqwest::Client,
    endpoint: Url,
}

impl std::fmt::Debug for HttpChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChatBackend")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl HttpChatBackend {
    /// Create a backend for the service rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ChatError> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a backend with a custom reqwest client.
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self, ChatError> {
        let endpoint = Url::parse(&format!("{}/api/chat", base_url.trim_end_matches('/')))?;
        Ok(Self { http, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, req: ChatRequest) -> Result<ChatReply, ChatError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            persona = %req.current_agent,
            history_len = req.conversation_history.len(),
            "Calling chat endpoint"
        );

        let resp = self.http.post(self.endpoint.clone()).json(&req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let reply: ChatReply = serde_json::from_slice(&bytes)?;
        Ok(reply)
    }
}
