//! Conversational assistant with an explicitly owned session.

use crate::error::{Result, StudioError};
use crate::gateway::{ChatSessionId, Gateway};
use serde::{Deserialize, Serialize};

/// Reply recorded when the assistant could not answer.
pub const CHAT_FALLBACK_REPLY: &str = "Sorry, I couldn't get a response. Please try again.";

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person typing.
    User,
    /// The model.
    Assistant,
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Message body.
    pub text: String,
}

/// In-memory, append-only record of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    fn push(&mut self, role: ChatRole, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role,
            text: text.into(),
        });
    }

    /// All messages, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing was said yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A conversation owned by its caller.
///
/// The remote conversation is opened on the first turn and reused after that;
/// each turn sends only the new user text.
#[derive(Debug, Default)]
pub struct ChatSession {
    remote: Option<ChatSessionId>,
    transcript: ChatTranscript,
}

impl ChatSession {
    /// Creates a session with nothing said yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The conversation so far.
    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    /// Returns true once the remote conversation exists.
    pub fn is_started(&self) -> bool {
        self.remote.is_some()
    }

    /// Sends `text` and records the reply.
    ///
    /// On failure the fallback reply is recorded so every user turn is
    /// answered, and [`StudioError::ChatError`] is returned.
    pub async fn send_turn(&mut self, gateway: &dyn Gateway, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StudioError::MissingInput("type a message".into()));
        }
        self.transcript.push(ChatRole::User, text);

        match self.exchange(gateway, text).await {
            Ok(reply) => {
                self.transcript.push(ChatRole::Assistant, reply.as_str());
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!("chat turn failed: {e}");
                self.transcript.push(ChatRole::Assistant, CHAT_FALLBACK_REPLY);
                Err(match e {
                    StudioError::ChatError(message) | StudioError::Gateway { message, .. } => {
                        StudioError::ChatError(message)
                    }
                    other => StudioError::ChatError(other.to_string()),
                })
            }
        }
    }

    async fn exchange(&mut self, gateway: &dyn Gateway, text: &str) -> Result<String> {
        let session = match self.remote {
            Some(id) => id,
            None => {
                let id = gateway.start_chat().await?;
                self.remote = Some(id);
                id
            }
        };
        gateway.chat_turn(&session, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedGateway;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_session_created_once_and_reused() {
        let gw = ScriptedGateway::new();
        gw.push_chat(Ok("Hi there".into()));
        gw.push_chat(Ok("Sure".into()));

        let mut chat = ChatSession::new();
        assert!(!chat.is_started());
        assert_eq!(chat.send_turn(&gw, "hello").await.unwrap(), "Hi there");
        assert_eq!(chat.send_turn(&gw, " can you help? ").await.unwrap(), "Sure");

        assert_eq!(gw.chats_started.load(Ordering::SeqCst), 1);
        let inputs = gw.chat_inputs.lock().unwrap().clone();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].0, inputs[1].0);
        assert_eq!(inputs[1].1, "can you help?");

        let roles: Vec<ChatRole> = chat.transcript().messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_appends_fallback() {
        let gw = ScriptedGateway::new();
        gw.push_chat(Err(StudioError::Gateway {
            status: 500,
            message: "overloaded".into(),
        }));
        gw.push_chat(Ok("Back online".into()));

        let mut chat = ChatSession::new();
        match chat.send_turn(&gw, "hello").await {
            Err(StudioError::ChatError(msg)) => assert_eq!(msg, "overloaded"),
            other => panic!("Expected ChatError, got: {:?}", other),
        }
        assert_eq!(chat.transcript().len(), 2);
        assert_eq!(
            chat.transcript().last().map(|m| m.text.as_str()),
            Some(CHAT_FALLBACK_REPLY)
        );

        // The transcript keeps working after a failure.
        assert_eq!(chat.send_turn(&gw, "again").await.unwrap(), "Back online");
        assert_eq!(chat.transcript().len(), 4);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let gw = ScriptedGateway::new();
        let mut chat = ChatSession::new();
        assert!(matches!(
            chat.send_turn(&gw, "   ").await,
            Err(StudioError::MissingInput(_))
        ));
        assert!(chat.transcript().is_empty());
        assert!(!chat.is_started());
    }
}
