//! Conversation state: transcript, current outline, loading flag.
//!
//! All mutation goes through the transition methods below. Messages are never
//! removed; a model message's text is rewritten in place while its reply
//! streams in.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed transcript text shown when an exchange fails.
pub const EXCHANGE_FAILED_MESSAGE: &str =
    "Si è verificato un errore durante la generazione della mappa.";

/// Opaque message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    /// True for model replies that carry a map rather than a clarification.
    ///
    /// Front-ends show a short confirmation for these instead of the raw
    /// Markdown, which is already visible as the diagram.
    pub fn is_outline(&self) -> bool {
        self.role == Role::Model && !self.is_error && self.text.trim_start().starts_with('#')
    }
}

/// Ordered transcript plus the outline currently on display.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    current_outline: String,
    is_loading: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user_message(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::User, text.into(), false)
    }

    /// Appends the empty model entry that a streaming reply will fill in.
    pub fn append_placeholder_model_message(&mut self) -> MessageId {
        self.push(Role::Model, String::new(), false)
    }

    /// Appends an error-flagged model entry.
    pub fn append_error_message(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::Model, text.into(), true)
    }

    /// Replaces the text of a model message.
    ///
    /// Returns `false` (and leaves the transcript untouched) if `id` is unknown
    /// or names a user message.
    pub fn update_model_message(&mut self, id: MessageId, text: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) if message.role == Role::Model => {
                message.text = text.into();
                true
            }
            Some(_) => {
                tracing::warn!(%id, "refusing to rewrite a user message");
                false
            }
            None => {
                tracing::warn!(%id, "update for unknown message");
                false
            }
        }
    }

    pub fn set_current_outline(&mut self, text: impl Into<String>) {
        self.current_outline = text.into();
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn current_outline(&self) -> &str {
        &self.current_outline
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    fn push(&mut self, role: Role, text: String, is_error: bool) -> MessageId {
        let id = MessageId::new();
        self.messages.push(Message {
            id,
            role,
            text,
            is_error,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_follows_user_message() {
        let mut conversation = Conversation::new();
        let user = conversation.append_user_message("Sistema Solare");
        let reply = conversation.append_placeholder_model_message();

        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, user);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].id, reply);
        assert_eq!(messages[1].role, Role::Model);
        assert!(messages[1].text.is_empty());
        assert_ne!(user, reply);
    }

    #[test]
    fn update_model_message_rewrites_in_place() {
        let mut conversation = Conversation::new();
        let reply = conversation.append_placeholder_model_message();

        assert!(conversation.update_model_message(reply, "# A"));
        assert!(conversation.update_model_message(reply, "# A\n## B"));
        assert_eq!(conversation.message(reply).unwrap().text, "# A\n## B");
        assert_eq!(conversation.messages().len(), 1);
    }

    #[test]
    fn update_rejects_user_and_unknown_ids() {
        let mut conversation = Conversation::new();
        let user = conversation.append_user_message("ciao");
        let mut other = Conversation::new();
        let foreign = other.append_placeholder_model_message();

        assert!(!conversation.update_model_message(user, "hijack"));
        assert!(!conversation.update_model_message(foreign, "lost"));
        assert_eq!(conversation.messages()[0].text, "ciao");
    }

    #[test]
    fn error_messages_are_flagged() {
        let mut conversation = Conversation::new();
        let id = conversation.append_error_message(EXCHANGE_FAILED_MESSAGE);
        let message = conversation.message(id).unwrap();
        assert!(message.is_error);
        assert_eq!(message.role, Role::Model);
        assert!(!message.is_outline());
    }

    #[test]
    fn is_outline_detects_heading_replies() {
        let mut conversation = Conversation::new();
        let map = conversation.append_placeholder_model_message();
        conversation.update_model_message(map, "# Sistema Solare\n## Pianeti");
        let question = conversation.append_placeholder_model_message();
        conversation.update_model_message(question, "Quale argomento?");

        assert!(conversation.message(map).unwrap().is_outline());
        assert!(!conversation.message(question).unwrap().is_outline());
    }

    #[test]
    fn outline_and_loading_transitions() {
        let mut conversation = Conversation::new();
        assert!(!conversation.is_loading());
        conversation.set_loading(true);
        conversation.set_current_outline("# A");
        assert!(conversation.is_loading());
        assert_eq!(conversation.current_outline(), "# A");
    }
}
