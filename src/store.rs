//! In-memory conversation storage
//!
//! Nothing here outlives the process: the registry holds every conversation,
//! and the message store mirrors the active one.

mod messages;
mod registry;

pub use messages::MessageStore;
pub use registry::{Conversation, ConversationRegistry, ConversationSummary, DEFAULT_TITLE};

use crate::llm::{HistoryEntry, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Time-ordered message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Time-ordered conversation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
}

impl Message {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
            edited: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry::new(self.role, self.text.clone())
    }
}

/// Map the trailing `window` messages to gateway history entries
pub fn recent_history(messages: &[Message], window: usize) -> Vec<HistoryEntry> {
    let start = messages.len().saturating_sub(window);
    messages[start..].iter().map(Message::to_history_entry).collect()
}
