//! Conversation registry
//!
//! Conversations are kept most-recently-created first. The active id always
//! names an existing entry, or is `None` while the registry is empty.

use super::{ConversationId, Message};
use crate::llm::ModelTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title of a conversation before its first user message
pub const DEFAULT_TITLE: &str = "New Chat";

/// A titled thread of messages with its own model setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub model: ModelTier,
}

impl Conversation {
    /// New conversation seeded with an assistant greeting
    pub fn with_greeting(model: ModelTier, greeting: &str) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            title: DEFAULT_TITLE.to_string(),
            messages: vec![Message::assistant(greeting)],
            created_at: now,
            updated_at: now,
            model,
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            message_count: self.messages.len(),
            model: self.model,
            updated_at: self.updated_at,
        }
    }
}

/// Sidebar view of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    pub message_count: usize,
    pub model: ModelTier,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationRegistry {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front and make it active
    pub fn insert(&mut self, conversation: Conversation) -> ConversationId {
        let id = conversation.id;
        self.conversations.retain(|c| c.id != id);
        self.conversations.insert(0, conversation);
        self.active = Some(id);
        id
    }

    /// Make `id` active; unknown ids leave the registry unchanged
    pub fn activate(&mut self, id: ConversationId) -> Option<&Conversation> {
        let conversation = self.conversations.iter().find(|c| c.id == id)?;
        self.active = Some(id);
        Some(conversation)
    }

    /// Remove a conversation. When it was active, the most recent remaining
    /// one becomes active (or none, if the registry is now empty).
    pub fn remove(&mut self, id: ConversationId) -> Option<Conversation> {
        let position = self.conversations.iter().position(|c| c.id == id)?;
        let removed = self.conversations.remove(position);
        if self.active == Some(id) {
            self.active = self.conversations.first().map(|c| c.id);
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
        self.active = None;
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: ConversationId) -> bool {
        self.get(id).is_some()
    }

    /// Write a message list back into a conversation record
    pub fn commit_messages(&mut self, id: ConversationId, messages: Vec<Message>) -> bool {
        match self.get_mut(id) {
            Some(conversation) => {
                conversation.messages = messages;
                conversation.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn set_title(&mut self, id: ConversationId, title: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(conversation) => {
                conversation.title = title.into();
                true
            }
            None => false,
        }
    }

    pub fn set_model(&mut self, id: ConversationId, model: ModelTier) -> bool {
        match self.get_mut(id) {
            Some(conversation) => {
                conversation.model = model;
                true
            }
            None => false,
        }
    }

    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations.iter().map(Conversation::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
