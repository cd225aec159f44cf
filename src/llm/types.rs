//! Common types for completion requests

use super::ModelTier;
use serde::{Deserialize, Serialize};

/// Message role, shared by history entries and stored messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One prior turn sent as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: ModelTier,
    pub temperature: Option<f32>,
    /// Most recent messages, oldest first, ending with the prompt itself
    pub history: Vec<HistoryEntry>,
}

/// Completion reply: the full text, already complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReply {
    pub reply: String,
}

impl CompletionReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}
