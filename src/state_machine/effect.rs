//! Effects produced by state transitions

use super::TurnId;
use crate::llm::{CompletionRequest, MessageRole};

/// Effects to be executed after a transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a new message to the message store
    AppendMessage { role: MessageRole, text: String },

    /// Drop the trailing message
    RemoveLast,

    /// Edit a message in place (marks it edited)
    EditMessage { index: usize, text: String },

    /// Keep messages `[0..=index]`
    TruncateAfter { index: usize },

    /// Call the completion gateway (spawns as background task)
    RequestReply {
        turn: TurnId,
        request: CompletionRequest,
    },

    /// Append an empty assistant message and start revealing `reply` into it
    StartReveal { turn: TurnId, reply: String },

    /// Write the full reply into the trailing assistant message and stamp it
    FinalizeReply { reply: String },

    /// Retitle the active conversation
    SetTitle { title: String },

    /// Copy the message store back into the active conversation record
    SyncConversation,

    /// Cancel the running gateway request or reveal
    CancelTurn,

    /// Tell subscribers the turn is over
    NotifyTurnFinished,
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: MessageRole::User,
            text: text.into(),
        }
    }

    pub fn append_assistant(text: impl Into<String>) -> Self {
        Effect::AppendMessage {
            role: MessageRole::Assistant,
            text: text.into(),
        }
    }
}
