//! Turn state types

use crate::llm::ModelTier;
use crate::store::{ConversationId, Message, DEFAULT_TITLE};
use serde::Serialize;

/// Monotonic identifier of one request/reveal cycle
pub type TurnId = u64;

/// State of the in-flight turn for the active conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Ready for input, nothing pending
    #[default]
    Idle,

    /// Gateway request in flight
    AwaitingReply {
        turn: TurnId,
        /// Title to apply once the reply lands (first user message only)
        title: Option<String>,
    },

    /// Reply received, reveal animation running
    Revealing {
        turn: TurnId,
        reply: String,
        title: Option<String>,
    },
}

impl TurnState {
    /// The busy flag: any state other than idle blocks new turns
    pub fn is_busy(&self) -> bool {
        !matches!(self, TurnState::Idle)
    }

    pub fn turn_id(&self) -> Option<TurnId> {
        match self {
            TurnState::Idle => None,
            TurnState::AwaitingReply { turn, .. } | TurnState::Revealing { turn, .. } => {
                Some(*turn)
            }
        }
    }
}

/// Read-only view of the active conversation handed to transitions
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    pub conversation_id: ConversationId,
    pub messages: &'a [Message],
    /// Current title; a default title is replaced by the next prompt
    pub title: &'a str,
    pub model: ModelTier,
    pub temperature: Option<f32>,
    /// How many trailing messages are sent as history
    pub history_window: usize,
    /// Id the next started turn will take
    pub next_turn: TurnId,
}

impl<'a> TurnContext<'a> {
    pub fn new(conversation_id: ConversationId, messages: &'a [Message]) -> Self {
        Self {
            conversation_id,
            messages,
            title: DEFAULT_TITLE,
            model: ModelTier::default(),
            temperature: None,
            history_window: 10,
            next_turn: 1,
        }
    }
}
