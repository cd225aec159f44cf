//! Events that drive turn transitions

use super::TurnId;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    Send {
        text: String,
    },
    Regenerate,
    SaveEdit {
        index: usize,
        text: String,
    },
    /// Conversation switch, new chat, delete or clear while a turn may run
    Abort,

    // Gateway events
    ReplyReceived {
        turn: TurnId,
        reply: String,
    },
    ReplyFailed {
        turn: TurnId,
        message: String,
    },

    // Reveal events
    RevealFinished {
        turn: TurnId,
    },
}
