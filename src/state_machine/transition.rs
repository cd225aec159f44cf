//! Pure state transition function
//!
//! Send, regenerate and save-edit all funnel into [`begin_turn`]: the user
//! prompt ends up as the trailing message and a gateway request is issued
//! with the recent history. Guarded preconditions come back as
//! [`TransitionError`] and the runtime treats them as no-ops.

use super::{Effect, Event, TurnContext, TurnState};
use crate::llm::{CompletionRequest, HistoryEntry, MessageRole};
use crate::store::{recent_history, Message, DEFAULT_TITLE};
use crate::title::derive_title;
use thiserror::Error;

/// Assistant text substituted for a failed gateway call
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Preconditions that turn an action into a no-op
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is already in progress")]
    Busy,
    #[error("Prompt is empty")]
    EmptyPrompt,
    #[error("Nothing to regenerate")]
    NothingToRegenerate,
    #[error("No message at index {0}")]
    InvalidIndex(usize),
    #[error("Event belongs to a turn that is no longer running")]
    StaleTurn,
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(
    state: &TurnState,
    context: &TurnContext<'_>,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User actions
        // ============================================================
        (TurnState::Idle, Event::Send { text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyPrompt);
            }
            Ok(begin_turn(context, context.messages, text, true, vec![]))
        }

        (TurnState::Idle, Event::Regenerate) => regenerate(context),

        (TurnState::Idle, Event::SaveEdit { index, text }) => save_edit(context, index, text),

        (
            TurnState::AwaitingReply { .. } | TurnState::Revealing { .. },
            Event::Send { .. } | Event::Regenerate | Event::SaveEdit { .. },
        ) => Err(TransitionError::Busy),

        // ============================================================
        // Gateway results
        // ============================================================
        (TurnState::AwaitingReply { turn, title }, Event::ReplyReceived { turn: t, reply })
            if *turn == t =>
        {
            Ok(TransitionResult::new(TurnState::Revealing {
                turn: t,
                reply: reply.clone(),
                title: title.clone(),
            })
            .with_effect(Effect::StartReveal { turn: t, reply }))
        }

        (TurnState::AwaitingReply { turn, .. }, Event::ReplyFailed { turn: t, .. })
            if *turn == t =>
        {
            Ok(TransitionResult::new(TurnState::Idle)
                .with_effect(Effect::append_assistant(ERROR_REPLY))
                .with_effect(Effect::SyncConversation)
                .with_effect(Effect::NotifyTurnFinished))
        }

        // ============================================================
        // Reveal completion
        // ============================================================
        (TurnState::Revealing { turn, reply, title }, Event::RevealFinished { turn: t })
            if *turn == t =>
        {
            Ok(TransitionResult::new(TurnState::Idle).with_effects(finish_reply(reply, title)))
        }

        // ============================================================
        // Abort
        // ============================================================
        (TurnState::Idle, Event::Abort) => Ok(TransitionResult::new(TurnState::Idle)),

        (TurnState::AwaitingReply { .. }, Event::Abort) => Ok(TransitionResult::new(
            TurnState::Idle,
        )
        .with_effect(Effect::CancelTurn)
        .with_effect(Effect::NotifyTurnFinished)),

        // The reply is already known: fast-forward it instead of dropping it
        (TurnState::Revealing { reply, title, .. }, Event::Abort) => {
            Ok(TransitionResult::new(TurnState::Idle)
                .with_effect(Effect::CancelTurn)
                .with_effects(finish_reply(reply, title)))
        }

        // ============================================================
        // Late events from cancelled or superseded turns
        // ============================================================
        (
            _,
            Event::ReplyReceived { .. } | Event::ReplyFailed { .. } | Event::RevealFinished { .. },
        ) => Err(TransitionError::StaleTurn),
    }
}

fn finish_reply(reply: &str, title: &Option<String>) -> Vec<Effect> {
    let mut effects = vec![Effect::FinalizeReply {
        reply: reply.to_string(),
    }];
    if let Some(title) = title {
        effects.push(Effect::SetTitle {
            title: title.clone(),
        });
    }
    effects.push(Effect::SyncConversation);
    effects.push(Effect::NotifyTurnFinished);
    effects
}

/// Remove the stale reply and resubmit the most recent user message
fn regenerate(context: &TurnContext<'_>) -> Result<TransitionResult, TransitionError> {
    let messages = context.messages;
    if messages.len() < 2 {
        return Err(TransitionError::NothingToRegenerate);
    }
    let user_index = messages
        .iter()
        .rposition(Message::is_user)
        .ok_or(TransitionError::NothingToRegenerate)?;
    let last_index = messages.len() - 1;
    let prompt = messages[user_index].text.clone();

    // After RemoveLast the user message is still trailing: reuse it.
    // Otherwise (it was the removed one, or replies pile up after it) the
    // prompt goes in as a fresh user turn.
    let result = if user_index + 1 == last_index {
        begin_turn(context, &messages[..user_index], prompt, false, vec![Effect::RemoveLast])
    } else {
        begin_turn(context, &messages[..last_index], prompt, true, vec![Effect::RemoveLast])
    };
    Ok(result)
}

/// Commit an edit; a user message directly answered by the last reply is
/// re-sent so the reply is regenerated
fn save_edit(
    context: &TurnContext<'_>,
    index: usize,
    text: String,
) -> Result<TransitionResult, TransitionError> {
    let messages = context.messages;
    let target = messages
        .get(index)
        .ok_or(TransitionError::InvalidIndex(index))?;
    if text.trim().is_empty() {
        return Err(TransitionError::EmptyPrompt);
    }

    let answered_by_last_reply = target.is_user()
        && index + 2 == messages.len()
        && messages[index + 1].role == MessageRole::Assistant;

    if answered_by_last_reply {
        let prefix = vec![
            Effect::EditMessage {
                index,
                text: text.clone(),
            },
            Effect::TruncateAfter { index },
        ];
        Ok(begin_turn(context, &messages[..index], text, false, prefix))
    } else {
        Ok(TransitionResult::new(TurnState::Idle)
            .with_effect(Effect::EditMessage { index, text })
            .with_effect(Effect::SyncConversation))
    }
}

/// Start a gateway turn for `prompt`.
///
/// `prior` is everything before the prompt message once `prefix` has run.
/// With `append_prompt` the prompt is added as a new user message; without
/// it the prompt is assumed to already be trailing.
fn begin_turn(
    context: &TurnContext<'_>,
    prior: &[Message],
    prompt: String,
    append_prompt: bool,
    prefix: Vec<Effect>,
) -> TransitionResult {
    let turn = context.next_turn;

    // The prompt takes the last slot of the window
    let mut history = recent_history(prior, context.history_window.saturating_sub(1));
    history.push(HistoryEntry::new(MessageRole::User, prompt.clone()));

    // A conversation still on the default title takes it from this prompt
    let needs_title = context.title == DEFAULT_TITLE || !prior.iter().any(Message::is_user);
    let title = needs_title.then(|| derive_title(&prompt));

    let request = CompletionRequest {
        prompt: prompt.clone(),
        model: context.model,
        temperature: context.temperature,
        history,
    };

    let mut result = TransitionResult::new(TurnState::AwaitingReply { turn, title })
        .with_effects(prefix);
    if append_prompt {
        result = result.with_effect(Effect::append_user(prompt));
    }
    result
        .with_effect(Effect::SyncConversation)
        .with_effect(Effect::RequestReply { turn, request })
}
