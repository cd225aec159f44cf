//! Chat runtime executor

use super::{ClientEvent, ClientSnapshot, Command, EditSession};
use crate::capabilities::{Capabilities, SpeechEvent, TranscriptSink};
use crate::config::{clamp_temperature, ClientConfig};
use crate::llm::{CompletionRequest, CompletionService, MessageRole, ModelTier};
use crate::reveal::{RevealAnimator, RevealOutcome};
use crate::state_machine::{transition, Effect, Event, TurnContext, TurnId, TurnState};
use crate::store::{
    Conversation, ConversationId, ConversationRegistry, Message, MessageStore, DEFAULT_TITLE,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// How long the "copied" marker stays on a message
const COPIED_FLAG_TTL: Duration = Duration::from_millis(1500);

/// Reports from background tasks
#[derive(Debug)]
enum TaskEvent {
    Turn(Event),
    RevealFrame { turn: TurnId, text: String },
    CopyExpired { generation: u64 },
}

/// Everything the user can see, owned by the runtime task
#[derive(Debug)]
struct ClientState {
    registry: ConversationRegistry,
    /// Mirror of the active conversation's messages
    store: MessageStore,
    model: ModelTier,
    temperature: f32,
    input: String,
    editing: Option<EditSession>,
    turn: TurnState,
    copied_index: Option<usize>,
    listening: bool,
}

/// Runtime that owns the client state and executes effects
pub(crate) struct ChatRuntime<L>
where
    L: CompletionService + 'static,
{
    state: ClientState,
    completion: Arc<L>,
    capabilities: Capabilities,
    animator: RevealAnimator,
    history_window: usize,
    greeting: String,
    command_rx: mpsc::Receiver<Command>,
    task_tx: mpsc::UnboundedSender<TaskEvent>,
    task_rx: mpsc::UnboundedReceiver<TaskEvent>,
    speech_tx: mpsc::UnboundedSender<SpeechEvent>,
    speech_rx: mpsc::UnboundedReceiver<SpeechEvent>,
    broadcast_tx: broadcast::Sender<ClientEvent>,
    /// Token to cancel the running gateway request or reveal
    turn_cancel: Option<CancellationToken>,
    next_turn: TurnId,
    copy_generation: u64,
}

impl<L> ChatRuntime<L>
where
    L: CompletionService + 'static,
{
    pub fn new(
        config: &ClientConfig,
        completion: L,
        capabilities: Capabilities,
        command_rx: mpsc::Receiver<Command>,
        broadcast_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();

        // Startup conversation
        let conversation = Conversation::with_greeting(config.default_model, &config.greeting);
        let mut store = MessageStore::new();
        store.load(conversation.messages.clone());
        let mut registry = ConversationRegistry::new();
        registry.insert(conversation);

        Self {
            state: ClientState {
                registry,
                store,
                model: config.default_model,
                temperature: clamp_temperature(config.temperature),
                input: String::new(),
                editing: None,
                turn: TurnState::Idle,
                copied_index: None,
                listening: false,
            },
            completion: Arc::new(completion),
            capabilities,
            animator: RevealAnimator::new(config.reveal_tick),
            history_window: config.history_window,
            greeting: config.greeting.clone(),
            command_rx,
            task_tx,
            task_rx,
            speech_tx,
            speech_rx,
            broadcast_tx,
            turn_cancel: None,
            next_turn: 1,
            copy_generation: 0,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            conv_id = ?self.state.registry.active_id(),
            model = %self.state.model,
            capabilities = ?self.capabilities,
            "Starting chat runtime"
        );

        // Process events in a loop - all state changes happen here
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.task_rx.recv() => self.handle_task_event(event),
                Some(event) = self.speech_rx.recv() => self.handle_speech_event(event),
            }
        }

        if let Some(token) = self.turn_cancel.take() {
            token.cancel();
        }
        tracing::info!("Chat runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send { text } => {
                self.dispatch(Event::Send { text });
            }
            Command::SubmitInput => {
                let text = self.state.input.clone();
                self.dispatch(Event::Send { text });
            }
            Command::SetInput { text } => self.set_input(text),
            Command::Regenerate => {
                self.dispatch(Event::Regenerate);
            }
            Command::StartEdit { index } => self.start_edit(index),
            Command::CancelEdit => self.set_editing(None),
            Command::SaveEdit { index, text } => {
                if self.dispatch(Event::SaveEdit { index, text }) {
                    self.set_editing(None);
                }
            }
            Command::NewConversation => self.new_conversation(),
            Command::SelectConversation { id } => self.select_conversation(id),
            Command::DeleteConversation { id } => self.delete_conversation(id),
            Command::ClearAll { confirmed } => self.clear_all(confirmed),
            Command::SelectModel { model } => self.select_model(model),
            Command::SetTemperature { temperature } => {
                if temperature.is_finite() {
                    self.state.temperature = clamp_temperature(temperature);
                }
            }
            Command::ToggleVoiceInput => self.toggle_voice_input(),
            Command::SpeakMessage { index } => self.speak_message(index),
            Command::CopyMessage { index } => self.copy_message(index),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn handle_task_event(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Turn(event) => {
                self.dispatch(event);
            }
            TaskEvent::RevealFrame { turn, text } => self.apply_reveal_frame(turn, text),
            TaskEvent::CopyExpired { generation } => {
                if generation == self.copy_generation && self.state.copied_index.is_some() {
                    self.state.copied_index = None;
                    self.broadcast(ClientEvent::CopiedChanged(None));
                }
            }
        }
    }

    fn handle_speech_event(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Transcript(text) => {
                self.set_input(text);
                self.set_listening(false);
            }
            SpeechEvent::Ended => self.set_listening(false),
        }
    }

    // ========================================================================
    // Turn handling
    // ========================================================================

    /// Run one transition against the active conversation.
    ///
    /// Returns false when the transition was refused. A refused action
    /// leaves every piece of state untouched.
    fn dispatch(&mut self, event: Event) -> bool {
        let conversation_id = self.ensure_active();
        let title = self
            .state
            .registry
            .active()
            .map_or(DEFAULT_TITLE, |c| c.title.as_str());
        let context = TurnContext {
            conversation_id,
            messages: self.state.store.current(),
            title,
            model: self.state.model,
            temperature: Some(self.state.temperature),
            history_window: self.history_window,
            next_turn: self.next_turn,
        };

        let result = match transition(&self.state.turn, &context, event) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(conv_id = %conversation_id, error = %e, "Ignoring action");
                return false;
            }
        };

        let was_busy = self.state.turn.is_busy();
        self.state.turn = result.new_state;

        for effect in result.effects {
            self.execute_effect(conversation_id, effect);
        }

        let busy = self.state.turn.is_busy();
        if busy != was_busy {
            if busy {
                self.set_input(String::new());
            }
            self.broadcast(ClientEvent::BusyChanged(busy));
        }
        true
    }

    fn execute_effect(&mut self, conversation_id: ConversationId, effect: Effect) {
        match effect {
            Effect::AppendMessage { role, text } => {
                self.state.store.append(Message::new(role, text));
                self.notify_messages();
            }
            Effect::RemoveLast => {
                self.state.store.remove_last();
                self.notify_messages();
            }
            Effect::EditMessage { index, text } => {
                if self.state.store.edit_at(index, text) {
                    self.notify_messages();
                }
            }
            Effect::TruncateAfter { index } => {
                self.state.store.truncate_after(index);
                self.notify_messages();
            }
            Effect::RequestReply { turn, request } => {
                self.request_reply(conversation_id, turn, request);
            }
            Effect::StartReveal { turn, reply } => {
                self.start_reveal(conversation_id, turn, reply);
            }
            Effect::FinalizeReply { reply } => self.finalize_reply(reply),
            Effect::SetTitle { title } => {
                tracing::debug!(conv_id = %conversation_id, title = %title, "Setting title");
                self.state.registry.set_title(conversation_id, title);
                self.notify_conversations();
            }
            Effect::SyncConversation => {
                self.state
                    .registry
                    .commit_messages(conversation_id, self.state.store.snapshot());
                self.notify_conversations();
            }
            Effect::CancelTurn => {
                if let Some(token) = self.turn_cancel.take() {
                    tracing::info!(conv_id = %conversation_id, "Cancelling in-flight turn");
                    token.cancel();
                }
            }
            Effect::NotifyTurnFinished => {
                self.turn_cancel = None;
                self.broadcast(ClientEvent::TurnFinished { conversation_id });
            }
        }
    }

    fn request_reply(
        &mut self,
        conversation_id: ConversationId,
        turn: TurnId,
        request: CompletionRequest,
    ) {
        self.next_turn = turn + 1;

        // Create cancellation token for this turn
        let cancel_token = CancellationToken::new();
        self.turn_cancel = Some(cancel_token.clone());

        tracing::info!(
            conv_id = %conversation_id,
            turn,
            model = %request.model,
            history_len = request.history.len(),
            "Requesting reply (background)"
        );

        let completion = self.completion.clone();
        let task_tx = self.task_tx.clone();

        tokio::spawn(async move {
            // Race the gateway against cancellation
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(conv_id = %conversation_id, turn, "Reply request cancelled");
                }

                result = completion.complete(&request) => {
                    let event = match result {
                        Ok(reply) => Event::ReplyReceived { turn, reply: reply.reply },
                        Err(e) => {
                            tracing::warn!(
                                conv_id = %conversation_id,
                                turn,
                                error = %e,
                                kind = ?e.kind,
                                "Reply request failed"
                            );
                            Event::ReplyFailed { turn, message: e.message }
                        }
                    };
                    let _ = task_tx.send(TaskEvent::Turn(event));
                }
            }
        });
    }

    fn start_reveal(&mut self, conversation_id: ConversationId, turn: TurnId, reply: String) {
        self.state.store.append(Message::assistant(""));
        self.notify_messages();

        let cancel_token = self
            .turn_cancel
            .get_or_insert_with(CancellationToken::new)
            .clone();
        let animator = self.animator;
        let task_tx = self.task_tx.clone();

        tokio::spawn(async move {
            let outcome = animator
                .animate(&reply, &cancel_token, |text| {
                    let _ = task_tx.send(TaskEvent::RevealFrame { turn, text });
                })
                .await;

            match outcome {
                RevealOutcome::Completed => {
                    let _ = task_tx.send(TaskEvent::Turn(Event::RevealFinished { turn }));
                }
                RevealOutcome::Cancelled => {
                    tracing::debug!(conv_id = %conversation_id, turn, "Reveal cancelled");
                }
            }
        });
    }

    /// Grow the trailing message; frames from a turn that already ended are dropped
    fn apply_reveal_frame(&mut self, turn: TurnId, text: String) {
        if !matches!(self.state.turn, TurnState::Revealing { turn: current, .. } if current == turn)
        {
            return;
        }
        if self.state.store.replace_last_text(text) {
            if let Some(message) = self.state.store.last() {
                let index = self.state.store.len() - 1;
                self.broadcast(ClientEvent::MessageUpdated {
                    index,
                    message: message.clone(),
                });
            }
        }
    }

    fn finalize_reply(&mut self, reply: String) {
        let finished = match self.state.store.last() {
            Some(last) if last.role == MessageRole::Assistant => Some(Message {
                text: reply.clone(),
                timestamp: Utc::now(),
                ..last.clone()
            }),
            _ => None,
        };
        match finished {
            Some(message) => self.state.store.replace_last(message),
            None => self.state.store.append(Message::assistant(reply)),
        }
        self.notify_messages();
    }

    /// Abort whatever turn is running before the active conversation changes
    fn abort_turn(&mut self) {
        if self.state.turn.is_busy() {
            self.dispatch(Event::Abort);
        }
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    /// Active id, repairing an empty registry with a fresh conversation
    fn ensure_active(&mut self) -> ConversationId {
        match self.state.registry.active_id() {
            Some(id) => id,
            None => self.create_conversation(),
        }
    }

    fn create_conversation(&mut self) -> ConversationId {
        let conversation = Conversation::with_greeting(self.state.model, &self.greeting);
        self.state.store.load(conversation.messages.clone());
        let id = self.state.registry.insert(conversation);
        tracing::info!(conv_id = %id, "Created conversation");
        self.set_editing(None);
        self.clear_copied();
        self.notify_conversations();
        self.notify_messages();
        id
    }

    fn new_conversation(&mut self) {
        self.abort_turn();
        self.create_conversation();
        self.set_input(String::new());
    }

    /// Mirror a conversation into the message store and adopt its model
    fn load_active(&mut self, id: ConversationId) {
        let Some(conversation) = self.state.registry.activate(id) else {
            return;
        };
        let messages = conversation.messages.clone();
        let model = conversation.model;

        self.state.store.load(messages);
        self.state.model = model;
        self.set_editing(None);
        self.clear_copied();
        self.notify_conversations();
        self.notify_messages();
    }

    fn select_conversation(&mut self, id: ConversationId) {
        if self.state.registry.active_id() == Some(id) {
            return;
        }
        if !self.state.registry.contains(id) {
            tracing::debug!(conv_id = %id, "Ignoring select of unknown conversation");
            return;
        }
        self.abort_turn();
        self.load_active(id);
    }

    fn delete_conversation(&mut self, id: ConversationId) {
        if !self.state.registry.contains(id) {
            tracing::debug!(conv_id = %id, "Ignoring delete of unknown conversation");
            return;
        }

        let was_active = self.state.registry.active_id() == Some(id);
        if was_active {
            self.abort_turn();
        }
        self.state.registry.remove(id);
        tracing::info!(conv_id = %id, was_active, "Deleted conversation");

        if !was_active {
            self.notify_conversations();
            return;
        }
        match self.state.registry.active_id() {
            Some(next) => self.load_active(next),
            None => {
                self.create_conversation();
            }
        }
    }

    fn clear_all(&mut self, confirmed: bool) {
        if !confirmed {
            tracing::debug!("Clear all not confirmed");
            return;
        }
        self.abort_turn();
        let removed = self.state.registry.len();
        self.state.registry.clear();
        self.state.store.load(Vec::new());
        tracing::info!(removed, "Cleared all conversations");
        self.new_conversation();
    }

    fn select_model(&mut self, model: ModelTier) {
        self.state.model = model;
        if let Some(id) = self.state.registry.active_id() {
            self.state.registry.set_model(id, model);
        }
        self.notify_conversations();
    }

    // ========================================================================
    // Input, editing and capabilities
    // ========================================================================

    fn start_edit(&mut self, index: usize) {
        let Some(message) = self.state.store.get(index) else {
            tracing::debug!(index, "Ignoring edit of missing message");
            return;
        };
        let session = EditSession {
            index,
            draft: message.text.clone(),
        };
        self.set_editing(Some(session));
    }

    fn toggle_voice_input(&mut self) {
        let Some(stt) = self.capabilities.speech_to_text.clone() else {
            self.notice("Voice input is not supported");
            return;
        };

        if self.state.listening {
            stt.stop();
            self.set_listening(false);
            return;
        }

        match stt.start(TranscriptSink::new(self.speech_tx.clone())) {
            Ok(()) => self.set_listening(true),
            Err(e) => {
                tracing::warn!(error = %e, "Voice input failed to start");
                self.notice(e.to_string());
            }
        }
    }

    fn speak_message(&mut self, index: usize) {
        let Some(tts) = self.capabilities.text_to_speech.clone() else {
            self.notice("Text-to-speech is not supported");
            return;
        };

        // Toggle: a second press stops the current utterance
        if tts.is_speaking() {
            tts.cancel();
            return;
        }

        let Some(message) = self.state.store.get(index) else {
            return;
        };
        if let Err(e) = tts.speak(&message.text) {
            tracing::warn!(error = %e, "Text-to-speech failed");
            self.notice(e.to_string());
        }
    }

    fn copy_message(&mut self, index: usize) {
        let Some(clipboard) = self.capabilities.clipboard.clone() else {
            self.notice("Clipboard is not available");
            return;
        };
        let Some(message) = self.state.store.get(index) else {
            return;
        };

        // Fire-and-forget: a failed write is only logged
        if let Err(e) = clipboard.write_text(&message.text) {
            tracing::warn!(error = %e, "Clipboard write failed");
        }

        self.copy_generation += 1;
        let generation = self.copy_generation;
        self.state.copied_index = Some(index);
        self.broadcast(ClientEvent::CopiedChanged(Some(index)));

        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(COPIED_FLAG_TTL).await;
            let _ = task_tx.send(TaskEvent::CopyExpired { generation });
        });
    }

    /// Drop the copied marker; it indexes into the conversation being left
    fn clear_copied(&mut self) {
        // Invalidates any pending expiry timer
        self.copy_generation += 1;
        if self.state.copied_index.take().is_some() {
            self.broadcast(ClientEvent::CopiedChanged(None));
        }
    }

    fn set_input(&mut self, text: String) {
        if self.state.input != text {
            self.state.input = text;
            self.broadcast(ClientEvent::InputChanged(self.state.input.clone()));
        }
    }

    fn set_editing(&mut self, editing: Option<EditSession>) {
        if self.state.editing != editing {
            self.state.editing = editing;
            self.broadcast(ClientEvent::EditChanged(self.state.editing.clone()));
        }
    }

    fn set_listening(&mut self, listening: bool) {
        if self.state.listening != listening {
            self.state.listening = listening;
            self.broadcast(ClientEvent::ListeningChanged(listening));
        }
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            active_id: self.state.registry.active_id(),
            conversations: self.state.registry.summaries(),
            messages: self.state.store.snapshot(),
            model: self.state.model,
            temperature: self.state.temperature,
            input: self.state.input.clone(),
            busy: self.state.turn.is_busy(),
            editing: self.state.editing.clone(),
            copied_index: self.state.copied_index,
            listening: self.state.listening,
        }
    }

    fn notify_messages(&self) {
        if let Some(conversation_id) = self.state.registry.active_id() {
            self.broadcast(ClientEvent::MessagesChanged {
                conversation_id,
                messages: self.state.store.snapshot(),
            });
        }
    }

    fn notify_conversations(&self) {
        self.broadcast(ClientEvent::ConversationsChanged {
            active_id: self.state.registry.active_id(),
            conversations: self.state.registry.summaries(),
        });
    }

    fn notice(&self, message: impl Into<String>) {
        self.broadcast(ClientEvent::Notice(message.into()));
    }

    fn broadcast(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}
