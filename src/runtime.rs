//! Runtime for driving the chat client
//!
//! One task owns all client state and applies commands in arrival order.
//! Gateway calls and reveal animations run in side tasks that report back
//! through a channel, so state is only ever touched from the owning task.

mod executor;

#[cfg(test)]
pub mod testing;

pub(crate) use executor::ChatRuntime;

use crate::capabilities::Capabilities;
use crate::config::ClientConfig;
use crate::llm::{CompletionService, ModelTier};
use crate::store::{ConversationId, ConversationSummary, Message};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Chat client has shut down")]
    Closed,
}

/// Message currently being edited
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditSession {
    pub index: usize,
    pub draft: String,
}

/// Read-only view of the whole client
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub active_id: Option<ConversationId>,
    pub conversations: Vec<ConversationSummary>,
    pub messages: Vec<Message>,
    pub model: ModelTier,
    pub temperature: f32,
    pub input: String,
    pub busy: bool,
    pub editing: Option<EditSession>,
    pub copied_index: Option<usize>,
    pub listening: bool,
}

/// Updates pushed to subscribers (the rendering layer)
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The active message list changed shape
    MessagesChanged {
        conversation_id: ConversationId,
        messages: Vec<Message>,
    },
    /// One message changed in place (reveal frames)
    MessageUpdated { index: usize, message: Message },
    ConversationsChanged {
        active_id: Option<ConversationId>,
        conversations: Vec<ConversationSummary>,
    },
    BusyChanged(bool),
    TurnFinished { conversation_id: ConversationId },
    InputChanged(String),
    EditChanged(Option<EditSession>),
    CopiedChanged(Option<usize>),
    ListeningChanged(bool),
    /// User-visible notice (missing capability and the like)
    Notice(String),
}

/// Commands accepted by the runtime
#[derive(Debug)]
pub(crate) enum Command {
    Send { text: String },
    SubmitInput,
    SetInput { text: String },
    Regenerate,
    StartEdit { index: usize },
    CancelEdit,
    SaveEdit { index: usize, text: String },
    NewConversation,
    SelectConversation { id: ConversationId },
    DeleteConversation { id: ConversationId },
    ClearAll { confirmed: bool },
    SelectModel { model: ModelTier },
    SetTemperature { temperature: f32 },
    ToggleVoiceInput,
    SpeakMessage { index: usize },
    CopyMessage { index: usize },
    Snapshot { reply: oneshot::Sender<ClientSnapshot> },
}

/// Handle to interact with a running client
#[derive(Clone)]
pub struct ChatHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<ClientEvent>,
}

/// Start a client runtime in the background and return its handle
pub fn spawn_client<L>(config: &ClientConfig, service: L, capabilities: Capabilities) -> ChatHandle
where
    L: CompletionService + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (broadcast_tx, _) = broadcast::channel(EVENT_BUFFER);

    let runtime = ChatRuntime::new(
        config,
        service,
        capabilities,
        command_rx,
        broadcast_tx.clone(),
    );

    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!("Chat runtime finished");
    });

    ChatHandle {
        command_tx,
        broadcast_tx,
    }
}

impl ChatHandle {
    async fn command(&self, command: Command) -> Result<(), ClientError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Subscribe to client updates
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.broadcast_tx.subscribe()
    }

    pub async fn snapshot(&self) -> Result<ClientSnapshot, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Send a prompt. Blank prompts and sends while busy are ignored.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::Send { text: text.into() }).await
    }

    /// Send whatever is in the input draft
    pub async fn submit_input(&self) -> Result<(), ClientError> {
        self.command(Command::SubmitInput).await
    }

    pub async fn set_input(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::SetInput { text: text.into() }).await
    }

    pub async fn regenerate(&self) -> Result<(), ClientError> {
        self.command(Command::Regenerate).await
    }

    pub async fn start_edit(&self, index: usize) -> Result<(), ClientError> {
        self.command(Command::StartEdit { index }).await
    }

    pub async fn cancel_edit(&self) -> Result<(), ClientError> {
        self.command(Command::CancelEdit).await
    }

    pub async fn save_edit(&self, index: usize, text: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::SaveEdit {
            index,
            text: text.into(),
        })
        .await
    }

    pub async fn new_conversation(&self) -> Result<(), ClientError> {
        self.command(Command::NewConversation).await
    }

    pub async fn select_conversation(&self, id: ConversationId) -> Result<(), ClientError> {
        self.command(Command::SelectConversation { id }).await
    }

    pub async fn delete_conversation(&self, id: ConversationId) -> Result<(), ClientError> {
        self.command(Command::DeleteConversation { id }).await
    }

    /// Delete every conversation; nothing happens unless `confirmed`
    pub async fn clear_all(&self, confirmed: bool) -> Result<(), ClientError> {
        self.command(Command::ClearAll { confirmed }).await
    }

    pub async fn select_model(&self, model: ModelTier) -> Result<(), ClientError> {
        self.command(Command::SelectModel { model }).await
    }

    pub async fn set_temperature(&self, temperature: f32) -> Result<(), ClientError> {
        self.command(Command::SetTemperature { temperature }).await
    }

    pub async fn toggle_voice_input(&self) -> Result<(), ClientError> {
        self.command(Command::ToggleVoiceInput).await
    }

    pub async fn speak_message(&self, index: usize) -> Result<(), ClientError> {
        self.command(Command::SpeakMessage { index }).await
    }

    pub async fn copy_message(&self, index: usize) -> Result<(), ClientError> {
        self.command(Command::CopyMessage { index }).await
    }
}
