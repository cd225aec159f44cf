//! Chat client core
//!
//! Conversation state for a chat front end: an in-memory conversation
//! registry, a turn state machine that talks to a completion gateway, and a
//! timed reveal of each reply. Rendering lives outside this crate and
//! follows the runtime through [`ChatHandle::subscribe`].

pub mod capabilities;
pub mod config;
pub mod llm;
pub mod markup;
pub mod reveal;
pub mod runtime;
pub mod state_machine;
pub mod store;
pub mod title;

pub use capabilities::Capabilities;
pub use config::ClientConfig;
pub use llm::{CompletionService, HttpGateway, LoggingService, ModelTier};
pub use runtime::{spawn_client, ChatHandle, ClientError, ClientEvent, ClientSnapshot};
pub use store::{ConversationId, Message};
