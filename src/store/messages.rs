//! Ordered message list for the active conversation

use super::Message;

/// Message store
///
/// Mutations never reorder existing messages. Each call completes before the
/// next snapshot can be taken.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with another conversation's messages
    pub fn load(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Swap the trailing message; appends when the store is empty
    pub fn replace_last(&mut self, message: Message) {
        match self.messages.last_mut() {
            Some(last) => *last = message,
            None => self.messages.push(message),
        }
    }

    /// Overwrite the trailing message's text, keeping its id and metadata
    pub fn replace_last_text(&mut self, text: impl Into<String>) -> bool {
        match self.messages.last_mut() {
            Some(last) => {
                last.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Edit a message in place and mark it edited. Out of range is a no-op.
    pub fn edit_at(&mut self, index: usize, text: impl Into<String>) -> bool {
        match self.messages.get_mut(index) {
            Some(message) => {
                message.text = text.into();
                message.edited = true;
                true
            }
            None => false,
        }
    }

    /// Keep `[0..=index]`, dropping everything after
    pub fn truncate_after(&mut self, index: usize) {
        self.messages.truncate(index.saturating_add(1));
    }

    pub fn remove_last(&mut self) -> Option<Message> {
        self.messages.pop()
    }

    pub fn current(&self) -> &[Message] {
        &self.messages
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
