//! Mock implementations for testing
//!
//! These mocks drive the full runtime without a network or a platform.

use super::{spawn_client, ChatHandle, ClientEvent};
use crate::capabilities::{
    Capabilities, CapabilityError, Clipboard, SpeechToText, TextToSpeech, TranscriptSink,
};
use crate::config::ClientConfig;
use crate::llm::{CompletionReply, CompletionRequest, CompletionService, LlmError};
use crate::store::ConversationId;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Mock Completion Service
// ============================================================================

/// Mock gateway that returns queued replies
pub struct MockCompletionService {
    responses: Mutex<VecDeque<Result<CompletionReply, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, reply: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(CompletionReply::new(reply)));
    }

    /// Queue an error
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

/// Mock gateway that waits before answering, for testing aborts mid-request
pub struct DelayedMockCompletionService {
    inner: MockCompletionService,
    delay: Duration,
}

impl DelayedMockCompletionService {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockCompletionService::new(),
            delay,
        }
    }

    pub fn queue_reply(&self, reply: &str) {
        self.inner.queue_reply(reply);
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl CompletionService for DelayedMockCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        // Recorded up front so a cancelled request still shows up
        self.inner.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;
        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

// ============================================================================
// Mock Capabilities
// ============================================================================

/// Recognizer that holds the sink so a test can "speak"
#[derive(Default)]
pub struct MockSpeechToText {
    sink: Mutex<Option<TranscriptSink>>,
    pub stops: AtomicUsize,
}

impl MockSpeechToText {
    pub fn say(&self, transcript: &str) {
        if let Some(sink) = self.sink.lock().unwrap().take() {
            sink.deliver(transcript);
        }
    }

    pub fn is_listening(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }
}

impl SpeechToText for MockSpeechToText {
    fn start(&self, sink: TranscriptSink) -> Result<(), CapabilityError> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        self.sink.lock().unwrap().take();
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Synthesizer that "speaks" until cancelled
#[derive(Default)]
pub struct MockTextToSpeech {
    speaking: AtomicBool,
    pub spoken: Mutex<Vec<String>>,
}

impl TextToSpeech for MockTextToSpeech {
    fn speak(&self, text: &str) -> Result<(), CapabilityError> {
        self.spoken.lock().unwrap().push(text.to_string());
        self.speaking.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cancel(&self) {
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockClipboard {
    pub writes: Mutex<Vec<String>>,
}

impl Clipboard for MockClipboard {
    fn write_text(&self, text: &str) -> Result<(), CapabilityError> {
        self.writes.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// A running client plus a subscription opened before any command
pub struct TestClient {
    pub handle: ChatHandle,
    pub events: broadcast::Receiver<ClientEvent>,
}

impl TestClient {
    pub fn new<L: CompletionService + 'static>(service: L) -> Self {
        Self::with_capabilities(service, Capabilities::none())
    }

    pub fn with_capabilities<L: CompletionService + 'static>(
        service: L,
        capabilities: Capabilities,
    ) -> Self {
        let handle = spawn_client(&ClientConfig::default(), service, capabilities);
        let events = handle.subscribe();
        Self { handle, events }
    }

    /// Wait for the first event matching `predicate`
    pub async fn wait_for<F>(&mut self, predicate: F) -> Option<ClientEvent>
    where
        F: Fn(&ClientEvent) -> bool,
    {
        loop {
            match tokio::time::timeout(Duration::from_secs(60), self.events.recv()).await {
                Ok(Ok(event)) if predicate(&event) => return Some(event),
                Ok(Ok(_) | Err(broadcast::error::RecvError::Lagged(_))) => {}
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
            }
        }
    }

    pub async fn wait_for_turn_finished(&mut self) -> Option<ConversationId> {
        match self
            .wait_for(|e| matches!(e, ClientEvent::TurnFinished { .. }))
            .await
        {
            Some(ClientEvent::TurnFinished { conversation_id }) => Some(conversation_id),
            _ => None,
        }
    }

    /// Collect every event up to and including the next `TurnFinished`
    pub async fn collect_turn(&mut self) -> Vec<ClientEvent> {
        let mut collected = Vec::new();
        loop {
            match tokio::time::timeout(Duration::from_secs(60), self.events.recv()).await {
                Ok(Ok(event)) => {
                    let done = matches!(event, ClientEvent::TurnFinished { .. });
                    collected.push(event);
                    if done {
                        return collected;
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => {}
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return collected,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MessageRole, ModelTier};
    use crate::state_machine::ERROR_REPLY;
    use crate::store::DEFAULT_TITLE;

    fn mock() -> Arc<MockCompletionService> {
        Arc::new(MockCompletionService::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_has_one_greeting_conversation() {
        let client = TestClient::new(mock());
        let snapshot = client.handle.snapshot().await.unwrap();

        assert_eq!(snapshot.conversations.len(), 1);
        assert_eq!(snapshot.active_id, Some(snapshot.conversations[0].id));
        assert_eq!(snapshot.conversations[0].title, DEFAULT_TITLE);
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].role, MessageRole::Assistant);
        assert_eq!(snapshot.messages[0].text, crate::config::DEFAULT_GREETING);
        assert!(!snapshot.busy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_appends_prompt_and_revealed_reply() {
        let service = mock();
        service.queue_reply("Hi there");
        let mut client = TestClient::new(service.clone());

        client.handle.set_input("draft").await.unwrap();
        client.handle.send("hello").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[1].role, MessageRole::User);
        assert_eq!(snapshot.messages[1].text, "hello");
        assert_eq!(snapshot.messages[2].role, MessageRole::Assistant);
        assert_eq!(snapshot.messages[2].text, "Hi there");
        assert!(!snapshot.busy);
        assert_eq!(snapshot.input, "");
        assert_eq!(snapshot.conversations[0].title, "hello");
        assert_eq!(snapshot.conversations[0].message_count, 3);

        let requests = service.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "hello");
        assert_eq!(requests[0].model, ModelTier::Gpt35Turbo);
        assert_eq!(requests[0].temperature, Some(0.7));
        assert_eq!(requests[0].history.last().unwrap().content, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_frames_are_growing_prefixes() {
        let service = mock();
        service.queue_reply("hello");
        let mut client = TestClient::new(service);

        client.handle.send("hi").await.unwrap();
        let events = client.collect_turn().await;

        // The empty placeholder is appended before the first frame
        let placeholder = events.iter().position(|e| {
            matches!(e, ClientEvent::MessagesChanged { messages, .. }
                if messages.len() == 3 && messages[2].text.is_empty())
        });
        let first_frame = events
            .iter()
            .position(|e| matches!(e, ClientEvent::MessageUpdated { .. }));
        assert!(placeholder.unwrap() < first_frame.unwrap());

        let frames: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                ClientEvent::MessageUpdated { index: 2, message } => Some(message.text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec!["h", "he", "hel", "hell", "hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reveal_takes_one_tick_per_char() {
        let service = mock();
        service.queue_reply("abcd");
        let mut client = TestClient::new(service);

        let start = tokio::time::Instant::now();
        client.handle.send("go").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_send_is_noop() {
        let service = mock();
        let client = TestClient::new(service.clone());

        client.handle.send("").await.unwrap();
        client.handle.send("   \n").await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert!(!snapshot.busy);
        assert!(service.recorded_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_input_sends_draft() {
        let service = mock();
        service.queue_reply("ok");
        let mut client = TestClient::new(service.clone());

        client.handle.set_input("from the box").await.unwrap();
        client.handle.submit_input().await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages[1].text, "from the box");
        assert_eq!(snapshot.input, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gateway_failure_appends_apology() {
        let service = mock();
        service.queue_error(LlmError::server_error("boom"));
        let mut client = TestClient::new(service);

        client.handle.send("hello").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[2].role, MessageRole::Assistant);
        assert_eq!(snapshot.messages[2].text, ERROR_REPLY);
        assert!(!snapshot.busy);
        assert_eq!(snapshot.conversations[0].title, DEFAULT_TITLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_busy_is_ignored() {
        let service = Arc::new(DelayedMockCompletionService::new(Duration::from_secs(1)));
        service.queue_reply("first");
        let mut client = TestClient::new(service.clone());

        client.handle.send("one").await.unwrap();
        client.handle.send("two").await.unwrap();
        client.handle.regenerate().await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[1].text, "one");
        assert_eq!(snapshot.messages[2].text, "first");
        assert_eq!(service.recorded_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_replaces_last_reply() {
        let service = mock();
        service.queue_reply("x");
        service.queue_reply("y");
        let mut client = TestClient::new(service.clone());

        client.handle.send("hi").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();
        client.handle.regenerate().await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[1].text, "hi");
        assert_eq!(snapshot.messages[2].text, "y");

        let requests = service.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].prompt, "hi");
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[1].content, "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerate_on_greeting_only_is_noop() {
        let service = mock();
        let client = TestClient::new(service.clone());

        client.handle.regenerate().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 1);
        assert!(service.recorded_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_edit_regenerates_answer() {
        let service = mock();
        service.queue_reply("b");
        service.queue_reply("d");
        let mut client = TestClient::new(service.clone());

        client.handle.send("a").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();
        client.handle.start_edit(1).await.unwrap();
        client.handle.save_edit(1, "c").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        let texts: Vec<&str> = snapshot.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec![crate::config::DEFAULT_GREETING, "c", "d"]);
        assert!(snapshot.messages[1].edited);
        assert_eq!(snapshot.editing, None);
        assert_eq!(snapshot.conversations[0].title, "c");
        assert_eq!(service.recorded_requests()[1].prompt, "c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_edit_of_older_message_only_commits() {
        let service = mock();
        service.queue_reply("r1");
        service.queue_reply("r2");
        let mut client = TestClient::new(service.clone());

        client.handle.send("q1").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();
        client.handle.send("q2").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        client.handle.save_edit(1, "z").await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();

        assert_eq!(snapshot.messages.len(), 5);
        assert_eq!(snapshot.messages[1].text, "z");
        assert!(snapshot.messages[1].edited);
        assert_eq!(snapshot.messages[4].text, "r2");
        assert!(!snapshot.busy);
        assert_eq!(service.recorded_requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_cancel_edit_do_not_touch_messages() {
        let client = TestClient::new(mock());

        client.handle.start_edit(0).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        let session = snapshot.editing.unwrap();
        assert_eq!(session.index, 0);
        assert_eq!(session.draft, crate::config::DEFAULT_GREETING);

        client.handle.cancel_edit().await.unwrap();
        client.handle.start_edit(7).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.editing, None);
        assert!(!snapshot.messages[0].edited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_edit_is_noop() {
        let client = TestClient::new(mock());

        client.handle.save_edit(0, "  ").await.unwrap();
        client.handle.save_edit(5, "text").await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages[0].text, crate::config::DEFAULT_GREETING);
        assert!(!snapshot.messages[0].edited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_is_truncated() {
        let service = mock();
        service.queue_reply("ha");
        let mut client = TestClient::new(service);

        client
            .handle
            .send("Tell me a long joke about cats")
            .await
            .unwrap();
        client.wait_for_turn_finished().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.conversations[0].title, "Tell me a long joke ...");
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_taken_from_first_successful_prompt() {
        let service = mock();
        service.queue_error(LlmError::network("down"));
        service.queue_reply("fine");
        let mut client = TestClient::new(service);

        client.handle.send("first try").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.conversations[0].title, DEFAULT_TITLE);

        client.handle.send("second try").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.conversations[0].title, "second try");
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_kept_after_second_prompt() {
        let service = mock();
        service.queue_reply("1");
        service.queue_reply("2");
        let mut client = TestClient::new(service);

        client.handle.send("first").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();
        client.handle.send("second").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.conversations[0].title, "first");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_conversation_mid_reveal_keeps_full_reply() {
        let service = mock();
        service.queue_reply("abcdefghij");
        let mut client = TestClient::new(service);
        let original = client.handle.snapshot().await.unwrap().active_id.unwrap();

        client.handle.send("hi").await.unwrap();
        client
            .wait_for(|e| matches!(e, ClientEvent::MessageUpdated { .. }))
            .await
            .unwrap();
        client.handle.new_conversation().await.unwrap();
        assert_eq!(client.wait_for_turn_finished().await, Some(original));

        // Leftover frames must not leak into the new conversation
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_ne!(snapshot.active_id, Some(original));
        assert_eq!(snapshot.messages.len(), 1);
        assert!(!snapshot.busy);
        assert_eq!(snapshot.conversations.len(), 2);

        client.handle.select_conversation(original).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[2].text, "abcdefghij");
        let summary = snapshot
            .conversations
            .iter()
            .find(|c| c.id == original)
            .unwrap();
        assert_eq!(summary.title, "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_mid_request_drops_reply() {
        let service = Arc::new(DelayedMockCompletionService::new(Duration::from_secs(1)));
        service.queue_reply("late");
        let mut client = TestClient::new(service.clone());
        let original = client.handle.snapshot().await.unwrap().active_id.unwrap();

        client.handle.send("hi").await.unwrap();
        // Let the request task start before switching away
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.handle.new_conversation().await.unwrap();
        client.wait_for_turn_finished().await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = client.handle.snapshot().await.unwrap();
        assert!(!snapshot.busy);
        assert_eq!(snapshot.messages.len(), 1);

        client.handle.select_conversation(original).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        let texts: Vec<&str> = snapshot.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec![crate::config::DEFAULT_GREETING, "hi"]);
        assert_eq!(service.recorded_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_unknown_conversation_is_noop() {
        let client = TestClient::new(mock());
        let before = client.handle.snapshot().await.unwrap();

        client
            .handle
            .delete_conversation(ConversationId::new())
            .await
            .unwrap();
        client
            .handle
            .select_conversation(ConversationId::new())
            .await
            .unwrap();

        let after = client.handle.snapshot().await.unwrap();
        assert_eq!(after.active_id, before.active_id);
        assert_eq!(after.conversations, before.conversations);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_active_activates_most_recent_remaining() {
        let client = TestClient::new(mock());
        client.handle.new_conversation().await.unwrap();
        let middle = client.handle.snapshot().await.unwrap().active_id.unwrap();
        client.handle.new_conversation().await.unwrap();
        let newest = client.handle.snapshot().await.unwrap().active_id.unwrap();

        client.handle.delete_conversation(newest).await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.conversations.len(), 2);
        assert_eq!(snapshot.active_id, Some(middle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_inactive_keeps_active() {
        let client = TestClient::new(mock());
        let first = client.handle.snapshot().await.unwrap().active_id.unwrap();
        client.handle.new_conversation().await.unwrap();
        let second = client.handle.snapshot().await.unwrap().active_id.unwrap();

        client.handle.delete_conversation(first).await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.conversations.len(), 1);
        assert_eq!(snapshot.active_id, Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_last_conversation_creates_fresh_one() {
        let client = TestClient::new(mock());
        let only = client.handle.snapshot().await.unwrap().active_id.unwrap();

        client.handle.delete_conversation(only).await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.conversations.len(), 1);
        assert_ne!(snapshot.active_id, Some(only));
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_last_conversation_leaves_edit_mode() {
        let service = mock();
        service.queue_reply("ok");
        let mut client = TestClient::new(service);
        let only = client.handle.snapshot().await.unwrap().active_id.unwrap();

        client.handle.send("hi").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();
        client.handle.start_edit(2).await.unwrap();
        assert!(client.handle.snapshot().await.unwrap().editing.is_some());

        client.handle.delete_conversation(only).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.editing, None);
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_all_requires_confirmation() {
        let client = TestClient::new(mock());
        client.handle.new_conversation().await.unwrap();

        client.handle.clear_all(false).await.unwrap();
        assert_eq!(
            client.handle.snapshot().await.unwrap().conversations.len(),
            2
        );

        client.handle.clear_all(true).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.conversations.len(), 1);
        assert_eq!(snapshot.conversations[0].title, DEFAULT_TITLE);
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_follows_conversation() {
        let service = mock();
        service.queue_reply("ok");
        let mut client = TestClient::new(service.clone());
        let first = client.handle.snapshot().await.unwrap().active_id.unwrap();

        client.handle.select_model(ModelTier::Gpt4).await.unwrap();
        client.handle.send("hi").await.unwrap();
        client.wait_for_turn_finished().await.unwrap();
        assert_eq!(service.recorded_requests()[0].model, ModelTier::Gpt4);

        client.handle.new_conversation().await.unwrap();
        client.handle.select_model(ModelTier::Gpt4Turbo).await.unwrap();
        client.handle.select_conversation(first).await.unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.model, ModelTier::Gpt4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_temperature_is_clamped() {
        let client = TestClient::new(mock());

        client.handle.set_temperature(9.0).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert!((snapshot.temperature - 2.0).abs() < f32::EPSILON);

        client.handle.set_temperature(f32::NAN).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert!((snapshot.temperature - 2.0).abs() < f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_capabilities_report_notices() {
        let mut client = TestClient::new(mock());

        client.handle.toggle_voice_input().await.unwrap();
        let notice = client
            .wait_for(|e| matches!(e, ClientEvent::Notice(_)))
            .await;
        assert!(matches!(notice, Some(ClientEvent::Notice(n)) if n.contains("Voice input")));

        client.handle.speak_message(0).await.unwrap();
        let notice = client
            .wait_for(|e| matches!(e, ClientEvent::Notice(_)))
            .await;
        assert!(matches!(notice, Some(ClientEvent::Notice(n)) if n.contains("Text-to-speech")));

        let snapshot = client.handle.snapshot().await.unwrap();
        assert!(!snapshot.listening);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_transcript_fills_input() {
        let stt = Arc::new(MockSpeechToText::default());
        let capabilities = Capabilities::none().with_speech_to_text(stt.clone());
        let mut client = TestClient::with_capabilities(mock(), capabilities);

        client.handle.toggle_voice_input().await.unwrap();
        assert!(client.handle.snapshot().await.unwrap().listening);
        assert!(stt.is_listening());

        stt.say("what time is it");
        client
            .wait_for(|e| matches!(e, ClientEvent::InputChanged(_)))
            .await
            .unwrap();

        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.input, "what time is it");
        assert!(!snapshot.listening);
        // Transcript is not sent automatically
        assert_eq!(snapshot.messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_toggle_stops_listening() {
        let stt = Arc::new(MockSpeechToText::default());
        let capabilities = Capabilities::none().with_speech_to_text(stt.clone());
        let client = TestClient::with_capabilities(mock(), capabilities);

        client.handle.toggle_voice_input().await.unwrap();
        client.handle.toggle_voice_input().await.unwrap();

        assert!(!client.handle.snapshot().await.unwrap().listening);
        assert_eq!(stt.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speak_toggles() {
        let tts = Arc::new(MockTextToSpeech::default());
        let capabilities = Capabilities::none().with_text_to_speech(tts.clone());
        let client = TestClient::with_capabilities(mock(), capabilities);

        client.handle.speak_message(0).await.unwrap();
        client.handle.snapshot().await.unwrap();
        assert!(tts.is_speaking());
        assert_eq!(
            tts.spoken.lock().unwrap().clone(),
            vec![crate::config::DEFAULT_GREETING.to_string()]
        );

        client.handle.speak_message(0).await.unwrap();
        client.handle.snapshot().await.unwrap();
        assert!(!tts.is_speaking());
        assert_eq!(tts.spoken.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_marks_message_briefly() {
        let clipboard = Arc::new(MockClipboard::default());
        let capabilities = Capabilities::none().with_clipboard(clipboard.clone());
        let client = TestClient::with_capabilities(mock(), capabilities);

        client.handle.copy_message(0).await.unwrap();
        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.copied_index, Some(0));
        assert_eq!(
            clipboard.writes.lock().unwrap().clone(),
            vec![crate::config::DEFAULT_GREETING.to_string()]
        );

        tokio::time::sleep(Duration::from_millis(1600)).await;
        let snapshot = client.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.copied_index, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_marker_cleared_on_switch() {
        let clipboard = Arc::new(MockClipboard::default());
        let capabilities = Capabilities::none().with_clipboard(clipboard);
        let client = TestClient::with_capabilities(mock(), capabilities);
        let first = client.handle.snapshot().await.unwrap().active_id.unwrap();

        client.handle.copy_message(0).await.unwrap();
        client.handle.new_conversation().await.unwrap();
        assert_eq!(client.handle.snapshot().await.unwrap().copied_index, None);

        client.handle.select_conversation(first).await.unwrap();
        client.handle.copy_message(0).await.unwrap();
        let second = client.handle.snapshot().await.unwrap().conversations[0].id;
        client.handle.select_conversation(second).await.unwrap();
        assert_eq!(client.handle.snapshot().await.unwrap().copied_index, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_completion_without_queue_errors() {
        let service = MockCompletionService::new();
        let request = CompletionRequest {
            prompt: "hi".to_string(),
            model: ModelTier::Gpt4,
            temperature: None,
            history: Vec::new(),
        };

        let result = service.complete(&request).await;
        assert!(result.is_err());
        assert_eq!(service.recorded_requests(), vec![request]);
    }
}
