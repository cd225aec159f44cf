//! HTTP completion gateway
//!
//! Posts `{prompt, model, temperature, conversationHistory}` to `{base}/chat`
//! and reads `{reply}` back. Any transport, status or parse problem becomes
//! an [`LlmError`].

use super::{CompletionReply, CompletionRequest, CompletionService, HistoryEntry, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gateway speaking the `/chat` JSON contract
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: chat_endpoint(base_url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Join the base URL and the `/chat` path without doubling slashes
fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat", base_url.trim_end_matches('/'))
}

fn translate_request(request: &CompletionRequest) -> ChatRequestBody<'_> {
    ChatRequestBody {
        prompt: &request.prompt,
        model: request.model.id(),
        temperature: request.temperature,
        conversation_history: &request.history,
    }
}

#[async_trait]
impl CompletionService for HttpGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&translate_request(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        let parsed: ChatResponseBody = serde_json::from_str(&body).map_err(|e| {
            LlmError::invalid_request(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(CompletionReply::new(parsed.reply))
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    prompt: &'a str,
    model: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "conversationHistory")]
    conversation_history: &'a [HistoryEntry],
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    reply: String,
}
