//! Completion gateway abstraction
//!
//! The remote service is opaque: a prompt plus recent history goes in, a full
//! reply string (or an error) comes out.

mod error;
mod gateway;
mod models;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gateway::HttpGateway;
pub use models::{all_tiers, ModelTier};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for completion backends
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Request a full reply
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError>;
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        (**self).complete(request).await
    }
}

/// Logging wrapper for completion services
pub struct LoggingService {
    inner: Arc<dyn CompletionService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn CompletionService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CompletionService for LoggingService {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    history_len = request.history.len(),
                    reply_chars = reply.reply.chars().count(),
                    "Completion request finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %request.model,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    "Completion request failed"
                );
            }
        }

        result
    }
}
