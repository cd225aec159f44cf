//! Client configuration from the environment

use crate::llm::ModelTier;
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:8080";
pub const DEFAULT_GREETING: &str = "Hello! How can I help you today?";

/// Configuration for the chat client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Completion gateway base URL; requests go to `{gateway_url}/chat`
    pub gateway_url: String,
    pub default_model: ModelTier,
    pub temperature: f32,
    /// Pause between reveal frames
    pub reveal_tick: Duration,
    /// Trailing messages sent as history with each request
    pub history_window: usize,
    pub request_timeout: Duration,
    /// Assistant message that opens every conversation
    pub greeting: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            default_model: ModelTier::default(),
            temperature: 0.7,
            reveal_tick: crate::reveal::DEFAULT_TICK,
            history_window: 10,
            request_timeout: Duration::from_secs(60),
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl ClientConfig {
    /// Read `CHAT_*` variables; anything missing or unparsable keeps its default
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let default_model = match lookup("CHAT_DEFAULT_MODEL") {
            Some(id) => ModelTier::from_id(id.trim()).unwrap_or_else(|| {
                tracing::warn!(model = %id, "Unknown CHAT_DEFAULT_MODEL, using default");
                defaults.default_model
            }),
            None => defaults.default_model,
        };

        Self {
            gateway_url: lookup("CHAT_GATEWAY_URL")
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.gateway_url),
            default_model,
            temperature: lookup("CHAT_TEMPERATURE")
                .and_then(|t| t.trim().parse::<f32>().ok())
                .filter(|t| t.is_finite())
                .map_or(defaults.temperature, clamp_temperature),
            reveal_tick: lookup("CHAT_REVEAL_TICK_MS")
                .and_then(|ms| ms.trim().parse().ok())
                .map_or(defaults.reveal_tick, Duration::from_millis),
            history_window: lookup("CHAT_HISTORY_WINDOW")
                .and_then(|n| n.trim().parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.history_window),
            request_timeout: lookup("CHAT_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .map_or(defaults.request_timeout, Duration::from_secs),
            greeting: lookup("CHAT_GREETING")
                .filter(|g| !g.trim().is_empty())
                .unwrap_or(defaults.greeting),
        }
    }
}

/// Keep sampling temperature in the range the gateway accepts
pub fn clamp_temperature(temperature: f32) -> f32 {
    temperature.clamp(0.0, 2.0)
}
