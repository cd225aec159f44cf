//! Optional platform capabilities
//!
//! Speech-to-text, text-to-speech and clipboard access are injected at
//! construction. Each may be absent; the controller then reports a notice
//! instead of failing.

use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error("{capability} failed: {message}")]
    Failed {
        capability: &'static str,
        message: String,
    },
}

impl CapabilityError {
    pub fn failed(capability: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            capability,
            message: message.into(),
        }
    }
}

/// What a speech recognizer reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Transcript(String),
    /// Recognition stopped without a result (error, silence, end of input)
    Ended,
}

/// Callback handed to a recognizer when listening starts
#[derive(Debug, Clone)]
pub struct TranscriptSink {
    tx: mpsc::UnboundedSender<SpeechEvent>,
}

impl TranscriptSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SpeechEvent>) -> Self {
        Self { tx }
    }

    pub fn deliver(&self, transcript: impl Into<String>) {
        if self
            .tx
            .send(SpeechEvent::Transcript(transcript.into()))
            .is_err()
        {
            tracing::debug!("Transcript dropped, client has shut down");
        }
    }

    pub fn ended(&self) {
        let _ = self.tx.send(SpeechEvent::Ended);
    }
}

pub trait SpeechToText: Send + Sync {
    /// Begin listening; results arrive through `sink`
    fn start(&self, sink: TranscriptSink) -> Result<(), CapabilityError>;

    fn stop(&self);
}

pub trait TextToSpeech: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), CapabilityError>;

    /// Stop the current utterance
    fn cancel(&self);

    fn is_speaking(&self) -> bool;
}

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), CapabilityError>;
}

/// The set of capabilities available to a client
#[derive(Clone, Default)]
pub struct Capabilities {
    pub speech_to_text: Option<Arc<dyn SpeechToText>>,
    pub text_to_speech: Option<Arc<dyn TextToSpeech>>,
    pub clipboard: Option<Arc<dyn Clipboard>>,
}

impl Capabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_speech_to_text(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.speech_to_text = Some(stt);
        self
    }

    pub fn with_text_to_speech(mut self, tts: Arc<dyn TextToSpeech>) -> Self {
        self.text_to_speech = Some(tts);
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("speech_to_text", &self.speech_to_text.is_some())
            .field("text_to_speech", &self.text_to_speech.is_some())
            .field("clipboard", &self.clipboard.is_some())
            .finish()
    }
}

/// System clipboard backed by arboard
pub struct SystemClipboard {
    clipboard: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, CapabilityError> {
        let clipboard = arboard::Clipboard::new()
            .map_err(|e| CapabilityError::failed("clipboard", e.to_string()))?;
        Ok(Self {
            clipboard: Mutex::new(clipboard),
        })
    }
}

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), CapabilityError> {
        let mut clipboard = self
            .clipboard
            .lock()
            .map_err(|_| CapabilityError::failed("clipboard", "clipboard lock poisoned"))?;
        clipboard
            .set_text(text)
            .map_err(|e| CapabilityError::failed("clipboard", e.to_string()))
    }
}
