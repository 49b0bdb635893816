//! Adapter interfaces for external collaborators.
//!
//! The core loops only see these traits:
//! - [`Transcriber`] / [`Responder`]: speech-to-text and chat completion
//! - [`NotificationSink`] / [`SpeechSink`]: user-facing delivery
//!
//! Concrete implementations talk to the Groq API and to local desktop
//! commands (`notify-send`, `espeak-ng`).

pub mod groq;
pub mod notifier;
pub mod speaker;

use async_trait::async_trait;
use thiserror::Error;

pub use groq::GroqClient;
pub use notifier::{CommandNotifier, LogNotifier};
pub use speaker::{CommandSpeaker, LogSpeaker};

/// Failure of a transcription or response call
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Failure to hand a notification or utterance to the host system
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with status {code}")]
    Failed { command: String, code: i32 },

    #[error("'{command}' timed out")]
    Timeout { command: String },
}

/// A user-visible alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Stable key; a new alert with the same key replaces the old one
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV blob. An empty string means nothing was understood.
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, CollaboratorError>;
}

/// Conversational response collaborator
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply to `prompt` given prior conversation `context`
    async fn respond(&self, prompt: &str, context: &str) -> Result<String, CollaboratorError>;
}

/// Host notification system
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Text-to-speech output with flush semantics: a new utterance interrupts
/// the one in progress.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, utterance: &str) -> Result<(), DeliveryError>;
}
