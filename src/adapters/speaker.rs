//! Text-to-speech sinks.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::{DeliveryError, SpeechSink};

/// Speaks through a TTS command such as `espeak-ng`.
///
/// Only one utterance plays at a time: starting a new one kills the
/// process still speaking the previous one. `speak` returns as soon as the
/// new utterance has started.
pub struct CommandSpeaker {
    command: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSpeaker {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            current: Mutex::new(None),
        }
    }

    /// Interrupt the utterance in progress, if any
    pub async fn stop(&self) {
        let mut current = self.current.lock().await;
        if let Some(mut child) = current.take() {
            interrupt(&mut child).await;
        }
    }
}

async fn interrupt(child: &mut Child) {
    // Already finished is the common case.
    if let Ok(None) = child.try_wait() {
        if let Err(e) = child.kill().await {
            tracing::debug!("Failed to interrupt utterance: {}", e);
        }
    }
}

#[async_trait]
impl SpeechSink for CommandSpeaker {
    async fn speak(&self, utterance: &str) -> Result<(), DeliveryError> {
        let mut current = self.current.lock().await;

        if let Some(mut previous) = current.take() {
            interrupt(&mut previous).await;
        }

        let child = Command::new(&self.command)
            .args(&self.args)
            .arg(utterance)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeliveryError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        *current = Some(child);
        Ok(())
    }
}

/// Logs utterances instead of speaking them
#[derive(Debug, Default)]
pub struct LogSpeaker;

#[async_trait]
impl SpeechSink for LogSpeaker {
    async fn speak(&self, utterance: &str) -> Result<(), DeliveryError> {
        tracing::info!("Speaking: {}", utterance);
        Ok(())
    }
}
