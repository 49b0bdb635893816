//! Desktop notification sinks.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use super::{DeliveryError, Notification, NotificationSink};

/// Sends notifications through a `notify-send` compatible command.
///
/// The notification id is passed as a stack/synchronous hint so that a
/// repeated alert for the same entry replaces the previous one.
pub struct CommandNotifier {
    command: String,
    app_name: String,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(command: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            app_name: app_name.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(&self, notification: &Notification) -> Vec<String> {
        vec![
            "--app-name".to_string(),
            self.app_name.clone(),
            "--urgency".to_string(),
            "critical".to_string(),
            "--hint".to_string(),
            format!("string:x-dunst-stack-tag:{}", notification.id),
            "--hint".to_string(),
            format!("string:x-canonical-private-synchronous:{}", notification.id),
            notification.title.clone(),
            notification.body.clone(),
        ]
    }
}

#[async_trait]
impl NotificationSink for CommandNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let child = Command::new(&self.command)
            .args(self.args(notification))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeliveryError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DeliveryError::Timeout {
                command: self.command.clone(),
            })?
            .map_err(|source| DeliveryError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            tracing::debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Notification command failed"
            );
            return Err(DeliveryError::Failed {
                command: self.command.clone(),
                code: output.status.code().unwrap_or(-1),
            });
        }

        Ok(())
    }
}

/// Writes notifications to the log; used when no notification command is
/// configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), DeliveryError> {
        tracing::info!(id = %notification.id, "{}: {}", notification.title, notification.body);
        Ok(())
    }
}
