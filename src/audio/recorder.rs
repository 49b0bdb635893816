//! Microphone capture through an external recorder process.
//!
//! The recorder (`arecord` by default) writes raw signed 16-bit
//! little-endian mono PCM to stdout; frames are read off the pipe at the
//! device's own cadence.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

use super::{AudioCapture, AudioSource, DeviceError};

/// Spawns a recorder command per capture session
pub struct RecorderSource {
    command: Vec<String>,
    frame_size: usize,
}

impl RecorderSource {
    /// `command` is the program followed by its arguments
    pub fn new(command: Vec<String>, frame_size: usize) -> Self {
        Self {
            command,
            frame_size: frame_size.max(1),
        }
    }
}

#[async_trait]
impl AudioSource for RecorderSource {
    async fn open(&self) -> Result<Box<dyn AudioCapture>, DeviceError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| DeviceError::Unavailable("empty capture command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeviceError::Unavailable(format!("failed to start {}: {}", program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DeviceError::Unavailable("recorder has no stdout".to_string()))?;

        tracing::debug!(program = %program, "Microphone capture started");

        Ok(Box::new(RecorderCapture {
            child,
            stdout,
            buffer: vec![0u8; self.frame_size * 2],
        }))
    }
}

struct RecorderCapture {
    child: Child,
    stdout: ChildStdout,
    buffer: Vec<u8>,
}

#[async_trait]
impl AudioCapture for RecorderCapture {
    async fn read_frame(&mut self) -> Result<Option<Vec<i16>>, DeviceError> {
        match self.stdout.read_exact(&mut self.buffer).await {
            Ok(_) => Ok(Some(decode_pcm(&self.buffer))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("Recorder already stopped: {}", e);
        }
        tracing::debug!("Microphone capture released");
    }
}

/// Decode S16_LE bytes into samples; a trailing odd byte is ignored.
pub fn decode_pcm(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
