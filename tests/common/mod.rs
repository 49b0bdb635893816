//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use almex::adapters::{
    CollaboratorError, DeliveryError, Notification, NotificationSink, Responder, SpeechSink,
    Transcriber,
};
use almex::audio::{AudioCapture, AudioSource, DeviceError, WakeLock};
use almex::core::ManualClock;

/// Samples per synthetic frame (64 ms at 16 kHz)
pub const FRAME_SAMPLES: usize = 1024;

/// Wall duration of one synthetic frame
pub const FRAME: Duration = Duration::from_millis(64);

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Square wave with the given normalized energy
pub fn tone(energy: f32) -> Vec<i16> {
    let amplitude = (energy * f32::from(i16::MAX)) as i16;
    (0..FRAME_SAMPLES)
        .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
        .collect()
}

pub fn silence() -> Vec<i16> {
    vec![0; FRAME_SAMPLES]
}

/// Loud enough to wake with default thresholds (0.02 * 2.0)
pub fn loud() -> Vec<i16> {
    tone(0.2)
}

/// Above the activity threshold, below the wake threshold
pub fn murmur() -> Vec<i16> {
    tone(0.03)
}

// ---------------------------------------------------------------------------
// Delivery sinks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: bool,
    pub hang: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(DeliveryError::Failed {
                command: "notify-send".to_string(),
                code: 1,
            });
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSpeaker {
    pub spoken: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingSpeaker {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSink for RecordingSpeaker {
    async fn speak(&self, utterance: &str) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Failed {
                command: "espeak-ng".to_string(),
                code: 1,
            });
        }
        self.spoken.lock().unwrap().push(utterance.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Returns a fixed transcript, or fails
pub struct ScriptedTranscriber {
    pub transcript: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn saying(text: &str) -> Self {
        Self {
            transcript: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            transcript: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(&audio[0..4], b"RIFF", "uploads must be WAV");
        self.transcript
            .clone()
            .ok_or_else(|| CollaboratorError::InvalidResponse("scripted failure".to_string()))
    }
}

/// Answers with a fixed reply, or fails
pub struct ScriptedResponder {
    pub reply: Option<String>,
    pub delay: Option<Duration>,
    pub contexts: Mutex<Vec<String>>,
}

impl ScriptedResponder {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            delay: None,
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Replies after `delay` of (tokio) time
    pub fn slow(text: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying(text)
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            contexts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn respond(&self, _prompt: &str, context: &str) -> Result<String, CollaboratorError> {
        self.contexts.lock().unwrap().push(context.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().ok_or(CollaboratorError::Api {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingWakeLock {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
}

impl CountingWakeLock {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl WakeLock for CountingWakeLock {
    fn acquire(&self) -> Result<(), DeviceError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Plays back a fixed list of frames, advancing a manual clock by one
/// frame duration per read. Ends the stream when the frames run out,
/// or blocks forever if `hold_open` is set.
pub struct ScriptedSource {
    frames: Mutex<Option<VecDeque<Vec<i16>>>>,
    clock: Arc<ManualClock>,
    pub hold_open: bool,
    pub fail_open: bool,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<Vec<i16>>, clock: Arc<ManualClock>) -> Self {
        Self {
            frames: Mutex::new(Some(frames.into())),
            clock,
            hold_open: false,
            fail_open: false,
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unavailable(clock: Arc<ManualClock>) -> Self {
        Self {
            fail_open: true,
            ..Self::new(Vec::new(), clock)
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSource for ScriptedSource {
    async fn open(&self) -> Result<Box<dyn AudioCapture>, DeviceError> {
        if self.fail_open {
            return Err(DeviceError::Unavailable("no microphone".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let frames = self.frames.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(ScriptedCapture {
            frames,
            clock: self.clock.clone(),
            hold_open: self.hold_open,
            closed: self.closed.clone(),
        }))
    }
}

struct ScriptedCapture {
    frames: VecDeque<Vec<i16>>,
    clock: Arc<ManualClock>,
    hold_open: bool,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl AudioCapture for ScriptedCapture {
    async fn read_frame(&mut self) -> Result<Option<Vec<i16>>, DeviceError> {
        tokio::task::yield_now().await;
        match self.frames.pop_front() {
            Some(frame) => {
                self.clock.advance(FRAME);
                Ok(Some(frame))
            }
            None if self.hold_open => {
                std::future::pending::<()>().await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
