//! Audio activation pipeline.
//!
//! One session owns the microphone and the wake lock for its whole
//! lifetime. Frames are read on the session's own task; every finalized
//! capture is handed to a separate dispatch task for transcription and
//! response, so network latency never stalls the frame loop.
//!
//! Shutdown releases the microphone and wake lock first; a dispatch still
//! running then gets a short grace period before it is aborted.
//!
//! Only one active-listening cycle exists at a time: while a dispatch is in
//! flight, frames keep being read (the device must be drained) but are not
//! fed to the state machine, so a wake during that period is ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::adapters::{Responder, SpeechSink, Transcriber};
use crate::audio::{encode_wav, AudioCapture, AudioSource, DeviceError, WakeLock, WakeLockGuard};
use crate::domain::{build_context, summarize};
use crate::store::ConversationStore;

use super::activation::{ActivationMachine, ActivationState, Capture, Transition};
use super::clock::Clock;
use super::shutdown::Shutdown;

pub use crate::config::ListenerSettings;

/// Past exchanges included as context in each prompt
const CONTEXT_TURNS: usize = 5;

/// How long an in-flight dispatch may keep running after shutdown
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Spoken and stored when the responder itself fails
const FALLBACK_RESPONSE: &str = "Sorry, I could not get an answer right now.";

/// External services a finished capture is handed to
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub responder: Arc<dyn Responder>,
    pub conversations: Arc<dyn ConversationStore>,
    pub speaker: Arc<dyn SpeechSink>,
}

/// Snapshot of the pipeline, published on every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerStatus {
    pub state: ActivationState,
    /// A finalized capture is being transcribed/answered
    pub processing: bool,
    pub captures_finalized: u64,
    pub exchanges_completed: u64,
}

impl Default for ListenerStatus {
    fn default() -> Self {
        Self {
            state: ActivationState::Idle,
            processing: false,
            captures_finalized: 0,
            exchanges_completed: 0,
        }
    }
}

/// How a listening session ended without a device error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Shutdown,
    /// The capture stream reached end of input
    StreamEnded,
}

/// How one dispatched capture was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing intelligible was heard
    Empty,
    /// Transcribed, answered and stored
    Answered { transcript: String, response: String },
    /// The capture could not be packed for upload
    Dropped,
}

/// The audio activation pipeline
pub struct Listener {
    source: Arc<dyn AudioSource>,
    wake_lock: Arc<dyn WakeLock>,
    collaborators: Arc<Collaborators>,
    clock: Arc<dyn Clock>,
    settings: ListenerSettings,
    status: Arc<watch::Sender<ListenerStatus>>,
}

impl Listener {
    pub fn new(
        source: Arc<dyn AudioSource>,
        wake_lock: Arc<dyn WakeLock>,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        settings: ListenerSettings,
    ) -> Self {
        let (status, _) = watch::channel(ListenerStatus::default());
        Self {
            source,
            wake_lock,
            collaborators: Arc::new(collaborators),
            clock,
            settings,
            status: Arc::new(status),
        }
    }

    /// Subscribe to status updates
    pub fn status(&self) -> watch::Receiver<ListenerStatus> {
        self.status.subscribe()
    }

    /// Keep sessions running until shutdown, reacquiring the microphone
    /// after `retry_delay` whenever a session fails.
    #[instrument(skip_all, name = "listener")]
    pub async fn run_forever(self, mut shutdown: Shutdown) {
        info!(
            wake_threshold = self.settings.wake_threshold(),
            silence_timeout = ?self.settings.silence_timeout(),
            "Listener started"
        );

        loop {
            match self.run(shutdown.clone()).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::StreamEnded) => warn!("Capture stream ended, restarting"),
                Err(e) => error!(error = %e, "Listening session failed"),
            }

            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = tokio::time::sleep(self.settings.retry_delay()) => {}
            }
        }

        info!("Listener stopped");
    }

    /// Run one session: acquire the wake lock and microphone, listen until
    /// shutdown or stream end, then release both. An in-flight dispatch is
    /// awaited after release; on shutdown it gets [`SHUTDOWN_GRACE`] before
    /// being aborted.
    pub async fn run(&self, mut shutdown: Shutdown) -> Result<SessionEnd, DeviceError> {
        let wake = WakeLockGuard::acquire(self.wake_lock.as_ref())?;
        let mut capture = self.source.open().await?;
        debug!("Microphone acquired");

        let mut inflight = None;
        let result = self
            .listen(capture.as_mut(), &mut shutdown, &mut inflight)
            .await;

        capture.close().await;
        drop(wake);
        self.status.send_modify(|s| s.state = ActivationState::Idle);

        if let Some(handle) = inflight {
            if shutdown.is_triggered() {
                self.finish_dispatch(handle).await;
            } else if let Err(e) = handle.await {
                error!(error = %e, "Dispatch task failed");
            }
        }

        result
    }

    /// Give an in-flight dispatch a bounded grace period, then abort it
    async fn finish_dispatch(&self, mut handle: JoinHandle<()>) {
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Dispatch task failed"),
            Err(_) => {
                warn!(grace = ?SHUTDOWN_GRACE, "Dispatch still running at shutdown, aborting");
                handle.abort();
                self.status.send_modify(|s| s.processing = false);
            }
        }
    }

    async fn listen(
        &self,
        capture: &mut dyn AudioCapture,
        shutdown: &mut Shutdown,
        inflight: &mut Option<JoinHandle<()>>,
    ) -> Result<SessionEnd, DeviceError> {
        let mut machine = ActivationMachine::from_settings(&self.settings);

        loop {
            let frame = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    if let Some(partial) = machine.reset() {
                        debug!(samples = partial.samples.len(), "Discarding partial capture");
                    }
                    return Ok(SessionEnd::Shutdown);
                }
                frame = capture.read_frame() => frame?,
            };

            let Some(frame) = frame else {
                machine.reset();
                return Ok(SessionEnd::StreamEnded);
            };

            if inflight.as_ref().is_some_and(JoinHandle::is_finished) {
                if let Some(handle) = inflight.take() {
                    if let Err(e) = handle.await {
                        error!(error = %e, "Dispatch task failed");
                    }
                }
            }

            if inflight.is_some() && machine.state() == ActivationState::Idle {
                continue;
            }

            match machine.feed(&frame, self.clock.instant()) {
                Transition::None => {}
                Transition::Woke => {
                    info!("Wake condition met, listening");
                    self.status.send_modify(|s| s.state = ActivationState::Active);
                }
                Transition::Finalized(finished) => {
                    info!(
                        duration = ?finished.duration(),
                        reason = ?finished.reason,
                        "Listening window closed"
                    );
                    self.status.send_modify(|s| {
                        s.state = ActivationState::Idle;
                        s.processing = true;
                        s.captures_finalized += 1;
                    });
                    *inflight = Some(self.spawn_dispatch(finished));
                }
            }
        }
    }

    fn spawn_dispatch(&self, capture: Capture) -> JoinHandle<()> {
        let collaborators = Arc::clone(&self.collaborators);
        let status = Arc::clone(&self.status);
        let sample_rate = self.settings.sample_rate;
        let speak = self.settings.speak_responses;
        let cycle = Uuid::new_v4();

        tokio::spawn(
            async move {
                let outcome = dispatch(&collaborators, capture, sample_rate, speak).await;
                debug!(?outcome, "Cycle finished");
                status.send_modify(|s| {
                    s.processing = false;
                    if matches!(outcome, CycleOutcome::Answered { .. }) {
                        s.exchanges_completed += 1;
                    }
                });
            }
            .instrument(tracing::info_span!("cycle", %cycle)),
        )
    }
}

/// Transcribe, answer, store and optionally speak one capture.
///
/// Collaborator failures never propagate: a failed transcription counts as
/// silence and a failed response becomes a fixed apology.
pub async fn dispatch(
    collaborators: &Collaborators,
    capture: Capture,
    sample_rate: u32,
    speak: bool,
) -> CycleOutcome {
    let wav = match encode_wav(&capture.samples, sample_rate) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to encode capture");
            return CycleOutcome::Dropped;
        }
    };

    let transcript = match collaborators.transcriber.transcribe(wav).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "Transcription failed");
            String::new()
        }
    };
    if transcript.is_empty() {
        debug!("Nothing understood");
        return CycleOutcome::Empty;
    }
    info!(chars = transcript.len(), "Transcribed request");

    let summaries = collaborators
        .conversations
        .recent_summaries(CONTEXT_TURNS)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load conversation context");
            Vec::new()
        });
    let context = build_context(&summaries);

    let response = match collaborators.responder.respond(&transcript, &context).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Response failed");
            FALLBACK_RESPONSE.to_string()
        }
    };

    let summary = summarize(&transcript, &response);
    if let Err(e) = collaborators
        .conversations
        .save_turn(&transcript, &response, &summary)
    {
        warn!(error = %e, "Failed to store conversation");
    }

    if speak {
        if let Err(e) = collaborators.speaker.speak(&response).await {
            warn!(error = %e, "Failed to speak response");
        }
    }

    CycleOutcome::Answered {
        transcript,
        response,
    }
}
