//! Wake detection and active-listening windows.
//!
//! [`ActivationMachine`] is a pure state machine: it is fed frames and
//! instants and reports transitions. It never touches the microphone or a
//! clock itself, so every timing rule can be tested with synthetic frames.
//!
//! Wake detection is an energy heuristic, not a keyword model: a frame
//! whose normalized RMS energy exceeds `activity_threshold * wake_multiplier`
//! opens a window; any frame above `activity_threshold` keeps it open.

use std::time::{Duration, Instant};

use crate::config::ListenerSettings;

/// Externally visible pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Idle,
    Active,
}

impl ActivationState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
        }
    }
}

/// Why a window closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEnd {
    /// No voice activity for the silence timeout
    Silence,
    /// The window reached its maximum length
    MaxLength,
}

/// Audio accumulated during one active-listening window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub samples: Vec<i16>,
    pub started: Instant,
    pub ended: Instant,
    pub reason: WindowEnd,
}

impl Capture {
    pub fn duration(&self) -> Duration {
        self.ended.saturating_duration_since(self.started)
    }
}

/// Result of feeding one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    None,
    /// Idle -> Active
    Woke,
    /// Active -> Idle, with the finished capture
    Finalized(Capture),
}

enum Phase {
    Idle,
    Active {
        started: Instant,
        last_voice: Instant,
        buffer: Vec<i16>,
    },
}

/// Idle/Active state machine over audio frames
pub struct ActivationMachine {
    activity_threshold: f32,
    wake_threshold: f32,
    silence_timeout: Duration,
    max_window: Option<Duration>,
    phase: Phase,
}

impl ActivationMachine {
    pub fn new(activity_threshold: f32, wake_multiplier: f32, silence_timeout: Duration) -> Self {
        Self {
            activity_threshold,
            wake_threshold: activity_threshold * wake_multiplier,
            silence_timeout,
            max_window: None,
            phase: Phase::Idle,
        }
    }

    pub fn from_settings(settings: &ListenerSettings) -> Self {
        let machine = Self::new(
            settings.activity_threshold,
            settings.wake_multiplier,
            settings.silence_timeout(),
        );
        if settings.max_capture_secs > 0 {
            machine.with_max_window(settings.max_capture())
        } else {
            machine
        }
    }

    /// Close windows that stay active longer than `max`
    pub fn with_max_window(mut self, max: Duration) -> Self {
        self.max_window = Some(max);
        self
    }

    pub fn state(&self) -> ActivationState {
        match self.phase {
            Phase::Idle => ActivationState::Idle,
            Phase::Active { .. } => ActivationState::Active,
        }
    }

    pub fn wake_threshold(&self) -> f32 {
        self.wake_threshold
    }

    /// Feed one frame captured at `now`.
    ///
    /// A wake while already active is not a transition; it only refreshes
    /// the voice activity timestamp like any other loud frame.
    pub fn feed(&mut self, frame: &[i16], now: Instant) -> Transition {
        let energy = frame_energy(frame);

        match &mut self.phase {
            Phase::Idle => {
                if energy > self.wake_threshold {
                    tracing::debug!(energy, "Wake condition detected");
                    self.phase = Phase::Active {
                        started: now,
                        last_voice: now,
                        buffer: frame.to_vec(),
                    };
                    Transition::Woke
                } else {
                    Transition::None
                }
            }
            Phase::Active {
                started,
                last_voice,
                buffer,
            } => {
                buffer.extend_from_slice(frame);
                if energy > self.activity_threshold {
                    *last_voice = now;
                }

                let silent_for = now.saturating_duration_since(*last_voice);
                let open_for = now.saturating_duration_since(*started);
                let end = if silent_for > self.silence_timeout {
                    Some(WindowEnd::Silence)
                } else if self.max_window.is_some_and(|max| open_for >= max) {
                    Some(WindowEnd::MaxLength)
                } else {
                    None
                };

                match end {
                    Some(reason) => self.finish(now, reason),
                    None => Transition::None,
                }
            }
        }
    }

    /// Drop back to idle, returning any partial capture
    pub fn reset(&mut self) -> Option<Capture> {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => None,
            Phase::Active {
                started, buffer, ..
            } => Some(Capture {
                samples: buffer,
                started,
                ended: started,
                reason: WindowEnd::Silence,
            }),
        }
    }

    fn finish(&mut self, now: Instant, reason: WindowEnd) -> Transition {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Active {
                started, buffer, ..
            } => Transition::Finalized(Capture {
                samples: buffer,
                started,
                ended: now,
                reason,
            }),
            Phase::Idle => Transition::None,
        }
    }
}

/// Root-mean-square energy normalized to full scale (0.0 ..= ~1.0)
pub fn frame_energy(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f64 = frame.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let rms = (sum / frame.len() as f64).sqrt();
    (rms / f64::from(i16::MAX)) as f32
}
